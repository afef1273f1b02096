use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flight_ticker::{
    Attribution, Leg, Offer, OfferMerger, ProviderId, RankingConfig, RankingEngine, RankingMode,
};
use rand::{thread_rng, Rng};

fn random_offers(count: usize) -> Vec<Offer> {
    let mut rng = thread_rng();
    let base = NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let providers = [ProviderId::amadeus(), ProviderId::kiwi()];

    (0..count)
        .map(|_| {
            // Small flight-number space so the merger finds duplicates
            let flight = format!("TP{}", rng.gen_range(1..200));
            let departure = base + Duration::hours(rng.gen_range(0..72));
            let hours = rng.gen_range(9..30);
            let stops = rng.gen_range(0..3);
            let outbound = Leg {
                origin: "GRU".to_string(),
                destination: "LIS".to_string(),
                departure,
                arrival: departure + Duration::hours(hours),
                flight_numbers: vec![flight],
                carriers: vec!["TP".to_string()],
                stops,
                duration_minutes: hours * 60,
            };
            Offer {
                fallback_link: format!("https://fallback/{}", outbound.flight_numbers[0]),
                outbound,
                inbound: None,
                price: rng.gen_range(150.0..2500.0),
                currency: "EUR".to_string(),
                attribution: Attribution::Single(providers[rng.gen_range(0..2)].clone()),
                fare_class: None,
                direct_link: None,
                baggage_included: Some(rng.gen_bool(0.5)),
            }
        })
        .collect()
}

pub fn ranking_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_and_rank");
    let merger = OfferMerger::new(vec![ProviderId::amadeus(), ProviderId::kiwi()]);
    let ranking = RankingEngine::new(RankingConfig::default());

    for size in [100, 1_000, 10_000].iter() {
        let offers = random_offers(*size);
        for mode in [RankingMode::PriceOnly, RankingMode::Weighted] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode), size),
                &offers,
                |b, offers| {
                    b.iter(|| {
                        let merged = merger.merge(vec![offers.clone()]);
                        let result = ranking.rank(merged, mode, 20);
                        black_box(result)
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, ranking_benchmark);
criterion_main!(benches);
