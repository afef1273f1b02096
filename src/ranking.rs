// Ranking of merged offers, by price alone or by a weighted score

use crate::config::RankingConfig;
use crate::error::SearchError;
use crate::models::{Offer, RankingMode};
use serde::Serialize;
use std::cmp::Ordering;

// Per-search counters, filled in by the engine as the phases run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub queries_issued: usize,
    pub queries_succeeded: usize,
    pub queries_failed: usize,
    pub queries_timed_out: usize,
    pub offers_collected: usize,
    pub offers_dropped: usize,
    pub split_offers_composed: usize,
    pub duplicates_removed: usize,
    pub elapsed_ms: u64,
}

// Normalized components of a weighted score, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub price: f64,
    pub duration: f64,
    pub stops: f64,
    pub reliability: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOffer {
    pub offer: Offer,
    // Price in price-only mode, weighted score otherwise. Lower ranks first.
    pub rank_key: f64,
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub mode: RankingMode,
    pub offers: Vec<RankedOffer>,
    pub stats: SearchStats,
}

impl RankedResult {
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn cheapest(&self) -> Option<&Offer> {
        self.offers
            .iter()
            .map(|ranked| &ranked.offer)
            .min_by(|a, b| a.price.total_cmp(&b.price))
    }
}

// Min-max bounds of one ranking dimension across the candidate set
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: f64,
    max: f64,
}

impl Bounds {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Bounds {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |b, v| Bounds {
                min: b.min.min(v),
                max: b.max.max(v),
            },
        )
    }

    fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range <= f64::EPSILON {
            0.0
        } else {
            (value - self.min) / range
        }
    }
}

pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn rank(
        &self,
        offers: Vec<Offer>,
        mode: RankingMode,
        limit: usize,
    ) -> Result<RankedResult, SearchError> {
        if limit == 0 {
            return Err(SearchError::InvalidConfiguration(
                "Result limit must be at least 1".to_string(),
            ));
        }

        let mut ranked = match mode {
            RankingMode::PriceOnly => self.price_only(offers),
            RankingMode::Weighted => self.weighted(offers),
        };
        ranked.truncate(limit);

        Ok(RankedResult {
            mode,
            offers: ranked,
            stats: SearchStats::default(),
        })
    }

    fn price_only(&self, offers: Vec<Offer>) -> Vec<RankedOffer> {
        let mut ranked: Vec<RankedOffer> = offers
            .into_iter()
            .map(|offer| RankedOffer {
                rank_key: offer.price,
                offer,
                breakdown: None,
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.offer
                .price
                .total_cmp(&b.offer.price)
                .then_with(|| {
                    a.offer
                        .total_duration_minutes()
                        .cmp(&b.offer.total_duration_minutes())
                })
                .then_with(|| a.offer.total_stops().cmp(&b.offer.total_stops()))
        });
        ranked
    }

    fn weighted(&self, offers: Vec<Offer>) -> Vec<RankedOffer> {
        let prices = Bounds::of(offers.iter().map(|o| o.price));
        let durations = Bounds::of(offers.iter().map(|o| o.total_duration_minutes() as f64));
        let stops = Bounds::of(offers.iter().map(|o| o.total_stops() as f64));
        let weights = &self.config.weights;

        let mut ranked: Vec<RankedOffer> = offers
            .into_iter()
            .map(|offer| {
                let price = prices.normalize(offer.price);
                let duration = durations.normalize(offer.total_duration_minutes() as f64);
                let stop_score = stops.normalize(offer.total_stops() as f64);
                let reliability = self.reliability(&offer);
                let total = weights.price * price
                    + weights.duration * duration
                    + weights.stops * stop_score
                    - weights.provider_reliability * reliability;

                RankedOffer {
                    rank_key: total,
                    offer,
                    breakdown: Some(ScoreBreakdown {
                        price,
                        duration,
                        stops: stop_score,
                        reliability,
                        total,
                    }),
                }
            })
            .collect();

        ranked.sort_by(|a, b| match a.rank_key.total_cmp(&b.rank_key) {
            Ordering::Equal => a.offer.price.total_cmp(&b.offer.price),
            other => other,
        });
        ranked
    }

    // A split offer is only as reliable as its weaker provider
    fn reliability(&self, offer: &Offer) -> f64 {
        offer
            .attribution
            .providers()
            .into_iter()
            .map(|provider| self.config.reliability(provider))
            .fold(f64::INFINITY, f64::min)
            .clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingWeights;
    use crate::models::fixtures::{at, leg, one_way, round_trip};
    use crate::models::{Attribution, ProviderId};
    use test_case::test_case;

    fn engine() -> RankingEngine {
        RankingEngine::new(RankingConfig::default())
    }

    fn offers() -> Vec<Offer> {
        vec![
            one_way("kiwi", 500.0, leg("GRU", "LIS", at("2025-06-01", "22:00"), 10, &["TP88"])),
            one_way("kiwi", 300.0, leg("GRU", "LIS", at("2025-06-01", "08:00"), 20, &["UX58", "UX1153"])),
            one_way("amadeus", 300.0, leg("GRU", "LIS", at("2025-06-01", "10:00"), 14, &["LA8084"])),
            one_way("amadeus", 650.0, leg("GRU", "LIS", at("2025-06-01", "23:00"), 9, &["TP82"])),
        ]
    }

    #[test]
    fn test_price_only_is_monotone_with_duration_tie_break() {
        let result = engine().rank(offers(), RankingMode::PriceOnly, 10).unwrap();
        let prices: Vec<f64> = result.offers.iter().map(|r| r.offer.price).collect();
        assert_eq!(prices, vec![300.0, 300.0, 500.0, 650.0]);
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
        // Shorter of the two 300s first
        assert_eq!(result.offers[0].offer.outbound.flight_numbers, vec!["LA8084"]);
        assert!(result.offers.iter().all(|r| r.breakdown.is_none()));
    }

    #[test_case(1, 1; "#1 truncated to limit")]
    #[test_case(3, 3; "#2 partial")]
    #[test_case(10, 4; "#3 limit above candidates")]
    fn test_result_length_is_min_of_limit_and_candidates(limit: usize, expected: usize) {
        for mode in [RankingMode::PriceOnly, RankingMode::Weighted] {
            let result = engine().rank(offers(), mode, limit).unwrap();
            assert_eq!(result.len(), expected);
        }
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        assert!(matches!(
            engine().rank(offers(), RankingMode::PriceOnly, 0),
            Err(SearchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_weighted_prefers_cheap_and_short() {
        let result = engine().rank(offers(), RankingMode::Weighted, 10).unwrap();
        let first = &result.offers[0];
        assert_eq!(first.offer.outbound.flight_numbers, vec!["LA8084"]);

        let breakdown = first.breakdown.as_ref().unwrap();
        assert_eq!(breakdown.price, 0.0);
        assert_eq!(breakdown.stops, 0.0);
        assert_eq!(breakdown.reliability, 0.9);
        assert!(result
            .offers
            .windows(2)
            .all(|w| w[0].rank_key <= w[1].rank_key));
    }

    #[test]
    fn test_degenerate_ranges_fall_back_to_price() {
        let weights = RankingWeights {
            price: 0.0,
            duration: 1.0,
            stops: 1.0,
            provider_reliability: 0.0,
        };
        let config = RankingConfig {
            weights,
            ..RankingConfig::default()
        };
        let same_shape = vec![
            one_way("kiwi", 410.0, leg("GRU", "LIS", at("2025-06-01", "22:00"), 10, &["TP88"])),
            one_way("kiwi", 390.0, leg("GRU", "LIS", at("2025-06-02", "22:00"), 10, &["TP88"])),
        ];

        let result = RankingEngine::new(config)
            .rank(same_shape, RankingMode::Weighted, 5)
            .unwrap();
        assert!(result.offers.iter().all(|r| r.rank_key == 0.0));
        assert_eq!(result.offers[0].offer.price, 390.0);
    }

    #[test]
    fn test_split_offers_use_weaker_provider_reliability() {
        let out = leg("GRU", "LIS", at("2025-06-01", "22:00"), 10, &["TP88"]);
        let back = leg("LIS", "GRU", at("2025-06-15", "12:00"), 10, &["TP87"]);
        let mut split = round_trip("amadeus", 600.0, out, back);
        split.attribution = Attribution::Split {
            outbound: ProviderId::amadeus(),
            inbound: ProviderId::kiwi(),
        };

        assert_eq!(engine().reliability(&split), 0.8);
    }
}
