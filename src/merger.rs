// Merging and deduplication of offers gathered from every provider

use crate::models::{Offer, ProviderId};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

// Two offers are the same itinerary when they fly the same flights on the
// same days. Fare class only tells offers apart when both report one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    outbound_flights: Vec<String>,
    inbound_flights: Option<Vec<String>>,
    outbound_date: NaiveDate,
    inbound_date: Option<NaiveDate>,
}

impl DedupKey {
    pub fn of(offer: &Offer) -> Self {
        Self {
            outbound_flights: offer.outbound.flight_numbers.clone(),
            inbound_flights: offer.inbound.as_ref().map(|l| l.flight_numbers.clone()),
            outbound_date: offer.outbound.departure_date(),
            inbound_date: offer.inbound.as_ref().map(|l| l.departure_date()),
        }
    }
}

// Best offer per known fare class of one itinerary, plus the best offer
// that did not say which class it sells
#[derive(Default)]
struct Bucket {
    known: Vec<(String, Offer)>,
    unknown: Option<Offer>,
}

pub struct OfferMerger {
    provider_priority: Vec<ProviderId>,
}

impl OfferMerger {
    pub fn new(provider_priority: Vec<ProviderId>) -> Self {
        Self { provider_priority }
    }

    // One offer per itinerary and known fare class, in order of first
    // appearance. An offer with no fare class competes with the cheapest
    // known class of its itinerary; if it wins it takes over that class.
    pub fn merge(&self, batches: Vec<Vec<Offer>>) -> Vec<Offer> {
        let mut order: Vec<DedupKey> = Vec::new();
        let mut buckets: HashMap<DedupKey, Bucket> = HashMap::new();

        for offer in batches.into_iter().flatten() {
            let key = DedupKey::of(&offer);
            let bucket = buckets.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Bucket::default()
            });

            match offer.fare_class.as_ref().map(|f| f.to_uppercase()) {
                Some(class) => match bucket.known.iter_mut().find(|(c, _)| *c == class) {
                    Some((_, kept)) => {
                        if self.prefer(&offer, kept) == Ordering::Less {
                            *kept = offer;
                        }
                    }
                    None => bucket.known.push((class, offer)),
                },
                None => match &bucket.unknown {
                    Some(kept) if self.prefer(&offer, kept) != Ordering::Less => {}
                    _ => bucket.unknown = Some(offer),
                },
            }
        }

        let mut merged = Vec::with_capacity(order.len());
        for key in order {
            let Some(bucket) = buckets.remove(&key) else {
                continue;
            };
            merged.extend(self.settle(bucket));
        }
        merged
    }

    fn settle(&self, bucket: Bucket) -> Vec<Offer> {
        let Bucket { known, unknown } = bucket;
        let mut offers: Vec<Offer> = known.into_iter().map(|(_, offer)| offer).collect();

        let Some(unknown) = unknown else {
            return offers;
        };
        let cheapest = offers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| self.prefer(a, b))
            .map(|(i, _)| i);

        match cheapest {
            None => offers.push(unknown),
            Some(i) => {
                if self.prefer(&unknown, &offers[i]) == Ordering::Less {
                    // Same flights, so the class reported elsewhere applies
                    let fare_class = offers[i].fare_class.clone();
                    offers[i] = Offer {
                        fare_class,
                        ..unknown
                    };
                }
            }
        }
        offers
    }

    // Less means `a` should win over `b`
    fn prefer(&self, a: &Offer, b: &Offer) -> Ordering {
        a.price
            .total_cmp(&b.price)
            .then_with(|| a.is_split().cmp(&b.is_split()))
            .then_with(|| self.rank(a).cmp(&self.rank(b)))
    }

    fn rank(&self, offer: &Offer) -> usize {
        offer
            .attribution
            .providers()
            .into_iter()
            .map(|provider| {
                self.provider_priority
                    .iter()
                    .position(|p| p == provider)
                    .unwrap_or(self.provider_priority.len())
            })
            .min()
            .unwrap_or(self.provider_priority.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{at, leg, one_way, round_trip};
    use crate::models::Attribution;

    fn merger() -> OfferMerger {
        OfferMerger::new(vec![ProviderId::amadeus(), ProviderId::kiwi()])
    }

    fn tap() -> crate::models::Leg {
        leg("GRU", "LIS", at("2025-06-01", "22:00"), 10, &["TP88"])
    }

    #[test]
    fn test_duplicates_keep_minimum_price() {
        let batches = vec![
            vec![one_way("kiwi", 500.0, tap())],
            vec![
                one_way("amadeus", 420.0, tap()),
                one_way("kiwi", 300.0, leg("GRU", "LIS", at("2025-06-01", "08:00"), 12, &["LA8084"])),
            ],
        ];

        let merged = merger().merge(batches);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].price, 420.0);
        assert_eq!(merged[0].attribution, Attribution::Single(ProviderId::amadeus()));
        assert_eq!(merged[1].price, 300.0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let back = leg("LIS", "GRU", at("2025-06-15", "12:00"), 10, &["TP87"]);
        let batches = vec![vec![
            round_trip("kiwi", 800.0, tap(), back.clone()),
            round_trip("amadeus", 760.0, tap(), back),
            one_way("kiwi", 300.0, tap()),
            one_way("kiwi", 300.0, tap()),
        ]];

        let once = merger().merge(batches);
        let twice = merger().merge(vec![once.clone()]);
        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_price_ties_prefer_single_ticket_then_priority() {
        let back = leg("LIS", "GRU", at("2025-06-15", "12:00"), 10, &["TP87"]);
        let mut split = round_trip("kiwi", 700.0, tap(), back.clone());
        split.attribution = Attribution::Split {
            outbound: ProviderId::amadeus(),
            inbound: ProviderId::amadeus(),
        };
        let kiwi = round_trip("kiwi", 700.0, tap(), back.clone());
        let amadeus = round_trip("amadeus", 700.0, tap(), back);

        let merged = merger().merge(vec![vec![split, kiwi.clone()]]);
        assert_eq!(merged, vec![kiwi.clone()]);

        let merged = merger().merge(vec![vec![kiwi], vec![amadeus.clone()]]);
        assert_eq!(merged, vec![amadeus]);
    }

    #[test]
    fn test_known_fare_classes_stay_apart() {
        let mut economy = one_way("kiwi", 300.0, tap());
        economy.fare_class = Some("ECONOMY".to_string());
        let mut business = one_way("amadeus", 900.0, tap());
        business.fare_class = Some("BUSINESS".to_string());

        let merged = merger().merge(vec![vec![economy, business]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_unknown_fare_class_merges_into_cheapest_known() {
        let mut economy = one_way("amadeus", 420.0, tap());
        economy.fare_class = Some("ECONOMY".to_string());
        let mut business = one_way("amadeus", 900.0, tap());
        business.fare_class = Some("BUSINESS".to_string());
        let unknown = one_way("kiwi", 400.0, tap());

        let merged = merger().merge(vec![vec![economy, business], vec![unknown]]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].price, 400.0);
        assert_eq!(merged[0].attribution, Attribution::Single(ProviderId::kiwi()));
        assert_eq!(merged[0].fare_class.as_deref(), Some("ECONOMY"));
        assert_eq!(merged[1].price, 900.0);

        // Merging the result again changes nothing
        assert_eq!(merger().merge(vec![merged.clone()]), merged);
    }

    #[test]
    fn test_pricier_unknown_fare_class_is_dropped() {
        let mut economy = one_way("amadeus", 420.0, tap());
        economy.fare_class = Some("economy".to_string());
        let unknown = one_way("kiwi", 450.0, tap());
        let also_unknown = one_way("kiwi", 430.0, tap());

        let merged = merger().merge(vec![vec![unknown, economy.clone(), also_unknown]]);
        assert_eq!(merged, vec![economy]);
    }
}
