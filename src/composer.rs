// Split-ticket composition: two separate one-way tickets sold as one trip

use crate::config::SplitConfig;
use crate::links::fallback_link;
use crate::models::{Attribution, Offer, ProviderId};
use chrono::Duration;
use tracing::debug;

pub struct SplitTicketComposer {
    config: SplitConfig,
    locale: String,
}

impl SplitTicketComposer {
    pub fn new(config: SplitConfig, locale: &str) -> Self {
        Self {
            config,
            locale: locale.to_string(),
        }
    }

    // Pairs every affordable outbound with every compatible inbound.
    // Round-trip inputs are ignored; each side is bounded to the cheapest
    // `max_offers_per_leg` offers before pairing.
    pub fn compose(&self, outbound: Vec<Offer>, inbound: Vec<Offer>) -> Vec<Offer> {
        let outbound = self.cheapest_one_way(outbound);
        let inbound = self.cheapest_one_way(inbound);
        let buffer = Duration::minutes(self.config.min_connection_minutes);

        let mut composed = Vec::new();
        let mut rejected = 0usize;
        for out in &outbound {
            for back in &inbound {
                if back.outbound.departure <= out.outbound.arrival + buffer {
                    rejected += 1;
                    continue;
                }
                if !self.within_ceilings(out, back) {
                    rejected += 1;
                    continue;
                }
                composed.push(self.pair(out, back));
            }
        }

        debug!(
            outbound = outbound.len(),
            inbound = inbound.len(),
            composed = composed.len(),
            rejected,
            "Composed split-ticket offers"
        );
        composed
    }

    fn cheapest_one_way(&self, offers: Vec<Offer>) -> Vec<Offer> {
        let mut offers: Vec<Offer> = offers
            .into_iter()
            .filter(|offer| !offer.is_round_trip())
            .collect();
        offers.sort_by(|a, b| a.price.total_cmp(&b.price));
        offers.truncate(self.config.max_offers_per_leg);
        offers
    }

    fn within_ceilings(&self, out: &Offer, back: &Offer) -> bool {
        if let Some(max_minutes) = self.config.max_total_duration_minutes {
            if out.outbound.duration_minutes + back.outbound.duration_minutes > max_minutes {
                return false;
            }
        }
        if let Some(max_days) = self.config.max_stay_days {
            let stay = back.outbound.departure - out.outbound.arrival;
            if stay > Duration::days(max_days) {
                return false;
            }
        }
        true
    }

    fn pair(&self, out: &Offer, back: &Offer) -> Offer {
        let outbound = out.outbound.clone();
        let inbound = back.outbound.clone();
        let fallback_link = fallback_link(&outbound, Some(&inbound), &out.currency, &self.locale);
        let fare_class = match (&out.fare_class, &back.fare_class) {
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            _ => None,
        };

        Offer {
            outbound,
            inbound: Some(inbound),
            price: out.price + back.price,
            currency: out.currency.clone(),
            attribution: Attribution::Split {
                outbound: single_provider(&out.attribution),
                inbound: single_provider(&back.attribution),
            },
            fare_class,
            direct_link: None,
            fallback_link,
            baggage_included: both_include_bags(out.baggage_included, back.baggage_included),
        }
    }
}

// Two tickets include a bag only if each of them does
fn both_include_bags(out: Option<bool>, back: Option<bool>) -> Option<bool> {
    match (out, back) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn single_provider(attribution: &Attribution) -> ProviderId {
    match attribution {
        Attribution::Single(provider) => provider.clone(),
        Attribution::Split { outbound, .. } => outbound.clone(),
    }
}
