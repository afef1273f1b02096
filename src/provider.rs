// Provider adapter contract. The engine only ever talks to providers
// through this trait, one implementation per flight data source.

use crate::error::ProviderError;
use crate::links::fallback_link;
use crate::models::{Attribution, Leg, Offer, ProviderId, ProviderQuery};
use async_trait::async_trait;

// The normalized subset of a provider-native offer
#[derive(Debug, Clone, PartialEq)]
pub struct RawOffer {
    pub provider: ProviderId,
    pub price: f64,
    pub currency: String,
    pub outbound: Leg,
    pub inbound: Option<Leg>,
    pub fare_class: Option<String>,
    pub deep_link: Option<String>,
    pub baggage_included: Option<bool>,
}

#[async_trait]
pub trait FlightProvider: Send + Sync + 'static {
    fn id(&self) -> ProviderId;

    // Search one itinerary shape. Credentials, retries and transport are
    // the adapter's business.
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RawOffer>, ProviderError>;

    // Turn a raw offer into the engine's Offer for the given query
    fn normalize(&self, raw: RawOffer, query: &ProviderQuery) -> Result<Offer, ProviderError> {
        normalize_offer(raw, query)
    }
}

pub fn normalize_offer(raw: RawOffer, query: &ProviderQuery) -> Result<Offer, ProviderError> {
    let provider = raw.provider.clone();

    if !raw.price.is_finite() || raw.price < 0.0 {
        return Err(ProviderError::rejected(
            &provider,
            format!("offer has invalid price {}", raw.price),
        ));
    }
    if !raw.currency.eq_ignore_ascii_case(&query.currency) {
        return Err(ProviderError::rejected(
            &provider,
            format!(
                "offer priced in {} but the search is in {}",
                raw.currency, query.currency
            ),
        ));
    }
    match (query.return_date.is_some(), raw.inbound.is_some()) {
        (true, false) => {
            return Err(ProviderError::rejected(
                &provider,
                "round-trip query answered without an inbound leg",
            ))
        }
        (false, true) => {
            return Err(ProviderError::rejected(
                &provider,
                "one-way query answered with an inbound leg",
            ))
        }
        _ => {}
    }

    let fallback_link = fallback_link(
        &raw.outbound,
        raw.inbound.as_ref(),
        &query.currency,
        &query.locale,
    );
    let offer = Offer {
        outbound: raw.outbound,
        inbound: raw.inbound,
        price: raw.price,
        currency: query.currency.clone(),
        attribution: Attribution::Single(provider.clone()),
        fare_class: raw.fare_class,
        direct_link: raw.deep_link.filter(|link| !link.is_empty()),
        fallback_link,
        baggage_included: raw.baggage_included,
    };
    offer
        .check_invariants()
        .map_err(|reason| ProviderError::rejected(&provider, reason))?;

    Ok(offer)
}
