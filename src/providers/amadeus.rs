// Amadeus Self-Service flight offers adapter (OAuth2 client credentials)

use super::{http_client, parse_local_timestamp, status_error, transport_error, with_retries, RetryConfig};
use crate::error::ProviderError;
use crate::links::carrier_direct_link;
use crate::models::{Leg, ProviderId, ProviderQuery, Segment};
use crate::provider::{FlightProvider, RawOffer};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

const TEST_BASE_URL: &str = "https://test.api.amadeus.com";
const PRODUCTION_BASE_URL: &str = "https://api.amadeus.com";

// Refresh tokens this long before Amadeus says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_results: u32,
    pub retry_config: RetryConfig,
}

impl AmadeusConfig {
    pub fn new(client_id: &str, client_secret: &str, production: bool) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: if production {
                PRODUCTION_BASE_URL
            } else {
                TEST_BASE_URL
            }
            .to_string(),
            timeout_ms: 30_000,
            max_results: 50,
            retry_config: RetryConfig::default(),
        }
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct AmadeusProvider {
    id: ProviderId,
    config: AmadeusConfig,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    1799
}

// Subset of the flight-offers search response we read
#[derive(Debug, Deserialize)]
pub struct AmadeusResponse {
    #[serde(default)]
    pub data: Vec<AmadeusOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusOffer {
    #[serde(default)]
    pub itineraries: Vec<AmadeusItinerary>,
    pub price: AmadeusPrice,
    #[serde(default)]
    pub traveler_pricings: Vec<AmadeusTravelerPricing>,
}

#[derive(Debug, Deserialize)]
pub struct AmadeusItinerary {
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<AmadeusSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusSegment {
    pub departure: AmadeusEndpoint,
    pub arrival: AmadeusEndpoint,
    pub carrier_code: String,
    pub number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusEndpoint {
    pub iata_code: String,
    pub at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusPrice {
    pub currency: String,
    pub total: Option<String>,
    pub grand_total: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusTravelerPricing {
    #[serde(default)]
    pub fare_details_by_segment: Vec<AmadeusFareDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusFareDetails {
    pub cabin: Option<String>,
    pub included_checked_bags: Option<AmadeusCheckedBags>,
}

#[derive(Debug, Deserialize)]
pub struct AmadeusCheckedBags {
    pub quantity: Option<u32>,
    // Some fares state the allowance by weight instead of piece count
    pub weight: Option<u32>,
}

impl AmadeusProvider {
    pub fn new(config: AmadeusConfig) -> Result<Self, ProviderError> {
        let id = ProviderId::amadeus();
        let http = http_client(&id, config.timeout_ms)?;
        Ok(Self {
            id,
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        let token = self.token.lock();
        token
            .as_ref()
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| t.value.clone())
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.config.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // A refused token request is an auth failure, not a bad query
            return Err(ProviderError::unavailable(
                &self.id,
                format!("token request failed with HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(&self.id, format!("token response: {}", e)))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);

        *self.token.lock() = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!(provider = %self.id, lifetime_s = lifetime.as_secs(), "Fetched Amadeus access token");

        Ok(token.access_token)
    }

    fn search_params(&self, query: &ProviderQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.format("%Y-%m-%d").to_string()),
            ("adults", query.passengers.adults.to_string()),
            ("nonStop", (query.max_stops == 0).to_string()),
            ("currencyCode", query.currency.clone()),
            ("max", self.config.max_results.to_string()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.format("%Y-%m-%d").to_string()));
        }
        if query.passengers.children > 0 {
            params.push(("children", query.passengers.children.to_string()));
        }
        if query.passengers.infants > 0 {
            params.push(("infants", query.passengers.infants.to_string()));
        }
        if let Some(cabin) = query.cabin {
            params.push(("travelClass", cabin.as_str().to_string()));
        }
        params
    }

    async fn search_once(&self, query: &ProviderQuery) -> Result<AmadeusResponse, ProviderError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}/v2/shopping/flight-offers", self.config.base_url))
            .bearer_auth(token)
            .query(&self.search_params(query))
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked early; the retry fetches a fresh one
            self.token.lock().take();
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.id, status, &body));
        }

        response
            .json::<AmadeusResponse>()
            .await
            .map_err(|e| transport_error(&self.id, e))
    }
}

#[async_trait]
impl FlightProvider for AmadeusProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RawOffer>, ProviderError> {
        let response =
            with_retries(&self.id, &self.config.retry_config, || self.search_once(query)).await?;
        Ok(parse_offers(&self.id, response, query))
    }
}

// Offers that cannot be read are skipped, the rest of the response is kept
pub fn parse_offers(provider: &ProviderId, response: AmadeusResponse, query: &ProviderQuery) -> Vec<RawOffer> {
    let total = response.data.len();
    let offers: Vec<RawOffer> = response
        .data
        .into_iter()
        .filter_map(|offer| parse_offer(provider, offer, query))
        .collect();

    if offers.len() < total {
        debug!(
            provider = %provider,
            skipped = total - offers.len(),
            "Skipped unreadable Amadeus offers"
        );
    }
    offers
}

fn parse_offer(provider: &ProviderId, offer: AmadeusOffer, query: &ProviderQuery) -> Option<RawOffer> {
    let price: f64 = offer
        .price
        .grand_total
        .as_deref()
        .or(offer.price.total.as_deref())?
        .parse()
        .ok()?;

    let mut itineraries = offer.itineraries.iter();
    let outbound = parse_itinerary(itineraries.next()?)?;
    let inbound = match itineraries.next() {
        Some(itinerary) => Some(parse_itinerary(itinerary)?),
        None => None,
    };

    let fare_details = offer
        .traveler_pricings
        .first()
        .map(|tp| tp.fare_details_by_segment.as_slice())
        .unwrap_or_default();
    let fare_class = fare_details.first().and_then(|fd| fd.cabin.clone());
    let baggage_included = checked_bag_included(fare_details);
    let deep_link = carrier_direct_link(&outbound, inbound.as_ref(), &query.passengers);

    Some(RawOffer {
        provider: provider.clone(),
        price,
        currency: offer.price.currency,
        outbound,
        inbound,
        fare_class,
        deep_link,
        baggage_included,
    })
}

// A checked bag on any segment counts; no bag data at all means unknown
fn checked_bag_included(fare_details: &[AmadeusFareDetails]) -> Option<bool> {
    let allowances: Vec<u32> = fare_details
        .iter()
        .filter_map(|fd| fd.included_checked_bags.as_ref())
        .filter_map(|bags| bags.quantity.or(bags.weight))
        .collect();
    if allowances.is_empty() {
        None
    } else {
        Some(allowances.iter().any(|a| *a > 0))
    }
}

fn parse_itinerary(itinerary: &AmadeusItinerary) -> Option<Leg> {
    let segments = itinerary
        .segments
        .iter()
        .map(|s| {
            Some(Segment {
                origin: s.departure.iata_code.clone(),
                destination: s.arrival.iata_code.clone(),
                departure: parse_local_timestamp(&s.departure.at)?,
                arrival: parse_local_timestamp(&s.arrival.at)?,
                carrier: s.carrier_code.clone(),
                number: s.number.clone(),
            })
        })
        .collect::<Option<Vec<Segment>>>()?;

    let duration = itinerary.duration.as_deref().and_then(parse_iso_duration);
    Leg::from_segments(&segments, duration)
}

// ISO-8601 durations as Amadeus sends them: "PT13H30M", "P1DT2H5M"
pub fn parse_iso_duration(value: &str) -> Option<i64> {
    let rest = value.strip_prefix('P')?;
    let (days, time) = match rest.split_once('T') {
        Some((days, time)) => (days, time),
        None => (rest, ""),
    };

    let mut minutes = 0i64;
    if !days.is_empty() {
        minutes += days.strip_suffix('D')?.parse::<i64>().ok()? * 24 * 60;
    }

    let mut number = String::new();
    for c in time.chars() {
        match c {
            '0'..='9' => number.push(c),
            'H' => minutes += number.drain(..).collect::<String>().parse::<i64>().ok()? * 60,
            'M' => minutes += number.drain(..).collect::<String>().parse::<i64>().ok()?,
            'S' => {
                number.clear();
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }

    Some(minutes)
}
