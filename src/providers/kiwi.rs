// Kiwi.com Tequila search adapter (API key auth)

use super::{http_client, parse_local_timestamp, status_error, transport_error, with_retries, RetryConfig};
use crate::error::ProviderError;
use crate::models::{CabinClass, Leg, ProviderId, ProviderQuery, Segment};
use crate::provider::{FlightProvider, RawOffer};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const BASE_URL: &str = "https://api.tequila.kiwi.com/v2";

#[derive(Debug, Clone)]
pub struct KiwiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_results: u32,
    pub retry_config: RetryConfig,
}

impl KiwiConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: BASE_URL.to_string(),
            timeout_ms: 30_000,
            max_results: 50,
            retry_config: RetryConfig::default(),
        }
    }
}

pub struct KiwiProvider {
    id: ProviderId,
    config: KiwiConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct KiwiResponse {
    pub currency: Option<String>,
    #[serde(default)]
    pub data: Vec<KiwiItinerary>,
}

#[derive(Debug, Deserialize)]
pub struct KiwiItinerary {
    pub price: f64,
    pub deep_link: Option<String>,
    #[serde(default)]
    pub route: Vec<KiwiRoute>,
    pub duration: Option<KiwiDuration>,
    // Price per extra checked bag; empty when a bag is already included
    pub bags_price: Option<HashMap<String, f64>>,
}

// Seconds per direction
#[derive(Debug, Deserialize)]
pub struct KiwiDuration {
    #[serde(default)]
    pub departure: i64,
    #[serde(rename = "return", default)]
    pub return_: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KiwiRoute {
    pub fly_from: String,
    pub fly_to: String,
    #[serde(rename = "local_departure")]
    pub local_departure: String,
    #[serde(rename = "local_arrival")]
    pub local_arrival: String,
    pub airline: String,
    #[serde(rename = "flight_no")]
    pub flight_no: Option<u32>,
    #[serde(rename = "fare_category")]
    pub fare_category: Option<String>,
    // 0 for outbound segments, 1 for the way back
    #[serde(rename = "return", default)]
    pub return_: u8,
}

// Tequila cabin codes
pub fn cabin_code(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "M",
        CabinClass::PremiumEconomy => "W",
        CabinClass::Business => "C",
        CabinClass::First => "F",
    }
}

fn cabin_from_code(code: &str) -> Option<CabinClass> {
    match code {
        "M" => Some(CabinClass::Economy),
        "W" => Some(CabinClass::PremiumEconomy),
        "C" => Some(CabinClass::Business),
        "F" => Some(CabinClass::First),
        _ => None,
    }
}

impl KiwiProvider {
    pub fn new(config: KiwiConfig) -> Result<Self, ProviderError> {
        let id = ProviderId::kiwi();
        let http = http_client(&id, config.timeout_ms)?;
        Ok(Self { id, config, http })
    }

    fn search_params(&self, query: &ProviderQuery) -> Vec<(&'static str, String)> {
        let departure = query.departure_date.format("%d/%m/%Y").to_string();
        // Tequila wants a bare language ("pt"), not "pt-PT"
        let language = query
            .locale
            .split(['-', '_'])
            .next()
            .unwrap_or("en")
            .to_lowercase();

        let mut params = vec![
            ("fly_from", query.origin.clone()),
            ("fly_to", query.destination.clone()),
            ("date_from", departure.clone()),
            ("date_to", departure),
            ("adults", query.passengers.adults.to_string()),
            ("children", query.passengers.children.to_string()),
            ("infants", query.passengers.infants.to_string()),
            ("max_stopovers", query.max_stops.to_string()),
            ("curr", query.currency.clone()),
            ("locale", language),
            ("limit", self.config.max_results.to_string()),
            ("sort", "price".to_string()),
            (
                "selected_cabins",
                cabin_code(query.cabin.unwrap_or(CabinClass::Economy)).to_string(),
            ),
        ];
        match query.return_date {
            Some(return_date) => {
                let ret = return_date.format("%d/%m/%Y").to_string();
                params.push(("flight_type", "round".to_string()));
                params.push(("return_from", ret.clone()));
                params.push(("return_to", ret));
            }
            None => params.push(("flight_type", "oneway".to_string())),
        }
        params
    }

    async fn search_once(&self, query: &ProviderQuery) -> Result<KiwiResponse, ProviderError> {
        let response = self
            .http
            .get(format!("{}/search", self.config.base_url))
            .header("apikey", &self.config.api_key)
            .query(&self.search_params(query))
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.id, status, &body));
        }

        response
            .json::<KiwiResponse>()
            .await
            .map_err(|e| transport_error(&self.id, e))
    }
}

#[async_trait]
impl FlightProvider for KiwiProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RawOffer>, ProviderError> {
        let response =
            with_retries(&self.id, &self.config.retry_config, || self.search_once(query)).await?;
        Ok(parse_offers(&self.id, response, query))
    }
}

pub fn parse_offers(provider: &ProviderId, response: KiwiResponse, query: &ProviderQuery) -> Vec<RawOffer> {
    let currency = response
        .currency
        .clone()
        .unwrap_or_else(|| query.currency.clone());
    let total = response.data.len();

    let offers: Vec<RawOffer> = response
        .data
        .into_iter()
        .filter_map(|itinerary| parse_itinerary(provider, itinerary, &currency))
        .collect();

    if offers.len() < total {
        debug!(
            provider = %provider,
            skipped = total - offers.len(),
            "Skipped unreadable Kiwi itineraries"
        );
    }
    offers
}

fn parse_itinerary(provider: &ProviderId, itinerary: KiwiItinerary, currency: &str) -> Option<RawOffer> {
    let mut outbound_segments = Vec::new();
    let mut inbound_segments = Vec::new();
    for route in &itinerary.route {
        let segment = Segment {
            origin: route.fly_from.clone(),
            destination: route.fly_to.clone(),
            departure: parse_local_timestamp(&route.local_departure)?,
            arrival: parse_local_timestamp(&route.local_arrival)?,
            // flight_no belongs to the marketing airline, as on Amadeus
            carrier: route.airline.clone(),
            number: route.flight_no?.to_string(),
        };
        if route.return_ == 1 {
            inbound_segments.push(segment);
        } else {
            outbound_segments.push(segment);
        }
    }

    let minutes = |seconds: i64| (seconds > 0).then_some(seconds / 60);
    let outbound_duration = itinerary.duration.as_ref().and_then(|d| minutes(d.departure));
    let inbound_duration = itinerary.duration.as_ref().and_then(|d| minutes(d.return_));

    let outbound = Leg::from_segments(&outbound_segments, outbound_duration)?;
    let inbound = if inbound_segments.is_empty() {
        None
    } else {
        Some(Leg::from_segments(&inbound_segments, inbound_duration)?)
    };

    let fare_class = itinerary
        .route
        .first()
        .and_then(|r| r.fare_category.as_deref())
        .and_then(cabin_from_code)
        .map(|cabin| cabin.as_str().to_string());

    Some(RawOffer {
        provider: provider.clone(),
        price: itinerary.price,
        currency: currency.to_string(),
        outbound,
        inbound,
        fare_class,
        deep_link: itinerary.deep_link,
        baggage_included: itinerary.bags_price.map(|prices| prices.is_empty()),
    })
}
