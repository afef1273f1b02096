// Core data model shared by every stage of the search pipeline

use crate::dates::DateSpec;
use crate::error::SearchError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        ProviderId(id.into())
    }

    pub fn amadeus() -> Self {
        ProviderId::new("amadeus")
    }

    pub fn kiwi() -> Self {
        ProviderId::new("kiwi")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl Passengers {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }
}

impl FromStr for CabinClass {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "ECONOMY" => Ok(CabinClass::Economy),
            "PREMIUM_ECONOMY" => Ok(CabinClass::PremiumEconomy),
            "BUSINESS" => Ok(CabinClass::Business),
            "FIRST" => Ok(CabinClass::First),
            other => Err(SearchError::Configuration(format!(
                "Unknown cabin class: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    PriceOnly,
    #[default]
    Weighted,
}

// What a user asks for before any expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub origin: String,
    pub destination: String,
    pub departure: DateSpec,
    pub return_date: Option<DateSpec>,
    pub passengers: Passengers,
    pub max_stops: u32,
    pub cabin: Option<CabinClass>,
    // Fall back to the engine configuration when absent
    pub currency: Option<String>,
    pub locale: Option<String>,
    pub limit: usize,
    pub ranking: RankingMode,
    pub max_price: Option<f64>,
    // Only offers known to include a checked bag
    #[serde(default)]
    pub checked_bag: bool,
    // Split tickets also need to be enabled in the engine configuration
    pub split_tickets: bool,
}

impl SearchRequest {
    pub fn new(origin: &str, destination: &str, departure: DateSpec) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure,
            return_date: None,
            passengers: Passengers::default(),
            max_stops: 2,
            cabin: None,
            currency: None,
            locale: None,
            limit: 10,
            ranking: RankingMode::default(),
            max_price: None,
            checked_bag: false,
            split_tickets: true,
        }
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        validate_location_code(&self.origin)?;
        validate_location_code(&self.destination)?;

        if self.passengers.adults < 1 {
            return Err(SearchError::Configuration(
                "At least one adult passenger is required".to_string(),
            ));
        }
        if self.passengers.infants > self.passengers.adults {
            return Err(SearchError::Configuration(format!(
                "{} infants cannot travel with {} adults",
                self.passengers.infants, self.passengers.adults
            )));
        }
        if self.limit == 0 {
            return Err(SearchError::InvalidConfiguration(
                "Result limit must be at least 1".to_string(),
            ));
        }
        if let Some(max_price) = self.max_price {
            if !max_price.is_finite() || max_price < 0.0 {
                return Err(SearchError::Configuration(format!(
                    "Invalid maximum price: {}",
                    max_price
                )));
            }
        }
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(SearchError::Configuration(format!(
                    "Invalid currency code: {}",
                    currency
                )));
            }
        }
        Ok(())
    }
}

// Airport and metro group codes are both three letters
pub fn validate_location_code(code: &str) -> Result<(), SearchError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(SearchError::Configuration(format!(
            "Invalid airport or group code: '{}'",
            code
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryRole {
    // Round trip or one-way, exactly as requested
    Direct,
    // One-way origin -> destination used to build split tickets
    SplitOutbound,
    // One-way destination -> origin used to build split tickets
    SplitInbound,
}

// A single itinerary shape sent to exactly one provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub provider: ProviderId,
    pub role: QueryRole,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: Passengers,
    pub max_stops: u32,
    pub cabin: Option<CabinClass>,
    pub currency: String,
    pub locale: String,
}

// One flight as reported by a provider, before it is folded into a Leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub carrier: String,
    pub number: String,
}

impl Segment {
    pub fn flight_number(&self) -> String {
        format!("{}{}", self.carrier, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub flight_numbers: Vec<String>,
    pub carriers: Vec<String>,
    pub stops: u32,
    pub duration_minutes: i64,
}

impl Leg {
    // Builds a leg from its ordered segments. `duration_minutes` is the
    // provider-reported duration; local timestamps are used otherwise.
    pub fn from_segments(segments: &[Segment], duration_minutes: Option<i64>) -> Option<Leg> {
        let first = segments.first()?;
        let last = segments.last()?;

        let mut carriers: Vec<String> = Vec::new();
        for segment in segments {
            if !segment.carrier.is_empty() && !carriers.contains(&segment.carrier) {
                carriers.push(segment.carrier.clone());
            }
        }

        Some(Leg {
            origin: first.origin.clone(),
            destination: last.destination.clone(),
            departure: first.departure,
            arrival: last.arrival,
            flight_numbers: segments.iter().map(Segment::flight_number).collect(),
            carriers,
            stops: (segments.len() - 1) as u32,
            duration_minutes: duration_minutes
                .unwrap_or_else(|| (last.arrival - first.departure).num_minutes())
                .max(0),
        })
    }

    pub fn departure_date(&self) -> NaiveDate {
        self.departure.date()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    Single(ProviderId),
    Split {
        outbound: ProviderId,
        inbound: ProviderId,
    },
}

impl Attribution {
    pub fn providers(&self) -> Vec<&ProviderId> {
        match self {
            Attribution::Single(provider) => vec![provider],
            Attribution::Split { outbound, inbound } => vec![outbound, inbound],
        }
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribution::Single(provider) => write!(f, "{}", provider),
            Attribution::Split { outbound, inbound } => {
                write!(f, "split({} + {})", outbound, inbound)
            }
        }
    }
}

// The engine's unified representation of a bookable itinerary.
// Offers are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub outbound: Leg,
    pub inbound: Option<Leg>,
    pub price: f64,
    pub currency: String,
    pub attribution: Attribution,
    pub fare_class: Option<String>,
    pub direct_link: Option<String>,
    pub fallback_link: String,
    // Whether a checked bag is in the price; None when the provider is silent
    #[serde(default)]
    pub baggage_included: Option<bool>,
}

impl Offer {
    pub fn is_round_trip(&self) -> bool {
        self.inbound.is_some()
    }

    pub fn is_split(&self) -> bool {
        matches!(self.attribution, Attribution::Split { .. })
    }

    pub fn total_duration_minutes(&self) -> i64 {
        self.outbound.duration_minutes + self.inbound.as_ref().map_or(0, |l| l.duration_minutes)
    }

    pub fn total_stops(&self) -> u32 {
        self.outbound.stops + self.inbound.as_ref().map_or(0, |l| l.stops)
    }

    pub fn max_leg_stops(&self) -> u32 {
        self.outbound
            .stops
            .max(self.inbound.as_ref().map_or(0, |l| l.stops))
    }

    pub fn departure_date(&self) -> NaiveDate {
        self.outbound.departure_date()
    }

    pub fn checkout_link(&self) -> &str {
        self.direct_link.as_deref().unwrap_or(&self.fallback_link)
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("invalid price {}", self.price));
        }
        if let Some(inbound) = &self.inbound {
            if inbound.departure <= self.outbound.arrival {
                return Err(format!(
                    "inbound departs {} before outbound arrives {}",
                    inbound.departure, self.outbound.arrival
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M")
            .expect("valid fixture timestamp")
    }

    pub fn leg(
        origin: &str,
        destination: &str,
        departure: NaiveDateTime,
        hours: i64,
        flights: &[&str],
    ) -> Leg {
        Leg {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure,
            arrival: departure + chrono::Duration::hours(hours),
            flight_numbers: flights.iter().map(|f| f.to_string()).collect(),
            carriers: flights.iter().map(|f| f[..2].to_string()).collect(),
            stops: flights.len().saturating_sub(1) as u32,
            duration_minutes: hours * 60,
        }
    }

    pub fn one_way(provider: &str, price: f64, outbound: Leg) -> Offer {
        Offer {
            fallback_link: format!("https://fallback/{}", outbound.flight_numbers.join("-")),
            outbound,
            inbound: None,
            price,
            currency: "EUR".to_string(),
            attribution: Attribution::Single(ProviderId::new(provider)),
            fare_class: None,
            direct_link: None,
            baggage_included: None,
        }
    }

    pub fn round_trip(provider: &str, price: f64, outbound: Leg, inbound: Leg) -> Offer {
        Offer {
            inbound: Some(inbound),
            ..one_way(provider, price, outbound)
        }
    }
}
