// Query expansion: one SearchRequest becomes many concrete provider queries

use crate::airports::AirportGroups;
use crate::dates::DateWindow;
use crate::error::SearchError;
use crate::models::{ProviderId, ProviderQuery, QueryRole, SearchRequest};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;

type DateCombo = (NaiveDate, Option<NaiveDate>);

pub struct QueryExpander {
    groups: AirportGroups,
    max_queries: usize,
    default_currency: String,
    default_locale: String,
}

impl QueryExpander {
    pub fn new(groups: AirportGroups, max_queries: usize, currency: &str, locale: &str) -> Self {
        Self {
            groups,
            max_queries,
            default_currency: currency.to_string(),
            default_locale: locale.to_string(),
        }
    }

    pub fn max_queries(&self) -> usize {
        self.max_queries
    }

    // Cartesian product of airports x dates x providers, capped at
    // `max_queries`. The primary airports and dates always come first; the
    // rest of the capacity is shared round-robin between airport pairs.
    pub fn expand(
        &self,
        request: &SearchRequest,
        providers: &[ProviderId],
    ) -> Result<Vec<ProviderQuery>, SearchError> {
        let origins = self.groups.resolve(&request.origin)?;
        let destinations = self.groups.resolve(&request.destination)?;

        let origin_set: HashSet<&String> = origins.iter().collect();
        if let Some(shared) = destinations.iter().find(|d| origin_set.contains(d)) {
            return Err(SearchError::Configuration(format!(
                "Origin {} and destination {} both include airport {}",
                request.origin, request.destination, shared
            )));
        }
        if providers.is_empty() {
            return Err(SearchError::Configuration(
                "No providers available for the search".to_string(),
            ));
        }

        let departures = DateWindow::from_spec(&request.departure)?;
        let returns = request
            .return_date
            .as_ref()
            .map(DateWindow::from_spec)
            .transpose()?;
        let combos = date_combos(&departures, returns.as_ref());
        if combos.is_empty() {
            return Err(SearchError::Configuration(
                "Every return date falls before every departure date".to_string(),
            ));
        }

        let pairs: Vec<(&String, &String)> = origins
            .iter()
            .flat_map(|o| destinations.iter().map(move |d| (o, d)))
            .collect();

        let raw_total = pairs.len() * combos.len() * providers.len();
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone())
            .to_uppercase();
        let locale = request
            .locale
            .clone()
            .unwrap_or_else(|| self.default_locale.clone());

        let mut queries = Vec::with_capacity(raw_total.min(self.max_queries));
        'rounds: for (departure_date, return_date) in combos.iter() {
            for (origin, destination) in pairs.iter() {
                for provider in providers {
                    if queries.len() >= self.max_queries {
                        break 'rounds;
                    }
                    queries.push(ProviderQuery {
                        provider: provider.clone(),
                        role: QueryRole::Direct,
                        origin: origin.to_string(),
                        destination: destination.to_string(),
                        departure_date: *departure_date,
                        return_date: *return_date,
                        passengers: request.passengers,
                        max_stops: request.max_stops,
                        cabin: request.cabin,
                        currency: currency.clone(),
                        locale: locale.clone(),
                    });
                }
            }
        }

        debug!(
            origins = origins.len(),
            destinations = destinations.len(),
            date_combinations = combos.len(),
            providers = providers.len(),
            raw_total,
            emitted = queries.len(),
            "Expanded search request"
        );

        Ok(queries)
    }
}

// Departure/return pairs closest to the primary dates first. Returns
// before the departure date are impossible and skipped.
fn date_combos(departures: &DateWindow, returns: Option<&DateWindow>) -> Vec<DateCombo> {
    let Some(returns) = returns else {
        return departures
            .by_proximity()
            .into_iter()
            .map(|d| (d, None))
            .collect();
    };

    let mut combos: Vec<DateCombo> = Vec::new();
    for departure in departures.dates() {
        for ret in returns.dates().iter().filter(|r| *r >= departure) {
            combos.push((*departure, Some(*ret)));
        }
    }

    let (primary_departure, primary_return) = (departures.primary(), returns.primary());
    combos.sort_by_key(|(d, r)| {
        let r = r.unwrap_or(primary_return);
        (
            (*d - primary_departure).num_days().abs() + (r - primary_return).num_days().abs(),
            *d,
            r,
        )
    });
    combos
}

// One-way queries used for split tickets: outbound on the departure date,
// inbound (reversed route) on the return date, one per distinct shape.
pub fn split_leg_queries(direct: &[ProviderQuery]) -> Vec<ProviderQuery> {
    let mut seen = HashSet::new();
    let mut legs = Vec::new();

    for query in direct {
        let Some(return_date) = query.return_date else {
            continue;
        };

        let outbound = ProviderQuery {
            role: QueryRole::SplitOutbound,
            return_date: None,
            ..query.clone()
        };
        let inbound = ProviderQuery {
            role: QueryRole::SplitInbound,
            origin: query.destination.clone(),
            destination: query.origin.clone(),
            departure_date: return_date,
            return_date: None,
            ..query.clone()
        };

        for leg in [outbound, inbound] {
            if seen.insert(leg.clone()) {
                legs.push(leg);
            }
        }
    }

    legs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateSpec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn expander(cap: usize) -> QueryExpander {
        QueryExpander::new(AirportGroups::builtin(), cap, "EUR", "pt-PT")
    }

    #[test]
    fn test_fixed_date_single_airports() {
        let request = SearchRequest::new("GRU", "LIS", DateSpec::Fixed(date("2025-06-01")));
        let queries = expander(60)
            .expand(&request, &[ProviderId::amadeus(), ProviderId::kiwi()])
            .unwrap();

        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|q| q.departure_date == date("2025-06-01")));
        assert!(queries.iter().all(|q| q.role == QueryRole::Direct));
        assert_eq!(queries[0].provider, ProviderId::amadeus());
        assert_eq!(queries[1].provider, ProviderId::kiwi());
        assert_eq!(queries[0].currency, "EUR");
    }

    #[test]
    fn test_month_expansion_is_capped_with_primary_date_first() {
        let request = SearchRequest::new(
            "GRU",
            "LIS",
            DateSpec::Month {
                year: 2025,
                month: 6,
            },
        );
        let expander = expander(10);
        let queries = expander.expand(&request, &[ProviderId::kiwi()]).unwrap();

        assert_eq!(queries.len(), expander.max_queries());
        assert_eq!(queries[0].departure_date, date("2025-06-01"));
        let unique: HashSet<NaiveDate> = queries.iter().map(|q| q.departure_date).collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn test_airport_groups_round_robin_after_primary() {
        let mut request = SearchRequest::new(
            "SAO",
            "LIS",
            DateSpec::Around {
                date: date("2025-06-10"),
                days: 3,
            },
        );
        request.currency = Some("brl".to_string());
        let queries = expander(5)
            .expand(&request, &[ProviderId::kiwi()])
            .unwrap();

        assert_eq!(queries.len(), 5);
        // Primary pair on the primary date first
        assert_eq!(queries[0].origin, "GRU");
        assert_eq!(queries[0].departure_date, date("2025-06-10"));
        // Every group airport is covered before the second date of any pair
        assert_eq!(queries[1].origin, "CGH");
        assert_eq!(queries[2].origin, "VCP");
        assert_eq!(queries[1].departure_date, date("2025-06-10"));
        assert_eq!(queries[3].origin, "GRU");
        assert_eq!(queries[3].departure_date, date("2025-06-09"));
        assert_eq!(queries[0].currency, "BRL");
    }

    #[test]
    fn test_round_trip_skips_impossible_returns() {
        let mut request = SearchRequest::new(
            "GRU",
            "LIS",
            DateSpec::Range {
                start: date("2025-06-01"),
                end: date("2025-06-03"),
            },
        );
        request.return_date = Some(DateSpec::Fixed(date("2025-06-02")));
        let queries = expander(60)
            .expand(&request, &[ProviderId::kiwi()])
            .unwrap();

        assert_eq!(queries.len(), 2);
        assert!(queries
            .iter()
            .all(|q| q.return_date.unwrap() >= q.departure_date));
        assert_eq!(queries[0].departure_date, date("2025-06-01"));
    }

    #[test]
    fn test_overlapping_airports_are_rejected() {
        let request = SearchRequest::new("SAO", "GRU", DateSpec::Fixed(date("2025-06-01")));
        let result = expander(60).expand(&request, &[ProviderId::kiwi()]);
        assert!(matches!(result, Err(SearchError::Configuration(_))));

        let request = SearchRequest::new("LIS", "LIS", DateSpec::Fixed(date("2025-06-01")));
        assert!(expander(60)
            .expand(&request, &[ProviderId::kiwi()])
            .is_err());
    }

    #[test]
    fn test_split_leg_queries_are_reversed_and_deduplicated() {
        let mut request = SearchRequest::new("GRU", "LIS", DateSpec::Fixed(date("2025-06-01")));
        request.return_date = Some(DateSpec::Fixed(date("2025-06-15")));
        let direct = expander(60)
            .expand(&request, &[ProviderId::kiwi()])
            .unwrap();
        let doubled: Vec<ProviderQuery> = direct.iter().chain(direct.iter()).cloned().collect();

        let legs = split_leg_queries(&doubled);
        assert_eq!(legs.len(), 2);

        let outbound = legs
            .iter()
            .find(|q| q.role == QueryRole::SplitOutbound)
            .unwrap();
        assert_eq!((outbound.origin.as_str(), outbound.destination.as_str()), ("GRU", "LIS"));
        assert_eq!(outbound.departure_date, date("2025-06-01"));
        assert!(outbound.return_date.is_none());

        let inbound = legs
            .iter()
            .find(|q| q.role == QueryRole::SplitInbound)
            .unwrap();
        assert_eq!((inbound.origin.as_str(), inbound.destination.as_str()), ("LIS", "GRU"));
        assert_eq!(inbound.departure_date, date("2025-06-15"));
    }
}
