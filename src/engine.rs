// Search orchestration: expands a request, fans the queries out to the
// providers, composes split tickets, merges and ranks what came back.

use crate::airports::AirportGroups;
use crate::composer::SplitTicketComposer;
use crate::config::EngineConfig;
use crate::error::{ProviderError, SearchError};
use crate::expander::{split_leg_queries, QueryExpander};
use crate::merger::OfferMerger;
use crate::models::{Offer, ProviderId, ProviderQuery, QueryRole, SearchRequest};
use crate::provider::FlightProvider;
use crate::ranking::{RankedResult, RankingEngine, SearchStats};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Expanding,
    Querying,
    Composing,
    Merging,
    Ranking,
    Done,
    Failed,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::Expanding => "expanding",
            SearchPhase::Querying => "querying",
            SearchPhase::Composing => "composing",
            SearchPhase::Merging => "merging",
            SearchPhase::Ranking => "ranking",
            SearchPhase::Done => "done",
            SearchPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct ProviderSlot {
    provider: Arc<dyn FlightProvider>,
    permits: Arc<Semaphore>,
}

#[derive(Debug)]
enum QueryFailure {
    Provider(ProviderError),
    TimedOut,
}

struct QueryOutcome {
    query: ProviderQuery,
    result: Result<Normalized, QueryFailure>,
}

struct Normalized {
    offers: Vec<Offer>,
    rejected: usize,
}

// Everything one search collects. Owned by the collector loop, so it has a
// single writer and never outlives the search.
#[derive(Default)]
struct SearchArena {
    direct: Vec<Offer>,
    split_outbound: Vec<Offer>,
    split_inbound: Vec<Offer>,
    stats: SearchStats,
}

impl SearchArena {
    fn record(&mut self, outcome: QueryOutcome) {
        let QueryOutcome { query, result } = outcome;
        match result {
            Ok(normalized) => {
                self.stats.queries_succeeded += 1;
                self.stats.offers_collected += normalized.offers.len();
                self.stats.offers_dropped += normalized.rejected;
                let bucket = match query.role {
                    QueryRole::Direct => &mut self.direct,
                    QueryRole::SplitOutbound => &mut self.split_outbound,
                    QueryRole::SplitInbound => &mut self.split_inbound,
                };
                bucket.extend(normalized.offers);
            }
            Err(QueryFailure::Provider(e)) => {
                self.stats.queries_failed += 1;
                warn!(
                    provider = %e.provider(),
                    origin = %query.origin,
                    destination = %query.destination,
                    departure = %query.departure_date,
                    transient = e.is_transient(),
                    error = %e,
                    "Provider query failed"
                );
            }
            Err(QueryFailure::TimedOut) => {
                self.stats.queries_timed_out += 1;
                warn!(
                    provider = %query.provider,
                    origin = %query.origin,
                    destination = %query.destination,
                    departure = %query.departure_date,
                    "Provider query timed out"
                );
            }
        }
    }
}

pub struct SearchEngine {
    config: EngineConfig,
    // Providers in priority order
    order: Vec<ProviderId>,
    providers: HashMap<ProviderId, ProviderSlot>,
    expander: QueryExpander,
    merger: OfferMerger,
    ranking: RankingEngine,
}

impl SearchEngine {
    pub fn new(
        config: EngineConfig,
        providers: Vec<Arc<dyn FlightProvider>>,
        groups: AirportGroups,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if providers.is_empty() {
            return Err(SearchError::Configuration(
                "At least one flight provider is required".to_string(),
            ));
        }

        let mut slots = HashMap::new();
        let mut order = Vec::new();
        for provider in providers {
            let id = provider.id();
            let permits = Arc::new(Semaphore::new(config.concurrency.max_concurrent(&id)));
            if slots
                .insert(id.clone(), ProviderSlot { provider, permits })
                .is_some()
            {
                return Err(SearchError::Configuration(format!(
                    "Provider {} registered twice",
                    id
                )));
            }
            order.push(id);
        }
        order.sort_by_key(|id| config.provider_rank(id));

        let expander = QueryExpander::new(
            groups,
            config.expansion.max_queries,
            &config.currency,
            &config.locale,
        );
        let merger = OfferMerger::new(config.provider_priority.clone());
        let ranking = RankingEngine::new(config.ranking.clone());

        info!(
            providers = ?order,
            max_queries = expander.max_queries(),
            split_tickets = config.split_tickets_enabled,
            "Search engine ready"
        );

        Ok(Self {
            config,
            order,
            providers: slots,
            expander,
            merger,
            ranking,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn providers(&self) -> &[ProviderId] {
        &self.order
    }

    pub async fn run_search(&self, request: SearchRequest) -> Result<RankedResult, SearchError> {
        let started = Instant::now();

        enter(SearchPhase::Expanding);
        let direct = match request
            .validate()
            .and_then(|_| self.expander.expand(&request, &self.order))
        {
            Ok(queries) => queries,
            Err(e) => {
                warn!(phase = %SearchPhase::Failed, error = %e, "Search rejected");
                return Err(e);
            }
        };

        let compose = request.is_round_trip()
            && request.split_tickets
            && self.config.split_tickets_enabled;
        let mut queries = direct;
        if compose {
            let legs = split_leg_queries(&queries);
            queries.extend(legs);
        }

        enter(SearchPhase::Querying);
        let mut arena = self.collect(queries).await;

        let composed = if compose {
            enter(SearchPhase::Composing);
            let locale = request.locale.as_deref().unwrap_or(self.config.locale.as_str());
            let composer = SplitTicketComposer::new(self.config.split.clone(), locale);
            let composed = composer.compose(
                std::mem::take(&mut arena.split_outbound),
                std::mem::take(&mut arena.split_inbound),
            );
            arena.stats.split_offers_composed = composed.len();
            composed
        } else {
            Vec::new()
        };

        enter(SearchPhase::Merging);
        let candidates: Vec<Offer> = std::mem::take(&mut arena.direct)
            .into_iter()
            .chain(composed)
            .collect();
        let before_filter = candidates.len();
        let candidates: Vec<Offer> = candidates
            .into_iter()
            .filter(|offer| offer.max_leg_stops() <= request.max_stops)
            .filter(|offer| request.max_price.map_or(true, |max| offer.price <= max))
            .filter(|offer| !request.checked_bag || offer.baggage_included == Some(true))
            .collect();
        arena.stats.offers_dropped += before_filter - candidates.len();

        let before_merge = candidates.len();
        let merged = self.merger.merge(vec![candidates]);
        arena.stats.duplicates_removed = before_merge - merged.len();

        let mut stats = arena.stats;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        if merged.is_empty() {
            let error = SearchError::NoOffersFound {
                attempted: stats.queries_issued,
                failed: stats.queries_failed + stats.queries_timed_out,
            };
            warn!(phase = %SearchPhase::Failed, stats = ?stats, error = %error, "Search found nothing");
            return Err(error);
        }

        enter(SearchPhase::Ranking);
        let mut result = self.ranking.rank(merged, request.ranking, request.limit)?;

        info!(
            phase = %SearchPhase::Done,
            origin = %request.origin,
            destination = %request.destination,
            results = result.len(),
            queries = stats.queries_issued,
            failed = stats.queries_failed,
            timed_out = stats.queries_timed_out,
            duplicates = stats.duplicates_removed,
            elapsed_ms = stats.elapsed_ms,
            "Search complete"
        );
        result.stats = stats;
        Ok(result)
    }

    // Runs every query concurrently (bounded per provider) until all have
    // answered or the search deadline passes. Whatever is still in flight
    // at the deadline is dropped and counted as timed out.
    async fn collect(&self, queries: Vec<ProviderQuery>) -> SearchArena {
        let mut arena = SearchArena::default();
        let query_timeout = self.config.concurrency.query_timeout();
        let deadline = tokio::time::sleep(self.config.concurrency.search_timeout());
        tokio::pin!(deadline);

        let mut pending: FuturesUnordered<_> = queries
            .into_iter()
            .map(|query| self.run_query(query, query_timeout))
            .collect();
        arena.stats.queries_issued = pending.len();
        debug!(queries = pending.len(), "Dispatching provider queries");

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some(outcome) => arena.record(outcome),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        abandoned = pending.len(),
                        timeout_ms = self.config.concurrency.search_timeout_ms,
                        "Search deadline reached, abandoning in-flight queries"
                    );
                    arena.stats.queries_timed_out += pending.len();
                    break;
                }
            }
        }

        arena
    }

    async fn run_query(&self, query: ProviderQuery, query_timeout: Duration) -> QueryOutcome {
        let Some(slot) = self.providers.get(&query.provider) else {
            let error = ProviderError::unavailable(&query.provider, "provider not registered");
            return QueryOutcome {
                query,
                result: Err(QueryFailure::Provider(error)),
            };
        };

        let _permit = match slot.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                let error = ProviderError::unavailable(&query.provider, "provider shut down");
                return QueryOutcome {
                    query,
                    result: Err(QueryFailure::Provider(error)),
                };
            }
        };

        let result = match tokio::time::timeout(query_timeout, slot.provider.search(&query)).await {
            Ok(Ok(raw_offers)) => {
                let mut offers = Vec::with_capacity(raw_offers.len());
                let mut rejected = 0;
                for raw in raw_offers {
                    match slot.provider.normalize(raw, &query) {
                        Ok(offer) => offers.push(offer),
                        Err(e) => {
                            rejected += 1;
                            debug!(provider = %query.provider, error = %e, "Dropped offer");
                        }
                    }
                }
                Ok(Normalized { offers, rejected })
            }
            Ok(Err(e)) => Err(QueryFailure::Provider(e)),
            Err(_) => Err(QueryFailure::TimedOut),
        };

        QueryOutcome { query, result }
    }
}

fn enter(phase: SearchPhase) {
    debug!(phase = %phase, "Search phase");
}
