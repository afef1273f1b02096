// Engine configuration. Every policy constant of the search pipeline lives
// here; the engine itself never reads the environment.

use crate::error::SearchError;
use crate::models::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub currency: String,
    pub locale: String,
    // Earlier providers win ties between otherwise identical offers
    pub provider_priority: Vec<ProviderId>,
    pub split_tickets_enabled: bool,
    pub expansion: ExpansionConfig,
    pub split: SplitConfig,
    pub ranking: RankingConfig,
    pub concurrency: ConcurrencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            locale: "pt-PT".to_string(),
            provider_priority: vec![ProviderId::amadeus(), ProviderId::kiwi()],
            split_tickets_enabled: true,
            expansion: ExpansionConfig::default(),
            split: SplitConfig::default(),
            ranking: RankingConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    // Upper bound on provider queries generated for one request
    pub max_queries: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { max_queries: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    // Inbound must leave at least this long after the outbound lands
    pub min_connection_minutes: i64,
    // Cheapest N one-way offers kept per direction before pairing
    pub max_offers_per_leg: usize,
    // Flying time of both legs together
    pub max_total_duration_minutes: Option<i64>,
    // Time between outbound arrival and inbound departure
    pub max_stay_days: Option<i64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_connection_minutes: 120,
            max_offers_per_leg: 50,
            max_total_duration_minutes: Some(48 * 60),
            max_stay_days: Some(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub price: f64,
    pub duration: f64,
    pub stops: f64,
    pub provider_reliability: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: 0.6,
            duration: 0.25,
            stops: 0.1,
            provider_reliability: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    // 0.0..=1.0 per provider, missing providers use the default
    pub provider_reliability: HashMap<ProviderId, f64>,
    pub default_reliability: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let mut provider_reliability = HashMap::new();
        provider_reliability.insert(ProviderId::amadeus(), 0.9);
        provider_reliability.insert(ProviderId::kiwi(), 0.8);
        Self {
            weights: RankingWeights::default(),
            provider_reliability,
            default_reliability: 0.5,
        }
    }
}

impl RankingConfig {
    pub fn reliability(&self, provider: &ProviderId) -> f64 {
        self.provider_reliability
            .get(provider)
            .copied()
            .unwrap_or(self.default_reliability)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub default_max_concurrent: usize,
    pub per_provider: HashMap<ProviderId, usize>,
    pub query_timeout_ms: u64,
    pub search_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: 4,
            per_provider: HashMap::new(),
            query_timeout_ms: 15_000,
            search_timeout_ms: 60_000,
        }
    }
}

impl ConcurrencyConfig {
    pub fn max_concurrent(&self, provider: &ProviderId) -> usize {
        self.per_provider
            .get(provider)
            .copied()
            .unwrap_or(self.default_max_concurrent)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| SearchError::Configuration(format!("Invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // Position in the priority list, unknown providers sort last
    pub fn provider_rank(&self, provider: &ProviderId) -> usize {
        self.provider_priority
            .iter()
            .position(|p| p == provider)
            .unwrap_or(self.provider_priority.len())
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |msg: String| Err(SearchError::Configuration(msg));

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return invalid(format!("Invalid currency code: {}", self.currency));
        }
        if self.locale.trim().is_empty() {
            return invalid("Locale must not be empty".to_string());
        }
        if self.expansion.max_queries == 0 {
            return invalid("Expansion cap must be at least 1".to_string());
        }
        if self.split.max_offers_per_leg == 0 {
            return invalid("Split-ticket per-leg bound must be at least 1".to_string());
        }
        if self.split.min_connection_minutes < 0 {
            return invalid("Minimum connection buffer must not be negative".to_string());
        }

        let weights = &self.ranking.weights;
        for (name, weight) in [
            ("price", weights.price),
            ("duration", weights.duration),
            ("stops", weights.stops),
            ("provider_reliability", weights.provider_reliability),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(format!("Ranking weight {} must be >= 0, got {}", name, weight));
            }
        }
        let reliabilities = self
            .ranking
            .provider_reliability
            .values()
            .chain(std::iter::once(&self.ranking.default_reliability));
        for reliability in reliabilities {
            if !(0.0..=1.0).contains(reliability) {
                return invalid(format!("Provider reliability {} outside 0..=1", reliability));
            }
        }

        let concurrency = &self.concurrency;
        if concurrency.default_max_concurrent == 0
            || concurrency.per_provider.values().any(|cap| *cap == 0)
        {
            return invalid("Provider concurrency caps must be at least 1".to_string());
        }
        if concurrency.query_timeout_ms == 0 || concurrency.search_timeout_ms == 0 {
            return invalid("Timeouts must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider_rank(&ProviderId::amadeus()), 0);
        assert_eq!(config.provider_rank(&ProviderId::kiwi()), 1);
        assert_eq!(config.provider_rank(&ProviderId::new("other")), 2);
        assert_eq!(config.concurrency.max_concurrent(&ProviderId::kiwi()), 4);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "currency": "BRL",
                "expansion": { "max_queries": 10 },
                "concurrency": { "per_provider": { "kiwi": 2 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.currency, "BRL");
        assert_eq!(config.locale, "pt-PT");
        assert_eq!(config.expansion.max_queries, 10);
        assert_eq!(config.concurrency.max_concurrent(&ProviderId::kiwi()), 2);
        assert_eq!(config.concurrency.max_concurrent(&ProviderId::amadeus()), 4);
        assert_eq!(config.split.max_offers_per_leg, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.ranking.weights.duration = -0.1;
        assert!(matches!(
            config.validate(),
            Err(SearchError::Configuration(_))
        ));

        let mut config = EngineConfig::default();
        config.concurrency.per_provider.insert(ProviderId::kiwi(), 0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.expansion.max_queries = 0;
        assert!(config.validate().is_err());

        assert!(EngineConfig::from_json("{ not json").is_err());
    }
}
