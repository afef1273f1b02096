// Error types shared by the search engine and the provider adapters

use crate::models::ProviderId;
use thiserror::Error;

// Failures of a single provider call. Never fatal to a search: the
// coordinator logs them and counts the query as contributing zero offers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable { provider: ProviderId, reason: String },

    #[error("Provider {provider} rejected the query: {reason}")]
    Rejected { provider: ProviderId, reason: String },
}

impl ProviderError {
    pub fn unavailable(provider: &ProviderId, reason: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }

    pub fn rejected(provider: &ProviderId, reason: impl Into<String>) -> Self {
        ProviderError::Rejected {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }

    pub fn provider(&self) -> &ProviderId {
        match self {
            ProviderError::Unavailable { provider, .. } => provider,
            ProviderError::Rejected { provider, .. } => provider,
        }
    }

    // Transient failures are worth retrying inside an adapter
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }
}

// Errors surfaced to the caller of the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No offers found ({failed} of {attempted} provider queries failed)")]
    NoOffersFound { attempted: usize, failed: usize },
}

impl SearchError {
    // True when every provider query failed, as opposed to providers
    // answering with nothing usable
    pub fn is_total_provider_failure(&self) -> bool {
        matches!(
            self,
            SearchError::NoOffersFound { attempted, failed } if *attempted > 0 && attempted == failed
        )
    }
}
