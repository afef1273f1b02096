// Flight search orchestration and offer ranking engine

pub mod airports;
pub mod composer;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod expander;
pub mod links;
pub mod merger;
pub mod models;
pub mod provider;
pub mod providers;
pub mod ranking;

// Re-export key types for convenience
pub use airports::{AirportGroup, AirportGroups};
pub use composer::SplitTicketComposer;
pub use config::{
    ConcurrencyConfig, EngineConfig, ExpansionConfig, RankingConfig, RankingWeights, SplitConfig,
};
pub use dates::{DateSpec, DateWindow};
pub use engine::{SearchEngine, SearchPhase};
pub use error::{ProviderError, SearchError};
pub use expander::QueryExpander;
pub use merger::OfferMerger;
pub use models::{
    Attribution, CabinClass, Leg, Offer, Passengers, ProviderId, ProviderQuery, QueryRole,
    RankingMode, SearchRequest,
};
pub use provider::{FlightProvider, RawOffer};
pub use providers::{build_providers, ProviderSettings};
pub use ranking::{RankedOffer, RankedResult, RankingEngine, ScoreBreakdown, SearchStats};
