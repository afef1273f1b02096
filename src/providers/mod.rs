// HTTP provider adapters and the plumbing they share: retry with
// exponential backoff, HTTP status classification, timestamp parsing.

pub mod amadeus;
pub mod kiwi;

use crate::error::ProviderError;
use crate::models::ProviderId;
use crate::provider::FlightProvider;
use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use amadeus::{AmadeusConfig, AmadeusProvider};
pub use kiwi::{KiwiConfig, KiwiProvider};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// Exponential backoff with jitter so parallel queries do not retry in lockstep
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

// Runs `attempt` until it succeeds, fails permanently, or retries run out.
// Only transient (unavailable) failures are retried.
pub async fn with_retries<T, F, Fut>(
    provider: &ProviderId,
    config: &RetryConfig,
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < config.max_retries => {
                let backoff = calculate_backoff(retry, config);
                warn!(
                    provider = %provider,
                    retry = retry + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying provider request"
                );
                tokio::time::sleep(backoff).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// Auth, throttling and server trouble are transient; anything else means
// the provider understood the query and refused it
pub fn status_error(provider: &ProviderId, status: reqwest::StatusCode, body: &str) -> ProviderError {
    let snippet: String = body.chars().take(200).collect();
    let reason = format!("HTTP {}: {}", status.as_u16(), snippet);
    match status.as_u16() {
        401 | 403 | 408 | 429 => ProviderError::unavailable(provider, reason),
        _ if status.is_server_error() => ProviderError::unavailable(provider, reason),
        _ => ProviderError::rejected(provider, reason),
    }
}

pub fn transport_error(provider: &ProviderId, error: reqwest::Error) -> ProviderError {
    if error.is_decode() {
        ProviderError::rejected(provider, format!("malformed response: {}", error))
    } else {
        ProviderError::unavailable(provider, error.to_string())
    }
}

pub fn http_client(provider: &ProviderId, timeout_ms: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| ProviderError::unavailable(provider, format!("HTTP client setup failed: {}", e)))
}

// Provider timestamps are local times, sometimes with a bogus "Z" suffix
pub fn parse_local_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
}

// Credentials for every adapter the binary may build
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub amadeus: Option<AmadeusConfig>,
    pub kiwi: Option<KiwiConfig>,
}

impl ProviderSettings {
    // AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET / AMADEUS_ENV and
    // TEQUILA_API_KEY. Providers without credentials are left out.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let amadeus = match (var("AMADEUS_CLIENT_ID"), var("AMADEUS_CLIENT_SECRET")) {
            (Some(id), Some(secret)) => {
                let production = var("AMADEUS_ENV")
                    .map(|env| env.eq_ignore_ascii_case("production"))
                    .unwrap_or(false);
                Some(AmadeusConfig::new(&id, &secret, production))
            }
            _ => None,
        };
        let kiwi = var("TEQUILA_API_KEY").map(|key| KiwiConfig::new(&key));

        Self { amadeus, kiwi }
    }
}

pub fn build_providers(
    settings: &ProviderSettings,
) -> Result<Vec<Arc<dyn FlightProvider>>, ProviderError> {
    let mut providers: Vec<Arc<dyn FlightProvider>> = Vec::new();

    if let Some(config) = &settings.amadeus {
        providers.push(Arc::new(AmadeusProvider::new(config.clone())?));
    }
    if let Some(config) = &settings.kiwi {
        providers.push(Arc::new(KiwiProvider::new(config.clone())?));
    }

    info!(
        providers = ?providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
        "Configured flight providers"
    );
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use test_case::test_case;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(calculate_backoff(0, &config), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, &config), Duration::from_millis(400));
        assert_eq!(calculate_backoff(10, &config), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_with_retries_retries_only_transient_failures() {
        let provider = ProviderId::kiwi();
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..RetryConfig::default()
        };

        let attempts = AtomicU32::new(0);
        let result = with_retries(&provider, &config, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::unavailable(&provider, "503"))
            } else {
                Ok(42)
            }
        })
        .await;
        tokio_test::assert_ok!(&result);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let attempts = AtomicU32::new(0);
        let result: Result<(), ProviderError> = with_retries(&provider, &config, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::rejected(&provider, "bad airport"))
        })
        .await;
        tokio_test::assert_err!(&result);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test_case(401, true; "#1 unauthorized is transient")]
    #[test_case(429, true; "#2 throttled is transient")]
    #[test_case(503, true; "#3 server error is transient")]
    #[test_case(400, false; "#4 bad request is a rejection")]
    #[test_case(422, false; "#5 unprocessable is a rejection")]
    fn test_status_classification(status: u16, transient: bool) {
        let status = reqwest::StatusCode::from_u16(status).unwrap();
        let error = status_error(&ProviderId::amadeus(), status, "{}");
        assert_eq!(error.is_transient(), transient);
    }

    #[test_case("2025-06-01T22:05:00", Some("2025-06-01 22:05"); "#1 plain")]
    #[test_case("2025-06-01T22:05:00.000Z", Some("2025-06-01 22:05"); "#2 fractional with zulu")]
    #[test_case("2025-06-01T22:05", Some("2025-06-01 22:05"); "#3 no seconds")]
    #[test_case("yesterday", None; "#4 garbage")]
    fn test_parse_local_timestamp(value: &str, expected: Option<&str>) {
        let expected =
            expected.map(|e| NaiveDateTime::parse_from_str(e, "%Y-%m-%d %H:%M").unwrap());
        assert_eq!(parse_local_timestamp(value), expected);
    }

    #[test]
    fn test_build_providers_from_settings() {
        let settings = ProviderSettings {
            amadeus: None,
            kiwi: Some(KiwiConfig::new("key")),
        };
        let providers = build_providers(&settings).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id(), ProviderId::kiwi());

        assert!(build_providers(&ProviderSettings::default())
            .unwrap()
            .is_empty());
    }
}
