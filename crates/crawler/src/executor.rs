//! Raw request executor
//!
//! Issues one catalog GET with retry and backoff:
//! - 200 with a JSON body: success
//! - 429: sleep the backoff, double it, retry
//! - 5xx and transport failures: sleep the backoff unchanged, retry
//! - any other status or an undecodable body: give up at once
//!
//! Callers only ever see the parsed body or `None`.

use crate::transport::{Sleeper, Transport};
use citeforge_common::config::RetryConfig;
use citeforge_common::errors::AppError;
use citeforge_common::metrics::{self, CallProfile};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Retry tuning for one fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts, including the first
    pub retries: u32,
    /// Initial backoff
    pub backoff: Duration,
    /// Delay slept before every attempt
    pub rate_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(2),
            rate_interval: Duration::ZERO,
        }
    }
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = AppError;

    fn try_from(config: &RetryConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            retries: config.retries,
            backoff: config.backoff()?,
            rate_interval: config.rate_interval()?,
        })
    }
}

impl RetryPolicy {
    /// Same policy with a different pre-attempt delay
    pub fn with_rate_interval(mut self, rate_interval: Duration) -> Self {
        self.rate_interval = rate_interval;
        self
    }
}

/// Executes catalog GETs and feeds the call profile
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    profile: CallProfile,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        profile: CallProfile,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            profile,
        }
    }

    /// Profile this executor writes to
    pub fn profile(&self) -> &CallProfile {
        &self.profile
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch with the executor's own policy
    pub async fn fetch(&self, url: &Url) -> Option<Value> {
        self.fetch_with(url, &self.policy).await
    }

    /// Fetch with an explicit policy
    pub async fn fetch_with(&self, url: &Url, policy: &RetryPolicy) -> Option<Value> {
        debug!(url = %url, "Making API request");

        // Call time is measured from the first attempt
        let started = Instant::now();
        let mut backoff = policy.backoff;

        for attempt in 1..=policy.retries {
            if !policy.rate_interval.is_zero() {
                debug!(
                    delay_secs = policy.rate_interval.as_secs_f64(),
                    "Sleeping before API call"
                );
                self.sleeper.sleep(policy.rate_interval).await;
            }

            debug!(attempt, retries = policy.retries, "Catalog API attempt");

            match self.attempt(url).await {
                Ok(body) => {
                    let elapsed = started.elapsed();
                    self.profile.track_call(elapsed);
                    metrics::record_catalog_call(elapsed.as_secs_f64(), true);
                    return Some(body);
                }
                Err(err) if err.is_retryable() => {
                    self.sleeper.sleep(backoff).await;
                    if matches!(err, AppError::RateLimited) {
                        backoff = backoff.saturating_mul(2);
                    }
                }
                Err(_) => {
                    metrics::record_catalog_call(started.elapsed().as_secs_f64(), false);
                    return None;
                }
            }
        }

        error!(url = %url, retries = policy.retries, "Max retries reached, skipping request");
        metrics::record_catalog_call(started.elapsed().as_secs_f64(), false);
        None
    }

    /// One GET; failures are already logged and tracked
    async fn attempt(&self, url: &Url) -> Result<Value, AppError> {
        let response = match self.transport.get(url).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "HTTP request failed");
                return Err(self.track(err));
            }
        };

        match response.status {
            200 => serde_json::from_str::<Value>(&response.body).map_err(|e| {
                let err = AppError::malformed(format!("Failed to decode JSON: {}", e));
                error!(error = %err, body = %truncate(&response.body), "Undecodable API response");
                self.track(err)
            }),
            429 => {
                warn!("Rate limit hit (HTTP 429), backing off");
                Err(self.track(AppError::RateLimited))
            }
            status if status >= 500 => {
                let err = AppError::ServerError { status };
                error!(error = %err, "Server error, retrying");
                Err(self.track(err))
            }
            status => {
                let err = AppError::ClientError {
                    status,
                    body: truncate(&response.body).to_string(),
                };
                error!(error = %err, "API request failed");
                Err(self.track(err))
            }
        }
    }

    fn track(&self, err: AppError) -> AppError {
        self.profile.track_error(err.code());
        metrics::record_catalog_error(err.code());
        err
    }
}

fn truncate(body: &str) -> &str {
    const LIMIT: usize = 512;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSleeper, ScriptedTransport};
    use crate::transport::TransportResponse;
    use citeforge_common::errors::ErrorCode;

    fn url() -> Url {
        Url::parse("https://api.openalex.org/works/W1").unwrap()
    }

    fn executor(
        transport: Arc<ScriptedTransport>,
        sleeper: Arc<RecordingSleeper>,
        policy: RetryPolicy,
    ) -> RequestExecutor {
        RequestExecutor::new(transport, sleeper, policy, CallProfile::new())
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let transport = ScriptedTransport::sequence(vec![Ok(TransportResponse::new(
            200,
            r#"{"id": "https://openalex.org/W1"}"#,
        ))]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        let body = exec.fetch(&url()).await.unwrap();
        assert_eq!(body["id"], "https://openalex.org/W1");
        assert_eq!(transport.request_count(), 1);
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(exec.profile().call_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_doubles_backoff() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(TransportResponse::new(429, "slow down")),
            Ok(TransportResponse::new(429, "slow down")),
            Ok(TransportResponse::new(429, "slow down")),
        ]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        assert!(exec.fetch(&url()).await.is_none());
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_secs_f64(2.0),
                Duration::from_secs_f64(4.0),
                Duration::from_secs_f64(8.0)
            ]
        );
        assert_eq!(transport.request_count(), 3);
        assert_eq!(exec.profile().error_count(ErrorCode::RateLimited), 3);
        assert_eq!(exec.profile().call_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(TransportResponse::new(404, "not found")),
            Ok(TransportResponse::new(200, "{}")),
        ]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        assert!(exec.fetch(&url()).await.is_none());
        assert_eq!(transport.request_count(), 1);
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(exec.profile().error_count(ErrorCode::ClientError), 1);
    }

    #[tokio::test]
    async fn test_server_error_keeps_backoff_constant() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(TransportResponse::new(503, "unavailable")),
            Ok(TransportResponse::new(500, "boom")),
            Ok(TransportResponse::new(200, r#"{"ok": true}"#)),
        ]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        let body = exec.fetch(&url()).await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(2)]);
        assert_eq!(exec.profile().error_count(ErrorCode::ServerError), 2);
        assert_eq!(exec.profile().call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        let transport = ScriptedTransport::sequence(vec![
            Err(AppError::Transport {
                message: "connection reset".into(),
            }),
            Ok(TransportResponse::new(200, "[]")),
        ]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        assert!(exec.fetch(&url()).await.is_some());
        assert_eq!(transport.request_count(), 2);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2)]);
        assert_eq!(
            exec.profile().error_count(ErrorCode::TransientTransportError),
            1
        );
    }

    #[tokio::test]
    async fn test_undecodable_body_is_not_retried() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(TransportResponse::new(200, "<html>oops</html>")),
            Ok(TransportResponse::new(200, "{}")),
        ]);
        let sleeper = RecordingSleeper::new();
        let exec = executor(transport.clone(), sleeper.clone(), RetryPolicy::default());

        assert!(exec.fetch(&url()).await.is_none());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(exec.profile().error_count(ErrorCode::MalformedResponse), 1);
    }

    #[tokio::test]
    async fn test_rate_interval_before_every_attempt() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(TransportResponse::new(429, "")),
            Ok(TransportResponse::new(200, "{}")),
        ]);
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::from_secs(1),
            rate_interval: Duration::from_millis(250),
        };
        let exec = executor(transport, sleeper.clone(), policy);

        assert!(exec.fetch(&url()).await.is_some());
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_millis(250),
                Duration::from_secs(1),
                Duration::from_millis(250)
            ]
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            retries: 5,
            backoff_secs: 0.5,
            rate_interval_secs: 0.1,
        };
        let policy = RetryPolicy::try_from(&config).unwrap();
        assert_eq!(policy.retries, 5);
        assert_eq!(policy.backoff, Duration::from_millis(500));
        assert_eq!(policy.rate_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_policy_rejects_unrepresentable_backoff() {
        let config = RetryConfig {
            retries: 3,
            backoff_secs: 1e20,
            rate_interval_secs: 0.0,
        };
        assert!(matches!(
            RetryPolicy::try_from(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_long_rate_limit_streak_saturates_backoff() {
        let transport = ScriptedTransport::from_fn(|_| Ok(TransportResponse::new(429, "")));
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy {
            retries: 70,
            backoff: Duration::from_secs(2),
            rate_interval: Duration::ZERO,
        };
        let exec = executor(transport.clone(), sleeper.clone(), policy);

        assert!(exec.fetch(&url()).await.is_none());
        assert_eq!(transport.request_count(), 70);
        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.len(), 70);
        assert_eq!(sleeps[1], Duration::from_secs(4));
        assert_eq!(sleeps[69], Duration::MAX);
        assert_eq!(exec.profile().error_count(ErrorCode::RateLimited), 70);
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(2000);
        assert_eq!(truncate(&body).len(), 512);
        assert_eq!(truncate("short"), "short");
    }
}
