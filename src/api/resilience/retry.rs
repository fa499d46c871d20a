//! Classification-driven retry around a single API operation
//!
//! `401` refreshes the token and retries exactly once, `503` backs off
//! exponentially up to the configured ceiling, anything else ends the
//! operation. Every terminal failure is journaled here; success is left to
//! the caller, which knows what the response means.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::config::RetryConfig;
use crate::api::auth::TokenManager;
use crate::api::client::{ApiRequest, ApiResponse, Transport};
use crate::journal::{ERROR_STATUS_CODE, EventLog};

/// How a failed attempt is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 401: stale credential, recoverable once by refreshing
    AuthExpired,
    /// HTTP 503: transient, recoverable by waiting
    ServiceUnavailable,
    /// Network errors and every other status
    Generic,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FailureKind::AuthExpired,
            503 => FailureKind::ServiceUnavailable,
            _ => FailureKind::Generic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{detail}")]
pub struct CallFailure {
    pub kind: FailureKind,
    /// HTTP status, absent for network-level failures
    pub status: Option<u16>,
    pub detail: String,
}

impl CallFailure {
    pub fn from_response(response: &ApiResponse) -> Self {
        Self {
            kind: FailureKind::from_status(response.status),
            status: Some(response.status),
            detail: format!("Request failed with status code {}", response.status),
        }
    }

    pub fn network(detail: String) -> Self {
        Self {
            kind: FailureKind::Generic,
            status: None,
            detail,
        }
    }

    fn status_label(&self) -> String {
        self.status
            .map_or_else(|| "no status".to_string(), |status| status.to_string())
    }
}

pub type CallOutcome = Result<ApiResponse, CallFailure>;

#[derive(Debug)]
enum CallState {
    Attempting { retry_count: u32 },
    AwaitingBackoff { retry_count: u32, delay: Duration },
    RefreshingToken,
    RetryingAfterRefresh,
    Done(ApiResponse),
    Failed(CallFailure),
}

/// Executes API operations with backoff and on-demand token refresh
pub struct ResilientCaller {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
    journal: Arc<EventLog>,
}

impl ResilientCaller {
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig, journal: Arc<EventLog>) -> Self {
        Self {
            transport,
            config,
            journal,
        }
    }

    /// Run `request` to completion. `subject` identifies the record in
    /// journal lines.
    pub async fn execute(
        &self,
        tokens: &mut TokenManager,
        request: &ApiRequest,
        subject: &str,
    ) -> CallOutcome {
        let mut state = CallState::Attempting { retry_count: 0 };

        loop {
            state = match state {
                CallState::Attempting { retry_count } => {
                    match self.attempt(tokens, request).await {
                        Ok(response) => CallState::Done(response),
                        Err(failure) => self.on_failure(failure, retry_count, subject),
                    }
                }
                CallState::AwaitingBackoff { retry_count, delay } => {
                    tokio::time::sleep(delay).await;
                    CallState::Attempting {
                        retry_count: retry_count + 1,
                    }
                }
                CallState::RefreshingToken => {
                    tokens.refresh_token().await;
                    CallState::RetryingAfterRefresh
                }
                CallState::RetryingAfterRefresh => match self.attempt(tokens, request).await {
                    Ok(response) => CallState::Done(response),
                    Err(failure) => {
                        warn!(
                            "Retry after refresh failed for {} ({}): {}",
                            subject,
                            failure.status_label(),
                            failure.detail
                        );
                        self.journal.failure(&format!(
                            "ErrorType: Retry Error for user {}, Status Code: {}, Message: {}",
                            subject,
                            ERROR_STATUS_CODE,
                            failure.detail
                        ));
                        CallState::Failed(failure)
                    }
                },
                CallState::Done(response) => {
                    debug!("{} {} completed with {}", request.method, request.url, response.status);
                    return Ok(response);
                }
                CallState::Failed(failure) => return Err(failure),
            };
        }
    }

    async fn attempt(&self, tokens: &TokenManager, request: &ApiRequest) -> CallOutcome {
        let response = self
            .transport
            .send(request, tokens.current())
            .await
            .map_err(|e| CallFailure::network(e.to_string()))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(CallFailure::from_response(&response))
        }
    }

    fn on_failure(&self, failure: CallFailure, retry_count: u32, subject: &str) -> CallState {
        match failure.kind {
            FailureKind::AuthExpired => {
                self.journal.notice(&format!(
                    "Token expired for user {}. Refreshing token and retrying...",
                    subject
                ));
                CallState::RefreshingToken
            }
            FailureKind::ServiceUnavailable if retry_count < self.config.max_retries => {
                let delay = self.config.backoff_delay(retry_count);
                self.journal.notice(&format!(
                    "Service unavailable for user {}. Retrying in {} seconds... (Attempt {}/{})",
                    subject,
                    delay.as_secs_f64(),
                    retry_count + 1,
                    self.config.max_retries
                ));
                info!("Backing off {:?} before retry {}", delay, retry_count + 1);
                CallState::AwaitingBackoff { retry_count, delay }
            }
            _ => {
                warn!(
                    "Call failed for {} ({}): {}",
                    subject,
                    failure.status_label(),
                    failure.detail
                );
                self.journal.failure(&format!(
                    "ErrorType: API Error for user {}, Status Code: {}, Message: {}",
                    subject,
                    ERROR_STATUS_CODE,
                    failure.detail
                ));
                CallState::Failed(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{ClientCredentials, TokenIssuer};
    use crate::api::client::testing::ScriptedTransport;
    use crate::journal::MemorySink;
    use reqwest::Method;

    const BASE: &str = "https://tenant.example";
    const QUERY: &str = "/api/v1/users/query";
    const TOKEN: &str = "/connect/token";

    struct Harness {
        transport: Arc<ScriptedTransport>,
        sink: Arc<MemorySink>,
        tokens: TokenManager,
        caller: ResilientCaller,
    }

    fn harness(config: RetryConfig) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let sink = Arc::new(MemorySink::new());
        let journal = Arc::new(EventLog::new(sink.clone()).without_console());
        let issuer = TokenIssuer::new(
            transport.clone(),
            BASE,
            ClientCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
        );
        Harness {
            tokens: TokenManager::new(issuer, journal.clone()),
            caller: ResilientCaller::new(transport.clone(), config, journal),
            transport,
            sink,
        }
    }

    // The paused clock lands on millisecond ticks, so allow sub-tick slack.
    fn assert_backoff_total(elapsed: Duration, expected: Duration) {
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    fn query_request() -> ApiRequest {
        ApiRequest::new(Method::POST, format!("{}{}", BASE, QUERY))
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(FailureKind::from_status(401), FailureKind::AuthExpired);
        assert_eq!(FailureKind::from_status(503), FailureKind::ServiceUnavailable);
        assert_eq!(FailureKind::from_status(500), FailureKind::Generic);
        assert_eq!(FailureKind::from_status(404), FailureKind::Generic);
        assert_eq!(FailureKind::from_status(429), FailureKind::Generic);
    }

    #[tokio::test]
    async fn test_success_is_returned_without_retry() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        h.transport.reply(QUERY, 200, r#"{"data":[]}"#);
        h.tokens.ensure_valid_token().await;

        let outcome = h.caller.execute(&mut h.tokens, &query_request(), "a@x.com").await;

        assert_eq!(outcome.unwrap().body, r#"{"data":[]}"#);
        let sent = h.transport.sent_to(QUERY);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("t1"));
        assert!(h.sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries_with_new_token() {
        let mut h = harness(RetryConfig::default());
        h.transport
            .reply(TOKEN, 200, r#"{"access_token":"t1"}"#)
            .reply(TOKEN, 200, r#"{"access_token":"t2"}"#);
        h.transport
            .reply(QUERY, 401, "")
            .reply(QUERY, 200, r#"{"data":[]}"#);
        h.tokens.ensure_valid_token().await;

        let outcome = h.caller.execute(&mut h.tokens, &query_request(), "a@x.com").await;

        assert!(outcome.is_ok());
        let bearers: Vec<_> = h
            .transport
            .sent_to(QUERY)
            .into_iter()
            .map(|r| r.bearer)
            .collect();
        assert_eq!(bearers, vec![Some("t1".to_string()), Some("t2".to_string())]);
        assert_eq!(h.transport.sent_to(TOKEN).len(), 2);
        assert_eq!(
            h.sink.lines(),
            vec!["Token expired for user a@x.com. Refreshing token and retrying..."]
        );
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let mut h = harness(RetryConfig::default());
        h.transport
            .reply(TOKEN, 200, r#"{"access_token":"t1"}"#)
            .reply(TOKEN, 200, r#"{"access_token":"t2"}"#);
        h.transport.reply(QUERY, 401, "").reply(QUERY, 401, "");
        h.tokens.ensure_valid_token().await;

        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::AuthExpired);
        assert_eq!(h.transport.sent_to(QUERY).len(), 2);
        assert_eq!(h.transport.sent_to(TOKEN).len(), 2);
        assert_eq!(
            h.sink.lines().last().unwrap(),
            "ErrorType: Retry Error for user a@x.com, Status Code: 500, Message: Request failed with status code 401"
        );
    }

    #[tokio::test]
    async fn test_503_after_refresh_is_not_backed_off() {
        let mut h = harness(RetryConfig::default());
        h.transport
            .reply(TOKEN, 200, r#"{"access_token":"t1"}"#)
            .reply(TOKEN, 200, r#"{"access_token":"t2"}"#);
        h.transport.reply(QUERY, 401, "").reply(QUERY, 503, "");
        h.tokens.ensure_valid_token().await;

        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ServiceUnavailable);
        assert_eq!(h.transport.sent_to(QUERY).len(), 2);
        assert!(h.sink.lines().last().unwrap().starts_with("ErrorType: Retry Error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_401_during_backoff_still_gets_single_refresh() {
        let mut h = harness(RetryConfig::default());
        h.transport
            .reply(TOKEN, 200, r#"{"access_token":"t1"}"#)
            .reply(TOKEN, 200, r#"{"access_token":"t2"}"#);
        h.transport
            .reply(QUERY, 503, "")
            .reply(QUERY, 503, "")
            .reply(QUERY, 401, "")
            .reply(QUERY, 200, r#"{"data":[]}"#);
        h.tokens.ensure_valid_token().await;

        let outcome = h.caller.execute(&mut h.tokens, &query_request(), "a@x.com").await;

        assert!(outcome.is_ok());
        assert_eq!(h.transport.sent_to(QUERY).len(), 4);
        assert_eq!(h.transport.sent_to(TOKEN).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_503_backoff_doubles_then_gives_up() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        for _ in 0..6 {
            h.transport.reply(QUERY, 503, "");
        }
        h.tokens.ensure_valid_token().await;

        let started = tokio::time::Instant::now();
        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.status, Some(503));
        assert_backoff_total(started.elapsed(), Duration::from_secs(31));
        assert_eq!(h.transport.sent_to(QUERY).len(), 6);
        assert_eq!(
            h.sink.lines(),
            vec![
                "Service unavailable for user a@x.com. Retrying in 1 seconds... (Attempt 1/5)",
                "Service unavailable for user a@x.com. Retrying in 2 seconds... (Attempt 2/5)",
                "Service unavailable for user a@x.com. Retrying in 4 seconds... (Attempt 3/5)",
                "Service unavailable for user a@x.com. Retrying in 8 seconds... (Attempt 4/5)",
                "Service unavailable for user a@x.com. Retrying in 16 seconds... (Attempt 5/5)",
                "ErrorType: API Error for user a@x.com, Status Code: 500, Message: Request failed with status code 503",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_503_recovers_mid_storm() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        h.transport
            .reply(QUERY, 503, "")
            .reply(QUERY, 503, "")
            .reply(QUERY, 200, r#"{"data":[]}"#);
        h.tokens.ensure_valid_token().await;

        let started = tokio::time::Instant::now();
        let outcome = h.caller.execute(&mut h.tokens, &query_request(), "a@x.com").await;

        assert!(outcome.is_ok());
        assert_backoff_total(started.elapsed(), Duration::from_secs(3));
        assert_eq!(h.sink.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_other_status_is_terminal_without_retry() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        h.transport.reply(QUERY, 500, "boom");
        h.tokens.ensure_valid_token().await;

        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Generic);
        assert_eq!(h.transport.sent_to(QUERY).len(), 1);
        assert_eq!(
            h.sink.lines(),
            vec!["ErrorType: API Error for user a@x.com, Status Code: 500, Message: Request failed with status code 500"]
        );
    }

    #[tokio::test]
    async fn test_journal_reports_500_but_failure_keeps_real_status() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        h.transport.reply(QUERY, 404, "");
        h.tokens.ensure_valid_token().await;

        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.status, Some(404));
        assert_eq!(
            h.sink.lines(),
            vec!["ErrorType: API Error for user a@x.com, Status Code: 500, Message: Request failed with status code 404"]
        );
    }

    #[tokio::test]
    async fn test_network_error_is_terminal() {
        let mut h = harness(RetryConfig::default());
        h.transport.reply(TOKEN, 200, r#"{"access_token":"t1"}"#);
        h.transport.fail(QUERY, "connection reset");
        h.tokens.ensure_valid_token().await;

        let failure = h
            .caller
            .execute(&mut h.tokens, &query_request(), "a@x.com")
            .await
            .unwrap_err();

        assert_eq!(failure.status, None);
        assert_eq!(h.transport.sent_to(QUERY).len(), 1);
        assert_eq!(
            h.sink.lines(),
            vec!["ErrorType: API Error for user a@x.com, Status Code: 500, Message: network error: connection reset"]
        );
    }

    #[tokio::test]
    async fn test_missing_token_goes_out_unauthenticated_and_fails() {
        let mut h = harness(RetryConfig::default());
        h.transport
            .reply(TOKEN, 401, "")
            .reply(TOKEN, 401, "");
        h.transport.reply(QUERY, 401, "").reply(QUERY, 401, "");
        h.tokens.ensure_valid_token().await;

        let outcome = h.caller.execute(&mut h.tokens, &query_request(), "a@x.com").await;

        assert!(outcome.is_err());
        assert!(h.transport.sent_to(QUERY).iter().all(|r| r.bearer.is_none()));
        let lines = h.sink.lines();
        assert!(lines[0].starts_with("ErrorType: Fetching access token"));
        assert!(lines.last().unwrap().starts_with("ErrorType: Retry Error"));
    }
}
