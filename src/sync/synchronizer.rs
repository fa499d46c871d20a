use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use super::record::{InputRecord, merge_properties};
use crate::api::auth::{TokenIssuer, TokenManager};
use crate::api::client::{ApiRequest, Transport};
use crate::api::constants::{user_query_endpoint, user_update_endpoint};
use crate::api::models::{UpdateStatus, UserQueryRequest, UserQueryResponse};
use crate::api::resilience::{CallFailure, ResilientCaller};
use crate::config::SyncConfig;
use crate::journal::{ERROR_STATUS_CODE, EventLog};

/// Message journaled when the service confirms an update with an empty message
pub const SUCCESS_MESSAGE: &str = "Updation Successful";

/// How one record ended
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Updated(UpdateStatus),
    QueryFailed(CallFailure),
    UpdateFailed(CallFailure),
    /// The query succeeded but its body could not be understood
    Malformed(String),
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Updated(_))
    }
}

/// Processes one record at a time
#[async_trait]
pub trait RecordHandler: Send {
    async fn handle(&mut self, record: &InputRecord) -> RecordOutcome;
}

/// Looks up the user behind a record, merges the record into the user's
/// properties and pushes the user back.
pub struct RecordSynchronizer {
    base_url: String,
    caller: ResilientCaller,
    tokens: TokenManager,
    journal: Arc<EventLog>,
}

impl RecordSynchronizer {
    pub fn new(
        base_url: &str,
        caller: ResilientCaller,
        tokens: TokenManager,
        journal: Arc<EventLog>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            caller,
            tokens,
            journal,
        }
    }

    /// Wire the token manager and caller for `config` over `transport`
    pub fn from_config(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        journal: Arc<EventLog>,
    ) -> Self {
        let issuer = TokenIssuer::new(transport.clone(), &config.base_url, config.credentials());
        let tokens = TokenManager::new(issuer, journal.clone());
        let caller = ResilientCaller::new(transport, config.retry_config(), journal.clone());
        Self::new(&config.base_url, caller, tokens, journal)
    }

    pub async fn sync(&mut self, record: &InputRecord) -> RecordOutcome {
        self.tokens.ensure_valid_token().await;

        let query = match serde_json::to_value(UserQueryRequest::by_email(&record.email)) {
            Ok(body) => ApiRequest::new(Method::POST, user_query_endpoint(&self.base_url)).json(body),
            Err(e) => return self.malformed(record, e.to_string()),
        };

        let response = match self.caller.execute(&mut self.tokens, &query, &record.email).await {
            Ok(response) => response,
            Err(failure) => return RecordOutcome::QueryFailed(failure),
        };

        let mut users = match response.json::<UserQueryResponse>() {
            Ok(found) => found.data,
            Err(e) => return self.malformed(record, e.to_string()),
        };

        // With no match the update still goes out, carrying no user and so
        // no properties.
        match users.first_mut() {
            Some(user) => match user.properties.as_mut() {
                Some(properties) => {
                    let touched = merge_properties(properties, record);
                    debug!("Merged {} properties for {}", touched, record.email);
                }
                None => warn!("User {} has no properties; sending it unchanged", record.email),
            },
            None => warn!("No user matched {}; sending empty update", record.email),
        }

        self.tokens.ensure_valid_token().await;

        let update = match serde_json::to_value(&users) {
            Ok(body) => ApiRequest::new(Method::PUT, user_update_endpoint(&self.base_url)).json(body),
            Err(e) => return self.malformed(record, e.to_string()),
        };

        match self.caller.execute(&mut self.tokens, &update, &record.email).await {
            Ok(response) => {
                let body: Value = response.json().unwrap_or(Value::Null);
                debug!("Update response for {}: {}", record.email, body);
                let status = UpdateStatus::from_body(&body);
                self.journal.success(&success_line(&record.email, &status));
                RecordOutcome::Updated(status)
            }
            Err(failure) => RecordOutcome::UpdateFailed(failure),
        }
    }

    fn malformed(&self, record: &InputRecord, detail: String) -> RecordOutcome {
        self.journal.failure(&format!(
            "ErrorType: API Error for user {}, Status Code: {}, Message: {}",
            record.email, ERROR_STATUS_CODE, detail
        ));
        RecordOutcome::Malformed(detail)
    }
}

#[async_trait]
impl RecordHandler for RecordSynchronizer {
    async fn handle(&mut self, record: &InputRecord) -> RecordOutcome {
        self.sync(record).await
    }
}

fn success_line(email: &str, status: &UpdateStatus) -> String {
    let code = status
        .status_code
        .map_or_else(|| "unknown".to_string(), |c| c.to_string());
    let message = match status.message.as_deref() {
        Some(message) if !message.is_empty() => message,
        _ => SUCCESS_MESSAGE,
    };
    format!("Email: {}, Status Code: {}, Message: {}", email, code, message)
}
