use log::{debug, info, warn};
use reqwest::Method;
use std::sync::Arc;

use super::client::{ApiRequest, Transport};
use super::constants::{GRANT_TYPE_CLIENT_CREDENTIALS, token_endpoint};
use super::models::TokenResponse;
use crate::journal::{ERROR_STATUS_CODE, EventLog};

/// Holds the single live access token, if any
#[derive(Debug, Default)]
pub struct CredentialStore {
    access_token: Option<String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }

    pub fn replace(&mut self, token: String) {
        self.access_token = Some(token);
    }

    pub fn clear(&mut self) {
        self.access_token = None;
    }
}

/// Client credentials used for the OAuth2 client-credentials grant
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Exchanges client credentials for a fresh access token
pub struct TokenIssuer {
    transport: Arc<dyn Transport>,
    base_url: String,
    credentials: ClientCredentials,
}

impl TokenIssuer {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, credentials: ClientCredentials) -> Self {
        Self {
            transport,
            base_url: base_url.to_string(),
            credentials,
        }
    }

    pub async fn issue(&self) -> Result<String, TokenError> {
        info!("Requesting access token from {}", self.base_url);

        let request = ApiRequest::new(Method::POST, token_endpoint(&self.base_url)).form(&[
            ("grant_type", GRANT_TYPE_CLIENT_CREDENTIALS),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ]);

        let response = self
            .transport
            .send(&request, None)
            .await
            .map_err(|e| TokenError::new(None, e.to_string()))?;

        debug!("Token request status: {}", response.status);

        if !response.is_success() {
            return Err(TokenError::new(
                Some(response.status),
                format!("Request failed with status code {}", response.status),
            ));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| TokenError::new(Some(response.status), e.to_string()))?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => {
                debug!(
                    "Access token obtained (type: {}, expires in: {}s)",
                    token.token_type.as_deref().unwrap_or("unknown"),
                    token.expires_in.map_or("?".to_string(), |s| s.to_string())
                );
                Ok(access_token)
            }
            _ => Err(TokenError::new(
                Some(response.status),
                "No access token in response".to_string(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TokenError {
    pub status: Option<u16>,
    pub message: String,
}

impl TokenError {
    fn new(status: Option<u16>, message: String) -> Self {
        Self { status, message }
    }
}

/// Owns the credential store and keeps it populated.
///
/// Acquisition failures are journaled and leave the store empty; callers then
/// go out without an authorization header and fail on their own.
pub struct TokenManager {
    store: CredentialStore,
    issuer: TokenIssuer,
    journal: Arc<EventLog>,
    acquisitions: u32,
}

impl TokenManager {
    pub fn new(issuer: TokenIssuer, journal: Arc<EventLog>) -> Self {
        Self {
            store: CredentialStore::new(),
            issuer,
            journal,
            acquisitions: 0,
        }
    }

    /// Live token, if one is held
    pub fn current(&self) -> Option<&str> {
        self.store.current()
    }

    /// Number of token acquisitions performed so far
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions
    }

    /// Obtain a token only when none is held
    pub async fn ensure_valid_token(&mut self) -> bool {
        if self.store.is_empty() {
            self.refresh_token().await;
        }
        !self.store.is_empty()
    }

    /// Unconditionally replace the held token
    pub async fn refresh_token(&mut self) -> bool {
        self.acquisitions += 1;
        match self.issuer.issue().await {
            Ok(token) => {
                self.store.replace(token);
                true
            }
            Err(e) => {
                self.store.clear();
                warn!("Token request failed (status {:?}): {}", e.status, e.message);
                self.journal.failure(&format!(
                    "ErrorType: Fetching access token, Status Code: {}, Message: {}",
                    ERROR_STATUS_CODE,
                    e.message
                ));
                false
            }
        }
    }
}
