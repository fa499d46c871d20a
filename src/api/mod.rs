//! Unily REST API plumbing
//!
//! Transport, OAuth2 client-credentials authentication, wire models and the
//! resilient caller every request goes through.

pub mod auth;
pub mod client;
pub mod constants;
pub mod models;
pub mod resilience;

pub use auth::{ClientCredentials, CredentialStore, TokenIssuer, TokenManager};
pub use client::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport, TransportError};
pub use models::{UpdateStatus, User, UserProperty, UserQueryRequest, UserQueryResponse};
pub use resilience::{CallFailure, FailureKind, ResilientCaller, RetryConfig};
