//! Resilience for Unily API calls
//!
//! Retry configuration and the classification-driven caller that wraps every
//! request with backoff and token refresh.

pub mod config;
pub mod retry;

pub use config::{RetryConfig, RetryConfigBuilder, RetrySettings};
pub use retry::{CallFailure, CallOutcome, FailureKind, ResilientCaller};
