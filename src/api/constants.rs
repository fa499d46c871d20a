//! API constants for the Unily REST API

/// User agent sent with every request
pub const USER_AGENT: &str = "unily-sync/1.0";

/// OAuth2 token endpoint path
pub const TOKEN_PATH: &str = "/connect/token";

/// User query endpoint path
pub const USER_QUERY_PATH: &str = "/api/v1/users/query";

/// User update endpoint path
pub const USER_UPDATE_PATH: &str = "/api/v1/users";

/// OAuth2 grant used for service-to-service authentication
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Standard headers
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Content type for the token request
    pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
}

/// User query defaults: newest account first, a single match
pub mod query {
    pub const PAGE_SIZE: u32 = 1;
    pub const SORT_FIELD: &str = "createDate";
    pub const SORT_DIRECTION: &str = "Desc";
}

/// Property aliases written by the synchronizer
pub mod aliases {
    /// Receives the record's year
    pub const MIGRATION_WAVE_DATE: &str = "o365MigrationWaveDate";
    /// Receives the record's quarter
    pub const MIGRATION_WAVE: &str = "o365MigrationWave";
    /// Receives the record's persona
    pub const MIGRATION_COMPLETED: &str = "o365MigrationCompleted";
}

/// Build a full endpoint URL, tolerating a trailing slash on the base
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn token_endpoint(base_url: &str) -> String {
    endpoint(base_url, TOKEN_PATH)
}

pub fn user_query_endpoint(base_url: &str) -> String {
    endpoint(base_url, USER_QUERY_PATH)
}

pub fn user_update_endpoint(base_url: &str) -> String {
    endpoint(base_url, USER_UPDATE_PATH)
}
