//! Wire types for the Unily user API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::constants::query;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySort {
    pub field: String,
    pub direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryRequest {
    pub page_size: u32,
    pub paging_token: String,
    pub sort: QuerySort,
    pub query_text: String,
}

impl UserQueryRequest {
    /// Newest user whose email matches
    pub fn by_email(email: &str) -> Self {
        Self {
            page_size: query::PAGE_SIZE,
            paging_token: String::new(),
            sort: QuerySort {
                field: query::SORT_FIELD.to_string(),
                direction: query::SORT_DIRECTION.to_string(),
            },
            query_text: format!("email:{}", email),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserQueryResponse {
    pub data: Vec<User>,
}

/// A remote user. Fields other than `properties` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<UserProperty>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl User {
    pub fn email(&self) -> Option<&str> {
        self.rest.get("email").and_then(Value::as_str)
    }
}

/// One entry of a user's property list, kept as the server sent it.
///
/// Entries without a string `alias` never match anything and round-trip
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProperty {
    fields: Map<String, Value>,
}

impl UserProperty {
    pub fn new(alias: &str, value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("alias".to_string(), Value::String(alias.to_string()));
        fields.insert("value".to_string(), value);
        Self { fields }
    }

    pub fn alias(&self) -> Option<&str> {
        self.fields.get("alias").and_then(Value::as_str)
    }

    pub fn value(&self) -> Option<&Value> {
        self.fields.get("value")
    }

    pub fn set_value(&mut self, value: Value) {
        self.fields.insert("value".to_string(), value);
    }
}

/// Outcome reported for the first entry of an update response
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatus {
    pub status_code: Option<i64>,
    pub message: Option<String>,
}

impl UpdateStatus {
    /// Read `[0].statusCode` and `[0].message`, tolerating any shape
    pub fn from_body(body: &Value) -> Self {
        let first = body.get(0);
        Self {
            status_code: first
                .and_then(|entry| entry.get("statusCode"))
                .and_then(Value::as_i64),
            message: first
                .and_then(|entry| entry.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}
