use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::constants::{USER_AGENT, headers};

/// Body carried by an [`ApiRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Description of one outbound HTTP operation.
///
/// The authorization header is not part of the descriptor. The bearer token
/// is attached by the [`Transport`] on every attempt, so a retried request
/// carries whatever token is live at that moment.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.headers
            .push(("Content-Type".to_string(), headers::CONTENT_TYPE_JSON.to_string()));
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.headers
            .push(("Content-Type".to_string(), headers::CONTENT_TYPE_FORM.to_string()));
        self.body = RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }
}

/// Status and raw body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| anyhow::anyhow!("Failed to decode response body: {}", e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to build request: {0}")]
    Build(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            TransportError::Build(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

/// Seam between the retry machinery and the wire
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt of `request`, attaching `bearer` as the
    /// authorization header when present. Any HTTP status is a successful
    /// exchange here; classification happens in the caller.
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport with connection pooling
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(accept_invalid_certs: bool) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Form(fields) => builder.form(fields),
        };

        debug!("{} {}", request.method, request.url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("{} {} -> {}", request.method, request.url, status);

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport for exercising the retry machinery

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One request as the transport saw it
    #[derive(Debug, Clone)]
    pub struct SentRequest {
        pub method: Method,
        pub url: String,
        pub bearer: Option<String>,
        pub body: RequestBody,
    }

    /// Replies are consumed per URL suffix in FIFO order; an exhausted
    /// script answers 500 so a test never hangs on a missing reply.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<Vec<(String, VecDeque<Result<ApiResponse, String>>)>>,
        sent: Mutex<Vec<SentRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(&self, url_suffix: &str, status: u16, body: &str) -> &Self {
            self.push(url_suffix, Ok(ApiResponse::new(status, body)));
            self
        }

        pub fn fail(&self, url_suffix: &str, message: &str) -> &Self {
            self.push(url_suffix, Err(message.to_string()));
            self
        }

        fn push(&self, url_suffix: &str, reply: Result<ApiResponse, String>) {
            let mut replies = self.replies.lock().unwrap();
            match replies.iter_mut().find(|(suffix, _)| suffix == url_suffix) {
                Some((_, queue)) => queue.push_back(reply),
                None => replies.push((url_suffix.to_string(), VecDeque::from([reply]))),
            }
        }

        pub fn sent(&self) -> Vec<SentRequest> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_to(&self, url_suffix: &str) -> Vec<SentRequest> {
            self.sent()
                .into_iter()
                .filter(|r| r.url.ends_with(url_suffix))
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: &ApiRequest,
            bearer: Option<&str>,
        ) -> Result<ApiResponse, TransportError> {
            self.sent.lock().unwrap().push(SentRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                bearer: bearer.map(str::to_string),
                body: request.body.clone(),
            });

            let mut replies = self.replies.lock().unwrap();
            let reply = replies
                .iter_mut()
                .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
                .and_then(|(_, queue)| queue.pop_front());

            match reply {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(TransportError::Network(message)),
                None => Ok(ApiResponse::new(500, "unscripted request")),
            }
        }
    }
}
