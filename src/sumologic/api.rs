//! Authenticated request execution against the Sumo Logic API

use super::error::{Result, SumoError};
use super::retry::{self, RetryPolicy};
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, AUTHORIZATION, IF_MATCH};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// Public Sumo Logic API endpoint
pub const DEFAULT_API_ENDPOINT: &str = "https://api.sumologic.com/api/v1";

/// Per-attempt HTTP timeout (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP Basic credentials (access id and access key)
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub if_match: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            if_match: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body).map_err(SumoError::Encode)?);
        Ok(self)
    }

    /// Make the request conditional on the given etag
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }
}

/// Unparsed API response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON.
    ///
    /// The status code and raw body are logged when the body does not parse.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| {
            error!(
                url = %self.url,
                status = self.status,
                body = %self.body,
                "Failed to parse API response as JSON"
            );
            SumoError::Parse {
                url: self.url.clone(),
                status: self.status,
                source,
            }
        })
    }
}

/// HTTP client bound to one endpoint and one set of credentials
#[derive(Debug, Clone)]
pub struct SumoApi {
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl SumoApi {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("sumo-source/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Absolute URL of an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Perform one attempt of `request`.
    ///
    /// A 412 answer means the `If-Match` etag was stale and is reported as
    /// [`SumoError::EtagMismatch`]; any other non-success status is
    /// [`SumoError::Api`].
    pub async fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(AUTHORIZATION, self.credentials.authorization());

        if let Some(etag) = &request.if_match {
            builder = builder.header(IF_MATCH, etag);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            "API request completed"
        );

        if status == StatusCode::PRECONDITION_FAILED {
            return Err(SumoError::EtagMismatch {
                method: request.method.to_string(),
                url: request.url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(SumoError::Api {
                method: request.method.to_string(),
                url: request.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(RawResponse {
            url: request.url.clone(),
            status: status.as_u16(),
            headers,
            body,
        })
    }

    /// Perform `request`, retrying under `policy` when one is given
    pub async fn request(
        &self,
        request: &ApiRequest,
        policy: Option<RetryPolicy>,
    ) -> Result<RawResponse> {
        retry::run(policy, move || self.execute(request)).await
    }

    /// Perform `request` and parse the response body as JSON
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        policy: Option<RetryPolicy>,
    ) -> Result<T> {
        self.request(request, policy).await?.json()
    }
}
