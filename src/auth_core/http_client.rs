use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::types::AuthError;

/// HTTP methods used by the auth endpoints.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
        }
    }
}

/// Cookie policy for a request, mirroring the fetch `credentials` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCredentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// HTTP request handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.).
    pub method: HttpMethod,
    /// Target URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Whether cookies travel with the request.
    pub credentials: RequestCredentials,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            credentials: RequestCredentials::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::POST, url)
    }

    /// Appends a header without touching existing ones.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces any header with the same (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serializes `body` as JSON and sets `Accept` and `Content-Type` accordingly.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, AuthError> {
        self.body = Some(serde_json::to_vec(body)?);
        self.set_header("Accept", "application/json");
        self.set_header("Content-Type", "application/json");
        Ok(self)
    }

    /// Sends an already url-encoded form body.
    pub fn form(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into().into_bytes());
        self.set_header("Content-Type", "application/x-www-form-urlencoded");
        self
    }

    pub fn credentials(mut self, credentials: RequestCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Parses the request body as JSON, mostly useful when inspecting recorded requests.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// HTTP response returned by the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }
    }

    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Error type for HTTP client operations.
pub type HttpClientError = Box<dyn Error + Send + Sync>;

/// Transport boundary used by every auth call.
///
/// Implementations run on the UI thread, so the futures are not required to be `Send`.
#[async_trait(?Send)]
pub trait AuthHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

/// Treats 200..=399 as success and parses the body as JSON.
/// An empty or unparsable body becomes `Value::Null`.
pub fn check_status(response: HttpResponse) -> Result<Value, AuthError> {
    if !response.is_success() {
        return Err(AuthError::Http(response));
    }
    Ok(response.body_json().unwrap_or(Value::Null))
}

/// Executes `request` and runs the result through [`check_status`].
pub async fn fetch_json(
    client: &dyn AuthHttpClient,
    request: HttpRequest,
) -> Result<Value, AuthError> {
    debug!(method = request.method.as_str(), url = %request.url, "auth request");
    let response = client.execute(request).await.map_err(AuthError::Transport)?;
    check_status(response)
}

type RouteKey = (HttpMethod, String);

/// In-memory HTTP client stub for testing.
///
/// Sticky responses answer every matching request; queued responses are
/// consumed first, one per request, which allows a URL to answer twice differently.
#[derive(Clone, Default)]
pub struct InMemoryHttpClient {
    responses: Arc<DashMap<RouteKey, HttpResponse>>,
    queued: Arc<DashMap<RouteKey, VecDeque<HttpResponse>>>,
    default_response: Option<HttpResponse>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl InMemoryHttpClient {
    /// Creates a new in-memory HTTP client with no default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory HTTP client with a default response on miss.
    pub fn with_default(response: HttpResponse) -> Self {
        Self { default_response: Some(response), ..Self::default() }
    }

    /// Register a response for every request to `method url`.
    pub fn insert_response(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
        self.responses.insert((method, url.into()), response);
    }

    /// Queue a one-shot response for `method url`.
    pub fn push_response(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
        self.queued
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    /// Every request executed so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn requests_to(&self, method: HttpMethod, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }
}

#[async_trait(?Send)]
impl AuthHttpClient for InMemoryHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let key = (request.method, request.url.clone());
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        if let Some(response) = self.queued.get_mut(&key).and_then(|mut q| q.pop_front()) {
            return Ok(response);
        }
        if let Some(entry) = self.responses.get(&key) {
            Ok(entry.value().clone())
        } else if let Some(resp) = self.default_response.clone() {
            Ok(resp)
        } else {
            Err(format!("no mock response for {} {}", key.0.as_str(), key.1).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_check_accepts_redirects_and_rejects_errors() {
        assert_eq!(
            check_status(HttpResponse::with_json(302, &json!({ "ok": true }))).unwrap(),
            json!({ "ok": true })
        );
        assert_eq!(check_status(HttpResponse::new(204, Vec::new())).unwrap(), Value::Null);
        match check_status(HttpResponse::new(500, "boom")) {
            Err(AuthError::Http(resp)) => assert_eq!(resp.status, 500),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn json_body_sets_headers() {
        let req = HttpRequest::post("/auth/login").json(&json!({ "a": 1 })).unwrap();
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.header_value("Accept"), Some("application/json"));
        assert_eq!(req.body_json(), Some(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn queued_responses_run_before_sticky_ones() {
        let client = InMemoryHttpClient::new();
        client.insert_response(HttpMethod::POST, "/x", HttpResponse::with_json(200, &json!(2)));
        client.push_response(HttpMethod::POST, "/x", HttpResponse::with_json(200, &json!(1)));

        let first = fetch_json(&client, HttpRequest::post("/x")).await.unwrap();
        let second = fetch_json(&client, HttpRequest::post("/x")).await.unwrap();
        assert_eq!((first, second), (json!(1), json!(2)));
        assert_eq!(client.requests_to(HttpMethod::POST, "/x").len(), 2);

        let missing = fetch_json(&client, HttpRequest::get("/x")).await;
        assert!(matches!(missing, Err(AuthError::Transport(_))));
    }
}
