//! Credential manager: token persistence, JWT inspection and post-login redirects.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::config::AuthConfig;
use super::http_client::{AuthHttpClient, HttpClientError, HttpRequest, HttpResponse};
use super::router::{NavigationOptions, Router};
use super::storage::Storage;
use super::types::{AuthError, Params};
use super::utilities::{encode_uri, is_truthy, value_to_string};
use super::window::HostWindow;

/// Decodes one base64 JWT segment into JSON. Accepts both alphabets, padded or not.
pub fn decode_token_segment(segment: &str) -> Option<Value> {
    let trimmed = segment.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Claims of a 3-segment token. No signature check; None on any decode failure.
pub fn decompose_token(token: &str) -> Option<Params> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    match decode_token_segment(segments[1])? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

pub struct Authentication {
    config: Rc<AuthConfig>,
    storage: Storage,
    router: Rc<dyn Router>,
    host: Rc<dyn HostWindow>,
    token_name: String,
    id_token_name: String,
    initial_url: RefCell<Option<String>>,
}

impl Authentication {
    pub fn new(
        config: Rc<AuthConfig>,
        storage: Storage,
        router: Rc<dyn Router>,
        host: Rc<dyn HostWindow>,
    ) -> Self {
        let token_name = config.prefixed(&config.token_name);
        let id_token_name = config.prefixed(&config.id_token_name);
        Self {
            config,
            storage,
            router,
            host,
            token_name,
            id_token_name,
            initial_url: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Storage key of the access token.
    pub fn token_name(&self) -> &str {
        &self.token_name
    }

    pub fn id_token_name(&self) -> &str {
        &self.id_token_name
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(&self.token_name)
    }

    pub fn id_token(&self) -> Option<String> {
        self.storage.get(&self.id_token_name)
    }

    /// Claims of the stored token.
    pub fn payload(&self) -> Option<Params> {
        self.token().as_deref().and_then(decompose_token)
    }

    pub fn login_route(&self) -> &str {
        &self.config.login_route
    }

    /// Where to go after login: the captured initial URL, else the configured redirect.
    pub fn login_redirect(&self) -> Option<String> {
        self.initial_url
            .borrow()
            .clone()
            .or_else(|| self.config.login_redirect.clone())
    }

    pub fn set_initial_url(&self, url: &str) {
        *self.initial_url.borrow_mut() = Some(url.to_string());
    }

    /// True for any non-JWT token, and for a JWT whose `exp` (if set) is not in the past.
    pub fn is_authenticated(&self) -> bool {
        let Some(token) = self.token().filter(|t| !t.is_empty()) else {
            return false;
        };
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return true;
        }
        let Some(claims) = decode_token_segment(segments[1]) else {
            return false;
        };
        match claims.get("exp").filter(|exp| is_truthy(exp)) {
            Some(exp) => {
                let exp = exp
                    .as_f64()
                    .or_else(|| exp.as_str().and_then(|s| s.trim().parse().ok()));
                let now = (Utc::now().timestamp_millis() as f64 / 1000.0).round();
                exp.is_some_and(|exp| now <= exp)
            }
            None => true,
        }
    }

    /// Pulls the token (and id token) out of a login/exchange response and stores it,
    /// then redirects.
    ///
    /// If `response[response_token_prop]` is an object with a `data` object, extraction
    /// continues from that object. Otherwise a string value is the token. Failing that,
    /// the token is read from `response[token_root][token_name]` or `response[token_name]`.
    #[instrument(skip(self, response), level = "debug")]
    pub async fn set_token(&self, response: &Value, redirect: Option<&str>) -> Result<(), AuthError> {
        let config = &self.config;
        let mut response = response;
        let mut token: Option<String> = None;

        if let Some(access) = response.get(&config.response_token_prop).filter(|v| is_truthy(v)) {
            if access.is_object() && access.get("data").is_some_and(Value::is_object) {
                response = access;
            } else if let Some(access) = access.as_str() {
                token = Some(access.to_string());
            }
        }

        if token.is_none() {
            let root = config
                .token_root
                .as_deref()
                .and_then(|root| response.get(root))
                .filter(|root| is_truthy(root));
            token = match root {
                Some(root) => root.get(&config.token_name),
                None => response.get(&config.token_name),
            }
            .filter(|v| is_truthy(v))
            .map(value_to_string);
        }

        if let Some(token) = &token {
            debug!(key = %self.token_name, "storing token");
            self.storage.set(&self.token_name, token);
        }

        if let Some(id_token) = response
            .get(&config.response_id_token_prop)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            self.storage.set(&self.id_token_name, id_token);
        }

        match redirect.filter(|r| !r.is_empty()) {
            None => {
                if config.login_redirect.is_some() {
                    if let Some(target) = self.login_redirect() {
                        self.goto(&target).await;
                    }
                }
            }
            Some(url) => self.host.set_href(&encode_uri(url)),
        }
        Ok(())
    }

    pub fn remove_token(&self) {
        self.storage.remove(&self.token_name);
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn logout(&self, redirect: Option<&str>) -> Result<(), AuthError> {
        self.remove_token();
        match redirect.filter(|r| !r.is_empty()) {
            None => {
                if let Some(target) = &self.config.logout_redirect {
                    self.goto(target).await;
                }
            }
            Some(url) => self.host.set_href(url),
        }
        Ok(())
    }

    /// Adds the auth header to `request` while a session is active.
    pub fn decorate(&self, request: &mut HttpRequest) {
        if !self.config.http_interceptor || !self.is_authenticated() {
            return;
        }
        let Some(token) = self.token() else { return };
        let value = if self.config.auth_token.is_empty() {
            token
        } else {
            format!("{} {}", self.config.auth_token, token)
        };
        request.set_header(&self.config.auth_header, value);
    }

    /// The session change already happened; a refused navigation does not undo it.
    async fn goto(&self, target: &str) {
        if let Err(e) = self.router.goto(target, NavigationOptions::replace()).await {
            warn!(redirect = target, error = %e, "post-auth navigation failed");
        }
    }
}

/// Transport wrapper that runs every request through [`Authentication::decorate`].
pub struct AuthorizedHttpClient {
    inner: Rc<dyn AuthHttpClient>,
    auth: Rc<Authentication>,
}

impl AuthorizedHttpClient {
    pub fn new(inner: Rc<dyn AuthHttpClient>, auth: Rc<Authentication>) -> Self {
        Self { inner, auth }
    }
}

#[async_trait(?Send)]
impl AuthHttpClient for AuthorizedHttpClient {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        self.auth.decorate(&mut request);
        self.inner.execute(request).await
    }
}
