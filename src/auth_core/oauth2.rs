//! OAuth 2.0 / OpenID Connect popup flow, guarded by `state` and `nonce`.

use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::authentication::decompose_token;
use super::config::{AuthConfig, Platform};
use super::http_client::{AuthHttpClient, HttpRequest, RequestCredentials, fetch_json};
use super::popup::Popup;
use super::provider::OAuth2Provider;
use super::storage::Storage;
use super::types::{AuthError, Params};
use super::utilities::{camel_case, encode_uri_component, is_truthy, join_url, value_to_string};

pub struct OAuth2 {
    config: Rc<AuthConfig>,
    storage: Storage,
    popup: Popup,
    http: Rc<dyn AuthHttpClient>,
}

fn state_key(provider: &str) -> String {
    format!("{}_state", provider)
}

fn nonce_key(provider: &str) -> String {
    format!("{}_nonce", provider)
}

impl OAuth2 {
    pub fn new(
        config: Rc<AuthConfig>,
        storage: Storage,
        popup: Popup,
        http: Rc<dyn AuthHttpClient>,
    ) -> Self {
        Self { config, storage, popup, http }
    }

    /// Runs the handshake.
    ///
    /// Implicit and hybrid flows (`response_type` containing `token`) return the popup
    /// result once the nonce checks out; the code flow returns the server's exchange response.
    #[instrument(skip(self, provider, user_data), fields(provider = %provider.name), level = "debug")]
    pub async fn open(&self, provider: &OAuth2Provider, user_data: &Params) -> Result<Value, AuthError> {
        let authorization_endpoint = provider.authorization_endpoint.as_deref().ok_or_else(|| {
            AuthError::Config(format!("provider {} has no authorization endpoint", provider.name))
        })?;
        let redirect_uri = self.popup.resolve_redirect_uri(provider.redirect_uri.as_deref());

        let state_key = state_key(&provider.name);
        if let Some(state) = &provider.state {
            self.storage.set(&state_key, &state.resolve());
        }
        if let Some(nonce) = &provider.nonce {
            self.storage.set(&nonce_key(&provider.name), &nonce.resolve());
        }

        let url = format!(
            "{}?{}",
            authorization_endpoint,
            self.build_query_string(provider, &redirect_uri)
        );
        let handle = self
            .popup
            .open(&url, &provider.name, &provider.popup_options, &redirect_uri);
        let result = match self.config.platform {
            Platform::Mobile => handle.listen().await?,
            Platform::Browser => handle.poll().await?,
        };

        if let Some(returned) = result.get("state").filter(|s| is_truthy(s)) {
            let stored = self.storage.get(&state_key);
            if stored.as_deref() != Some(value_to_string(returned).as_str()) {
                warn!(provider = %provider.name, "state parameter mismatch");
                return Err(AuthError::StateMismatch);
            }
        }

        if provider.response_type.to_uppercase().contains("TOKEN") {
            if !self.verify_id_token(&result, &provider.name) {
                warn!(provider = %provider.name, "nonce parameter mismatch");
                return Err(AuthError::NonceMismatch);
            }
            return Ok(Value::Object(result));
        }

        self.exchange_for_token(result, user_data, provider, &redirect_uri).await
    }

    /// Checks the `nonce` claim of the returned id token against the stored nonce.
    ///
    /// Missing id tokens, undecodable ones, tokens without a nonce, and providers with
    /// no stored nonce pass.
    pub fn verify_id_token(&self, oauth_data: &Params, provider_name: &str) -> bool {
        let Some(id_token) = oauth_data
            .get(&self.config.response_id_token_prop)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        else {
            return true;
        };
        let Some(claims) = decompose_token(id_token) else {
            return true;
        };
        let Some(nonce) = claims.get("nonce").filter(|n| is_truthy(n)) else {
            return true;
        };
        match self.storage.get(&nonce_key(provider_name)) {
            Some(stored) => stored == value_to_string(nonce),
            None => true,
        }
    }

    /// Query string for the authorization endpoint, in default, required, optional order.
    /// Params without a value are left out.
    pub fn build_query_string(&self, provider: &OAuth2Provider, redirect_uri: &str) -> String {
        provider
            .default_url_params
            .iter()
            .chain(&provider.required_url_params)
            .chain(&provider.optional_url_params)
            .filter_map(|name| {
                let value = match camel_case(name).as_str() {
                    "state" => self.storage.get(&state_key(&provider.name)),
                    "nonce" => self.storage.get(&nonce_key(&provider.name)),
                    "scope" => provider.scope_value(),
                    "redirectUri" => Some(redirect_uri.to_string()),
                    _ => provider.url_param(name),
                }?;
                Some(format!("{}={}", name, encode_uri_component(&value)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn exchange_for_token(
        &self,
        oauth_data: Params,
        user_data: &Params,
        provider: &OAuth2Provider,
        redirect_uri: &str,
    ) -> Result<Value, AuthError> {
        let mut body = user_data.clone();
        if let Some(code) = oauth_data.get("code") {
            body.insert("code".into(), code.clone());
        }
        if let Some(client_id) = &provider.client_id {
            body.insert("clientId".into(), client_id.clone().into());
        }
        body.insert("redirectUri".into(), redirect_uri.into());
        if let Some(state) = oauth_data.get("state").filter(|s| is_truthy(s)) {
            body.insert("state".into(), state.clone());
        }
        for param in &provider.response_params {
            if let Some(value) = oauth_data.get(param) {
                body.insert(param.clone(), value.clone());
            }
        }

        let url = join_url(&self.config.base_url, &provider.url);
        debug!(url = %url, "exchanging authorization code");
        let credentials = if self.config.with_credentials {
            RequestCredentials::Include
        } else {
            RequestCredentials::SameOrigin
        };
        let request = HttpRequest::post(url).json(&body)?.credentials(credentials);
        fetch_json(self.http.as_ref(), request).await
    }
}
