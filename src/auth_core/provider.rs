//! Typed identity-provider descriptors, one per protocol version.

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::popup::PopupOptions;
use super::types::Params;
use super::utilities::{camel_case, value_to_string};

/// A handshake parameter given either literally or by a generator run per handshake.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub enum ParamSource {
    Value(String),
    Generator(Rc<dyn Fn() -> String>),
}

impl ParamSource {
    pub fn generator(f: impl Fn() -> String + 'static) -> Self {
        ParamSource::Generator(Rc::new(f))
    }

    /// Fresh random value for CSRF state.
    pub fn random_state() -> Self {
        Self::generator(|| Uuid::new_v4().simple().to_string())
    }

    /// Fresh random value for the OpenID nonce.
    pub fn random_nonce() -> Self {
        Self::generator(|| Uuid::new_v4().to_string())
    }

    pub fn resolve(&self) -> String {
        match self {
            ParamSource::Value(value) => value.clone(),
            ParamSource::Generator(generate) => generate(),
        }
    }
}

impl From<String> for ParamSource {
    fn from(value: String) -> Self {
        ParamSource::Value(value)
    }
}

impl From<&str> for ParamSource {
    fn from(value: &str) -> Self {
        ParamSource::Value(value.to_string())
    }
}

impl fmt::Debug for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ParamSource::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// OAuth 1.0a provider: the server runs the request-token dance, the popup only authorizes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuth1Provider {
    pub name: String,
    /// Server endpoint that issues request tokens and exchanges the verifier.
    pub url: String,
    pub authorization_endpoint: Option<String>,
    /// None means the host window origin; a `/path` is resolved against it.
    pub redirect_uri: Option<String>,
    pub popup_options: PopupOptions,
}

impl OAuth1Provider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), ..Self::default() }
    }
}

/// OAuth 2.0 / OpenID Connect provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuth2Provider {
    pub name: String,
    /// Server endpoint that exchanges the authorization code.
    pub url: String,
    pub authorization_endpoint: Option<String>,
    /// None means the host window origin; a `/path` is resolved against it.
    pub redirect_uri: Option<String>,
    pub popup_options: PopupOptions,
    pub client_id: Option<String>,
    pub scope: Vec<String>,
    pub scope_delimiter: Option<String>,
    pub scope_prefix: Option<String>,
    pub response_type: String,
    pub default_url_params: Vec<String>,
    pub required_url_params: Vec<String>,
    pub optional_url_params: Vec<String>,
    /// Extra keys copied from the popup result into the exchange body.
    pub response_params: Vec<String>,
    pub display: Option<String>,
    pub state: Option<ParamSource>,
    pub nonce: Option<ParamSource>,
    /// Any other url param, looked up by its name or its camelCase name.
    #[serde(flatten)]
    pub extra_params: Params,
}

impl Default for OAuth2Provider {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            authorization_endpoint: None,
            redirect_uri: None,
            popup_options: PopupOptions::default(),
            client_id: None,
            scope: Vec::new(),
            scope_delimiter: None,
            scope_prefix: None,
            response_type: "code".into(),
            default_url_params: vec![
                "response_type".into(),
                "client_id".into(),
                "redirect_uri".into(),
            ],
            required_url_params: Vec::new(),
            optional_url_params: Vec::new(),
            response_params: Vec::new(),
            display: None,
            state: None,
            nonce: None,
            extra_params: Params::new(),
        }
    }
}

impl OAuth2Provider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), ..Self::default() }
    }

    /// `scope_prefix` then every scope, joined with the delimiter (`,` when unset).
    /// None when there is nothing to send.
    pub fn scope_value(&self) -> Option<String> {
        let delimiter = self.scope_delimiter.as_deref().unwrap_or(",");
        let scopes = self.scope.join(delimiter);
        match self.scope_prefix.as_deref().filter(|p| !p.is_empty()) {
            Some(prefix) => Some([prefix, scopes.as_str()].join(delimiter)),
            None if scopes.is_empty() => None,
            None => Some(scopes),
        }
    }

    /// Value of a named url param other than `state`, `nonce` and `scope`.
    pub fn url_param(&self, name: &str) -> Option<String> {
        let camel = camel_case(name);
        let known = match camel.as_str() {
            "responseType" => Some(self.response_type.clone()),
            "clientId" => self.client_id.clone(),
            "redirectUri" => self.redirect_uri.clone(),
            "display" => self.display.clone(),
            "authorizationEndpoint" => self.authorization_endpoint.clone(),
            _ => None,
        };
        known.or_else(|| {
            self.extra_params
                .get(name)
                .or_else(|| self.extra_params.get(&camel))
                .filter(|value| !value.is_null())
                .map(value_to_string)
        })
    }
}

/// A configured provider; the tag selects the flow that runs it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Provider {
    #[serde(rename = "1.0")]
    OAuth1(OAuth1Provider),
    #[serde(rename = "2.0")]
    OAuth2(OAuth2Provider),
}

impl Provider {
    pub fn name(&self) -> &str {
        match self {
            Provider::OAuth1(p) => &p.name,
            Provider::OAuth2(p) => &p.name,
        }
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        match self {
            Provider::OAuth1(p) => p.redirect_uri.as_deref(),
            Provider::OAuth2(p) => p.redirect_uri.as_deref(),
        }
    }

    pub fn set_redirect_uri(&mut self, redirect_uri: Option<String>) {
        match self {
            Provider::OAuth1(p) => p.redirect_uri = redirect_uri,
            Provider::OAuth2(p) => p.redirect_uri = redirect_uri,
        }
    }
}

impl From<OAuth1Provider> for Provider {
    fn from(provider: OAuth1Provider) -> Self {
        Provider::OAuth1(provider)
    }
}

impl From<OAuth2Provider> for Provider {
    fn from(provider: OAuth2Provider) -> Self {
        Provider::OAuth2(provider)
    }
}

impl OAuth1Provider {
    fn apply_field(&mut self, key: &str, value: &Value) -> Result<(), serde_json::Error> {
        match camel_case(key).as_str() {
            "name" => self.name = parse(value)?,
            "url" => self.url = parse(value)?,
            "authorizationEndpoint" => self.authorization_endpoint = parse(value)?,
            "redirectUri" => self.redirect_uri = parse(value)?,
            "popupOptions" => self.popup_options = parse(value)?,
            _ => {}
        }
        Ok(())
    }
}

impl OAuth2Provider {
    fn apply_field(&mut self, key: &str, value: &Value) -> Result<(), serde_json::Error> {
        match camel_case(key).as_str() {
            "name" => self.name = parse(value)?,
            "url" => self.url = parse(value)?,
            "authorizationEndpoint" => self.authorization_endpoint = parse(value)?,
            "redirectUri" => self.redirect_uri = parse(value)?,
            "popupOptions" => self.popup_options = parse(value)?,
            "clientId" => self.client_id = parse(value)?,
            "scope" => self.scope = parse(value)?,
            "scopeDelimiter" => self.scope_delimiter = parse(value)?,
            "scopePrefix" => self.scope_prefix = parse(value)?,
            "responseType" => self.response_type = parse(value)?,
            "defaultUrlParams" => self.default_url_params = parse(value)?,
            "requiredUrlParams" => self.required_url_params = parse(value)?,
            "optionalUrlParams" => self.optional_url_params = parse(value)?,
            "responseParams" => self.response_params = parse(value)?,
            "display" => self.display = parse(value)?,
            "state" => self.state = parse(value)?,
            "nonce" => self.nonce = parse(value)?,
            _ => {
                self.extra_params.insert(key.to_string(), value.clone());
            }
        }
        Ok(())
    }
}

impl Provider {
    /// Overlays the keys of `patch` on this descriptor, leaving the others untouched.
    /// `type` is ignored; a patch cannot switch protocols.
    pub fn apply_patch(&mut self, patch: &Params) -> Result<(), serde_json::Error> {
        for (key, value) in patch.iter().filter(|(key, _)| key.as_str() != "type") {
            match self {
                Provider::OAuth1(p) => p.apply_field(key, value)?,
                Provider::OAuth2(p) => p.apply_field(key, value)?,
            }
        }
        Ok(())
    }

    pub fn version(&self) -> &'static str {
        match self {
            Provider::OAuth1(_) => "1.0",
            Provider::OAuth2(_) => "2.0",
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value.clone())
}

/// Parses a JSON value as a provider, e.g. from a config file fragment.
pub fn provider_from_value(value: Value) -> Result<Provider, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oauth2_descriptor_gets_typed_defaults() {
        let provider = OAuth2Provider::new("acme", "/auth/acme");
        assert_eq!(provider.response_type, "code");
        assert_eq!(
            provider.default_url_params,
            vec!["response_type", "client_id", "redirect_uri"]
        );
        assert_eq!(provider.scope_value(), None);
    }

    #[test]
    fn scope_joins_with_prefix() {
        let provider = OAuth2Provider {
            scope: vec!["a".into(), "b".into()],
            scope_delimiter: Some(" ".into()),
            scope_prefix: Some("openid".into()),
            ..OAuth2Provider::default()
        };
        assert_eq!(provider.scope_value().as_deref(), Some("openid a b"));

        let comma = OAuth2Provider { scope: vec!["email".into(), "x".into()], ..Default::default() };
        assert_eq!(comma.scope_value().as_deref(), Some("email,x"));
    }

    #[test]
    fn tag_selects_the_variant() {
        let provider = provider_from_value(json!({
            "type": "2.0",
            "name": "acme",
            "url": "/auth/acme",
            "clientId": "cid",
            "state": "S",
            "accessType": "offline",
            "popupOptions": { "width": 400, "height": 300 }
        }))
        .unwrap();
        let Provider::OAuth2(acme) = provider else { panic!("expected oauth2") };
        assert_eq!(acme.client_id.as_deref(), Some("cid"));
        assert_eq!(acme.state.as_ref().map(|s| s.resolve()).as_deref(), Some("S"));
        assert_eq!(acme.url_param("access_type").as_deref(), Some("offline"));
        assert_eq!(acme.url_param("client_id").as_deref(), Some("cid"));
        assert_eq!(acme.popup_options, PopupOptions::sized(400.0, 300.0));
        assert!(!acme.extra_params.contains_key("type"));

        let twitter = provider_from_value(json!({ "type": "1.0", "name": "twitter", "url": "/t" }));
        assert!(matches!(twitter, Ok(Provider::OAuth1(_))));
        assert!(provider_from_value(json!({ "type": "3.0", "name": "x" })).is_err());
    }

    #[test]
    fn patch_overlays_only_given_keys() {
        let mut provider = Provider::OAuth2(OAuth2Provider {
            scope: vec!["email".into()],
            display: Some("popup".into()),
            ..OAuth2Provider::new("google", "/auth/google")
        });
        let patch = json!({ "type": "1.0", "clientId": "cid", "url": "/oauth/google", "prompt": "consent" });
        provider.apply_patch(patch.as_object().unwrap()).unwrap();

        assert_eq!(provider.version(), "2.0");
        let Provider::OAuth2(google) = provider else { panic!("expected oauth2") };
        assert_eq!(google.client_id.as_deref(), Some("cid"));
        assert_eq!(google.url, "/oauth/google");
        assert_eq!(google.scope, vec!["email"]);
        assert_eq!(google.url_param("prompt").as_deref(), Some("consent"));
    }

    #[test]
    fn generators_run_per_call() {
        let state = ParamSource::random_state();
        assert_ne!(state.resolve(), state.resolve());
    }
}
