//! Auth configuration: endpoints, token naming, redirects and the provider table.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::popup::PopupOptions;
use super::provider::{OAuth1Provider, OAuth2Provider, ParamSource, Provider, provider_from_value};
use super::storage::StorageKind;
use super::types::{AuthError, Params};

/// Where the app runs. Mobile webviews report navigation events instead of being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Browser,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlinkMethod {
    #[default]
    Get,
    Post,
}

/// Complete auth configuration. Every field has a stock default, so partial JSON works.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    /// Attach the token to outgoing requests.
    pub http_interceptor: bool,
    /// Store the token returned by signup.
    pub login_on_signup: bool,
    pub base_url: String,
    pub login_redirect: Option<String>,
    pub logout_redirect: Option<String>,
    pub signup_redirect: Option<String>,
    pub login_url: String,
    pub signup_url: String,
    pub profile_url: String,
    pub login_route: String,
    pub signup_route: String,
    /// Object that holds the token when the response is enveloped.
    pub token_root: Option<String>,
    pub token_name: String,
    pub id_token_name: String,
    /// Prepended to storage keys as `{prefix}_`; empty disables it.
    pub token_prefix: String,
    pub response_token_prop: String,
    pub response_id_token_prop: String,
    pub unlink_url: String,
    pub unlink_method: UnlinkMethod,
    pub auth_header: String,
    /// Scheme put before the token, e.g. `Bearer`. Empty sends the bare token.
    pub auth_token: String,
    pub with_credentials: bool,
    pub platform: Platform,
    pub storage: StorageKind,
    #[serde(deserialize_with = "merge_providers")]
    pub providers: BTreeMap<String, Provider>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            http_interceptor: true,
            login_on_signup: true,
            base_url: "/".into(),
            login_redirect: Some("#/".into()),
            logout_redirect: Some("#/".into()),
            signup_redirect: Some("#/login".into()),
            login_url: "/auth/login".into(),
            signup_url: "/auth/signup".into(),
            profile_url: "/auth/me".into(),
            login_route: "/login".into(),
            signup_route: "/signup".into(),
            token_root: None,
            token_name: "token".into(),
            id_token_name: "id_token".into(),
            token_prefix: "aurelia".into(),
            response_token_prop: "access_token".into(),
            response_id_token_prop: "id_token".into(),
            unlink_url: "/auth/unlink/".into(),
            unlink_method: UnlinkMethod::Get,
            auth_header: "Authorization".into(),
            auth_token: "Bearer".into(),
            with_credentials: true,
            platform: Platform::Browser,
            storage: StorageKind::Local,
            providers: default_providers(),
        }
    }
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::new()
    }

    /// Loads a configuration from JSON. Provider entries patch the built-in ones.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let config: AuthConfig = serde_json::from_str(json)
            .map_err(|e| AuthError::Config(format!("invalid auth configuration: {}", e)))?;
        debug!(providers = config.providers.len(), "auth configuration loaded");
        Ok(config)
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// Adjusts one configured provider in place.
    pub fn configure_provider(
        &mut self,
        name: &str,
        configure: impl FnOnce(&mut Provider),
    ) -> Result<(), AuthError> {
        let provider = self
            .providers
            .get_mut(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))?;
        configure(provider);
        Ok(())
    }

    /// Storage key for a config key, honouring `token_prefix`.
    pub fn prefixed(&self, key: &str) -> String {
        if self.token_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}_{}", self.token_prefix, key)
        }
    }
}

fn merge_providers<'de, D>(deserializer: D) -> Result<BTreeMap<String, Provider>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let overrides = Params::deserialize(deserializer)?;
    let mut providers = default_providers();
    for (name, value) in overrides {
        let patch = value
            .as_object()
            .ok_or_else(|| D::Error::custom(format!("provider {} must be an object", name)))?;
        let same_type = patch
            .get("type")
            .and_then(|t| t.as_str())
            .map(|t| providers.get(&name).is_some_and(|p| p.version() == t));
        match providers.get_mut(&name) {
            Some(existing) if same_type.unwrap_or(true) => {
                existing.apply_patch(patch).map_err(D::Error::custom)?;
            }
            _ => {
                let mut value = patch.clone();
                value.entry("name").or_insert_with(|| name.clone().into());
                let provider = provider_from_value(value.into()).map_err(D::Error::custom)?;
                providers.insert(name, provider);
            }
        }
    }
    Ok(providers)
}

/// The stock provider table.
pub fn default_providers() -> BTreeMap<String, Provider> {
    let popup = PopupOptions::sized;
    let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let providers: Vec<Provider> = vec![
        OAuth2Provider {
            scope: list(&["profile", "openid"]),
            scope_prefix: Some(String::new()),
            scope_delimiter: Some(" ".into()),
            required_url_params: list(&["scope", "nonce"]),
            optional_url_params: list(&["display", "state"]),
            state: Some(ParamSource::random_state()),
            nonce: Some(ParamSource::random_nonce()),
            display: Some("popup".into()),
            client_id: Some("jsClient".into()),
            popup_options: popup(452.0, 633.0),
            ..OAuth2Provider::new("identSrv", "/auth/identSrv")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://accounts.google.com/o/oauth2/auth".into()),
            scope: list(&["profile", "email"]),
            scope_prefix: Some("openid".into()),
            scope_delimiter: Some(" ".into()),
            required_url_params: list(&["scope"]),
            optional_url_params: list(&["display", "state"]),
            display: Some("popup".into()),
            state: Some(ParamSource::random_state()),
            popup_options: popup(452.0, 633.0),
            ..OAuth2Provider::new("google", "/auth/google")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://www.facebook.com/v2.3/dialog/oauth".into()),
            scope: list(&["email"]),
            scope_delimiter: Some(",".into()),
            nonce: Some(ParamSource::random_nonce()),
            required_url_params: list(&["nonce", "display", "scope"]),
            // Facebook matches the redirect URI exactly, trailing slash included.
            redirect_uri: Some("/".into()),
            display: Some("popup".into()),
            popup_options: popup(580.0, 400.0),
            ..OAuth2Provider::new("facebook", "/auth/facebook")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://www.linkedin.com/uas/oauth2/authorization".into()),
            required_url_params: list(&["state"]),
            scope: list(&["r_emailaddress"]),
            scope_delimiter: Some(" ".into()),
            state: Some("STATE".into()),
            popup_options: popup(527.0, 582.0),
            ..OAuth2Provider::new("linkedin", "/auth/linkedin")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://github.com/login/oauth/authorize".into()),
            optional_url_params: list(&["scope"]),
            scope: list(&["user:email"]),
            scope_delimiter: Some(" ".into()),
            popup_options: popup(1020.0, 618.0),
            ..OAuth2Provider::new("github", "/auth/github")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://api.login.yahoo.com/oauth2/request_auth".into()),
            scope_delimiter: Some(",".into()),
            popup_options: popup(559.0, 519.0),
            ..OAuth2Provider::new("yahoo", "/auth/yahoo")
        }
        .into(),
        OAuth1Provider {
            authorization_endpoint: Some("https://api.twitter.com/oauth/authenticate".into()),
            popup_options: popup(495.0, 645.0),
            ..OAuth1Provider::new("twitter", "/auth/twitter")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://login.live.com/oauth20_authorize.srf".into()),
            scope: list(&["wl.emails"]),
            scope_delimiter: Some(" ".into()),
            required_url_params: list(&["display", "scope"]),
            display: Some("popup".into()),
            popup_options: popup(500.0, 560.0),
            ..OAuth2Provider::new("live", "/auth/live")
        }
        .into(),
        OAuth2Provider {
            authorization_endpoint: Some("https://api.instagram.com/oauth/authorize".into()),
            required_url_params: list(&["scope"]),
            scope: list(&["basic"]),
            scope_delimiter: Some("+".into()),
            display: Some("popup".into()),
            popup_options: popup(550.0, 369.0),
            ..OAuth2Provider::new("instagram", "/auth/instagram")
        }
        .into(),
    ];

    providers
        .into_iter()
        .map(|provider| (provider.name().to_string(), provider))
        .collect()
}

/// Chained-setter builder over [`AuthConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn new() -> Self {
        Self { config: AuthConfig::default() }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn login_url(mut self, login_url: impl Into<String>) -> Self {
        self.config.login_url = login_url.into();
        self
    }

    pub fn signup_url(mut self, signup_url: impl Into<String>) -> Self {
        self.config.signup_url = signup_url.into();
        self
    }

    pub fn profile_url(mut self, profile_url: impl Into<String>) -> Self {
        self.config.profile_url = profile_url.into();
        self
    }

    pub fn unlink_url(mut self, unlink_url: impl Into<String>) -> Self {
        self.config.unlink_url = unlink_url.into();
        self
    }

    pub fn unlink_method(mut self, method: UnlinkMethod) -> Self {
        self.config.unlink_method = method;
        self
    }

    pub fn login_redirect(mut self, redirect: Option<&str>) -> Self {
        self.config.login_redirect = redirect.map(str::to_string);
        self
    }

    pub fn logout_redirect(mut self, redirect: Option<&str>) -> Self {
        self.config.logout_redirect = redirect.map(str::to_string);
        self
    }

    pub fn signup_redirect(mut self, redirect: Option<&str>) -> Self {
        self.config.signup_redirect = redirect.map(str::to_string);
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.config.login_route = route.into();
        self
    }

    pub fn login_on_signup(mut self, enabled: bool) -> Self {
        self.config.login_on_signup = enabled;
        self
    }

    pub fn token_root(mut self, root: Option<&str>) -> Self {
        self.config.token_root = root.map(str::to_string);
        self
    }

    pub fn token_name(mut self, name: impl Into<String>) -> Self {
        self.config.token_name = name.into();
        self
    }

    pub fn token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.token_prefix = prefix.into();
        self
    }

    pub fn response_token_prop(mut self, prop: impl Into<String>) -> Self {
        self.config.response_token_prop = prop.into();
        self
    }

    pub fn auth_header(mut self, header: impl Into<String>, scheme: impl Into<String>) -> Self {
        self.config.auth_header = header.into();
        self.config.auth_token = scheme.into();
        self
    }

    pub fn http_interceptor(mut self, enabled: bool) -> Self {
        self.config.http_interceptor = enabled;
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.config.with_credentials = enabled;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn storage(mut self, storage: StorageKind) -> Self {
        self.config.storage = storage;
        self
    }

    /// Adds or replaces a provider under its own name.
    pub fn provider(mut self, provider: impl Into<Provider>) -> Self {
        let provider = provider.into();
        self.config.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_values() {
        let config = AuthConfig::default();
        assert_eq!(config.prefixed(&config.token_name), "aurelia_token");
        assert_eq!(config.login_redirect.as_deref(), Some("#/"));
        assert_eq!(config.signup_redirect.as_deref(), Some("#/login"));
        assert_eq!(config.storage, StorageKind::Local);
        assert_eq!(config.providers.len(), 9);
        assert!(matches!(config.provider("twitter"), Some(Provider::OAuth1(_))));
        let Some(Provider::OAuth2(google)) = config.provider("google") else {
            panic!("google should be oauth2")
        };
        assert_eq!(google.scope_value().as_deref(), Some("openid profile email"));
        assert_eq!(config.provider("facebook").and_then(|p| p.redirect_uri()), Some("/"));
        assert_eq!(config.provider("google").and_then(|p| p.redirect_uri()), None);
    }

    #[test]
    fn json_overrides_fields_and_patches_providers() {
        let config = AuthConfig::from_json(
            r#"{
                "baseUrl": "https://api.test",
                "tokenPrefix": "",
                "loginRedirect": null,
                "storage": "sessionStorage",
                "platform": "mobile",
                "unlinkMethod": "post",
                "providers": {
                    "google": { "clientId": "google-cid" },
                    "acme": { "type": "2.0", "url": "/auth/acme", "responseType": "token" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.test");
        assert_eq!(config.prefixed("token"), "token");
        assert_eq!(config.login_redirect, None);
        assert_eq!(config.storage, StorageKind::Session);
        assert_eq!(config.platform, Platform::Mobile);
        assert_eq!(config.unlink_method, UnlinkMethod::Post);
        assert_eq!(config.login_url, "/auth/login");

        let Some(Provider::OAuth2(google)) = config.provider("google") else { panic!() };
        assert_eq!(google.client_id.as_deref(), Some("google-cid"));
        assert_eq!(google.scope_prefix.as_deref(), Some("openid"));
        assert!(google.state.is_some());

        let Some(Provider::OAuth2(acme)) = config.provider("acme") else { panic!() };
        assert_eq!(acme.name, "acme");
        assert_eq!(acme.response_type, "token");
    }

    #[test]
    fn bad_storage_kind_is_a_config_error() {
        let err = AuthConfig::from_json(r#"{ "storage": "cookies" }"#).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn builder_and_configure_provider() {
        let mut config = AuthConfig::builder()
            .base_url("http://localhost:3000")
            .token_prefix("app")
            .provider(OAuth2Provider::new("acme", "/auth/acme"))
            .build();
        assert_eq!(config.prefixed("token"), "app_token");

        config
            .configure_provider("acme", |p| p.set_redirect_uri(Some("http://localhost:3000/cb".into())))
            .unwrap();
        assert_eq!(
            config.provider("acme").and_then(|p| p.redirect_uri()),
            Some("http://localhost:3000/cb")
        );
        assert!(matches!(
            config.configure_provider("nope", |_| {}),
            Err(AuthError::UnknownProvider(_))
        ));
    }
}
