//! OAuth 1.0a popup flow. The server holds the consumer secret; the client only
//! carries the request token through the popup and back.

use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, instrument};

use super::config::{AuthConfig, Platform};
use super::http_client::{AuthHttpClient, HttpRequest, RequestCredentials, fetch_json};
use super::popup::Popup;
use super::provider::OAuth1Provider;
use super::types::{AuthError, Params};
use super::utilities::{build_query_string, join_url};

pub struct OAuth1 {
    config: Rc<AuthConfig>,
    popup: Popup,
    http: Rc<dyn AuthHttpClient>,
}

impl OAuth1 {
    pub fn new(config: Rc<AuthConfig>, popup: Popup, http: Rc<dyn AuthHttpClient>) -> Self {
        Self { config, popup, http }
    }

    /// Runs the handshake and returns the server's exchange response.
    #[instrument(skip(self, provider, user_data), fields(provider = %provider.name), level = "debug")]
    pub async fn open(&self, provider: &OAuth1Provider, user_data: &Params) -> Result<Value, AuthError> {
        let authorization_endpoint = provider.authorization_endpoint.as_deref().ok_or_else(|| {
            AuthError::Config(format!("provider {} has no authorization endpoint", provider.name))
        })?;
        let redirect_uri = self.popup.resolve_redirect_uri(provider.redirect_uri.as_deref());
        let server_url = join_url(&self.config.base_url, &provider.url);
        let mobile = self.config.platform == Platform::Mobile;

        // Browsers only allow window.open synchronously with the user gesture.
        let blank = (!mobile).then(|| {
            self.popup.open("", &provider.name, &provider.popup_options, &redirect_uri)
        });

        let request_token = fetch_json(self.http.as_ref(), HttpRequest::post(&server_url)).await?;
        let authorize_url = format!("{}?{}", authorization_endpoint, build_query_string(&request_token));
        debug!(url = %authorize_url, "request token obtained");

        let result = match blank {
            Some(handle) => {
                handle.navigate(&authorize_url);
                handle.poll().await?
            }
            None => {
                self.popup
                    .open(&authorize_url, &provider.name, &provider.popup_options, &redirect_uri)
                    .listen()
                    .await?
            }
        };

        self.exchange_for_token(&server_url, result, user_data).await
    }

    async fn exchange_for_token(
        &self,
        server_url: &str,
        oauth_data: Params,
        user_data: &Params,
    ) -> Result<Value, AuthError> {
        let mut body = user_data.clone();
        body.extend(oauth_data);
        let credentials = if self.config.with_credentials {
            RequestCredentials::Include
        } else {
            RequestCredentials::SameOrigin
        };
        let request = HttpRequest::post(server_url)
            .json(&body)?
            .credentials(credentials);
        fetch_json(self.http.as_ref(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_core::http_client::{HttpMethod, HttpResponse, InMemoryHttpClient};
    use crate::auth_core::memory::InMemoryWindow;
    use crate::auth_core::window::PopupEvent;
    use serde_json::json;

    fn twitter() -> OAuth1Provider {
        OAuth1Provider {
            authorization_endpoint: Some("https://api.twitter.com/oauth/authenticate".into()),
            ..OAuth1Provider::new("twitter", "/auth/twitter")
        }
    }

    fn setup(config: AuthConfig) -> (OAuth1, Rc<InMemoryWindow>, InMemoryHttpClient) {
        let host = Rc::new(InMemoryWindow::new("https://app.test"));
        let http = InMemoryHttpClient::new();
        let flow = OAuth1::new(Rc::new(config), Popup::new(host.clone()), Rc::new(http.clone()));
        (flow, host, http)
    }

    #[tokio::test]
    async fn browser_flow_preopens_then_exchanges_verifier() {
        let (flow, host, http) = setup(AuthConfig::builder().base_url("https://api.test").build());
        http.push_response(
            HttpMethod::POST,
            "https://api.test/auth/twitter",
            HttpResponse::with_json(200, &json!({ "oauth_token": "rt 1" })),
        );
        http.push_response(
            HttpMethod::POST,
            "https://api.test/auth/twitter",
            HttpResponse::with_json(200, &json!({ "token": "final" })),
        );
        host.popup()
            .push_location("https://app.test/?oauth_token=rt1&oauth_verifier=v");

        let mut user_data = Params::new();
        user_data.insert("invite".into(), json!("x"));
        let response = flow.open(&twitter(), &user_data).await.unwrap();
        assert_eq!(response, json!({ "token": "final" }));

        let opened = host.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].url, "");
        assert_eq!(
            host.popup().navigations(),
            vec!["https://api.twitter.com/oauth/authenticate?oauth_token=rt%201".to_string()]
        );

        let posts = http.requests_to(HttpMethod::POST, "https://api.test/auth/twitter");
        assert_eq!(posts.len(), 2);
        assert!(posts[0].body.is_none());
        assert_eq!(
            posts[1].body_json(),
            Some(json!({ "invite": "x", "oauth_token": "rt1", "oauth_verifier": "v" }))
        );
        assert_eq!(posts[1].credentials, RequestCredentials::Include);
        assert_eq!(host.popup().close_calls(), 1);
    }

    #[tokio::test]
    async fn mobile_flow_opens_after_request_token_and_listens() {
        let config = AuthConfig::builder()
            .platform(Platform::Mobile)
            .with_credentials(false)
            .build();
        let (flow, host, http) = setup(config);
        http.push_response(HttpMethod::POST, "/auth/twitter", HttpResponse::with_json(200, &json!({ "oauth_token": "rt" })));
        http.push_response(HttpMethod::POST, "/auth/twitter", HttpResponse::with_json(200, &json!({ "token": "t" })));
        host.popup().push_event(PopupEvent::LoadStart(
            "https://app.test?oauth_token=rt&oauth_verifier=v".into(),
        ));

        flow.open(&twitter(), &Params::new()).await.unwrap();

        let opened = host.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].url, "https://api.twitter.com/oauth/authenticate?oauth_token=rt");
        let posts = http.requests_to(HttpMethod::POST, "/auth/twitter");
        assert_eq!(posts[1].credentials, RequestCredentials::SameOrigin);
    }

    #[tokio::test]
    async fn request_token_failure_closes_the_blank_popup() {
        let (flow, host, http) = setup(AuthConfig::default());
        http.insert_response(HttpMethod::POST, "/auth/twitter", HttpResponse::new(500, "down"));

        let err = flow.open(&twitter(), &Params::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::Http(ref r) if r.status == 500));
        assert_eq!(host.popup().close_calls(), 1);
    }

    #[tokio::test]
    async fn missing_endpoint_fails_before_any_popup() {
        let (flow, host, _) = setup(AuthConfig::default());
        let err = flow
            .open(&OAuth1Provider::new("bare", "/auth/bare"), &Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
        assert!(host.opened().is_empty());
    }
}
