//! Public auth facade: password login/signup, provider authentication and unlinking.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use super::authentication::Authentication;
use super::config::UnlinkMethod;
use super::http_client::{AuthHttpClient, HttpRequest, fetch_json};
use super::oauth1::OAuth1;
use super::oauth2::OAuth2;
use super::provider::Provider;
use super::router::{AuthEvent, EventPublisher, NavigationOptions, Router};
use super::types::{AuthError, Params};
use super::utilities::join_url;

/// Body of a login call.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginRequest {
    /// Pre-encoded `application/x-www-form-urlencoded` body.
    Form(String),
    Credentials { email: String, password: String },
}

impl From<(&str, &str)> for LoginRequest {
    fn from((email, password): (&str, &str)) -> Self {
        LoginRequest::Credentials { email: email.into(), password: password.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

impl From<(&str, &str, &str)> for SignupRequest {
    fn from((display_name, email, password): (&str, &str, &str)) -> Self {
        Self {
            display_name: display_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

pub struct AuthService {
    http: Rc<dyn AuthHttpClient>,
    router: Rc<dyn Router>,
    auth: Rc<Authentication>,
    oauth1: OAuth1,
    oauth2: OAuth2,
    events: Rc<dyn EventPublisher>,
}

impl AuthService {
    pub fn new(
        http: Rc<dyn AuthHttpClient>,
        router: Rc<dyn Router>,
        auth: Rc<Authentication>,
        oauth1: OAuth1,
        oauth2: OAuth2,
        events: Rc<dyn EventPublisher>,
    ) -> Self {
        Self { http, router, auth, oauth1, oauth2, events }
    }

    pub fn authentication(&self) -> &Rc<Authentication> {
        &self.auth
    }

    fn endpoint(&self, url: &str) -> String {
        join_url(&self.auth.config().base_url, url)
    }

    fn publish(&self, event: AuthEvent, payload: Option<&Value>) {
        self.events.publish(event.topic(), payload);
    }

    /// Fetches the current user's profile.
    pub async fn get_me<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        let url = self.endpoint(&self.auth.config().profile_url);
        let profile = fetch_json(self.http.as_ref(), HttpRequest::get(url)).await?;
        Ok(serde_json::from_value(profile)?)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn get_token_payload(&self) -> Option<Params> {
        self.auth.payload()
    }

    /// Stores a bare token, as if the backend had returned it under `token_name`.
    pub async fn set_token(&self, token: &str) -> Result<(), AuthError> {
        let mut response = Params::new();
        response.insert(self.auth.config().token_name.clone(), token.into());
        self.auth.set_token(&Value::Object(response), None).await
    }

    #[instrument(skip(self, request), level = "debug")]
    pub async fn signup(&self, request: impl Into<SignupRequest>) -> Result<Value, AuthError> {
        let request = request.into();
        let config = self.auth.config();
        let url = self.endpoint(&config.signup_url);
        let response = fetch_json(self.http.as_ref(), HttpRequest::post(url).json(&request)?).await?;

        if config.login_on_signup {
            self.auth.set_token(&response, None).await?;
        } else if let Some(redirect) = &config.signup_redirect {
            if let Err(e) = self.router.goto(redirect, NavigationOptions::replace()).await {
                warn!(redirect = %redirect, error = %e, "post-signup navigation failed");
            }
        }
        info!(email = %request.email, "signed up");
        self.publish(AuthEvent::Signup, Some(&response));
        Ok(response)
    }

    #[instrument(skip(self, request), level = "debug")]
    pub async fn login(&self, request: impl Into<LoginRequest>) -> Result<Value, AuthError> {
        let url = self.endpoint(&self.auth.config().login_url);
        let request = match request.into() {
            LoginRequest::Form(body) => HttpRequest::post(url).form(body),
            LoginRequest::Credentials { email, password } => {
                HttpRequest::post(url).json(&json!({ "email": email, "password": password }))?
            }
        };
        let response = fetch_json(self.http.as_ref(), request).await?;
        self.auth.set_token(&response, None).await?;
        info!("logged in");
        self.publish(AuthEvent::Login, Some(&response));
        Ok(response)
    }

    pub async fn logout(&self, redirect: Option<&str>) -> Result<(), AuthError> {
        self.auth.logout(redirect).await?;
        self.publish(AuthEvent::Logout, None);
        Ok(())
    }

    /// Authenticates with a configured provider through a popup.
    #[instrument(skip(self, user_data), level = "debug")]
    pub async fn authenticate(
        &self,
        name: &str,
        redirect: Option<&str>,
        user_data: Option<Params>,
    ) -> Result<Value, AuthError> {
        let provider = self
            .auth
            .config()
            .provider(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))?;
        let user_data = user_data.unwrap_or_default();
        let response = match provider {
            Provider::OAuth1(descriptor) => self.oauth1.open(descriptor, &user_data).await?,
            Provider::OAuth2(descriptor) => self.oauth2.open(descriptor, &user_data).await?,
        };
        self.auth.set_token(&response, redirect).await?;
        info!(provider = name, "authenticated");
        self.publish(AuthEvent::Authenticate, Some(&response));
        Ok(response)
    }

    /// Unlinks a provider from the current account.
    #[instrument(skip(self), level = "debug")]
    pub async fn unlink(&self, provider: &str) -> Result<Value, AuthError> {
        let config = self.auth.config();
        let url = self.endpoint(&config.unlink_url);
        let request = match config.unlink_method {
            UnlinkMethod::Get => HttpRequest::get(format!("{}{}", url, provider)),
            UnlinkMethod::Post => HttpRequest::post(url).json(provider)?,
        };
        let response = fetch_json(self.http.as_ref(), request).await?;
        self.publish(AuthEvent::Unlink, Some(&response));
        Ok(response)
    }
}
