//! Route guard run before every navigation, plus the auth-aware route filter.

use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::authentication::Authentication;
use super::router::{Navigation, NavigationOptions, Router};
use super::types::AuthError;
use super::window::HostWindow;

/// Route names the guard is registered for, or exempted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl GuardOptions {
    pub fn is_configured(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Cancel,
}

pub struct AuthorizeStep {
    auth: Rc<Authentication>,
    router: Rc<dyn Router>,
    host: Rc<dyn HostWindow>,
    options: GuardOptions,
}

impl AuthorizeStep {
    pub fn new(
        auth: Rc<Authentication>,
        router: Rc<dyn Router>,
        host: Rc<dyn HostWindow>,
        options: GuardOptions,
    ) -> Self {
        Self { auth, router, host, options }
    }

    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// Decides whether `navigation` may proceed.
    ///
    /// Unauthenticated users are sent to the login route when the guard is configured;
    /// the current URL is kept so login can return there. Authenticated users heading
    /// for the login route are sent to the login redirect instead.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self, navigation: &Navigation) -> Result<GuardOutcome, AuthError> {
        let logged_in = self.auth.is_authenticated();
        let login_route = self.auth.login_route().to_string();

        if !logged_in && self.options.is_configured() {
            let href = self.host.href();
            debug!(return_to = %href, "unauthenticated, redirecting to login");
            self.auth.set_initial_url(&href);
            self.load(&login_route, NavigationOptions::default()).await?;
            return Ok(GuardOutcome::Cancel);
        }

        if logged_in && navigation.instruction == login_route {
            if let Some(redirect) = self.auth.login_redirect() {
                self.load(&redirect, NavigationOptions::replace()).await?;
            }
            return Ok(GuardOutcome::Cancel);
        }

        Ok(GuardOutcome::Allow)
    }

    async fn load(&self, target: &str, options: NavigationOptions) -> Result<(), AuthError> {
        self.router
            .load(target, options)
            .await
            .map_err(|e| AuthError::Navigation(e.to_string()))
    }
}

/// A route entry carrying an optional `auth` requirement.
pub trait AuthRoute {
    /// `Some(true)`: only for signed-in users. `Some(false)`: only for guests.
    fn auth(&self) -> Option<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteEntry {
    pub name: String,
    #[serde(default)]
    pub auth: Option<bool>,
}

impl AuthRoute for RouteEntry {
    fn auth(&self) -> Option<bool> {
        self.auth
    }
}

/// Routes visible in the current session state, e.g. for building a nav menu.
pub fn filter_routes<R: AuthRoute + Clone>(routes: &[R], is_authenticated: bool) -> Vec<R> {
    routes
        .iter()
        .filter(|route| route.auth().is_none_or(|auth| auth == is_authenticated))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_core::config::AuthConfig;
    use crate::auth_core::memory::{InMemoryRouter, InMemorySurface, InMemoryWindow, RouterCall};
    use crate::auth_core::storage::{Storage, StorageKind};

    struct Fixture {
        step: AuthorizeStep,
        auth: Rc<Authentication>,
        storage: Storage,
        router: Rc<InMemoryRouter>,
    }

    fn fixture(options: GuardOptions) -> Fixture {
        let surface = InMemorySurface::new();
        let storage = Storage::new(StorageKind::Local, &surface).unwrap();
        let router = Rc::new(InMemoryRouter::new());
        let host = Rc::new(InMemoryWindow::new("https://app.test"));
        host.set_href("https://app.test/#/orders/7");
        let auth = Rc::new(Authentication::new(
            Rc::new(AuthConfig::default()),
            storage.clone(),
            router.clone(),
            host.clone(),
        ));
        let step = AuthorizeStep::new(auth.clone(), router.clone(), host, options);
        Fixture { step, auth, storage, router }
    }

    fn exclude_login() -> GuardOptions {
        GuardOptions { exclude: vec!["login".into()], ..GuardOptions::default() }
    }

    #[tokio::test]
    async fn unauthenticated_is_sent_to_login_and_url_captured() {
        let f = fixture(exclude_login());
        let outcome = f.step.run(&Navigation::to("/orders/7")).await.unwrap();

        assert_eq!(outcome, GuardOutcome::Cancel);
        assert_eq!(
            f.router.calls(),
            vec![(RouterCall::Load, "/login".to_string(), NavigationOptions::default())]
        );
        assert_eq!(f.auth.login_redirect().as_deref(), Some("https://app.test/#/orders/7"));
    }

    #[tokio::test]
    async fn authenticated_on_login_route_goes_to_redirect() {
        let f = fixture(GuardOptions::default());
        f.storage.set(f.auth.token_name(), "opaque");

        let outcome = f.step.run(&Navigation::to("/login")).await.unwrap();
        assert_eq!(outcome, GuardOutcome::Cancel);
        assert_eq!(
            f.router.last(),
            Some((RouterCall::Load, "#/".to_string(), NavigationOptions::replace()))
        );

        let outcome = f.step.run(&Navigation::to("/orders")).await.unwrap();
        assert_eq!(outcome, GuardOutcome::Allow);
    }

    #[tokio::test]
    async fn unconfigured_guard_allows_guests() {
        let f = fixture(GuardOptions::default());
        assert_eq!(f.step.run(&Navigation::to("/orders")).await.unwrap(), GuardOutcome::Allow);
        assert_eq!(f.step.run(&Navigation::to("/login")).await.unwrap(), GuardOutcome::Allow);
        assert!(f.router.calls().is_empty());
    }

    #[tokio::test]
    async fn configured_guard_allows_signed_in_users() {
        let f = fixture(exclude_login());
        f.storage.set(f.auth.token_name(), "opaque");
        assert_eq!(f.step.run(&Navigation::to("/orders")).await.unwrap(), GuardOutcome::Allow);
    }

    #[test]
    fn filters_routes_by_auth_requirement() {
        let routes: Vec<RouteEntry> = serde_json::from_str(
            r#"[{"name":"home"},{"name":"profile","auth":true},{"name":"login","auth":false}]"#,
        )
        .unwrap();
        let names = |routes: Vec<RouteEntry>| routes.into_iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names(filter_routes(&routes, true)), vec!["home", "profile"]);
        assert_eq!(names(filter_routes(&routes, false)), vec!["home", "login"]);
    }
}
