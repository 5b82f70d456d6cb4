//! Wires configuration and host collaborators into a ready-to-use auth context.

use std::rc::Rc;

use tracing::info;

use super::auth_service::AuthService;
use super::authentication::{Authentication, AuthorizedHttpClient};
use super::authorize_step::{AuthorizeStep, GuardOptions};
use super::config::AuthConfig;
use super::http_client::AuthHttpClient;
use super::oauth1::OAuth1;
use super::oauth2::OAuth2;
use super::popup::Popup;
use super::router::{EventPublisher, Router};
use super::storage::{Storage, StorageSurface};
use super::types::AuthError;
use super::window::HostWindow;

/// Host-provided collaborators.
pub struct Collaborators {
    pub storage: Rc<dyn StorageSurface>,
    pub http: Rc<dyn AuthHttpClient>,
    pub router: Rc<dyn Router>,
    pub host: Rc<dyn HostWindow>,
    pub events: Rc<dyn EventPublisher>,
}

/// Everything an application needs once auth is registered.
pub struct AuthContext {
    pub config: Rc<AuthConfig>,
    pub storage: Storage,
    pub authentication: Rc<Authentication>,
    pub service: AuthService,
    pub authorize_step: AuthorizeStep,
    /// The host transport with the auth header applied.
    pub http: Rc<dyn AuthHttpClient>,
}

/// Configuration entry point.
///
/// ```ignore
/// let plugin = AuthPlugin::configure(|p| {
///     p.config.base_url = "https://api.example.com".into();
///     p.guard.exclude.push("login".into());
/// });
/// let ctx = plugin.register(collaborators)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthPlugin {
    pub config: AuthConfig,
    pub guard: GuardOptions,
}

impl AuthPlugin {
    pub fn new(config: AuthConfig) -> Self {
        Self { config, guard: GuardOptions::default() }
    }

    pub fn configure(configure: impl FnOnce(&mut AuthPlugin)) -> Self {
        let mut plugin = Self::default();
        configure(&mut plugin);
        plugin
    }

    pub fn guard(mut self, guard: GuardOptions) -> Self {
        self.guard = guard;
        self
    }

    /// Builds the auth context. Fails when the configured storage area is unavailable.
    pub fn register(self, collaborators: Collaborators) -> Result<AuthContext, AuthError> {
        let Collaborators { storage, http, router, host, events } = collaborators;
        let config = Rc::new(self.config);
        let storage = Storage::new(config.storage, storage.as_ref())?;

        let authentication = Rc::new(Authentication::new(
            config.clone(),
            storage.clone(),
            router.clone(),
            host.clone(),
        ));
        let authorized: Rc<dyn AuthHttpClient> =
            Rc::new(AuthorizedHttpClient::new(http, authentication.clone()));
        let popup = Popup::new(host.clone());
        let service = AuthService::new(
            authorized.clone(),
            router.clone(),
            authentication.clone(),
            OAuth1::new(config.clone(), popup.clone(), authorized.clone()),
            OAuth2::new(config.clone(), storage.clone(), popup, authorized.clone()),
            events,
        );
        let authorize_step = AuthorizeStep::new(authentication.clone(), router, host, self.guard);

        info!(
            storage = config.storage.as_str(),
            providers = config.providers.len(),
            "auth registered"
        );
        Ok(AuthContext {
            config,
            storage,
            authentication,
            service,
            authorize_step,
            http: authorized,
        })
    }
}
