pub mod auth_core;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

pub use auth_core::auth_service::{AuthService, LoginRequest, SignupRequest};
pub use auth_core::authentication::{Authentication, AuthorizedHttpClient, decompose_token};
pub use auth_core::authorize_step::{AuthRoute, AuthorizeStep, GuardOptions, GuardOutcome, RouteEntry, filter_routes};
pub use auth_core::config::{AuthConfig, AuthConfigBuilder, Platform, UnlinkMethod};
pub use auth_core::http_client::{AuthHttpClient, HttpClientError, HttpMethod, HttpRequest, HttpResponse, InMemoryHttpClient, RequestCredentials};
pub use auth_core::memory::{InMemoryRouter, InMemoryStorage, InMemorySurface, InMemoryWindow, RecordingPublisher};
pub use auth_core::oauth1::OAuth1;
pub use auth_core::oauth2::OAuth2;
pub use auth_core::plugin::{AuthContext, AuthPlugin, Collaborators};
pub use auth_core::popup::{Popup, PopupHandle, PopupOptions};
pub use auth_core::provider::{OAuth1Provider, OAuth2Provider, ParamSource, Provider};
pub use auth_core::router::{AuthEvent, EventPublisher, Navigation, NavigationOptions, NullPublisher, Router};
pub use auth_core::storage::{Storage, StorageArea, StorageKind, StorageSurface};
pub use auth_core::types::{AuthError, Params};
pub use auth_core::window::{HostWindow, PopupEvent, PopupWindow, WindowGeometry};

#[cfg(feature = "reqwest")]
pub use auth_core::reqwest_client::ReqwestHttpClient;
