//! Boundaries to the application router and the notification bus.

use std::error::Error;

use async_trait::async_trait;
use serde_json::Value;

/// Options for a router navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationOptions {
    /// Replace the current history entry instead of pushing one.
    pub replace: bool,
}

impl NavigationOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

pub type NavigationError = Box<dyn Error + Send + Sync>;

/// The application router.
#[async_trait(?Send)]
pub trait Router {
    /// Navigates to a URL fragment such as `#/`.
    async fn goto(&self, target: &str, options: NavigationOptions) -> Result<(), NavigationError>;
    /// Loads a route instruction such as `/login`.
    async fn load(&self, target: &str, options: NavigationOptions) -> Result<(), NavigationError>;
}

/// The navigation a route guard is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Route instruction being navigated to, comparable with the login route.
    pub instruction: String,
}

impl Navigation {
    pub fn to(instruction: impl Into<String>) -> Self {
        Self { instruction: instruction.into() }
    }
}

/// Fire-and-forget notification bus.
pub trait EventPublisher {
    fn publish(&self, topic: &str, payload: Option<&Value>);
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _topic: &str, _payload: Option<&Value>) {}
}

/// Topics published by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Login,
    Signup,
    Logout,
    Authenticate,
    Unlink,
}

impl AuthEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            AuthEvent::Login => "auth:login",
            AuthEvent::Signup => "auth:signup",
            AuthEvent::Logout => "auth:logout",
            AuthEvent::Authenticate => "auth:authenticate",
            AuthEvent::Unlink => "auth:unlink",
        }
    }
}
