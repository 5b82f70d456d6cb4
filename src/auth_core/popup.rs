//! Popup broker: opens the provider window and waits for it to come back to the redirect URI.

use std::rc::Rc;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::types::{AuthError, Params};
use super::utilities::{is_truthy, merge_redirect_params};
use super::window::{HostWindow, PopupEvent, PopupWindow};

/// Interval between two reads of the popup location.
pub const POLL_INTERVAL: Duration = Duration::from_millis(35);

const DEFAULT_POPUP_SIZE: f64 = 500.0;

/// Requested popup size. Missing dimensions fall back to 500.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PopupOptions {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PopupOptions {
    pub fn sized(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height) }
    }
}

/// Opens provider popups on the host window.
#[derive(Clone)]
pub struct Popup {
    host: Rc<dyn HostWindow>,
}

impl Popup {
    pub fn new(host: Rc<dyn HostWindow>) -> Self {
        Self { host }
    }

    /// Default redirect URI for providers that do not set one.
    pub fn host_origin(&self) -> String {
        self.host.origin()
    }

    /// The redirect URI a handshake runs with: the host origin when unset, the host
    /// origin plus the path when given as `/path`, otherwise the value as-is.
    pub fn resolve_redirect_uri(&self, redirect_uri: Option<&str>) -> String {
        match redirect_uri {
            None => self.host_origin(),
            Some(path) if path.starts_with('/') && !path.starts_with("//") => {
                format!("{}{}", self.host_origin(), path)
            }
            Some(uri) => uri.to_string(),
        }
    }

    /// Opens `url` in a popup centered over the host window.
    ///
    /// Always returns a handle; a blocked popup surfaces when the handle is awaited.
    pub fn open(
        &self,
        url: &str,
        name: &str,
        options: &PopupOptions,
        redirect_uri: &str,
    ) -> PopupHandle {
        let features = self.features(options);
        debug!(popup = name, features = %features, "opening popup");
        let window = self.host.open(url, name, &features);
        match &window {
            Some(window) => window.focus(),
            None => warn!(popup = name, "popup blocked by the host"),
        }
        PopupHandle {
            window,
            host: self.host.clone(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    /// `width=..,height=..,left=..,top=..` for `window.open`.
    pub fn features(&self, options: &PopupOptions) -> String {
        let geometry = self.host.geometry();
        let width = options.width.unwrap_or(DEFAULT_POPUP_SIZE);
        let height = options.height.unwrap_or(DEFAULT_POPUP_SIZE);
        let left = geometry.screen_x + (geometry.outer_width - width) / 2.0;
        let top = geometry.screen_y + (geometry.outer_height - height) / 2.5;
        [("width", width), ("height", height), ("left", left), ("top", top)]
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One popup handshake. Consumed by [`PopupHandle::poll`] or [`PopupHandle::listen`];
/// the window is closed on every exit path, including drop.
pub struct PopupHandle {
    window: Option<Box<dyn PopupWindow>>,
    host: Rc<dyn HostWindow>,
    redirect_uri: String,
}

impl PopupHandle {
    pub fn is_blocked(&self) -> bool {
        self.window.is_none()
    }

    /// Points the already-open popup at `url`.
    pub fn navigate(&self, url: &str) {
        if let Some(window) = &self.window {
            window.navigate(url);
        }
    }

    /// Polls the popup location until it lands back on the host's origin.
    #[instrument(skip(self), level = "debug")]
    pub async fn poll(mut self) -> Result<Params, AuthError> {
        let host = self.host.host();
        loop {
            sleep(POLL_INTERVAL).await;

            let Some(window) = self.window.as_deref() else {
                return Err(AuthError::PopupBlocked);
            };
            if let Some(outcome) = inspect_location(window, &host) {
                self.settle();
                return outcome;
            }
            if window.is_closed() {
                warn!("popup closed before the redirect");
                self.settle();
                return Err(AuthError::PopupProblem);
            }
        }
    }

    /// Waits for the webview to start loading the redirect URI.
    #[instrument(skip(self), fields(redirect_uri = %self.redirect_uri), level = "debug")]
    pub async fn listen(mut self) -> Result<Params, AuthError> {
        let Some(mut events) = self.window.as_mut().and_then(|w| w.take_events()) else {
            return Err(AuthError::PopupBlocked);
        };
        while let Some(event) = events.next().await {
            match event {
                PopupEvent::LoadStart(url) => {
                    if !url.starts_with(&self.redirect_uri) {
                        continue;
                    }
                    if let Some(params) = redirect_params(&url) {
                        self.settle();
                        return into_outcome(params);
                    }
                }
                PopupEvent::Exit => {
                    warn!("popup dismissed before the redirect");
                    self.settle();
                    return Err(AuthError::PopupClosed);
                }
                PopupEvent::LoadError => {
                    warn!("popup failed to load");
                    self.settle();
                    return Err(AuthError::AuthorizationFailed);
                }
            }
        }
        self.settle();
        Err(AuthError::PopupClosed)
    }

    fn settle(&mut self) {
        if let Some(window) = self.window.take() {
            window.close();
        }
    }
}

impl Drop for PopupHandle {
    fn drop(&mut self) {
        self.settle();
    }
}

/// None while the popup is cross-origin or has no params yet.
fn inspect_location(window: &dyn PopupWindow, host: &str) -> Option<Result<Params, AuthError>> {
    let location = window.location().ok()?;
    let url = Url::parse(&location).ok()?;
    let popup_host = match (url.host_str(), url.port()) {
        (Some(name), Some(port)) => format!("{}:{}", name, port),
        (Some(name), None) => name.to_string(),
        (None, _) => return None,
    };
    if popup_host != host {
        return None;
    }
    redirect_params(&location).map(into_outcome)
}

/// Merged query and fragment params, or None when the URL carries neither.
fn redirect_params(location: &str) -> Option<Params> {
    let url = Url::parse(location).ok()?;
    let query = url.query().unwrap_or_default();
    let fragment = url.fragment().unwrap_or_default();
    if query.is_empty() && fragment.is_empty() {
        return None;
    }
    Some(merge_redirect_params(query, fragment))
}

fn into_outcome(params: Params) -> Result<Params, AuthError> {
    match params.get("error") {
        Some(error) if is_truthy(error) => {
            warn!(error = %error, "provider returned an error");
            Err(AuthError::Provider { error: error.clone() })
        }
        _ => Ok(params),
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(target_arch = "wasm32")]
async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}
