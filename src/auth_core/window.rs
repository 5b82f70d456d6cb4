//! Boundary to the host browser window and the popups it opens.

use std::fmt;

use futures::channel::mpsc::UnboundedReceiver;

/// Position and outer size of the host window, used to center popups.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowGeometry {
    pub screen_x: f64,
    pub screen_y: f64,
    pub outer_width: f64,
    pub outer_height: f64,
}

/// Navigation events raised by an embedded webview popup.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupEvent {
    /// The popup started loading `url`.
    LoadStart(String),
    /// The user dismissed the popup.
    Exit,
    /// The popup failed to load a page.
    LoadError,
}

/// Reading the popup location failed, typically because it is cross-origin.
#[derive(Debug, Clone)]
pub struct LocationAccessError(pub String);

impl fmt::Display for LocationAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot read popup location: {}", self.0)
    }
}

impl std::error::Error for LocationAccessError {}

/// A child window opened by [`HostWindow::open`].
pub trait PopupWindow {
    /// Full href of the popup.
    fn location(&self) -> Result<String, LocationAccessError>;
    fn is_closed(&self) -> bool;
    fn close(&self);
    fn focus(&self);
    fn navigate(&self, url: &str);
    /// Navigation event stream, for webview hosts that expose one. Can be taken once.
    fn take_events(&mut self) -> Option<UnboundedReceiver<PopupEvent>>;
}

/// The window hosting the application.
pub trait HostWindow {
    fn href(&self) -> String;
    /// `scheme://host[:port]`
    fn origin(&self) -> String;
    /// `host[:port]`
    fn host(&self) -> String;
    fn set_href(&self, url: &str);
    fn geometry(&self) -> WindowGeometry;
    /// Returns None when the popup was blocked.
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>>;
}
