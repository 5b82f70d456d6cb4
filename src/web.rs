//! Browser backends over `web_sys`: the real window, its popups and Web Storage.

use std::rc::Rc;

use futures::channel::mpsc::UnboundedReceiver;
use tracing::warn;
use wasm_bindgen::JsValue;

use crate::auth_core::storage::{StorageArea, StorageSurface};
use crate::auth_core::window::{
    HostWindow, LocationAccessError, PopupEvent, PopupWindow, WindowGeometry,
};

fn js_error(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn number_property(window: &web_sys::Window, name: &str) -> f64 {
    js_sys::Reflect::get(window.as_ref(), &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0)
}

/// The page's own `window`.
pub struct BrowserWindow {
    window: web_sys::Window,
}

impl BrowserWindow {
    /// None outside a browsing context, e.g. in a worker.
    pub fn new() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }
}

impl HostWindow for BrowserWindow {
    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn origin(&self) -> String {
        let location = self.window.location();
        location.origin().unwrap_or_else(|_| {
            format!(
                "{}//{}",
                location.protocol().unwrap_or_default(),
                location.host().unwrap_or_default()
            )
        })
    }

    fn host(&self) -> String {
        self.window.location().host().unwrap_or_default()
    }

    fn set_href(&self, url: &str) {
        if let Err(e) = self.window.location().set_href(url) {
            warn!(error = %js_error(e), "navigation failed");
        }
    }

    fn geometry(&self) -> WindowGeometry {
        WindowGeometry {
            screen_x: number_property(&self.window, "screenX"),
            screen_y: number_property(&self.window, "screenY"),
            outer_width: number_property(&self.window, "outerWidth"),
            outer_height: number_property(&self.window, "outerHeight"),
        }
    }

    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>> {
        match self.window.open_with_url_and_target_and_features(url, name, features) {
            Ok(Some(window)) => Some(Box::new(BrowserPopup { window })),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %js_error(e), "window.open failed");
                None
            }
        }
    }
}

/// A popup opened with `window.open`. Browsers expose no navigation events, so
/// handshakes on this backend are polled.
pub struct BrowserPopup {
    window: web_sys::Window,
}

impl PopupWindow for BrowserPopup {
    fn location(&self) -> Result<String, LocationAccessError> {
        self.window
            .location()
            .href()
            .map_err(|e| LocationAccessError(js_error(e)))
    }

    fn is_closed(&self) -> bool {
        self.window.closed().unwrap_or(true)
    }

    fn close(&self) {
        let _ = self.window.close();
    }

    fn focus(&self) {
        let _ = self.window.focus();
    }

    fn navigate(&self, url: &str) {
        if let Err(e) = self.window.location().set_href(url) {
            warn!(error = %js_error(e), "popup navigation failed");
        }
    }

    fn take_events(&mut self) -> Option<UnboundedReceiver<PopupEvent>> {
        None
    }
}

/// `localStorage` / `sessionStorage` of the page.
pub struct BrowserStorageSurface {
    window: web_sys::Window,
}

impl BrowserStorageSurface {
    pub fn new() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }
}

impl StorageSurface for BrowserStorageSurface {
    fn local(&self) -> Option<Rc<dyn StorageArea>> {
        let storage = self.window.local_storage().ok().flatten()?;
        Some(Rc::new(BrowserStorage { storage }))
    }

    fn session(&self) -> Option<Rc<dyn StorageArea>> {
        let storage = self.window.session_storage().ok().flatten()?;
        Some(Rc::new(BrowserStorage { storage }))
    }
}

pub struct BrowserStorage {
    storage: web_sys::Storage,
}

impl StorageArea for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            warn!(key, error = %js_error(e), "storage write failed");
        }
    }

    fn remove(&self, key: &str) {
        let _ = self.storage.remove_item(key);
    }
}
