//! Key-value persistence for tokens and pending handshake state.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::types::AuthError;

/// One synchronous string store, e.g. `localStorage`.
pub trait StorageArea {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// The host's storage surface. Either area may be missing (disabled, private mode).
pub trait StorageSurface {
    fn local(&self) -> Option<Rc<dyn StorageArea>>;
    fn session(&self) -> Option<Rc<dyn StorageArea>>;
}

/// Which area of the surface backs a [`Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageKind {
    #[default]
    #[serde(rename = "localStorage")]
    Local,
    #[serde(rename = "sessionStorage")]
    Session,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "localStorage",
            StorageKind::Session => "sessionStorage",
        }
    }
}

/// Store bound to a single storage area, selected once at construction.
#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    area: Rc<dyn StorageArea>,
}

impl Storage {
    pub fn new(kind: StorageKind, surface: &dyn StorageSurface) -> Result<Self, AuthError> {
        let area = match kind {
            StorageKind::Local => surface.local().ok_or_else(|| {
                AuthError::Config("Local Storage is disabled or unavailable.".into())
            })?,
            StorageKind::Session => surface.session().ok_or_else(|| {
                AuthError::Config("Session Storage is disabled or unavailable.".into())
            })?,
        };
        Ok(Self { kind, area })
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.area.get(key)
    }

    pub fn set(&self, key: &str, value: &str) {
        self.area.set(key, value)
    }

    pub fn remove(&self, key: &str) {
        self.area.remove(key)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("kind", &self.kind).finish()
    }
}
