//! In-memory collaborators: storage, host window, router and event bus.
//!
//! Used by the tests and by hosts that run the auth core outside a browser.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use serde_json::Value;
use url::Url;

use super::router::{EventPublisher, NavigationError, NavigationOptions, Router};
use super::storage::{StorageArea, StorageSurface};
use super::window::{
    HostWindow, LocationAccessError, PopupEvent, PopupWindow, WindowGeometry,
};

/// DashMap-backed storage area.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageArea for InMemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Storage surface with independent local and session areas.
#[derive(Clone)]
pub struct InMemorySurface {
    local: Option<Rc<InMemoryStorage>>,
    session: Option<Rc<InMemoryStorage>>,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self {
            local: Some(Rc::new(InMemoryStorage::new())),
            session: Some(Rc::new(InMemoryStorage::new())),
        }
    }

    /// Surface whose local storage is disabled.
    pub fn without_local() -> Self {
        Self { local: None, ..Self::new() }
    }

    /// Surface whose session storage is disabled.
    pub fn without_session() -> Self {
        Self { session: None, ..Self::new() }
    }

    pub fn local_area(&self) -> Option<Rc<InMemoryStorage>> {
        self.local.clone()
    }

    pub fn session_area(&self) -> Option<Rc<InMemoryStorage>> {
        self.session.clone()
    }
}

impl Default for InMemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSurface for InMemorySurface {
    fn local(&self) -> Option<Rc<dyn StorageArea>> {
        self.local.clone().map(|area| area as Rc<dyn StorageArea>)
    }

    fn session(&self) -> Option<Rc<dyn StorageArea>> {
        self.session.clone().map(|area| area as Rc<dyn StorageArea>)
    }
}

/// Scripted state shared by every popup an [`InMemoryWindow`] opens.
///
/// Locations are read front to back; the last one sticks. An empty queue reads
/// as a cross-origin access error.
pub struct PopupState {
    locations: RefCell<VecDeque<String>>,
    closed: Cell<bool>,
    focused: Cell<bool>,
    close_calls: Cell<usize>,
    location_reads: Cell<usize>,
    navigations: RefCell<Vec<String>>,
    events_tx: UnboundedSender<PopupEvent>,
    events_rx: RefCell<Option<UnboundedReceiver<PopupEvent>>>,
}

impl PopupState {
    fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            locations: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
            focused: Cell::new(false),
            close_calls: Cell::new(0),
            location_reads: Cell::new(0),
            navigations: RefCell::new(Vec::new()),
            events_tx,
            events_rx: RefCell::new(Some(events_rx)),
        }
    }

    pub fn push_location(&self, url: impl Into<String>) {
        self.locations.borrow_mut().push_back(url.into());
    }

    pub fn push_event(&self, event: PopupEvent) {
        let _ = self.events_tx.unbounded_send(event);
    }

    /// Marks the popup closed the way a user dismissing it would.
    pub fn close_by_user(&self) {
        self.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn focused(&self) -> bool {
        self.focused.get()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.get()
    }

    pub fn location_reads(&self) -> usize {
        self.location_reads.get()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }
}

/// Popup handed out by [`InMemoryWindow::open`].
pub struct ScriptedPopup {
    state: Rc<PopupState>,
}

impl PopupWindow for ScriptedPopup {
    fn location(&self) -> Result<String, LocationAccessError> {
        let state = &self.state;
        state.location_reads.set(state.location_reads.get() + 1);
        let mut locations = state.locations.borrow_mut();
        let location = if locations.len() > 1 {
            locations.pop_front()
        } else {
            locations.front().cloned()
        };
        location.ok_or_else(|| LocationAccessError("cross-origin frame".into()))
    }

    fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    fn close(&self) {
        self.state.close_calls.set(self.state.close_calls.get() + 1);
        self.state.closed.set(true);
    }

    fn focus(&self) {
        self.state.focused.set(true);
    }

    fn navigate(&self, url: &str) {
        self.state.navigations.borrow_mut().push(url.to_string());
    }

    fn take_events(&mut self) -> Option<UnboundedReceiver<PopupEvent>> {
        self.state.events_rx.borrow_mut().take()
    }
}

/// A `window.open` call seen by [`InMemoryWindow`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedPopup {
    pub url: String,
    pub name: String,
    pub features: String,
}

/// Host window double.
pub struct InMemoryWindow {
    origin: String,
    host: String,
    href: RefCell<String>,
    geometry: Cell<WindowGeometry>,
    block_popups: Cell<bool>,
    opened: RefCell<Vec<OpenedPopup>>,
    popup: Rc<PopupState>,
}

impl InMemoryWindow {
    /// `origin` is `scheme://host[:port]`; the initial href is `{origin}/`.
    pub fn new(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        let host = Url::parse(&origin)
            .ok()
            .and_then(|url| {
                url.host_str().map(|name| match url.port() {
                    Some(port) => format!("{}:{}", name, port),
                    None => name.to_string(),
                })
            })
            .unwrap_or_default();
        Self {
            href: RefCell::new(format!("{}/", origin)),
            origin,
            host,
            geometry: Cell::new(WindowGeometry {
                screen_x: 0.0,
                screen_y: 0.0,
                outer_width: 1280.0,
                outer_height: 800.0,
            }),
            block_popups: Cell::new(false),
            opened: RefCell::new(Vec::new()),
            popup: Rc::new(PopupState::new()),
        }
    }

    pub fn set_geometry(&self, geometry: WindowGeometry) {
        self.geometry.set(geometry);
    }

    /// Simulates a popup blocker.
    pub fn block_popups(&self, blocked: bool) {
        self.block_popups.set(blocked);
    }

    pub fn popup(&self) -> Rc<PopupState> {
        self.popup.clone()
    }

    pub fn opened(&self) -> Vec<OpenedPopup> {
        self.opened.borrow().clone()
    }
}

impl HostWindow for InMemoryWindow {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn host(&self) -> String {
        self.host.clone()
    }

    fn set_href(&self, url: &str) {
        *self.href.borrow_mut() = url.to_string();
    }

    fn geometry(&self) -> WindowGeometry {
        self.geometry.get()
    }

    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>> {
        self.opened.borrow_mut().push(OpenedPopup {
            url: url.to_string(),
            name: name.to_string(),
            features: features.to_string(),
        });
        if self.block_popups.get() {
            return None;
        }
        Some(Box::new(ScriptedPopup { state: self.popup.clone() }))
    }
}

/// Router call kinds recorded by [`InMemoryRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterCall {
    Goto,
    Load,
}

/// Router double that records every navigation.
#[derive(Default)]
pub struct InMemoryRouter {
    calls: RefCell<Vec<(RouterCall, String, NavigationOptions)>>,
    fail: Cell<bool>,
}

impl InMemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following navigation fail.
    pub fn fail_navigations(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn calls(&self) -> Vec<(RouterCall, String, NavigationOptions)> {
        self.calls.borrow().clone()
    }

    pub fn last(&self) -> Option<(RouterCall, String, NavigationOptions)> {
        self.calls.borrow().last().cloned()
    }

    fn record(&self, call: RouterCall, target: &str, options: NavigationOptions) -> Result<(), NavigationError> {
        self.calls.borrow_mut().push((call, target.to_string(), options));
        if self.fail.get() {
            return Err(format!("navigation to {} refused", target).into());
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Router for InMemoryRouter {
    async fn goto(&self, target: &str, options: NavigationOptions) -> Result<(), NavigationError> {
        self.record(RouterCall::Goto, target, options)
    }

    async fn load(&self, target: &str, options: NavigationOptions) -> Result<(), NavigationError> {
        self.record(RouterCall::Load, target, options)
    }
}

/// Event bus double keeping every published topic and payload.
#[derive(Default)]
pub struct RecordingPublisher {
    events: RefCell<Vec<(String, Option<Value>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events.borrow().iter().map(|(topic, _)| topic.clone()).collect()
    }

    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.borrow().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: Option<&Value>) {
        self.events.borrow_mut().push((topic.to_string(), payload.cloned()));
    }
}
