//! Browser settings registry
//!
//! Every live view is registered here while it exists so settings changes
//! reach it. Registration and removal must pair up; an unknown removal is
//! logged.

use axiom_tabs::{SettingsRegistry, ViewId};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct BrowserSettings {
    observers: RwLock<HashSet<ViewId>>,
    show_security_warnings: AtomicBool,
}

impl BrowserSettings {
    pub fn new(show_security_warnings: bool) -> Self {
        Self {
            observers: RwLock::new(HashSet::new()),
            show_security_warnings: AtomicBool::new(show_security_warnings),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_registered(&self, view: ViewId) -> bool {
        self.observers.read().contains(&view)
    }

    pub fn set_show_security_warnings(&self, show: bool) {
        self.show_security_warnings.store(show, Ordering::Relaxed);
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SettingsRegistry for BrowserSettings {
    fn register(&self, view: ViewId) {
        if !self.observers.write().insert(view) {
            tracing::warn!(view, "View registered for settings twice");
        }
    }

    fn unregister(&self, view: ViewId) {
        if !self.observers.write().remove(&view) {
            tracing::warn!(view, "Unregistering unknown settings observer");
        }
    }

    fn show_security_warnings(&self) -> bool {
        self.show_security_warnings.load(Ordering::Relaxed)
    }
}
