//! Security (lock) indicator with one-slot rollback

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    #[default]
    Unsecure,
    Secure,
    /// A secure page pulled in at least one insecure resource
    Mixed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LockIcon {
    current: LockState,
    previous: LockState,
}

impl LockIcon {
    pub fn state(&self) -> LockState {
        self.current
    }

    pub fn previous(&self) -> LockState {
        self.previous
    }

    /// Remember the current state, then derive a fresh one from the page URL.
    pub fn reset_for(&mut self, url: &str) {
        self.previous = self.current;
        self.current = if scheme_is(url, &["https"]) {
            LockState::Secure
        } else {
            LockState::Unsecure
        };
    }

    /// Roll back to the state saved by the last `reset_for`, e.g. after a
    /// failed or cancelled load.
    pub fn revert(&mut self) {
        self.current = self.previous;
    }

    /// Sub-resource loads on a secure page downgrade it to mixed content
    /// unless they are https, data or about URLs.
    pub fn on_resource_load(&mut self, url: &str) {
        if url.is_empty() || self.current != LockState::Secure {
            return;
        }
        if !scheme_is(url, &["https", "data", "about"]) {
            self.current = LockState::Mixed;
        }
    }

    pub(crate) fn restore(&mut self, state: LockState) {
        self.current = state;
        self.previous = state;
    }
}

fn scheme_is(url: &str, schemes: &[&str]) -> bool {
    Url::parse(url)
        .map(|parsed| schemes.contains(&parsed.scheme()))
        .unwrap_or(false)
}
