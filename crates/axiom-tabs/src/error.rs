//! Tab error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabError {
    #[error("Tab not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Tab {0} has neither a live view nor a saved state")]
    NoSavedState(String),

    #[error("Tab {0} has no live view")]
    NoView(String),

    #[error("Cannot open more than {0} tabs")]
    TooManyTabs(usize),

    #[error("Tab {0} already has a subwindow")]
    SubWindowExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] axiom_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
