//! Deferred navigation error notifications
//!
//! At most one error dialog is visible per tab. Errors reported while the
//! tab is in the background wait in FIFO order until it is foregrounded.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Navigation error kinds reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unknown,
    HostLookup,
    UnsupportedAuthScheme,
    Authentication,
    ProxyAuthentication,
    Connect,
    Io,
    Timeout,
    RedirectLoop,
    UnsupportedScheme,
    FailedSslHandshake,
    BadUrl,
    File,
    FileNotFound,
    TooManyRequests,
}

impl ErrorKind {
    /// Map the engine's integer error code. Unknown codes map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            -2 => ErrorKind::HostLookup,
            -3 => ErrorKind::UnsupportedAuthScheme,
            -4 => ErrorKind::Authentication,
            -5 => ErrorKind::ProxyAuthentication,
            -6 => ErrorKind::Connect,
            -7 => ErrorKind::Io,
            -8 => ErrorKind::Timeout,
            -9 => ErrorKind::RedirectLoop,
            -10 => ErrorKind::UnsupportedScheme,
            -11 => ErrorKind::FailedSslHandshake,
            -12 => ErrorKind::BadUrl,
            -13 => ErrorKind::File,
            -14 => ErrorKind::FileNotFound,
            -15 => ErrorKind::TooManyRequests,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn title(&self) -> ErrorTitle {
        match self {
            ErrorKind::FileNotFound => ErrorTitle::File,
            _ => ErrorTitle::Network,
        }
    }
}

/// Dialog title category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTitle {
    File,
    Network,
}

/// Which error kinds are logged only and never shown as a dialog.
///
/// The defaults are either noisy or already explained by the error page the
/// engine renders in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPolicy {
    suppressed: HashSet<ErrorKind>,
}

impl ErrorPolicy {
    pub const DEFAULT_SUPPRESSED: [ErrorKind; 5] = [
        ErrorKind::HostLookup,
        ErrorKind::Connect,
        ErrorKind::BadUrl,
        ErrorKind::UnsupportedScheme,
        ErrorKind::File,
    ];

    pub fn new(suppressed: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            suppressed: suppressed.into_iter().collect(),
        }
    }

    pub fn is_suppressed(&self, kind: ErrorKind) -> bool {
        self.suppressed.contains(&kind)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUPPRESSED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedError {
    pub kind: ErrorKind,
    pub title: ErrorTitle,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct ErrorQueue {
    /// `None` once drained, so idle tabs hold no container
    pending: Option<VecDeque<QueuedError>>,
}

impl ErrorQueue {
    /// Queue an error unless one of the same kind is already waiting.
    ///
    /// Returns the error to present right away: only when the tab is in the
    /// foreground and nothing else was queued.
    pub fn push(
        &mut self,
        kind: ErrorKind,
        description: impl Into<String>,
        in_foreground: bool,
    ) -> Option<&QueuedError> {
        let pending = self.pending.get_or_insert_with(VecDeque::new);
        if pending.iter().any(|queued| queued.kind == kind) {
            return None;
        }

        pending.push_back(QueuedError {
            kind,
            title: kind.title(),
            description: description.into(),
        });

        if pending.len() == 1 && in_foreground {
            pending.front()
        } else {
            None
        }
    }

    /// Drop the presented head. Returns the next error to present, if the
    /// tab is in the foreground.
    pub fn dismiss_current(&mut self, in_foreground: bool) -> Option<&QueuedError> {
        let pending = self.pending.as_mut()?;
        pending.pop_front();
        if pending.is_empty() {
            self.pending = None;
            return None;
        }
        if in_foreground {
            self.head()
        } else {
            None
        }
    }

    pub fn head(&self) -> Option<&QueuedError> {
        self.pending.as_ref().and_then(|pending| pending.front())
    }

    pub fn len(&self) -> usize {
        self.pending.as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a backing container exists.
    pub fn is_allocated(&self) -> bool {
        self.pending.is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedError> {
        self.pending.iter().flatten()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_reports_wait_for_foreground() {
        let mut queue = ErrorQueue::default();
        assert!(queue.push(ErrorKind::Timeout, "timed out", false).is_none());
        assert!(queue.push(ErrorKind::Io, "io", false).is_none());
        assert!(queue.push(ErrorKind::Timeout, "again", false).is_none());

        assert_eq!(queue.len(), 2);
        let head = queue.head().unwrap();
        assert_eq!(head.kind, ErrorKind::Timeout);
        assert_eq!(head.description, "timed out");
    }

    #[test]
    fn test_foreground_presents_only_first() {
        let mut queue = ErrorQueue::default();
        let shown = queue.push(ErrorKind::Timeout, "timed out", true).cloned();
        assert_eq!(shown.map(|e| e.kind), Some(ErrorKind::Timeout));

        // Second error queues behind the visible one
        assert!(queue.push(ErrorKind::Io, "io", true).is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_dedup_by_kind_not_content() {
        let mut queue = ErrorQueue::default();
        queue.push(ErrorKind::Authentication, "first", false);
        queue.push(ErrorKind::Authentication, "different text", false);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dismiss_presents_next_then_tears_down() {
        let mut queue = ErrorQueue::default();
        queue.push(ErrorKind::Timeout, "a", true);
        queue.push(ErrorKind::Io, "b", true);

        let next = queue.dismiss_current(true).cloned().unwrap();
        assert_eq!(next.kind, ErrorKind::Io);

        assert!(queue.dismiss_current(true).is_none());
        assert!(queue.is_empty());
        assert!(!queue.is_allocated());

        // Dismissing with nothing queued is harmless
        assert!(queue.dismiss_current(true).is_none());
    }

    #[test]
    fn test_dismiss_in_background_keeps_next_pending() {
        let mut queue = ErrorQueue::default();
        queue.push(ErrorKind::Timeout, "a", true);
        queue.push(ErrorKind::Io, "b", true);

        assert!(queue.dismiss_current(false).is_none());
        assert_eq!(queue.head().map(|e| e.kind), Some(ErrorKind::Io));
    }

    #[test]
    fn test_error_codes_and_titles() {
        assert_eq!(ErrorKind::from_code(-2), ErrorKind::HostLookup);
        assert_eq!(ErrorKind::from_code(-14), ErrorKind::FileNotFound);
        assert_eq!(ErrorKind::from_code(42), ErrorKind::Unknown);
        assert_eq!(ErrorKind::FileNotFound.title(), ErrorTitle::File);
        assert_eq!(ErrorKind::Timeout.title(), ErrorTitle::Network);
    }

    #[test]
    fn test_default_policy() {
        let policy = ErrorPolicy::default();
        for kind in ErrorPolicy::DEFAULT_SUPPRESSED {
            assert!(policy.is_suppressed(kind));
        }
        assert!(!policy.is_suppressed(ErrorKind::Timeout));

        let custom = ErrorPolicy::new([ErrorKind::Timeout]);
        assert!(custom.is_suppressed(ErrorKind::Timeout));
        assert!(!custom.is_suppressed(ErrorKind::HostLookup));
    }
}
