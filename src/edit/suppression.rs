//! Self-edit suppression
//!
//! When the engine rewrites a document itself, the editor echoes the change
//! back as an ordinary change notification. Each path carries a small state
//! machine so exactly that echo is swallowed:
//!
//! ```text
//! Clean --arm(text)--> AwaitingEcho --notification--> Clean
//! ```
//!
//! Any notification consumes the marker. If its text differs from what the
//! engine wrote, somebody else edited the buffer in between and the change is
//! treated as a fresh edit.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::warn;

/// Per-path suppression state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoState {
    #[default]
    Clean,
    /// The engine wrote this text and expects it back once
    AwaitingEcho { expected: blake3::Hash },
}

/// Outcome of a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The echo of the engine's own edit; no re-parse needed
    Suppressed,
    /// A marker was armed but the text differs; treat as a fresh edit
    Mismatched,
    /// No marker armed; a normal external edit
    Fresh,
}

impl Notification {
    /// Whether the notification should mark the document dirty
    pub fn needs_rebind(&self) -> bool {
        !matches!(self, Notification::Suppressed)
    }
}

/// Suppression markers keyed by path
#[derive(Debug, Default, Clone)]
pub struct SuppressionTable {
    states: FxHashMap<PathBuf, EchoState>,
}

impl SuppressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot marker for the text the engine is about to store
    pub fn arm(&mut self, path: &Path, text: &str) {
        let expected = blake3::hash(text.as_bytes());
        self.states.insert(path.to_path_buf(), EchoState::AwaitingEcho { expected });
    }

    pub fn state(&self, path: &Path) -> EchoState {
        self.states.get(path).copied().unwrap_or_default()
    }

    /// Consume the marker for `path`, if any, and classify the notification
    pub fn on_notification(&mut self, path: &Path, text: &str) -> Notification {
        match self.states.remove(path) {
            None | Some(EchoState::Clean) => Notification::Fresh,
            Some(EchoState::AwaitingEcho { expected }) => {
                if blake3::hash(text.as_bytes()) == expected {
                    Notification::Suppressed
                } else {
                    warn!(path = %path.display(), "change notification differs from the engine's own edit");
                    Notification::Mismatched
                }
            }
        }
    }

    /// Put back a state captured with [`SuppressionTable::state`]
    pub fn restore(&mut self, path: &Path, state: EchoState) {
        match state {
            EchoState::Clean => self.states.remove(path),
            armed => self.states.insert(path.to_path_buf(), armed),
        };
    }

    /// Drop the marker without a notification (document closed)
    pub fn disarm(&mut self, path: &Path) {
        self.states.remove(path);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Number of paths awaiting an echo
    pub fn armed(&self) -> usize {
        self.states.len()
    }
}
