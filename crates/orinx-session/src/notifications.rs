//! Dismissable operator alerts.
//!
//! Successes stay visible for 3 s and errors for 5 s; expired entries are
//! removed by [`NotificationCenter::prune`], which the console calls before
//! each prompt.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use orinx_types::{Notification, NotificationLevel};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Shared list of live notifications, newest last.
#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `notification` and return its id.
    pub fn raise(&self, notification: Notification) -> Uuid {
        let id = notification.id;
        debug!(%id, level = ?notification.level, message = %notification.message, "notification raised");
        self.entries.lock().push(notification);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.raise(Notification::new(NotificationLevel::Success, message))
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.raise(Notification::new(NotificationLevel::Error, message))
    }

    /// Copy of every notification still held, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every notification whose lifetime has elapsed at `now`.
    /// Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| !n.is_expired(now));
        before - entries.len()
    }

    /// Remove the notification with `id`.  Returns `false` if it was already
    /// gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    pub fn dismiss_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }
}
