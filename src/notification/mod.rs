//! Status notification for the running timer.
//!
//! The engine pushes a short text on every tick (`mm:ss` of the remaining
//! time, or a completion message at zero) and asks for removal when the
//! timer is stopped. How the text reaches the user is up to the host:
//!
//! - [`LogNotifier`]: keeps the latest text for `status` queries and logs it
//! - [`MockNotifier`]: records every call, for tests

pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub use self::error::NotificationError;

use crate::types::format_mm_ss;

/// Text shown once the countdown reaches zero.
pub const TIMES_UP_TEXT: &str = "Time's up";

/// Returns the notification text for `remain` milliseconds.
pub fn status_text(remain: u64) -> String {
    match format_mm_ss(remain) {
        text if text == "00:00" => TIMES_UP_TEXT.to_string(),
        text => text,
    }
}

/// Receiver of status notification updates.
pub trait StatusNotifier: Send + Sync {
    /// Shows or replaces the status text.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be posted.
    fn update(&self, text: &str) -> Result<(), NotificationError>;

    /// Removes the status notification.
    fn remove(&self);

    /// Returns the text currently shown, if the sink keeps track of it.
    fn current(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// LogNotifier
// ============================================================================

/// Keeps the latest status text in memory and writes changes to the log.
#[derive(Debug, Default)]
pub struct LogNotifier {
    current: Mutex<Option<String>>,
}

impl LogNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusNotifier for LogNotifier {
    fn update(&self, text: &str) -> Result<(), NotificationError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        // Only whole-second changes are worth a log line.
        if current.as_deref() != Some(text) {
            tracing::debug!("通知を更新: {}", text);
            *current = Some(text.to_string());
        }
        Ok(())
    }

    fn remove(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.take().is_some() {
            tracing::debug!("通知を削除しました");
        }
    }

    fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    updates: Mutex<Vec<String>>,
    remove_count: Mutex<usize>,
    should_fail: AtomicBool,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    #[must_use]
    pub fn remove_count(&self) -> usize {
        *self.remove_count.lock().unwrap()
    }

    pub fn clear_calls(&self) {
        self.updates.lock().unwrap().clear();
        *self.remove_count.lock().unwrap() = 0;
    }
}

impl StatusNotifier for MockNotifier {
    fn update(&self, text: &str) -> Result<(), NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::UpdateFailed("Mock failure".to_string()));
        }
        self.updates.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn remove(&self) {
        *self.remove_count.lock().unwrap() += 1;
    }

    fn current(&self) -> Option<String> {
        self.updates.lock().unwrap().last().cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
