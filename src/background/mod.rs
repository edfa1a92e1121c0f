//! Background execution handle.
//!
//! The engine acquires background execution when a countdown starts and
//! releases it when the countdown finishes or is stopped. What "background
//! execution" means belongs to the host; the engine only sees this trait.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;

/// Errors returned when background execution cannot be acquired.
#[derive(Debug, Error)]
pub enum BackgroundError {
    /// The host refused to keep running in the background.
    #[error("バックグラウンド実行が許可されていません: {0}")]
    NotAllowed(String),
}

/// Host hook that keeps the process alive while a countdown runs.
pub trait BackgroundExecution: Send + Sync {
    /// Begins background execution. Acquiring twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not allow background execution.
    fn acquire(&self) -> Result<(), BackgroundError>;

    /// Ends background execution. Releasing when not held is harmless.
    fn release(&self);

    /// Returns true while background execution is held.
    fn is_held(&self) -> bool;
}

// ============================================================================
// ProcessBackground
// ============================================================================

/// Background handle for the daemon process.
///
/// The daemon outlives every countdown, so holding only marks the process as
/// busy; the flag is reported by `status`.
#[derive(Debug, Default)]
pub struct ProcessBackground {
    held: AtomicBool,
}

impl ProcessBackground {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackgroundExecution for ProcessBackground {
    fn acquire(&self) -> Result<(), BackgroundError> {
        if !self.held.swap(true, Ordering::SeqCst) {
            tracing::info!("バックグラウンド実行を開始しました");
        }
        Ok(())
    }

    fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            tracing::info!("バックグラウンド実行を終了しました");
        }
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockBackground
// ============================================================================

/// Mock background handle for testing.
#[derive(Debug, Default)]
pub struct MockBackground {
    held: AtomicBool,
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,
    deny: AtomicBool,
}

impl MockBackground {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `acquire` calls fail.
    pub fn set_deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

impl BackgroundExecution for MockBackground {
    fn acquire(&self) -> Result<(), BackgroundError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(BackgroundError::NotAllowed("Mock denial".to_string()));
        }
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
