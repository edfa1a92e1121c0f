//! Persistence of the paused timer.
//!
//! Only two values survive a process restart: the remaining and the total
//! milliseconds of a paused countdown. They are written on pause and cleared
//! on start and stop. On startup the engine restores a saved record as
//! `Paused`.
//!
//! # Example
//!
//! ```no_run
//! use service_timer::store::{FileTimerStore, SavedTimer, TimerStore};
//!
//! let store = FileTimerStore::with_default_path()?;
//! store.save(&SavedTimer { remain: Some(30_000), total: 60_000 })?;
//! assert!(store.load()?.is_some());
//! store.clear()?;
//! # Ok::<(), service_timer::store::StoreError>(())
//! ```

pub mod error;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub use error::{Result, StoreError};

use crate::types::{total_in_bounds, TimerPhase};

/// State file location relative to the home directory.
const DEFAULT_STATE_PATH: &str = ".service-timer/state.json";

// ============================================================================
// SavedTimer
// ============================================================================

/// The persisted remain/total pair, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTimer {
    /// Remaining milliseconds; a missing value restores as `total`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remain: Option<u64>,
    /// Total milliseconds
    pub total: u64,
}

impl SavedTimer {
    /// Captures the remain/total of a phase.
    pub fn from_phase(phase: &TimerPhase) -> Self {
        Self {
            remain: Some(phase.remain()),
            total: phase.total(),
        }
    }

    /// Returns the phase this record restores to.
    ///
    /// A total outside the allowed bounds yields `None`; remain is capped at
    /// total.
    pub fn to_phase(&self) -> Option<TimerPhase> {
        if !total_in_bounds(self.total as i64) {
            return None;
        }
        let remain = self.remain.unwrap_or(self.total).min(self.total);
        Some(TimerPhase::Paused {
            remain,
            total: self.total,
        })
    }
}

// ============================================================================
// TimerStore
// ============================================================================

/// Key-value persistence for the paused timer.
pub trait TimerStore: Send + Sync {
    /// Loads the saved record, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<SavedTimer>>;

    /// Replaces the saved record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, saved: &SavedTimer) -> Result<()>;

    /// Removes the saved record. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn clear(&self) -> Result<()>;
}

// ============================================================================
// FileTimerStore
// ============================================================================

/// Stores the record as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileTimerStore {
    path: PathBuf,
}

impl FileTimerStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `~/.service-timer/state.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn with_default_path() -> Result<Self> {
        Ok(Self::new(default_state_path()?))
    }

    /// Returns the state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimerStore for FileTimerStore {
    fn load(&self) -> Result<Option<SavedTimer>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read(e)),
        };
        let saved = serde_json::from_slice(&bytes).map_err(StoreError::Format)?;
        Ok(Some(saved))
    }

    fn save(&self, saved: &SavedTimer) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::DirectoryCreation)?;
        }
        let json = serde_json::to_vec(saved).map_err(StoreError::Format)?;
        fs::write(&self.path, json).map_err(StoreError::Write)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Remove(e)),
        }
    }
}

/// Returns `~/.service-timer/state.json`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_state_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(StoreError::HomeDirectoryNotFound)?;
    Ok(home.join(DEFAULT_STATE_PATH))
}

// ============================================================================
// MemoryTimerStore
// ============================================================================

/// In-memory store for testing.
#[derive(Debug, Default)]
pub struct MemoryTimerStore {
    saved: Mutex<Option<SavedTimer>>,
    save_calls: Mutex<usize>,
    clear_calls: Mutex<usize>,
}

impl MemoryTimerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `saved`.
    #[must_use]
    pub fn with_saved(saved: SavedTimer) -> Self {
        Self {
            saved: Mutex::new(Some(saved)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn saved(&self) -> Option<SavedTimer> {
        *self.saved.lock().unwrap()
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.save_calls.lock().unwrap()
    }

    #[must_use]
    pub fn clear_count(&self) -> usize {
        *self.clear_calls.lock().unwrap()
    }
}

impl TimerStore for MemoryTimerStore {
    fn load(&self) -> Result<Option<SavedTimer>> {
        Ok(self.saved())
    }

    fn save(&self, saved: &SavedTimer) -> Result<()> {
        *self.saved.lock().unwrap() = Some(*saved);
        *self.save_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.saved.lock().unwrap() = None;
        *self.clear_calls.lock().unwrap() += 1;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
