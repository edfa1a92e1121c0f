//! Service Timer Library
//!
//! This library provides the core functionality for the Service Timer CLI.
//! It includes:
//! - Timer engine with pause/resume, bounded adjustment and persistence
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities
//! - Type definitions for configuration and state
//! - Host collaborators: timer store, status notifier, background handle

pub mod background;
pub mod cli;
pub mod daemon;
pub mod notification;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    AdjustDirection, EngineConfig, IpcRequest, IpcResponse, ResponseData, StartParams,
    TimerPhase, TimerView,
};

pub use background::{BackgroundError, BackgroundExecution, MockBackground, ProcessBackground};
pub use daemon::{DaemonOptions, TimerEngine, TimerEvent, TimerHost};
pub use notification::{LogNotifier, MockNotifier, NotificationError, StatusNotifier};
pub use store::{FileTimerStore, MemoryTimerStore, SavedTimer, StoreError, TimerStore};
