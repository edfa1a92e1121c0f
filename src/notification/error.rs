//! Notification error types.

use thiserror::Error;

/// Errors that can occur while updating the status notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The sink refused or failed to show the text.
    #[error("通知の更新に失敗しました: {0}")]
    UpdateFailed(String),
}
