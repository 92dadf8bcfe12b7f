//! Error types for the notification channel.

use thiserror::Error;

/// Defines the possible errors that can occur while configuring or sending
/// a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error indicating that the notification failed to be sent.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    /// An error from the underlying `reqwest` client.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
}
