//! # Notification channel
//!
//! This module is responsible for delivering alert notifications to the
//! configured Telegram chat.
//!
//! ## Core Components
//!
//! - **`TelegramNotifier`**: an async `sendMessage` client bound to one bot
//!   credential and one destination chat.
//! - **`AlertSink` trait**: the blocking seam between the serial watch loop
//!   and the notifier. The watcher calls `dispatch` synchronously and only
//!   learns success or failure; transport details stay behind the trait,
//!   which also keeps the watch loop testable without a network.
//! - **`TelegramSink`**: the production sink, bridging into the async client
//!   on a captured runtime handle.

pub mod error;
mod telegram;

pub use error::NotificationError;
pub use telegram::{Credentials, TelegramNotifier, DEFAULT_API_BASE};

use tokio::runtime::Handle;

/// Blocking delivery seam used by the serial watch loop.
pub trait AlertSink: Send {
    /// Deliver one notification message, blocking until the outcome is known.
    fn dispatch(&mut self, message: &str) -> Result<(), NotificationError>;
}

/// Sink that delivers through a [`TelegramNotifier`].
///
/// The watcher thread blocks for the duration of the network call, so the
/// next poll iteration never starts with a send still in flight.
pub struct TelegramSink {
    handle: Handle,
    notifier: TelegramNotifier,
}

impl TelegramSink {
    /// Create a sink that runs sends on the given runtime handle.
    pub fn new(handle: Handle, notifier: TelegramNotifier) -> Self {
        Self { handle, notifier }
    }
}

impl AlertSink for TelegramSink {
    fn dispatch(&mut self, message: &str) -> Result<(), NotificationError> {
        self.handle.block_on(self.notifier.send_text(message))
    }
}
