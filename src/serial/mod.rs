//! Serial link to the alert-emitting microcontroller
//!
//! This module provides functionality for:
//! - Listing and auto-detecting USB-serial boards
//! - Reading newline-terminated lines from the device
//! - The watch loop that turns matching lines into notifications

pub mod port;
pub mod watcher;

pub use port::{PortConfig, SerialConnection};
pub use watcher::{SerialWatcher, WatchConfig};
