//! Alert watch loop over the serial link
//!
//! Provides the long-running bridge loop:
//! - Polls the device for newline-terminated lines
//! - Echoes each raw line for diagnostics (with optional file logging)
//! - Forwards cooldown-gated notifications on an exact token match

use crate::alert::{CooldownGate, GateDecision};
use crate::config;
use crate::notify::AlertSink;
use crate::serial::{PortConfig, SerialConnection};
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use log::{debug, error};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Port configuration
    pub port_config: PortConfig,
    /// Exact line (after trimming) that signals an alert
    pub alert_token: String,
    /// Notification text forwarded on dispatch
    pub alert_message: String,
    /// Minimum duration between two dispatched notifications
    pub cooldown: Duration,
    /// Idle delay between polls when no bytes are waiting
    pub poll_interval: Duration,
    /// Prefix echoed lines with a timestamp
    pub show_timestamps: bool,
    /// Echo every received line to the console
    pub echo_lines: bool,
    /// Append received lines to this file
    pub log_file: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            port_config: PortConfig::default(),
            alert_token: config::DEFAULT_ALERT_TOKEN.to_string(),
            alert_message: config::DEFAULT_ALERT_MESSAGE.to_string(),
            cooldown: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            show_timestamps: true,
            echo_lines: true,
            log_file: None,
        }
    }
}

/// Serial watcher bridging alert lines to a notification sink
pub struct SerialWatcher {
    config: WatchConfig,
    sink: Box<dyn AlertSink>,
    gate: CooldownGate,
    connection: Option<SerialConnection>,
    log_writer: Option<BufWriter<File>>,
    line_count: usize,
    dispatched_count: usize,
    suppressed_count: usize,
    failed_count: usize,
    running: Arc<AtomicBool>,
}

impl SerialWatcher {
    /// Create a new watcher with the given configuration and sink
    pub fn new(config: WatchConfig, sink: Box<dyn AlertSink>) -> Self {
        let gate = CooldownGate::new(config.cooldown);
        Self {
            config,
            sink,
            gate,
            connection: None,
            log_writer: None,
            line_count: 0,
            dispatched_count: 0,
            suppressed_count: 0,
            failed_count: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a clone of the running flag for signal handling
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Connect to the serial port
    pub fn connect(&mut self) -> Result<()> {
        let mut connection = SerialConnection::open(self.config.port_config.clone())?;

        // Anything buffered before the watch started is stale.
        connection.clear_input()?;

        println!(
            "{} Connected to {} at {} baud",
            "[OK]".green().bold(),
            self.config.port_config.port_path.white().bold(),
            self.config.port_config.baud_rate
        );

        self.connection = Some(connection);

        // Setup log file if configured
        if let Some(ref log_path) = self.config.log_file {
            let file = File::create(log_path)
                .with_context(|| format!("Failed to create log file: {}", log_path))?;
            self.log_writer = Some(BufWriter::new(file));
            println!("{} Logging to: {}", "[LOG]".cyan().bold(), log_path.white());
        }

        Ok(())
    }

    /// Run the watch loop until the running flag clears
    pub fn run(&mut self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let line = {
                let Some(conn) = self.connection.as_mut() else {
                    break;
                };

                match conn.bytes_waiting() {
                    Ok(0) => {
                        std::thread::sleep(self.config.poll_interval);
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // A transient fault must not kill the watch.
                        error!("Serial poll error: {e:#}");
                        std::thread::sleep(Duration::from_millis(100));
                        continue;
                    }
                }

                match conn.read_line() {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Serial read error: {e:#}");
                        std::thread::sleep(Duration::from_millis(100));
                        continue;
                    }
                }
            };

            match line {
                Some(line) => self.process_line(&line)?,
                None => std::thread::sleep(self.config.poll_interval),
            }
        }

        self.print_summary();
        Ok(())
    }

    /// Stop the watch loop
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Process a single received line
    fn process_line(&mut self, line: &str) -> Result<()> {
        self.line_count += 1;

        let is_alert = line.trim() == self.config.alert_token;

        if self.config.echo_lines {
            println!("{}", self.format_line(line, is_alert));
        }

        // Write to log file
        if let Some(ref mut writer) = self.log_writer {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(writer, "[{}] {}", timestamp, line)?;
            writer.flush()?;
        }

        if is_alert {
            self.handle_alert();
        }

        Ok(())
    }

    /// Dispatch or suppress a detected alert
    fn handle_alert(&mut self) {
        let now = Instant::now();

        match self.gate.evaluate(now) {
            GateDecision::Dispatch => {
                println!("{} Alert detected, notifying...", "[ALERT]".red().bold());

                match self.sink.dispatch(&self.config.alert_message) {
                    Ok(()) => {
                        self.dispatched_count += 1;
                        self.gate.record_dispatch(now);
                        println!(
                            "{} Sent: {}",
                            "[TX]".green().bold(),
                            self.config.alert_message
                        );
                    }
                    Err(e) => {
                        // Swallowed: the watch keeps running and the gate
                        // stays open, so the next alert retries immediately.
                        self.failed_count += 1;
                        error!("Could not send notification: {e}");
                    }
                }
            }
            GateDecision::Suppress { remaining } => {
                self.suppressed_count += 1;
                debug!(
                    "Alert suppressed, cooldown ends in {:.1}s",
                    remaining.as_secs_f32()
                );
            }
        }
    }

    /// Format a line for display
    fn format_line(&self, line: &str, is_alert: bool) -> String {
        let mut output = String::new();

        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            output.push_str(&format!("{} ", timestamp.to_string().dimmed()));
        }

        output.push_str(&format!("{} ", "[device]".cyan()));

        if is_alert {
            output.push_str(&line.red().bold().to_string());
        } else {
            output.push_str(line);
        }

        output
    }

    /// Print summary statistics
    fn print_summary(&self) {
        println!("\n{}", "=".repeat(60).dimmed());
        println!("{}", "--- Watch Summary ---".cyan().bold());
        println!("Lines received: {}", self.line_count);
        println!("Alerts dispatched: {}", self.dispatched_count);
        println!("Alerts suppressed (cooldown): {}", self.suppressed_count);
        if self.failed_count > 0 {
            println!(
                "Failed sends: {}",
                self.failed_count.to_string().red().bold()
            );
        }
        if let Some(ref log) = self.config.log_file {
            println!("Log saved to: {}", log.white());
        }
        println!("{}", "=".repeat(60).dimmed());
    }
}
