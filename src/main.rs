//! Serial Sentinel
//!
//! Bridges alert lines from a microcontroller on a serial link to a
//! Telegram chat, with cooldown-gated notifications.
//!
//! # Features
//!
//! - **Watch loop**: reads newline-terminated lines from a USB-to-serial
//!   adapter and forwards a notification when the alert token appears
//! - **Cooldown gating**: repeated alerts within the cooldown window are
//!   suppressed instead of spamming the chat
//! - **Port discovery**: list and auto-detect connected boards
//!
//! # Usage
//!
//! ```bash
//! # Watch the default port with the default alert token
//! BOT_TOKEN=... CHAT_ID=... serial-sentinel watch
//!
//! # Watch a specific port and baud rate
//! serial-sentinel watch -p /dev/ttyACM0 -b 115200
//!
//! # List available serial ports
//! serial-sentinel ports list
//!
//! # Auto-detect a connected board
//! serial-sentinel ports detect
//!
//! # Send a test notification
//! serial-sentinel notify test -m "bridge is up"
//!
//! # Write a commented sample configuration
//! serial-sentinel generate config -o sentinel.toml
//! ```

mod alert;
mod config;
mod notify;
mod serial;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use config::SentinelConfig;
use notify::{Credentials, TelegramNotifier, TelegramSink};
use serial::{PortConfig, SerialWatcher, WatchConfig};

/// Serial Sentinel
///
/// Serial-to-Telegram alert bridge with cooldown-gated notifications
#[derive(Parser)]
#[command(name = "serial-sentinel")]
#[command(version = "0.1.0")]
#[command(about = "Forward alert lines from a serial device to a Telegram chat")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the serial link and forward alert notifications
    Watch(WatchArgs),

    /// Serial port operations
    #[command(subcommand)]
    Ports(PortCommands),

    /// Notification channel operations
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Generate configuration files
    #[command(subcommand)]
    Generate(GenerateCommands),
}

#[derive(Args)]
struct WatchArgs {
    /// Serial port path (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides the configured default)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Alert token to match (overrides the configured default)
    #[arg(short, long)]
    token: Option<String>,

    /// Cooldown between notifications, in seconds
    #[arg(long)]
    cooldown: Option<u64>,

    /// Append received lines to this file
    #[arg(short, long)]
    log: Option<String>,

    /// Disable timestamps on echoed lines
    #[arg(long)]
    no_timestamps: bool,

    /// Do not echo received lines to the console
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum PortCommands {
    /// List available serial ports
    List,

    /// Auto-detect connected USB-serial boards
    Detect,
}

#[derive(Subcommand)]
enum NotifyCommands {
    /// Send a test notification to the configured chat
    Test {
        /// Message text to send
        #[arg(short, long, default_value = "serial-sentinel test notification")]
        message: String,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GenerateCommands {
    /// Generate a commented sample configuration file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Watch(args) => handle_watch(args).await,
        Commands::Ports(cmd) => handle_ports(cmd),
        Commands::Notify(cmd) => handle_notify(cmd).await,
        Commands::Generate(cmd) => handle_generate(cmd),
    }
}

fn load_config(path: Option<&Path>) -> Result<SentinelConfig> {
    match path {
        Some(path) => SentinelConfig::load(path),
        None => Ok(SentinelConfig::default()),
    }
}

async fn handle_watch(args: WatchArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // CLI flags win over file values.
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(token) = args.token {
        config.alert.token = token;
    }
    if let Some(cooldown) = args.cooldown {
        config.alert.cooldown_secs = cooldown;
    }

    // Secrets are checked before the device is touched, so a missing
    // credential fails fast.
    let credentials = Credentials::from_env()?;
    let notifier = TelegramNotifier::new(credentials, &config.telegram.api_base);

    let port_config = PortConfig::new(&config.serial.port)
        .with_baud_rate(config.serial.baud_rate)
        .with_timeout(config.serial.timeout());

    let watch_config = WatchConfig {
        port_config,
        alert_token: config.alert.token.clone(),
        alert_message: config.alert.message.clone(),
        cooldown: config.alert.cooldown(),
        poll_interval: config.serial.poll_interval(),
        show_timestamps: !args.no_timestamps,
        echo_lines: !args.quiet,
        log_file: args.log,
    };

    let sink = TelegramSink::new(tokio::runtime::Handle::current(), notifier);
    let mut watcher = SerialWatcher::new(watch_config, Box::new(sink));

    watcher.connect()?;
    let running = watcher.running_flag();

    println!(
        "{} Listening for \"{}\" (cooldown: {}s). Press Ctrl+C to stop.",
        "[*]".cyan().bold(),
        config.alert.token,
        config.alert.cooldown_secs
    );

    let worker = tokio::task::spawn_blocking(move || watcher.run());

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "Failed to listen for interrupt signal")?;

    println!("\n{}", "Stopping...".yellow());
    running.store(false, Ordering::SeqCst);

    // The watcher notices the flag at its next poll, prints its summary,
    // and drops the serial connection on the way out.
    worker
        .await
        .with_context(|| "Watcher thread panicked")??;

    println!("{}", "Stopped.".green().bold());
    Ok(())
}

fn handle_ports(cmd: PortCommands) -> Result<()> {
    match cmd {
        PortCommands::List => serial::port::print_ports(),

        PortCommands::Detect => {
            println!("{} Detecting USB-serial boards...", "[*]".cyan().bold());

            let ports = serial::port::detect_boards()?;

            if ports.is_empty() {
                println!("{}", "No USB-serial boards detected".yellow());
                println!("\n{}", "Troubleshooting:".white().bold());
                println!("  1. Connect the board's USB cable");
                println!("  2. Check permissions: sudo usermod -aG dialout $USER");
                println!("  3. Check dmesg for connection events");
            } else {
                println!("\n{}", "Detected boards:".green().bold());
                for port in &ports {
                    println!("\n  {}", port.path.white().bold());
                    if let Some(ref prod) = port.product {
                        println!("    Product: {}", prod);
                    }
                    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                        println!("    VID:PID: {:04x}:{:04x}", vid, pid);
                    }
                }
                println!("\n{}", "To start watching:".cyan());
                println!("  serial-sentinel watch -p {}", ports[0].path.white());
            }

            Ok(())
        }
    }
}

async fn handle_notify(cmd: NotifyCommands) -> Result<()> {
    match cmd {
        NotifyCommands::Test { message, config } => {
            let config = load_config(config.as_deref())?;
            let credentials = Credentials::from_env()?;
            let notifier = TelegramNotifier::new(credentials, &config.telegram.api_base);

            println!(
                "{} Sending test notification: {}",
                "[TX]".cyan().bold(),
                message
            );
            notifier.send_text(&message).await?;
            println!("{}", "[OK] Notification sent".green());

            Ok(())
        }
    }
}

fn handle_generate(cmd: GenerateCommands) -> Result<()> {
    match cmd {
        GenerateCommands::Config { output } => {
            let sample = config::sample_toml()?;

            if let Some(path) = output {
                std::fs::write(&path, &sample)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{} Sample config written to {}",
                    "[OK]".green().bold(),
                    path.display()
                );
            } else {
                println!("{}", sample);
            }

            Ok(())
        }
    }
}
