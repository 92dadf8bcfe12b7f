//! Serial port configuration and connection management
//!
//! Handles USB serial adapter discovery and the read-only connection to the
//! microcontroller that emits alert lines.

use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::time::Duration;

/// Default baud rate for the sensor firmware serial link
pub const DEFAULT_BAUD: u32 = 9_600;

/// Configuration for the serial connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 9600, matching the firmware)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default firmware settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Decode a raw line buffer, tolerating malformed bytes.
///
/// A trailing carriage return is stripped; anything that is not valid UTF-8
/// comes through as replacement characters rather than failing the read.
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).to_string()
}

/// Wrapper around the serial connection to the alert source
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port: {}", config.port_path))?;

        Ok(Self { port, config })
    }

    /// Number of unread bytes waiting in the input buffer
    pub fn bytes_waiting(&self) -> Result<u32> {
        self.port
            .bytes_to_read()
            .with_context(|| "Failed to query serial input buffer")
    }

    /// Read one line from the serial port (until newline).
    ///
    /// Returns `Ok(None)` when the read times out with nothing buffered.
    /// Malformed bytes never fail the read; see [`decode_line`].
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut buffer = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    buffer.push(byte[0]);
                }
                Ok(0) => {
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                Ok(_) => unreachable!(),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                Err(e) => return Err(e).with_context(|| "Failed to read from serial port"),
            }
        }

        Ok(Some(decode_line(buffer)))
    }

    /// Discard any bytes buffered before the watch started
    pub fn clear_input(&mut self) -> Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .with_context(|| "Failed to clear serial input buffer")
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    let port_infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => {
                    (PortType::PciSerial, None, None, None, None, None)
                }
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    (PortType::Unknown, None, None, None, None, None)
                }
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect();

    Ok(port_infos)
}

/// Print formatted list of available serial ports
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the board's USB cable");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        println!("  4. Check dmesg for connection events: dmesg | tail -20");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in ports {
        println!("\n{}: {}", "Port".cyan(), port.path.white().bold());
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let Some(ref sn) = port.serial_number {
            println!("  Serial: {}", sn);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{}",
        "Use: serial-sentinel watch -p <PORT> to start watching".yellow()
    );

    Ok(())
}

/// Auto-detect likely microcontroller boards.
///
/// Matches USB serial ports against the VID/PIDs of Arduino boards and the
/// USB-to-serial chips their clones ship with (CH340, CP210x, FTDI, PL2303).
pub fn detect_boards() -> Result<Vec<PortInfo>> {
    let ports = list_ports()?;

    let board_ports: Vec<PortInfo> = ports
        .into_iter()
        .filter(|p| {
            if p.port_type != PortType::UsbSerial {
                return false;
            }

            if let (Some(vid), Some(pid)) = (p.vid, p.pid) {
                // Arduino (official boards)
                if vid == 0x2341 || vid == 0x2a03 {
                    return true;
                }
                // WCH CH340/CH341 (most Arduino clones)
                if vid == 0x1a86 && (pid == 0x7523 || pid == 0x5523) {
                    return true;
                }
                // FTDI
                if vid == 0x0403 {
                    return true;
                }
                // Silicon Labs CP210x
                if vid == 0x10c4 && (pid == 0xea60 || pid == 0xea70) {
                    return true;
                }
                // Prolific PL2303
                if vid == 0x067b && pid == 0x2303 {
                    return true;
                }
            }

            // Fallback: check product name for common keywords
            if let Some(ref prod) = p.product {
                let prod_lower = prod.to_lowercase();
                return prod_lower.contains("arduino")
                    || prod_lower.contains("serial")
                    || prod_lower.contains("uart")
                    || prod_lower.contains("ch340")
                    || prod_lower.contains("ftdi");
            }

            false
        })
        .collect();

    Ok(board_ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 9_600);
        assert_eq!(config.port_path, "/dev/ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new("/dev/ttyACM0")
            .with_baud_rate(115_200)
            .with_timeout(Duration::from_millis(500));

        assert_eq!(config.port_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_decode_strips_carriage_return() {
        assert_eq!(
            decode_line(b"ALERT: FIRE AT PARKING!\r".to_vec()),
            "ALERT: FIRE AT PARKING!"
        );
        assert_eq!(decode_line(b"plain".to_vec()), "plain");
    }

    #[test]
    fn test_decode_tolerates_malformed_bytes() {
        // Invalid UTF-8 must come through substituted, never as an error.
        let decoded = decode_line(vec![b'o', b'k', 0xff, 0xfe, b'\r']);
        assert!(decoded.starts_with("ok"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_decode_empty_line() {
        assert_eq!(decode_line(Vec::new()), "");
        assert_eq!(decode_line(b"\r".to_vec()), "");
    }
}
