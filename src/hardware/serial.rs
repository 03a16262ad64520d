//! Serial port transport for ELM327 adapters (USB, Bluetooth SPP or a pseudo terminal)

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    io::{ErrorKind, Read, Write},
    mem,
    time::{Duration, Instant},
};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use crate::channel::{ChannelError, ChannelResult, LineChannel};

use super::{HardwareError, HardwareInfo, HardwareResult, HardwareScanner};

/// Byte an ELM327 sends once it is ready for the next command
pub const ELM_PROMPT: u8 = b'>';

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Settings used to open a [SerialChannel]. The port always runs 8N1 without flow control
pub struct SerialSettings {
    /// Path of the port (`/dev/ttyUSB0`, `COM3` ...)
    pub path: String,
    /// Baud rate. ELM327 clones default to 9600 or 38400
    pub baud_rate: u32,
    /// Write timeout used when a caller passes 0
    pub write_timeout_ms: u32,
    /// Byte which terminates every reply
    pub terminator: u8,
    /// Largest reply accepted before [ChannelError::BufferFull] is returned
    pub max_reply_len: usize,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 9600,
            write_timeout_ms: 1000,
            terminator: ELM_PROMPT,
            max_reply_len: 4096,
        }
    }
}

impl SerialSettings {
    /// Default settings for the port at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

fn build_port(settings: &SerialSettings) -> serialport::Result<Box<dyn SerialPort>> {
    serialport::new(&settings.path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(settings.write_timeout_ms as u64))
        .open()
}

fn convert_serial_error(error: serialport::Error) -> ChannelError {
    ChannelError::IOError(error.into())
}

/// Collects reply bytes until the terminator. Bytes of an unfinished reply are
/// kept between reads
#[derive(Debug)]
struct LineFramer {
    pending: Vec<u8>,
    terminator: u8,
    max_len: usize,
}

impl LineFramer {
    fn new(terminator: u8, max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            terminator,
            max_len,
        }
    }

    /// Returns the finished reply once the terminator is pushed
    fn push(&mut self, byte: u8) -> ChannelResult<Option<Vec<u8>>> {
        if byte == self.terminator {
            return Ok(Some(mem::take(&mut self.pending)));
        }
        // Some clones pad replies with NUL
        if byte == 0 {
            return Ok(None);
        }
        if self.pending.len() == self.max_len {
            self.pending.clear();
            return Err(ChannelError::BufferFull);
        }
        self.pending.push(byte);
        Ok(None)
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Reads at most `count` bytes which are already waiting, stopping at the end of a reply
fn read_available<R: Read + ?Sized>(
    reader: &mut R,
    count: usize,
    framer: &mut LineFramer,
) -> ChannelResult<Option<Vec<u8>>> {
    let mut buf_1 = [0u8; 1];
    for _ in 0..count {
        match reader.read(&mut buf_1) {
            Ok(1) => {
                if let Some(line) = framer.push(buf_1[0])? {
                    return Ok(Some(line));
                }
            }
            Ok(_) => break,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
            Err(e) => return Err(ChannelError::IOError(e)),
        }
    }
    Ok(None)
}

/// A [LineChannel] over a serial port.
///
/// Replies are read byte by byte until [SerialSettings::terminator] is seen. A read
/// with a timeout of 0 only takes what the port already holds. The port is
/// closed when the channel is dropped.
pub struct SerialChannel {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
    framer: LineFramer,
}

impl Debug for SerialChannel {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("SerialChannel")
            .field("path", &self.settings.path)
            .field("baud_rate", &self.settings.baud_rate)
            .field("open", &self.port.is_some())
            .field("pending", &self.framer.pending.len())
            .finish()
    }
}

impl SerialChannel {
    /// Creates a channel without opening the port. Call [LineChannel::open] before use
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            framer: LineFramer::new(settings.terminator, settings.max_reply_len),
            settings,
            port: None,
        }
    }

    /// Creates a channel and opens the port straight away
    pub fn open_port(settings: SerialSettings) -> HardwareResult<Self> {
        let port = build_port(&settings).map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice => HardwareError::DeviceNotFound,
            _ => HardwareError::SerialPortError(e),
        })?;
        log::debug!("Opened serial port {} @ {}", settings.path, settings.baud_rate);
        Ok(Self {
            framer: LineFramer::new(settings.terminator, settings.max_reply_len),
            settings,
            port: Some(port),
        })
    }

    /// Returns the settings the channel was created with
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl LineChannel for SerialChannel {
    fn open(&mut self) -> ChannelResult<()> {
        if self.port.is_none() {
            self.port = Some(build_port(&self.settings).map_err(convert_serial_error)?);
            log::debug!(
                "Opened serial port {} @ {}",
                self.settings.path,
                self.settings.baud_rate
            );
        }
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.framer.clear();
        if self.port.take().is_some() {
            log::debug!("Closed serial port {}", self.settings.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()> {
        let port = self.port.as_mut().ok_or(ChannelError::InterfaceNotOpen)?;
        let timeout_ms = match timeout_ms {
            0 => self.settings.write_timeout_ms,
            t => t,
        };
        port.set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(convert_serial_error)?;
        port.write_all(buffer)
            .and_then(|_| port.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::TimedOut => ChannelError::WriteTimeout,
                _ => ChannelError::IOError(e),
            })
    }

    fn read_line(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        let port = self.port.as_mut().ok_or(ChannelError::InterfaceNotOpen)?;
        let framer = &mut self.framer;
        if timeout_ms == 0 {
            let waiting = port.bytes_to_read().map_err(convert_serial_error)?;
            return read_available(&mut **port, waiting as usize, framer)?
                .ok_or(ChannelError::BufferEmpty);
        }
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        let mut buf_1 = [0u8; 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChannelError::ReadTimeout);
            }
            port.set_timeout(remaining).map_err(convert_serial_error)?;
            match port.read(&mut buf_1) {
                Ok(1) => {
                    if let Some(line) = framer.push(buf_1[0])? {
                        return Ok(line);
                    }
                }
                Ok(_) => {}
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => return Err(ChannelError::IOError(e)),
            }
        }
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        let port = self.port.as_mut().ok_or(ChannelError::InterfaceNotOpen)?;
        self.framer.clear();
        port.clear(ClearBuffer::Input).map_err(convert_serial_error)
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Lists serial ports which could have an adapter attached
#[derive(Debug, Clone)]
pub struct SerialScanner {
    settings: SerialSettings,
    devices: Vec<HardwareInfo>,
}

impl SerialScanner {
    /// Scans the system for serial ports. Ports found are opened with `settings`
    /// (the path in `settings` is ignored)
    pub fn new(settings: SerialSettings) -> Self {
        let devices = match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| match p.port_type {
                    SerialPortType::UsbPort(usb) => HardwareInfo {
                        name: p.port_name,
                        vendor: usb.manufacturer,
                        product: usb.product,
                        serial_number: usb.serial_number,
                    },
                    _ => HardwareInfo {
                        name: p.port_name,
                        vendor: None,
                        product: None,
                        serial_number: None,
                    },
                })
                .collect(),
            Err(e) => {
                log::warn!("Could not list serial ports: {e}");
                Vec::new()
            }
        };
        log::debug!("Found {} serial ports", devices.len());
        Self { settings, devices }
    }
}

impl HardwareScanner<SerialChannel> for SerialScanner {
    fn list_devices(&self) -> Vec<HardwareInfo> {
        self.devices.clone()
    }

    fn open_device_by_index(&self, idx: usize) -> HardwareResult<SerialChannel> {
        let info = self.devices.get(idx).ok_or(HardwareError::DeviceNotFound)?;
        self.open_device_by_name(&info.name)
    }

    fn open_device_by_name(&self, name: &str) -> HardwareResult<SerialChannel> {
        // Pseudo terminals are not enumerated, so unknown names are still tried
        let mut settings = self.settings.clone();
        settings.path = name.to_string();
        SerialChannel::open_port(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = SerialSettings::new("/dev/ttyUSB0").with_baud_rate(38400);
        assert_eq!(settings.path, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 38400);
        assert_eq!(settings.terminator, ELM_PROMPT);
        assert_eq!(SerialSettings::default().baud_rate, 9600);
    }

    #[test]
    fn closed_channel_rejects_io() {
        let mut channel = SerialChannel::new(SerialSettings::new("/dev/null-adapter"));
        assert!(!channel.is_open());
        assert!(matches!(
            channel.write_bytes(b"ATZ\r", 100),
            Err(ChannelError::InterfaceNotOpen)
        ));
        assert!(matches!(
            channel.read_line(100),
            Err(ChannelError::InterfaceNotOpen)
        ));
        assert!(channel.close().is_ok());
    }

    #[test]
    fn available_bytes_up_to_prompt() {
        let mut framer = LineFramer::new(ELM_PROMPT, 64);
        let mut reader = std::io::Cursor::new(b"41 0C 1A F8\r\r>ATZ".to_vec());
        let line = read_available(&mut reader, 32, &mut framer).unwrap();
        assert_eq!(line.as_deref(), Some(&b"41 0C 1A F8\r\r"[..]));
        // Bytes after the prompt stay in the reader
        assert_eq!(reader.position(), 14);
    }

    #[test]
    fn partial_reply_is_kept() {
        let mut framer = LineFramer::new(ELM_PROMPT, 64);
        let mut first = std::io::Cursor::new(b"41 05\0".to_vec());
        assert_eq!(read_available(&mut first, 6, &mut framer).unwrap(), None);
        let mut second = std::io::Cursor::new(b" 7B\r>".to_vec());
        let line = read_available(&mut second, 5, &mut framer).unwrap();
        assert_eq!(line.as_deref(), Some(&b"41 05 7B\r"[..]));
    }

    #[test]
    fn nothing_waiting() {
        let mut framer = LineFramer::new(ELM_PROMPT, 64);
        let mut reader = std::io::Cursor::new(Vec::new());
        assert_eq!(read_available(&mut reader, 0, &mut framer).unwrap(), None);
        assert_eq!(read_available(&mut reader, 4, &mut framer).unwrap(), None);
    }

    #[test]
    fn oversized_reply() {
        let mut framer = LineFramer::new(ELM_PROMPT, 4);
        let mut reader = std::io::Cursor::new(b"410C1AF8>".to_vec());
        assert!(matches!(
            read_available(&mut reader, 9, &mut framer),
            Err(ChannelError::BufferFull)
        ));
        assert!(framer.pending.is_empty());
    }

    #[test]
    fn scanner_index_out_of_range() {
        let scanner = SerialScanner::new(SerialSettings::default());
        let count = scanner.list_devices().len();
        assert!(matches!(
            scanner.open_device_by_index(count),
            Err(HardwareError::DeviceNotFound)
        ));
    }
}
