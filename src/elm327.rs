//! ELM327 adapter command layer
//!
//! [Elm327] sits between a [LineChannel] and the OBD client. It sends AT commands,
//! strips what the adapter adds around a reply (command echo, `SEARCHING...`,
//! blank lines) and turns the adapter's error strings into [ObdError]s.

use crate::channel::LineChannel;
use crate::obd2::ObdRequest;
use crate::{ObdError, ObdResult};

/// ATZ can take over a second while the adapter reboots
const RESET_TIMEOUT_MS: u32 = 2000;

/// Replies the adapter sends instead of data when something went wrong
const ERROR_REPLIES: &[&str] = &[
    "ACT ALERT",
    "BUFFER FULL",
    "BUS BUSY",
    "BUS ERROR",
    "CAN ERROR",
    "DATA ERROR",
    "ERR",
    "FB ERROR",
    "LV RESET",
    "STOPPED",
    "UNABLE TO CONNECT",
];

const NO_DATA: &str = "NO DATA";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Vehicle bus protocols an ELM327 can be told to use (`ATSP`)
pub enum ElmProtocol {
    /// Automatic protocol detection
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ElmProtocol {
    /// Protocol number used by `ATSP` and reported by `ATDPN`
    pub fn at_digit(&self) -> char {
        match self {
            ElmProtocol::Auto => '0',
            ElmProtocol::J1850Pwm => '1',
            ElmProtocol::J1850Vpw => '2',
            ElmProtocol::Iso9141_2 => '3',
            ElmProtocol::Iso14230_4Kwp => '4',
            ElmProtocol::Iso14230_4KwpFast => '5',
            ElmProtocol::Iso15765_4Can11bit500 => '6',
            ElmProtocol::Iso15765_4Can29bit500 => '7',
            ElmProtocol::Iso15765_4Can11bit250 => '8',
            ElmProtocol::Iso15765_4Can29bit250 => '9',
        }
    }

    /// Inverse of [ElmProtocol::at_digit]
    pub fn from_at_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '0' => ElmProtocol::Auto,
            '1' => ElmProtocol::J1850Pwm,
            '2' => ElmProtocol::J1850Vpw,
            '3' => ElmProtocol::Iso9141_2,
            '4' => ElmProtocol::Iso14230_4Kwp,
            '5' => ElmProtocol::Iso14230_4KwpFast,
            '6' => ElmProtocol::Iso15765_4Can11bit500,
            '7' => ElmProtocol::Iso15765_4Can29bit500,
            '8' => ElmProtocol::Iso15765_4Can11bit250,
            '9' => ElmProtocol::Iso15765_4Can29bit250,
            _ => return None,
        })
    }

    /// AT command (without the `AT` prefix) selecting this protocol
    pub fn to_elm_command(&self) -> String {
        format!("SP{}", self.at_digit())
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        matches!(
            self,
            ElmProtocol::Iso15765_4Can11bit500
                | ElmProtocol::Iso15765_4Can29bit500
                | ElmProtocol::Iso15765_4Can11bit250
                | ElmProtocol::Iso15765_4Can29bit250
        )
    }
}

/// Splits a raw reply into lines, dropping the command echo, search notices and
/// anything that is not printable
fn clean_reply(raw: &[u8], command: &str) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split(['\r', '\n'])
        .map(|line| {
            line.chars()
                .filter(|c| !c.is_control() && *c != '>')
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case(command))
        .filter(|line| !line.starts_with("SEARCHING"))
        .collect()
}

fn is_error_reply(line: &str) -> bool {
    line == "?"
        || ERROR_REPLIES.iter().any(|e| line.starts_with(e))
        || (line.starts_with("BUS INIT") && line.ends_with("ERROR"))
}

fn is_status_line(line: &str) -> bool {
    line.starts_with("BUS INIT")
}

/// Version number at the end of an identity string (`ELM327 v1.5`)
fn parse_version(identity: &str) -> Option<f32> {
    let idx = identity.rfind(['v', 'V'])?;
    identity[idx + 1..].trim().parse().ok()
}

/// An ELM327 (or clone) reached through a [LineChannel]
#[derive(Debug)]
pub struct Elm327<C: LineChannel> {
    channel: C,
    read_timeout_ms: u32,
    write_timeout_ms: u32,
    version: Option<f32>,
}

impl<C: LineChannel> Elm327<C> {
    /// Wraps a channel. The channel is not opened
    pub fn new(channel: C, read_timeout_ms: u32, write_timeout_ms: u32) -> Self {
        Self {
            channel,
            read_timeout_ms,
            write_timeout_ms,
            version: None,
        }
    }

    /// Changes the timeouts used for every following command
    pub fn set_timeouts(&mut self, read_timeout_ms: u32, write_timeout_ms: u32) {
        self.read_timeout_ms = read_timeout_ms;
        self.write_timeout_ms = write_timeout_ms;
    }

    /// Returns a reference to the underlying channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns a mutable reference to the underlying channel
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consumes the adapter, returning the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Opens the underlying channel
    pub fn open(&mut self) -> ObdResult<()> {
        self.channel.open()?;
        Ok(())
    }

    /// Closes the underlying channel
    pub fn close(&mut self) -> ObdResult<()> {
        self.version = None;
        self.channel.close()?;
        Ok(())
    }

    /// Returns true if the underlying channel is open
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    fn transact(&mut self, command: &str, read_timeout_ms: u32) -> ObdResult<Vec<String>> {
        log::debug!("ELM -> {command}");
        self.channel.clear_rx_buffer()?;
        let mut buffer = command.as_bytes().to_vec();
        buffer.push(b'\r');
        let raw = self
            .channel
            .write_read_line(&buffer, self.write_timeout_ms, read_timeout_ms)?;
        let lines = clean_reply(&raw, command);
        log::debug!("ELM <- {lines:?}");
        if lines.is_empty() {
            return Err(ObdError::EmptyResponse);
        }
        if lines.iter().any(|l| l == NO_DATA) {
            return Err(ObdError::NoData);
        }
        if let Some(err) = lines.iter().find(|l| is_error_reply(l)) {
            log::error!("Adapter replied '{err}' to '{command}'");
            return Err(ObdError::AdapterError(err.clone()));
        }
        Ok(lines)
    }

    /// Sends a raw command and returns the cleaned reply lines
    pub fn send_command(&mut self, command: &str) -> ObdResult<Vec<String>> {
        self.transact(command, self.read_timeout_ms)
    }

    /// Sends `AT<command>` and returns the last line of the reply
    pub fn send_at(&mut self, command: &str) -> ObdResult<String> {
        let mut lines = self.send_command(&format!("AT{command}"))?;
        Ok(lines.pop().unwrap_or_default())
    }

    fn expect_ok(&mut self, command: &str) -> ObdResult<()> {
        let reply = self.send_at(command)?;
        if reply.eq_ignore_ascii_case("OK") {
            Ok(())
        } else {
            Err(ObdError::CommandRejected {
                command: command.to_string(),
                reply,
            })
        }
    }

    /// Resets the adapter (`ATZ`). Returns the identity it prints on start up
    pub fn reset(&mut self) -> ObdResult<String> {
        let timeout = self.read_timeout_ms.max(RESET_TIMEOUT_MS);
        let mut lines = self.transact("ATZ", timeout)?;
        let identity = lines.pop().unwrap_or_default();
        self.version = parse_version(&identity);
        Ok(identity)
    }

    /// Asks the adapter for its identity (`ATI`) and records its version
    pub fn identify(&mut self) -> ObdResult<String> {
        let identity = self.send_at("I")?;
        self.version = parse_version(&identity);
        log::debug!("Adapter identity '{identity}', version {:?}", self.version);
        Ok(identity)
    }

    /// Returns the adapter's firmware version, asking for it if not known yet
    pub fn version(&mut self) -> ObdResult<Option<f32>> {
        if self.version.is_none() {
            self.identify()?;
        }
        Ok(self.version)
    }

    /// Describes the protocol in use (`ATDP`), e.g. `AUTO, ISO 15765-4 (CAN 11/500)`
    pub fn describe_protocol(&mut self) -> ObdResult<String> {
        self.send_at("DP")
    }

    /// Returns the protocol in use (`ATDPN`). `None` if the reply is not understood
    pub fn protocol(&mut self) -> ObdResult<Option<ElmProtocol>> {
        let reply = self.send_at("DPN")?;
        // 'A' marks an automatically detected protocol
        Ok(reply
            .trim_start_matches('A')
            .chars()
            .next()
            .and_then(ElmProtocol::from_at_digit))
    }

    /// Selects the vehicle bus protocol (`ATSP`)
    pub fn set_protocol(&mut self, protocol: ElmProtocol) -> ObdResult<()> {
        log::debug!("Setting protocol to {protocol}");
        self.expect_ok(&protocol.to_elm_command())
    }

    /// Turns command echo on or off (`ATE`)
    pub fn set_echo(&mut self, on: bool) -> ObdResult<()> {
        self.expect_ok(&format!("E{}", on as u8))
    }

    /// Turns linefeeds after carriage returns on or off (`ATL`)
    pub fn set_linefeeds(&mut self, on: bool) -> ObdResult<()> {
        self.expect_ok(&format!("L{}", on as u8))
    }

    /// Turns spaces between reply bytes on or off (`ATS`)
    pub fn set_spaces(&mut self, on: bool) -> ObdResult<()> {
        self.expect_ok(&format!("S{}", on as u8))
    }

    /// Turns reply headers on or off (`ATH`)
    pub fn set_headers(&mut self, on: bool) -> ObdResult<()> {
        self.expect_ok(&format!("H{}", on as u8))
    }

    /// Turns CAN auto formatting on or off (`ATCAF`)
    pub fn set_can_autoformat(&mut self, on: bool) -> ObdResult<()> {
        self.expect_ok(&format!("CAF{}", on as u8))
    }

    fn bus_init(&mut self, command: &str) -> ObdResult<()> {
        let reply = self.send_at(command)?;
        if reply.ends_with("OK") {
            Ok(())
        } else {
            Err(ObdError::CommandRejected {
                command: command.to_string(),
                reply,
            })
        }
    }

    /// Performs a slow (5 baud) bus initialisation (`ATSI`). ISO 9141 and ISO 14230 only
    pub fn init_slow(&mut self) -> ObdResult<()> {
        self.bus_init("SI")
    }

    /// Performs a fast bus initialisation (`ATFI`). ISO 14230 only
    pub fn init_fast(&mut self) -> ObdResult<()> {
        self.bus_init("FI")
    }

    /// Reads the supply voltage at the OBD connector (`ATRV`)
    pub fn read_voltage(&mut self) -> ObdResult<f32> {
        let reply = self.send_at("RV")?;
        reply
            .trim_end_matches(['V', 'v'])
            .trim()
            .parse()
            .map_err(|_| ObdError::CommandRejected {
                command: "RV".into(),
                reply,
            })
    }

    /// Resets the adapter and sets it up for the text format the decoders expect:
    /// no echo, no linefeeds, no spaces, no headers. Then selects `protocol`
    pub fn initialize(&mut self, protocol: ElmProtocol) -> ObdResult<()> {
        let identity = self.reset()?;
        log::info!("Adapter reset, identity '{identity}'");
        self.set_echo(false)?;
        self.set_linefeeds(false)?;
        self.set_spaces(false)?;
        self.set_headers(false)?;
        self.set_protocol(protocol)
    }

    /// Sends one OBD request and returns every data line of the reply.
    ///
    /// Bus init notices are skipped. Replies spanning several lines (service 03
    /// with many codes, service 09, CAN multi-frame replies) come back in the
    /// order the adapter printed them.
    pub fn request_lines(&mut self, request: &ObdRequest) -> ObdResult<Vec<String>> {
        let command = request.to_hex_string();
        let lines: Vec<String> = self
            .send_command(&command)?
            .into_iter()
            .filter(|l| !is_status_line(l))
            .collect();
        if lines.is_empty() {
            return Err(ObdError::EmptyResponse);
        }
        Ok(lines)
    }

    /// Sends one OBD request and returns the single response line.
    ///
    /// Bus init notices are skipped. When several ECUs answer only the first
    /// reply is returned.
    pub fn request(&mut self, request: &ObdRequest) -> ObdResult<String> {
        let mut lines = self.request_lines(request)?.into_iter();
        let response = lines.next().ok_or(ObdError::EmptyResponse)?;
        let ignored = lines.count();
        if ignored != 0 {
            log::debug!("Ignoring {ignored} further reply lines to {}", request.to_hex_string());
        }
        Ok(response)
    }
}
