//! Blocking OBD-II client
//!
//! [ObdClient] sends one request over an [Elm327] adapter, reads the reply and
//! hands it to the matching decoder in [crate::obd2]. Replies that span several
//! lines (trouble codes, VIN) are joined the way the vehicle bus lays them out.
//!
//! Each query returns `ObdResult<Option<T>>`:
//! * `Err(_)` - no usable reply (adapter error, `NO DATA`, timeout) or a reply that
//!   matched the request but could not be decoded
//! * `Ok(None)` - the adapter answered, but for a different mode/PID
//! * `Ok(Some(v))` - the decoded value
//!
//! ```no_run
//! use obd_serial::hardware::serial::{SerialChannel, SerialSettings};
//! use obd_serial::{ClientOptions, ObdClient};
//!
//! let channel = SerialChannel::new(SerialSettings::new("/dev/ttyUSB0"));
//! let mut client = ObdClient::new(channel, ClientOptions::default());
//! client.open().unwrap();
//! if let Some(rpm) = client.engine_rpm().unwrap() {
//!     println!("Engine speed {rpm} RPM");
//! }
//! client.close().unwrap();
//! ```

use crate::channel::{ChannelError, LineChannel};
use crate::dtc::TroubleCode;
use crate::elm327::{Elm327, ElmProtocol};
use crate::obd2::{
    DataPid, MonitorStatus, ObdRequest, ObdValue, Temperature, clear_dtc_request,
    decode_can_trouble_codes, decode_clear_ack, decode_coolant_temperature, decode_data_pid,
    decode_monitor_status, decode_rpm, decode_supported_pids, decode_trouble_code_count,
    decode_trouble_code_frames, decode_vin, decode_vin_frames, merge_can_frames,
    read_dtc_request, vin_request,
};
use crate::{ObdError, ObdResult};

/// Base PIDs of the supported PID bitmasks in service 01
const SUPPORTED_PID_PAGE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Client configuration
pub struct ClientOptions {
    /// Timeout in ms for a whole reply. Slow ECUs on K-Line can take several seconds
    pub read_timeout_ms: u32,
    /// Timeout in ms for writing a command
    pub write_timeout_ms: u32,
    /// Vehicle bus protocol to select when the client initialises the adapter
    pub protocol: ElmProtocol,
    /// Reset and set up the adapter in [ObdClient::open]. Turn off if the adapter
    /// was already set up (no echo, no spaces, no headers) by someone else
    pub initialize_on_open: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5000,
            write_timeout_ms: 1000,
            protocol: ElmProtocol::Auto,
            initialize_on_open: true,
        }
    }
}

/// OBD-II client over an ELM327 adapter
#[derive(Debug)]
pub struct ObdClient<C: LineChannel> {
    adapter: Elm327<C>,
    options: ClientOptions,
    bus_protocol: Option<ElmProtocol>,
}

impl<C: LineChannel> ObdClient<C> {
    /// Creates a client over `channel`. Nothing is sent until [ObdClient::open]
    pub fn new(channel: C, options: ClientOptions) -> Self {
        Self {
            adapter: Elm327::new(channel, options.read_timeout_ms, options.write_timeout_ms),
            options,
            bus_protocol: None,
        }
    }

    /// Returns the client options
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the adapter, for AT commands the client does not wrap
    pub fn adapter(&mut self) -> &mut Elm327<C> {
        &mut self.adapter
    }

    /// Consumes the client, returning the channel
    pub fn into_channel(self) -> C {
        self.adapter.into_inner()
    }

    /// Opens the channel and, if [ClientOptions::initialize_on_open] is set,
    /// initialises the adapter
    pub fn open(&mut self) -> ObdResult<()> {
        self.bus_protocol = None;
        self.adapter.open()?;
        if self.options.initialize_on_open {
            if let Err(e) = self.adapter.initialize(self.options.protocol) {
                log::error!("Adapter initialisation failed: {e}");
                if let Err(close_err) = self.adapter.close() {
                    log::warn!("Could not close channel after failed initialisation: {close_err}");
                }
                return Err(e);
            }
        }
        log::info!("OBD client ready");
        Ok(())
    }

    /// Closes the channel
    pub fn close(&mut self) -> ObdResult<()> {
        log::info!("Closing OBD client");
        self.bus_protocol = None;
        self.adapter.close()
    }

    /// Returns true if the channel is open
    pub fn is_open(&self) -> bool {
        self.adapter.is_open()
    }

    /// Sends a request and returns the raw reply text, EG `"410C1AF8"`
    pub fn send_request(&mut self, request: &ObdRequest) -> ObdResult<String> {
        if !self.adapter.is_open() {
            return Err(ChannelError::InterfaceNotOpen.into());
        }
        self.adapter.request(request)
    }

    /// Sends a request and returns every data line of the reply
    pub fn send_request_lines(&mut self, request: &ObdRequest) -> ObdResult<Vec<String>> {
        if !self.adapter.is_open() {
            return Err(ChannelError::InterfaceNotOpen.into());
        }
        self.adapter.request_lines(request)
    }

    /// Returns the vehicle bus protocol in use. A fixed protocol comes from
    /// [ClientOptions::protocol], otherwise the adapter is asked (`ATDPN`) and the
    /// answer kept until the client is closed
    pub fn bus_protocol(&mut self) -> ObdResult<ElmProtocol> {
        if self.options.protocol != ElmProtocol::Auto {
            return Ok(self.options.protocol);
        }
        if let Some(protocol) = self.bus_protocol {
            return Ok(protocol);
        }
        if !self.adapter.is_open() {
            return Err(ChannelError::InterfaceNotOpen.into());
        }
        let protocol = self.adapter.protocol()?.unwrap_or_default();
        log::debug!("Vehicle bus protocol: {protocol}");
        // Not detected yet, ask again next time
        if protocol != ElmProtocol::Auto {
            self.bus_protocol = Some(protocol);
        }
        Ok(protocol)
    }

    /// Reads the engine coolant temperature (service 01 PID 05)
    pub fn coolant_temperature(&mut self) -> ObdResult<Option<Temperature>> {
        let response = self.send_request(&DataPid::EngineCoolantTemp.into())?;
        Ok(decode_coolant_temperature(&response)?)
    }

    /// Reads the engine speed in RPM (service 01 PID 0C)
    pub fn engine_rpm(&mut self) -> ObdResult<Option<f32>> {
        let response = self.send_request(&DataPid::EngineSpeed.into())?;
        Ok(decode_rpm(&response)?)
    }

    /// Reads the monitor status (service 01 PID 01)
    pub fn monitor_status(&mut self) -> ObdResult<Option<MonitorStatus>> {
        let response = self.send_request(&DataPid::StatusSinceDTCCleared.into())?;
        Ok(decode_monitor_status(&response)?)
    }

    /// Reads the number of stored trouble codes (service 01 PID 01)
    pub fn trouble_code_count(&mut self) -> ObdResult<Option<u8>> {
        let response = self.send_request(&DataPid::StatusSinceDTCCleared.into())?;
        Ok(decode_trouble_code_count(&response)?)
    }

    /// Reads `count` stored trouble codes (service 03). `count` normally comes
    /// from [ObdClient::trouble_code_count]
    pub fn trouble_codes(&mut self, count: usize) -> ObdResult<Option<Vec<TroubleCode>>> {
        let lines = self.send_request_lines(&read_dtc_request())?;
        if self.bus_protocol()?.is_can() {
            Ok(decode_can_trouble_codes(&merge_can_frames(&lines), count)?)
        } else {
            Ok(decode_trouble_code_frames(&lines, count)?)
        }
    }

    /// Reads the trouble code count, then the codes themselves.
    ///
    /// With no stored codes the service 03 request is skipped
    pub fn read_trouble_codes(&mut self) -> ObdResult<Option<Vec<TroubleCode>>> {
        let Some(count) = self.trouble_code_count()? else {
            return Ok(None);
        };
        log::debug!("ECU reports {count} stored trouble codes");
        if count == 0 {
            return Ok(Some(Vec::new()));
        }
        self.trouble_codes(count as usize)
    }

    /// Clears stored trouble codes and turns the MIL off (service 04).
    /// Returns true if the ECU acknowledged
    pub fn clear_trouble_codes(&mut self) -> ObdResult<bool> {
        let response = self.send_request(&clear_dtc_request())?;
        let acknowledged = decode_clear_ack(&response);
        if !acknowledged {
            log::warn!("ECU did not acknowledge clearing trouble codes: '{response}'");
        }
        Ok(acknowledged)
    }

    /// Reads the vehicle identification number (service 09 PID 02)
    pub fn vin(&mut self) -> ObdResult<Option<String>> {
        let lines = self.send_request_lines(&vin_request())?;
        if self.bus_protocol()?.is_can() {
            Ok(decode_vin(&merge_can_frames(&lines))?)
        } else {
            Ok(decode_vin_frames(&lines)?)
        }
    }

    /// Queries any service 01 PID, decoded to named values
    pub fn query_pid(&mut self, pid: DataPid) -> ObdResult<Option<Vec<ObdValue>>> {
        let response = self.send_request(&pid.into())?;
        Ok(decode_data_pid(pid, &response)?)
    }

    /// Queries the supported PID bitmasks of service 01 and returns the supported
    /// data PIDs. The bitmask PIDs themselves (`20`, `40` ...) are left out.
    pub fn supported_pids(&mut self) -> ObdResult<Vec<DataPid>> {
        let mut supported = Vec::new();
        let mut base = 0u8;
        loop {
            let response = match self.send_request(&ObdRequest::current_data(base)) {
                Ok(r) => r,
                // Later pages are optional
                Err(ObdError::NoData) if base != 0 => break,
                Err(e) => return Err(e),
            };
            let Some(pids) = decode_supported_pids(&response, base)? else {
                log::warn!("Unexpected reply to supported PID query {base:02X}: '{response}'");
                break;
            };
            let next = base.checked_add(SUPPORTED_PID_PAGE);
            let has_next = next.is_some_and(|n| pids.contains(&n));
            supported.extend(
                pids.into_iter()
                    .filter(|pid| pid % SUPPORTED_PID_PAGE != 0)
                    .map(DataPid::from),
            );
            match next {
                Some(n) if has_next => base = n,
                _ => break,
            }
        }
        Ok(supported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulation::SimulationChannel;

    fn client(sim: &mut SimulationChannel) -> ObdClient<SimulationChannel> {
        sim.add_elm_init_responses("1.5");
        let mut client = ObdClient::new(sim.clone(), ClientOptions::default());
        client.open().unwrap();
        client
    }

    #[test]
    fn coolant_and_rpm() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0105", "41057B");
        sim.add_response("010C", "410C1AF8");
        let mut client = client(&mut sim);
        let temp = client.coolant_temperature().unwrap().unwrap();
        assert_eq!(temp.to_celsius(), 83.0);
        assert_eq!(client.engine_rpm().unwrap(), Some(1726.0));
    }

    #[test]
    fn mismatched_reply_is_none() {
        let mut sim = SimulationChannel::new();
        sim.add_response("010C", "41057B");
        let mut client = client(&mut sim);
        assert_eq!(client.engine_rpm().unwrap(), None);
    }

    #[test]
    fn malformed_reply_is_error() {
        let mut sim = SimulationChannel::new();
        sim.add_response("010C", "410C1A");
        let mut client = client(&mut sim);
        assert!(matches!(
            client.engine_rpm(),
            Err(ObdError::MalformedResponse(_))
        ));
    }

    #[test]
    fn silent_adapter_times_out() {
        let mut sim = SimulationChannel::new();
        let mut client = client(&mut sim);
        assert!(matches!(
            client.coolant_temperature(),
            Err(ObdError::ChannelError(ChannelError::ReadTimeout))
        ));
    }

    #[test]
    fn read_trouble_codes() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0101", "41018207E500");
        sim.add_response("03", "4301330445");
        let mut client = client(&mut sim);
        let codes = client.read_trouble_codes().unwrap().unwrap();
        let names: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["P0133", "P0445"]);
    }

    #[test]
    fn no_trouble_codes_skips_mode_03() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0101", "41010007E500");
        let mut client = client(&mut sim);
        assert_eq!(client.read_trouble_codes().unwrap(), Some(Vec::new()));
        assert!(!sim.sent_commands().iter().any(|c| c == "03"));
    }

    #[test]
    fn clear_codes() {
        let mut sim = SimulationChannel::new();
        sim.add_response("04", "44");
        let mut client = client(&mut sim);
        assert!(client.clear_trouble_codes().unwrap());
    }

    #[test]
    fn supported_pids() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0100", "4100BE1FA813");
        sim.add_response("0120", "412080000000");
        let mut client = client(&mut sim);
        let pids = client.supported_pids().unwrap();
        assert!(pids.contains(&DataPid::EngineSpeed));
        assert!(pids.contains(&DataPid::EngineCoolantTemp));
        assert!(pids.contains(&DataPid::from(0x21)));
        assert!(!pids.contains(&DataPid::from(0x20)));
        assert!(!sim.sent_commands().iter().any(|c| c == "0140"));
    }

    #[test]
    fn query_named_pid() {
        let mut sim = SimulationChannel::new();
        sim.add_response("010D", "410D32");
        let mut client = client(&mut sim);
        let values = client.query_pid(DataPid::VehicleSpeed).unwrap().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].get_metric_data(), 50.0);
    }

    #[test]
    fn closed_client() {
        let mut sim = SimulationChannel::new();
        let mut client = client(&mut sim);
        client.close().unwrap();
        assert!(!client.is_open());
        assert!(matches!(
            client.engine_rpm(),
            Err(ObdError::ChannelError(ChannelError::InterfaceNotOpen))
        ));
    }

    #[test]
    fn init_failure_closes_channel() {
        let mut sim = SimulationChannel::new();
        sim.add_response("ATZ", "ELM327 v1.5");
        sim.add_response("ATE0", "?");
        let mut client = ObdClient::new(sim.clone(), ClientOptions::default());
        assert!(matches!(client.open(), Err(ObdError::AdapterError(_))));
        assert!(!sim.is_open());
    }

    #[test]
    fn trouble_codes_over_two_lines() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0101", "41018407E500");
        sim.add_response("03", "430133014401 55\r43016600000000");
        let mut client = client(&mut sim);
        let codes = client.read_trouble_codes().unwrap().unwrap();
        let names: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["P0133", "P0144", "P0155", "P0166"]);
    }

    #[test]
    fn can_trouble_codes_skip_count_byte() {
        let mut sim = SimulationChannel::new();
        sim.add_response("0101", "41018207E500");
        let mut client = client(&mut sim);
        sim.add_response("ATDPN", "A6");
        sim.add_response("03", "430201330445");
        let codes = client.read_trouble_codes().unwrap().unwrap();
        let names: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["P0133", "P0445"]);
        assert_eq!(
            client.bus_protocol().unwrap(),
            ElmProtocol::Iso15765_4Can11bit500
        );
    }

    #[test]
    fn can_multi_frame_trouble_codes() {
        let mut sim = SimulationChannel::new();
        let mut client = client(&mut sim);
        sim.add_response("ATDPN", "A6");
        sim.add_response("03", "00A\r0:430401330445\r1:01550166000000");
        let codes = client.trouble_codes(4).unwrap().unwrap();
        let names: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["P0133", "P0445", "P0155", "P0166"]);
    }

    #[test]
    fn fixed_protocol_skips_detection() {
        let mut sim = SimulationChannel::new();
        sim.add_elm_init_responses("1.5");
        sim.add_response("ATSP6", "OK");
        sim.add_response("03", "430201330445");
        let options = ClientOptions {
            protocol: ElmProtocol::Iso15765_4Can11bit500,
            ..Default::default()
        };
        let mut client = ObdClient::new(sim.clone(), options);
        client.open().unwrap();
        assert_eq!(client.trouble_codes(2).unwrap().unwrap().len(), 2);
        assert!(!sim.sent_commands().iter().any(|c| c == "ATDPN"));
    }

    #[test]
    fn legacy_vin() {
        let mut sim = SimulationChannel::new();
        sim.add_response(
            "0902",
            "49020100000031\r49020244344750\r49020330305235\r49020435423132\r49020533343536",
        );
        let mut client = client(&mut sim);
        assert_eq!(client.vin().unwrap().as_deref(), Some("1D4GP00R55B123456"));
    }
}
