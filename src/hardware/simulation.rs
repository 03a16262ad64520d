//! Simulated ELM327 adapter for unit testing OBD clients

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::channel::{ChannelError, ChannelResult, LineChannel};

#[derive(Debug, Default)]
struct SimState {
    req_resp_map: HashMap<String, String>,
    rx_queue: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    echo: bool,
    open: bool,
}

/// A scripted adapter. Each command written is looked up in a request/response
/// map and the matching reply is queued for the next [LineChannel::read_line].
///
/// Commands with no scripted reply produce nothing, so the next read times out
/// the way a silent adapter would. Clones share the same state, which lets a test
/// keep a handle after giving the channel to a client.
#[derive(Debug, Clone, Default)]
pub struct SimulationChannel {
    state: Arc<Mutex<SimState>>,
}

impl SimulationChannel {
    /// Creates an empty simulated adapter with echo off
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scripts the reply to `req`. `req` is the command without its trailing `\r`,
    /// `resp` is the reply text without the prompt
    pub fn add_response(&mut self, req: &str, resp: &str) {
        self.state()
            .req_resp_map
            .insert(req.to_string(), format!("{resp}\r\r"));
    }

    /// Scripts the usual replies of an adapter to the client's start up sequence.
    ///
    /// `ATDPN` answers `A3`, an automatically detected ISO 9141-2 bus. Override it
    /// with [SimulationChannel::add_response] to simulate a CAN vehicle
    pub fn add_elm_init_responses(&mut self, version: &str) {
        self.add_response("ATZ", &format!("\r\rELM327 v{version}"));
        self.add_response("ATI", &format!("ELM327 v{version}"));
        self.add_response("ATDPN", "A3");
        for cmd in ["ATE0", "ATL0", "ATS0", "ATH0", "ATSP0"] {
            self.add_response(cmd, "OK");
        }
    }

    /// Removes all scripted replies and anything waiting to be read
    pub fn clear_map(&mut self) {
        let mut state = self.state();
        state.req_resp_map.clear();
        state.rx_queue.clear();
    }

    /// Enables or disables command echo. `ATE0` / `ATE1` written to the channel also toggle it
    pub fn set_echo(&mut self, echo: bool) {
        self.state().echo = echo;
    }

    /// Returns every command written so far, without its trailing `\r`
    pub fn sent_commands(&self) -> Vec<String> {
        self.state().sent.clone()
    }
}

impl LineChannel for SimulationChannel {
    fn open(&mut self) -> ChannelResult<()> {
        self.state().open = true;
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        let mut state = self.state();
        state.open = false;
        state.rx_queue.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn write_bytes(&mut self, buffer: &[u8], _timeout_ms: u32) -> ChannelResult<()> {
        let mut state = self.state();
        if !state.open {
            return Err(ChannelError::InterfaceNotOpen);
        }
        let cmd = String::from_utf8_lossy(buffer).trim_end_matches('\r').to_string();
        let mut reply = if state.echo {
            format!("{cmd}\r")
        } else {
            String::new()
        };
        let scripted = state.req_resp_map.get(&cmd).cloned();
        match cmd.as_str() {
            "ATE0" => state.echo = false,
            "ATE1" => state.echo = true,
            _ => {}
        }
        state.sent.push(cmd);
        if let Some(resp) = scripted {
            reply.push_str(&resp);
            state.rx_queue.push_back(reply.into_bytes());
        }
        Ok(())
    }

    fn read_line(&mut self, _timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        let mut state = self.state();
        if !state.open {
            return Err(ChannelError::InterfaceNotOpen);
        }
        state.rx_queue.pop_front().ok_or(ChannelError::ReadTimeout)
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        self.state().rx_queue.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reply() {
        let mut sim = SimulationChannel::new();
        sim.add_response("010C", "41 0C 1A F8");
        sim.open().unwrap();
        let reply = sim.write_read_line(b"010C\r", 100, 100).unwrap();
        assert_eq!(reply, b"41 0C 1A F8\r\r");
        assert_eq!(sim.sent_commands(), vec!["010C".to_string()]);
    }

    #[test]
    fn unscripted_request_times_out() {
        let mut sim = SimulationChannel::new();
        sim.open().unwrap();
        assert!(matches!(
            sim.write_read_line(b"0105\r", 100, 100),
            Err(ChannelError::ReadTimeout)
        ));
    }

    #[test]
    fn echo_until_disabled() {
        let mut sim = SimulationChannel::new();
        sim.add_response("ATE0", "OK");
        sim.add_response("0105", "41057B");
        sim.set_echo(true);
        sim.open().unwrap();
        assert_eq!(sim.write_read_line(b"ATE0\r", 100, 100).unwrap(), b"ATE0\rOK\r\r");
        assert_eq!(sim.write_read_line(b"0105\r", 100, 100).unwrap(), b"41057B\r\r");
    }

    #[test]
    fn closed_channel() {
        let mut sim = SimulationChannel::new();
        assert!(matches!(
            sim.write_bytes(b"ATZ\r", 100),
            Err(ChannelError::InterfaceNotOpen)
        ));
        sim.open().unwrap();
        assert!(sim.is_open());
        // Clones share state
        let handle = sim.clone();
        sim.close().unwrap();
        assert!(!handle.is_open());
    }
}
