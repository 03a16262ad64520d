use obd_serial::{
    ClientOptions, ObdClient, ObdError,
    channel::{ChannelError, ChannelResult, LineChannel},
    obd2::DataPid,
};

/// Simulated ELM327 with an ECU behind it. AT commands are answered like a real
/// adapter, OBD requests are passed to the callback
#[derive(Clone)]
pub struct ElmSimEcu<T: Clone + Fn(&str) -> Option<String>> {
    on_request_callback: T,
    out_buffer: Vec<Vec<u8>>,
    echo: bool,
    open: bool,
}

impl<T: Clone + Fn(&str) -> Option<String>> ElmSimEcu<T> {
    pub fn new(on_request_callback: T) -> Self {
        Self {
            on_request_callback,
            out_buffer: Vec::new(),
            echo: true,
            open: false,
        }
    }

    fn adapter_reply(&mut self, cmd: &str) -> Option<String> {
        let at = cmd.strip_prefix("AT")?;
        Some(match at {
            "Z" => {
                self.echo = true;
                "\r\rELM327 v1.5".to_string()
            }
            "I" => "ELM327 v1.5".to_string(),
            "E0" => {
                self.echo = false;
                "OK".to_string()
            }
            "DP" => "AUTO, ISO 15765-4 (CAN 11/500)".to_string(),
            "DPN" => "A6".to_string(),
            "L0" | "S0" | "H0" | "SP0" => "OK".to_string(),
            _ => "?".to_string(),
        })
    }
}

impl<T: Clone + Fn(&str) -> Option<String>> LineChannel for ElmSimEcu<T> {
    fn open(&mut self) -> ChannelResult<()> {
        println!("LineChannel: open Called");
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        println!("LineChannel: close Called");
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()> {
        let cmd = String::from_utf8_lossy(buffer).trim_end().to_string();
        println!("LineChannel: write_bytes Called. Tx: {cmd:?}, timeout_ms: {timeout_ms}");
        let echo = if self.echo { format!("{cmd}\r") } else { String::new() };
        let reply = match self.adapter_reply(&cmd) {
            Some(r) => r,
            None => (self.on_request_callback)(&cmd).unwrap_or_else(|| "NO DATA".into()),
        };
        self.out_buffer.push(format!("{echo}{reply}\r\r").into_bytes());
        Ok(())
    }

    fn read_line(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        println!("LineChannel: read_line Called. timeout_ms: {timeout_ms}");
        if self.out_buffer.is_empty() {
            println!("-- NOTHING TO SEND");
            Err(ChannelError::ReadTimeout)
        } else {
            let send = self.out_buffer.remove(0);
            println!("-- Sending {:?} back to client", String::from_utf8_lossy(&send));
            Ok(send)
        }
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        self.out_buffer.clear();
        Ok(())
    }
}

fn running_engine(req: &str) -> Option<String> {
    match req {
        "0100" => Some("SEARCHING...\r41 00 BE 1F A8 13".into()),
        "0101" => Some("41 01 82 07 65 04".into()),
        "0105" => Some("41 05 7b".into()),
        "010C" => Some("41 0C 1A F8".into()),
        "010D" => Some("41 0D 00".into()),
        // CAN layout, code count right after 43
        "03" => Some("43 02 01 33 04 45".into()),
        "04" => Some("44".into()),
        "0902" => Some(
            "014\r0: 49 02 01 31 44 34\r1: 47 50 30 30 52 35 35\r2: 42 31 32 33 34 35 36".into(),
        ),
        _ => None,
    }
}

fn open_client<T: Clone + Fn(&str) -> Option<String>>(sim: ElmSimEcu<T>) -> ObdClient<ElmSimEcu<T>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut client = ObdClient::new(
        sim,
        ClientOptions {
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            ..Default::default()
        },
    );
    client.open().unwrap();
    client
}

#[test]
pub fn test_read_engine_data() {
    let mut client = open_client(ElmSimEcu::new(running_engine));

    let temp = client.coolant_temperature().unwrap().unwrap();
    assert_eq!(temp.to_celsius(), 83.0);
    assert_eq!(client.engine_rpm().unwrap(), Some(1726.0));
    assert_eq!(
        client.adapter().describe_protocol().unwrap(),
        "AUTO, ISO 15765-4 (CAN 11/500)"
    );

    let speed = client.query_pid(DataPid::VehicleSpeed).unwrap().unwrap();
    assert_eq!(speed[0].get_metric_data(), 0.0);

    let pids = client.supported_pids().unwrap();
    assert!(pids.contains(&DataPid::EngineSpeed));
    client.close().unwrap();
}

#[test]
pub fn test_trouble_codes() {
    let mut client = open_client(ElmSimEcu::new(running_engine));

    assert_eq!(client.trouble_code_count().unwrap(), Some(2));
    let status = client.monitor_status().unwrap().unwrap();
    assert!(status.mil_on);

    let codes: Vec<String> = client
        .read_trouble_codes()
        .unwrap()
        .unwrap()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(codes, vec!["P0133", "P0445"]);
    assert!(client.clear_trouble_codes().unwrap());
}

#[test]
pub fn test_multi_frame_vin() {
    let mut client = open_client(ElmSimEcu::new(running_engine));
    assert_eq!(client.vin().unwrap().as_deref(), Some("1D4GP00R55B123456"));
}

#[test]
pub fn test_ecu_not_answering() {
    fn callback(_req: &str) -> Option<String> {
        None
    }
    let mut client = open_client(ElmSimEcu::new(callback));
    assert!(matches!(client.engine_rpm(), Err(ObdError::NoData)));
    assert!(matches!(client.supported_pids(), Err(ObdError::NoData)));
}

#[test]
pub fn test_wrong_reply_and_garbage() {
    fn callback(req: &str) -> Option<String> {
        match req {
            // Late reply of an earlier request
            "0105" => Some("410C1AF8".into()),
            "010C" => Some("410CZZZZ".into()),
            _ => None,
        }
    }
    let mut client = open_client(ElmSimEcu::new(callback));
    assert!(client.coolant_temperature().unwrap().is_none());
    assert!(matches!(
        client.engine_rpm(),
        Err(ObdError::MalformedResponse(_))
    ));
}
