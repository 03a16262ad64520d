use std::str::FromStr;

use obd_serial::{
    ClientOptions, ObdClient,
    hardware::{
        HardwareScanner,
        serial::{SerialChannel, SerialScanner, SerialSettings},
    },
    obd2::DataPid,
};

extern crate obd_serial;

fn main() {
    env_logger::builder()
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();

    // read_sensors <port> [baud] [PID names...]
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        println!("Usage: read_sensors <port> [baud] [PID...]");
        println!("Serial ports found:");
        for dev in SerialScanner::new(SerialSettings::default()).list_devices() {
            println!("  {} {:?} {:?}", dev.name, dev.vendor, dev.product);
        }
        return;
    };
    let baud = args.next().and_then(|b| b.parse().ok()).unwrap_or(38400);
    let extra_pids: Vec<DataPid> = args
        .filter_map(|name| match DataPid::from_str(&name) {
            Ok(pid) => Some(pid),
            Err(_) => {
                println!("Unknown PID name '{name}'");
                None
            }
        })
        .collect();

    let channel = SerialChannel::new(SerialSettings::new(path).with_baud_rate(baud));
    let mut client = ObdClient::new(channel, ClientOptions::default());
    client.open().unwrap();

    println!("Adapter: {}", client.adapter().identify().unwrap());
    println!("Protocol: {}", client.adapter().describe_protocol().unwrap());
    match client.vin() {
        Ok(Some(vin)) => println!("VIN: {vin}"),
        Ok(None) => println!("VIN: reply was for another request"),
        Err(e) => println!("VIN: {e}"),
    }

    match client.coolant_temperature() {
        Ok(Some(t)) => println!("Coolant: {:.0}°C / {:.0}°F", t.to_celsius(), t.to_fahrenheit()),
        Ok(None) => println!("Coolant: reply was for another PID"),
        Err(e) => println!("Coolant: {e}"),
    }
    match client.engine_rpm() {
        Ok(Some(rpm)) => println!("Engine speed: {rpm} RPM"),
        Ok(None) => println!("Engine speed: reply was for another PID"),
        Err(e) => println!("Engine speed: {e}"),
    }
    match client.read_trouble_codes() {
        Ok(Some(codes)) if codes.is_empty() => println!("No stored trouble codes"),
        Ok(Some(codes)) => {
            for code in codes {
                println!("Stored trouble code {code}");
            }
        }
        Ok(None) => println!("Trouble codes: reply was for another request"),
        Err(e) => println!("Trouble codes: {e}"),
    }
    for pid in extra_pids {
        match client.query_pid(pid) {
            Ok(Some(values)) => {
                for v in values {
                    println!("{v}");
                }
            }
            Ok(None) => println!("{pid}: reply was for another PID"),
            Err(e) => println!("{pid}: {e}"),
        }
    }

    client.close().unwrap();
}
