//! The hardware module contains the transports an [crate::channel::LineChannel] can run over,
//! as well as device discovery for serial adapters

#[cfg(feature = "serial")]
pub mod serial;
pub mod simulation;

/// Hardware API result
pub type HardwareResult<T> = Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
/// Represents error that can be returned by Hardware API
pub enum HardwareError {
    /// Hardware not found
    #[error("Device not found")]
    DeviceNotFound,
    /// Serial port error
    #[cfg(feature = "serial")]
    #[error("Serial port error")]
    SerialPortError(
        #[from]
        #[source]
        serialport::Error,
    ),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
/// Device hardware info used by [HardwareScanner]
pub struct HardwareInfo {
    /// Name of the hardware (Port path for serial adapters)
    pub name: String,
    /// Vendor of the hardware
    pub vendor: Option<String>,
    /// Product name reported by the hardware
    pub product: Option<String>,
    /// Serial number reported by the hardware
    pub serial_number: Option<String>,
}

/// Trait for scanning for supported adapters, given an API
pub trait HardwareScanner<T> {
    /// Lists all scanned devices
    fn list_devices(&self) -> Vec<HardwareInfo>;
    /// Tries to open a device by a specific index.
    fn open_device_by_index(&self, idx: usize) -> HardwareResult<T>;
    /// Tries to open a device given the devices name
    fn open_device_by_name(&self, name: &str) -> HardwareResult<T>;
}
