#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    clippy::uninlined_format_args
)]

//! A crate for reading OBD-II data through ELM327 style adapters over a serial
//! port (or any other byte stream).
//!
//! ## Layers
//!
//! ### Response decoding ([obd2])
//! Pure functions which take the ASCII hex text an adapter returns and turn it into
//! physical values. A response which echoes a different mode/PID than the request
//! decodes to `None`. A response which matches but is truncated or not hex is a
//! [obd2::DecodeError].
//!
//! The decoders never touch a transport, so they work the same for text read from a
//! serial port, an SSH pseudo-terminal or a log file.
//!
//! ### Transport ([channel], [hardware])
//! [channel::LineChannel] is the byte stream boundary: write bytes, read one framed
//! reply. [hardware::serial::SerialChannel] implements it over the `serialport` crate
//! (feature `serial`), [hardware::simulation::SimulationChannel] is a scripted
//! adapter for tests.
//!
//! ### Adapter and client ([elm327], [client])
//! [elm327::Elm327] handles AT commands and reply cleanup, [client::ObdClient]
//! sends one request at a time and decodes the single reply.
//!
//! ## Example
//! ```
//! use obd_serial::obd2::{decode_coolant_temperature, decode_rpm};
//!
//! let temp = decode_coolant_temperature("41 05 7B").unwrap().unwrap();
//! assert_eq!(temp.to_celsius(), 83.0);
//!
//! assert_eq!(decode_rpm("410C1AF8").unwrap(), Some(1726.0));
//! // Reply to another PID
//! assert_eq!(decode_rpm("41057B").unwrap(), None);
//! ```

use channel::ChannelError;
use hardware::HardwareError;
use obd2::DecodeError;

pub mod channel;
pub mod client;
pub mod dtc;
pub mod elm327;
pub mod hardware;
pub mod helpers;
pub mod obd2;

pub use client::{ClientOptions, ObdClient};
pub use dtc::TroubleCode;

/// OBD client result
pub type ObdResult<T> = Result<T, ObdError>;

#[derive(Debug, thiserror::Error)]
/// OBD client error
pub enum ObdError {
    /// The adapter answered `NO DATA`, no ECU replied to the request
    #[error("No ECU responded to the request")]
    NoData,
    /// The adapter reported an error instead of data (`UNABLE TO CONNECT`, `CAN ERROR`, `?` ...)
    #[error("Adapter error: '{0}'")]
    AdapterError(String),
    /// An AT command was not acknowledged with `OK`
    #[error("Adapter rejected command '{command}', reply was '{reply}'")]
    CommandRejected {
        /// The command sent, without the `AT` prefix
        command: String,
        /// What the adapter sent back instead
        reply: String,
    },
    /// The adapter returned an empty reply
    #[error("Adapter returned an empty reply")]
    EmptyResponse,
    /// The reply matched the request but could not be decoded
    #[error("Malformed response from ECU")]
    MalformedResponse(
        #[from]
        #[source]
        DecodeError,
    ),
    /// Error with underlying communication channel
    #[error("Communication channel error")]
    ChannelError(
        #[from]
        #[source]
        ChannelError,
    ),
    /// Device hardware error
    #[error("Hardware error")]
    HardwareError(
        #[from]
        #[source]
        HardwareError,
    ),
}
