//! Module for logical communication channels with an OBD adapter
//!
//! The decoders in [crate::obd2] only ever see hex strings, so anything that can
//! move bytes to and from an adapter can sit behind [LineChannel]: a serial port,
//! an SSH pseudo-terminal or a test double.

/// Communication channel result
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug)]
/// Error produced by a communication channel
pub enum ChannelError {
    /// Underlying IO Error with channel
    IOError(std::io::Error),
    /// Timeout when writing data to the channel
    WriteTimeout,
    /// Timeout when reading from the channel. This is the "no response" signal,
    /// a reply which arrived but was empty is returned as an empty buffer instead
    ReadTimeout,
    /// The channel's Rx buffer is empty. Only applies when read timeout is 0
    BufferEmpty,
    /// The channel's Rx buffer filled up before a reply terminator was seen
    BufferFull,
    /// The interface is not open
    InterfaceNotOpen,
    /// Other channel error
    Other(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::IOError(e) => write!(f, "IO error: {e}"),
            ChannelError::ReadTimeout => write!(f, "timeout reading from channel"),
            ChannelError::WriteTimeout => write!(f, "timeout writing to channel"),
            ChannelError::BufferEmpty => write!(f, "channel's Receive buffer is empty"),
            ChannelError::BufferFull => write!(f, "channel's Receive buffer is full"),
            ChannelError::InterfaceNotOpen => write!(f, "channel's interface is not open"),
            ChannelError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::IOError(io_err) = self {
            Some(io_err)
        } else {
            None
        }
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => ChannelError::ReadTimeout,
            _ => ChannelError::IOError(err),
        }
    }
}

/// Base trait for interfacing with an OBD adapter over a byte stream.
///
/// Writes are raw byte sequences, reads are framed: one call to [LineChannel::read_line]
/// returns everything the adapter sent up to (and excluding) its reply terminator.
pub trait LineChannel {
    /// This function opens the interface.
    fn open(&mut self) -> ChannelResult<()>;

    /// Closes the channel. Dropping the channel must also release it
    fn close(&mut self) -> ChannelResult<()>;

    /// Returns true if the channel is currently open
    fn is_open(&self) -> bool;

    /// Attempts to write bytes to the channel
    ///
    /// ## Parameters
    /// * buffer - The buffer of bytes to write to the channel
    /// * timeout_ms - Timeout for writing bytes. If a value of 0 is used, it tells the channel to write without checking if
    ///   data was actually written.
    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()>;

    /// Attempts to read one framed reply from the channel.
    ///
    /// ## Parameters
    /// * timeout_ms - Timeout for the whole reply. If nothing (or no terminator) arrives in time,
    ///   [ChannelError::ReadTimeout] is returned
    fn read_line(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>>;

    /// Attempts to write bytes to the channel, then listen for the channels reply
    ///
    /// ## Parameters
    /// * buffer - The buffer of bytes to write to the channel as the request
    /// * write_timeout_ms - Timeout for writing bytes
    /// * read_timeout_ms - Timeout for reading the reply
    fn write_read_line(
        &mut self,
        buffer: &[u8],
        write_timeout_ms: u32,
        read_timeout_ms: u32,
    ) -> ChannelResult<Vec<u8>> {
        self.write_bytes(buffer, write_timeout_ms)?;
        self.read_line(read_timeout_ms)
    }

    /// Tells the channel to clear its Rx buffer
    fn clear_rx_buffer(&mut self) -> ChannelResult<()>;
}

impl<T: LineChannel + ?Sized> LineChannel for Box<T> {
    fn open(&mut self) -> ChannelResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> ChannelResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()> {
        (**self).write_bytes(buffer, timeout_ms)
    }

    fn read_line(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        (**self).read_line(timeout_ms)
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        (**self).clear_rx_buffer()
    }
}
