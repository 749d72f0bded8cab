//! Error types for wilcspi-core
//!
//! This module provides a no_std compatible error type shared by every
//! layer of the protocol engine.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed call parameters (address or size out of range, direction
    /// not matching the opcode, too many interrupt lines, ...)
    InvalidArgument,
    /// The transport primitive reported a failure
    BusTransportFailure,
    /// The chip echoed a different opcode than the one sent
    EchoMismatch {
        /// Opcode byte that was sent
        expected: u8,
        /// Byte found in the echo position
        found: u8,
    },
    /// The state byte of the response was not zero
    UnexpectedState(u8),
    /// No data-response marker was seen within the retry budget
    ///
    /// This is retryable: the bus may need a reset before the next attempt.
    DataHeaderTimeout,
    /// The response is too short to extract a field, or a frame buffer
    /// would be written past its capacity
    BufferOverrun,
    /// The byte does not name an opcode of the protocol
    UnsupportedOpcode(u8),
    /// The session has not been initialized yet
    NotReady,
}

impl Error {
    /// Returns true if the caller may retry the operation (possibly after
    /// resetting the bus)
    ///
    /// Every other error points at a logic or configuration defect and
    /// should not be retried blindly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BusTransportFailure | Self::DataHeaderTimeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::BusTransportFailure => write!(f, "SPI bus transfer failed"),
            Self::EchoMismatch { expected, found } => write!(
                f,
                "command echo mismatch: sent 0x{:02X}, chip answered 0x{:02X}",
                expected, found
            ),
            Self::UnexpectedState(state) => {
                write!(f, "unexpected command state 0x{:02X}", state)
            }
            Self::DataHeaderTimeout => write!(f, "timed out waiting for data response header"),
            Self::BufferOverrun => write!(f, "response buffer overrun"),
            Self::UnsupportedOpcode(op) => write!(f, "unsupported opcode 0x{:02X}", op),
            Self::NotReady => write!(f, "bus session not initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::BusTransportFailure.is_retryable());
        assert!(Error::DataHeaderTimeout.is_retryable());
        assert!(!Error::BufferOverrun.is_retryable());
        assert!(!Error::EchoMismatch {
            expected: 0xC4,
            found: 0x00
        }
        .is_retryable());
        assert!(!Error::InvalidArgument.is_retryable());
    }
}
