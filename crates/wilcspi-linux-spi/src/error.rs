//! Error types for the spidev transport

use thiserror::Error;

/// spidev setting applied when the device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// SPI mode (0-3)
    Mode,
    /// Bits per word
    BitsPerWord,
    /// Maximum clock speed in Hz
    SpeedHz,
}

impl std::fmt::Display for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode => write!(f, "SPI mode"),
            Self::BitsPerWord => write!(f, "bits per word"),
            Self::SpeedHz => write!(f, "clock speed (Hz)"),
        }
    }
}

/// Linux spidev transport errors
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An ioctl configuring the device was rejected
    #[error("Failed to set {setting} to {value}: {source}")]
    ConfigureFailed {
        setting: Setting,
        value: u32,
        #[source]
        source: std::io::Error,
    },

    /// SPI_IOC_MESSAGE failed
    #[error("SPI transfer of {len} bytes failed: {source}")]
    TransferFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// Full-duplex buffers of different lengths
    #[error("Full-duplex transfer with tx {tx} bytes and rx {rx} bytes")]
    LengthMismatch { tx: usize, rx: usize },

    /// Invalid programmer option
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/spidevX.Y")]
    NoDevice,
}

/// Result type for spidev operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;
