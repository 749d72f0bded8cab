//! wilcspi-linux-spi - Linux spidev transport
//!
//! This crate provides a [`BusTransport`](wilcspi_core::BusTransport) for
//! WILC chips wired to a Linux SPI controller exposed as `/dev/spidevX.Y`.
//!
//! # Example
//!
//! ```no_run
//! use wilcspi_core::{BusSession, SessionOptions};
//! use wilcspi_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0").with_speed(24_000_000);
//! let spi = LinuxSpi::open(&config)?;
//!
//! let mut session = BusSession::new(spi, SessionOptions::default());
//! session.init()?;
//! println!("chip id: 0x{:08X}", session.chip_id().unwrap_or(0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the wilcspi CLI
//!
//! ```bash
//! wilcspi -p linux_spi:dev=/dev/spidev0.0 init
//! wilcspi -p linux_spi:dev=/dev/spidev0.0,spispeed=24000 read-reg 0x3b0000
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to the `/dev/spidevX.Y` device
//! - A `bufsiz` module parameter of at least 8 KiB avoids splitting data
//!   packets across chip-select assertions

pub mod device;
pub mod error;

pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result, Setting};

use wilcspi_core::BusTransport;

/// Open a spidev device from programmer options and return a boxed transport
///
/// # Example Options
///
/// - `dev=/dev/spidev0.0` - Required: device path
/// - `spispeed=24000` - Optional: speed in kHz (default: 8000)
/// - `mode=0` - Optional: SPI mode 0-3 (default: 0)
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn BusTransport + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}
