//! wilcspi-core - SPI bus protocol engine for WILC radio chips
//!
//! This crate frames every register access and bulk (DMA) transfer to a
//! WILC chip as command/response packets on a half-duplex SPI bus. It is
//! `no_std` compatible: the caller supplies the raw byte primitives through
//! the [`transport::BusTransport`] trait and owns the resulting
//! [`session::BusSession`].
//!
//! # Layers
//!
//! - [`protocol`] - pure, stateless wire handling: opcodes and their layouts,
//!   command encoding, response parsing, chunk planning
//! - [`transfer`] - drives one complete operation against a transport
//! - [`register`] - 32-bit register reads and writes
//! - [`interrupt`] - interrupt status aggregation and clearing
//! - [`session`] - checksum negotiation and the negotiated [`BusConfig`]
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, serde and
//!   TOML loading of [`SessionOptions`])
//! - `alloc` - Enable boxed transports
//!
//! # Example
//!
//! ```ignore
//! use wilcspi_core::{BusSession, SessionOptions};
//!
//! let mut session = BusSession::new(transport, SessionOptions::default());
//! session.init()?;
//! println!("chip id: 0x{:08X}", session.chip_id().unwrap_or(0));
//! session.sync_interrupt_lines(3)?;
//! let status = session.read_interrupt_status()?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod crc7;
pub mod endian;
pub mod error;
pub mod interrupt;
pub mod protocol;
pub mod register;
pub mod regs;
pub mod session;
pub mod transfer;
pub mod transport;

pub use config::{BusConfig, ProtocolCapability, SessionOptions, TransactionMode};
pub use error::{Error, Result};
pub use session::{BusSession, SessionState};
pub use transport::BusTransport;
