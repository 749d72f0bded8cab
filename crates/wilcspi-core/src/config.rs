//! Session configuration
//!
//! [`BusConfig`] is what the session negotiated with the chip and is
//! read-only outside of [`BusSession::init`] and
//! [`BusSession::sync_interrupt_lines`]. [`SessionOptions`] is what the
//! caller asks for before the session starts.
//!
//! [`BusSession::init`]: crate::session::BusSession::init
//! [`BusSession::sync_interrupt_lines`]: crate::session::BusSession::sync_interrupt_lines

use crate::protocol::chunk::MAX_PACKET_SIZE;

/// Protocol variant spoken by the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "kebab-case"))]
pub enum ProtocolCapability {
    /// Interrupt status spread over several registers
    Legacy,
    /// Interrupt status consolidated into a single internal register
    #[default]
    ThroughputEnhanced,
}

/// How a command and its response are put on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "kebab-case"))]
pub enum TransactionMode {
    /// Command, response header and the start of the data phase in one
    /// full-duplex exchange
    #[default]
    Combined,
    /// Command, response header and data phase as separate transmit and
    /// receive calls
    Split,
}

/// Negotiated bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Command frames carry a CRC-7 byte and data blocks two checksum bytes
    pub checksum_enabled: bool,
    /// Number of interrupt lines enabled on the chip (0..=8)
    pub interrupt_line_count: u8,
    /// Interrupt register layout in use
    pub protocol_capability: ProtocolCapability,
    /// Swap register values between wire and host order
    pub swap_bytes: bool,
}

impl Default for BusConfig {
    /// The chip comes out of reset with checksums enabled
    fn default() -> Self {
        Self {
            checksum_enabled: true,
            interrupt_line_count: 0,
            protocol_capability: ProtocolCapability::default(),
            swap_bytes: false,
        }
    }
}

/// Caller-selected session options
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, rename_all = "kebab-case"))]
pub struct SessionOptions {
    /// Transaction shape used for every operation
    pub transaction_mode: TransactionMode,
    /// Maximum data packet size of one DMA segment
    pub max_packet: usize,
    /// Bytes scanned for the data-response marker inside a combined exchange
    pub combined_header_budget: u16,
    /// Bytes scanned for the data-response marker before each streamed chunk
    pub stream_header_budget: u16,
    /// Re-reads of the legacy interrupt registers while unknown bits are set
    pub irq_anomaly_budget: u16,
    /// Capability recorded after a successful initialization
    pub protocol_capability: ProtocolCapability,
    /// Swap register values between wire and host order
    pub swap_bytes: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transaction_mode: TransactionMode::Combined,
            max_packet: MAX_PACKET_SIZE,
            combined_header_budget: 100,
            stream_header_budget: 10,
            irq_anomaly_budget: 16,
            protocol_capability: ProtocolCapability::ThroughputEnhanced,
            swap_bytes: false,
        }
    }
}

impl SessionOptions {
    /// Set the transaction mode
    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// Set the capability recorded after initialization
    pub fn with_capability(mut self, capability: ProtocolCapability) -> Self {
        self.protocol_capability = capability;
        self
    }

    /// Set the maximum data packet size
    pub fn with_max_packet(mut self, max_packet: usize) -> Self {
        self.max_packet = max_packet;
        self
    }

    /// Enable or disable host byte swapping
    pub fn with_swap_bytes(mut self, swap: bool) -> Self {
        self.swap_bytes = swap;
        self
    }

    /// Set the data-response marker budgets (combined, streamed)
    pub fn with_header_budgets(mut self, combined: u16, stream: u16) -> Self {
        self.combined_header_budget = combined;
        self.stream_header_budget = stream;
        self
    }

    /// Set the legacy interrupt anomaly re-read budget
    pub fn with_irq_anomaly_budget(mut self, budget: u16) -> Self {
        self.irq_anomaly_budget = budget;
        self
    }

    /// Parse options from a TOML document
    ///
    /// Missing keys keep their default value.
    #[cfg(feature = "std")]
    pub fn from_toml_str(content: &str) -> core::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
