//! WILC register map
//!
//! Addresses, offsets and bit positions used by the bus layer. These are
//! chip constants, not protocol behavior.

/// Registers below this address are clockless and only reachable through
/// the internal read/write opcodes
pub const CLOCKLESS_THRESHOLD: u32 = 0x30;

/// Base address of the SPI slave register block
pub const SPI_REG_BASE: u32 = 0xE800;
/// SPI protocol configuration register (internal offset)
pub const SPI_PROTOCOL_OFFSET: u32 = 0xE824 - SPI_REG_BASE;
/// Checksum enable bits of the protocol configuration register
pub const SPI_PROTOCOL_CRC_MASK: u32 = 0x0C;
/// Data packet size field of the protocol configuration register
pub const SPI_PROTOCOL_PKT_SZ_MASK: u32 = 0x70;
/// Packet size field value selecting 8 KiB data packets
pub const SPI_PROTOCOL_PKT_SZ_8K: u32 = 0x5 << 4;

/// Chip identification register
pub const CHIP_ID: u32 = 0x3B_0000;

/// Peripheral register base
pub const PERIPH_REG_BASE: u32 = 0x1000;
/// Host RX control 0
pub const HOST_RX_CTRL_0: u32 = PERIPH_REG_BASE + 0x70;
/// Pin mux 0
pub const PIN_MUX_0: u32 = PERIPH_REG_BASE + 0x408;
/// Pin mux bit routing interrupts to the SPI interrupt line
pub const PIN_MUX_IRQ_BIT: u32 = 1 << 8;

/// Interrupt controller base
pub const INTR_REG_BASE: u32 = PERIPH_REG_BASE + 0xA00;
/// Primary interrupt enable register
pub const INTR_ENABLE: u32 = INTR_REG_BASE;
/// Secondary interrupt enable register (lines beyond the fifth)
pub const INTR2_ENABLE: u32 = INTR_REG_BASE + 4;
/// Interrupt enable bit used by the single-line sync
pub const INTR_ENABLE_BASIC_BIT: u32 = 1 << 16;
/// First enable bit of the primary register for interrupt lines
pub const INTR_ENABLE_LINE_SHIFT: u32 = 27;
/// Number of lines enabled through the primary register
pub const PRIMARY_INTR_LINES: u8 = 5;

/// Legacy interrupt flag registers
pub const LEGACY_IRQ_FLAGS_0: u32 = 0x1A90;
/// Flags for lines 5.. when more than five lines are active
pub const LEGACY_IRQ_FLAGS_1: u32 = 0x1A94;
/// Legacy per-line interrupt clear registers, one word per line
pub const LEGACY_IRQ_CLEAR_BASE: u32 = 0x10C8;

/// VMM register block
pub const VMM_BASE: u32 = 0x15_0000;
/// VMM core control
pub const VMM_CORE_CTL: u32 = VMM_BASE;
/// VMM table control
pub const VMM_TBL_CTL: u32 = VMM_BASE + 0x4;
/// Bytes pending from chip to host
pub const VMM_TO_HOST_SIZE: u32 = VMM_BASE + 0x10;

/// Throughput-enhanced interrupt status (internal offset)
pub const ENH_IRQ_STATUS_OFFSET: u32 = 0xE840 - SPI_REG_BASE;
/// Throughput-enhanced interrupt clear (internal offset)
pub const ENH_IRQ_CLEAR_OFFSET: u32 = 0xE844 - SPI_REG_BASE;

/// Bit position of the interrupt flags in an aggregated status word
pub const IRQ_FLAGS_OFFSET: u32 = 16;
/// Mask of the DMA word count in an aggregated status word
pub const IRQ_DMA_WD_CNT_MASK: u32 = (1 << IRQ_FLAGS_OFFSET) - 1;
/// Maximum number of interrupt lines
pub const MAX_NUM_INT: u8 = 8;
