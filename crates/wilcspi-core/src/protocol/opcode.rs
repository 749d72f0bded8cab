//! Protocol opcodes and their frame layouts

use crate::error::Error;

use super::{NUM_CRC_BYTES, NUM_DATA_BYTES, NUM_DATA_HDR_BYTES, NUM_DUMMY_BYTES};
use super::{NUM_RSP_BYTES, NUM_SKIP_BYTES};

/// Command opcodes understood by the chip's SPI slave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// DMA write, 16-bit size
    DmaWrite = 0xC1,
    /// DMA read, 16-bit size
    DmaRead = 0xC2,
    /// Internal (SPI slave) register write
    InternalWrite = 0xC3,
    /// Internal (SPI slave) register read
    InternalRead = 0xC4,
    /// Terminate the current transfer
    Terminate = 0xC5,
    /// Repeat the last transfer
    Repeat = 0xC6,
    /// DMA write, 24-bit size
    DmaExtWrite = 0xC7,
    /// DMA read, 24-bit size
    DmaExtRead = 0xC8,
    /// Single 32-bit word write
    SingleWrite = 0xC9,
    /// Single 32-bit word read
    SingleRead = 0xCA,
    /// Reset the SPI slave
    Reset = 0xCF,
}

/// What an opcode does with data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No data at all; the response is preceded by one skipped byte
    Control,
    /// One 32-bit word returned in the data phase
    RegisterRead,
    /// One 32-bit word carried in the command header
    RegisterWrite,
    /// Variable-length data returned in packets
    BlockRead,
    /// Variable-length data sent in packets after the response
    BlockWrite,
}

/// Fixed frame layout of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Command length including the checksum byte
    pub header_len: usize,
    /// Data access class
    pub access: Access,
    /// Width of the size field in bytes (0 when the opcode has none)
    pub size_bytes: u8,
}

impl FrameLayout {
    /// Command length on the wire for the given checksum mode
    pub const fn command_len(&self, checksum_enabled: bool) -> usize {
        if checksum_enabled {
            self.header_len
        } else {
            self.header_len - 1
        }
    }

    /// Returns true for Reset, Terminate and Repeat
    pub const fn is_control_only(&self) -> bool {
        matches!(self.access, Access::Control)
    }

    /// Returns true if the response carries a data phase
    pub const fn is_read(&self) -> bool {
        matches!(self.access, Access::RegisterRead | Access::BlockRead)
    }

    /// Returns true if the opcode moves data in either direction
    pub const fn has_data_phase(&self) -> bool {
        matches!(
            self.access,
            Access::RegisterRead | Access::BlockRead | Access::BlockWrite
        )
    }

    /// Bytes clocked in after the command in a combined exchange
    pub const fn combined_response_len(&self, checksum_enabled: bool) -> usize {
        match self.access {
            Access::Control => NUM_SKIP_BYTES + NUM_RSP_BYTES + NUM_DUMMY_BYTES,
            Access::RegisterRead => {
                let crc = if checksum_enabled { NUM_CRC_BYTES } else { 0 };
                NUM_RSP_BYTES + NUM_DATA_HDR_BYTES + NUM_DATA_BYTES + crc + NUM_DUMMY_BYTES
            }
            _ => NUM_RSP_BYTES + NUM_DUMMY_BYTES,
        }
    }

    /// Largest size the opcode can express
    pub const fn max_size(&self) -> u32 {
        match self.size_bytes {
            0 => 0,
            2 => 0xFFFF,
            _ => 0xFF_FFFF,
        }
    }
}

impl Opcode {
    /// All opcodes of the protocol
    pub const ALL: [Opcode; 11] = [
        Opcode::DmaWrite,
        Opcode::DmaRead,
        Opcode::InternalWrite,
        Opcode::InternalRead,
        Opcode::Terminate,
        Opcode::Repeat,
        Opcode::DmaExtWrite,
        Opcode::DmaExtRead,
        Opcode::SingleWrite,
        Opcode::SingleRead,
        Opcode::Reset,
    ];

    /// Wire value of the opcode
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Frame layout of the opcode
    pub const fn layout(self) -> FrameLayout {
        let (header_len, access, size_bytes) = match self {
            Opcode::SingleRead => (5, Access::RegisterRead, 0),
            Opcode::InternalRead => (5, Access::RegisterRead, 0),
            Opcode::SingleWrite => (9, Access::RegisterWrite, 0),
            Opcode::InternalWrite => (8, Access::RegisterWrite, 0),
            Opcode::DmaRead => (7, Access::BlockRead, 2),
            Opcode::DmaWrite => (7, Access::BlockWrite, 2),
            Opcode::DmaExtRead => (8, Access::BlockRead, 3),
            Opcode::DmaExtWrite => (8, Access::BlockWrite, 3),
            Opcode::Reset | Opcode::Terminate | Opcode::Repeat => (5, Access::Control, 0),
        };
        FrameLayout {
            header_len,
            access,
            size_bytes,
        }
    }

    /// Returns true for the internal (clockless capable) register opcodes
    pub const fn is_internal(self) -> bool {
        matches!(self, Opcode::InternalRead | Opcode::InternalWrite)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.as_u8() == value)
            .ok_or(Error::UnsupportedOpcode(value))
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op.as_u8()
    }
}
