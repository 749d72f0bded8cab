//! Command frame encoding

use crate::crc7::command_checksum;
use crate::error::{Error, Result};

use super::buffer::FrameBuf;
use super::opcode::{Access, Opcode};

/// Highest address expressible in a command
pub const MAX_ADDRESS: u32 = 0xFF_FFFF;
/// Highest internal register offset (the top bit of its high byte carries
/// the clockless flag)
pub const MAX_INTERNAL_ADDRESS: u32 = 0x7FFF;

/// Clockless flag in the first address byte of internal commands
const CLOCKLESS_BIT: u8 = 1 << 7;

/// One command to the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    /// Opcode
    pub opcode: Opcode,
    /// Register or memory address (24 bits, 15 bits for internal opcodes)
    pub address: u32,
    /// Data word for register writes
    pub data: u32,
    /// Transfer size for DMA opcodes
    pub size: u32,
    /// Address a clockless register (internal opcodes only)
    pub clockless: bool,
}

impl CommandFrame {
    /// Create a frame with no data and no size
    pub fn new(opcode: Opcode, address: u32) -> Self {
        Self {
            opcode,
            address,
            data: 0,
            size: 0,
            clockless: false,
        }
    }

    /// Create a control frame (Reset, Terminate, Repeat)
    pub fn control(opcode: Opcode) -> Self {
        Self::new(opcode, 0)
    }

    /// Set the data word
    pub fn with_data(mut self, data: u32) -> Self {
        self.data = data;
        self
    }

    /// Set the transfer size
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Set the clockless flag
    pub fn with_clockless(mut self, clockless: bool) -> Self {
        self.clockless = clockless;
        self
    }

    fn validate(&self) -> Result<()> {
        let layout = self.opcode.layout();
        let addr_limit = if self.opcode.is_internal() {
            MAX_INTERNAL_ADDRESS
        } else {
            MAX_ADDRESS
        };
        if layout.access != Access::Control && self.address > addr_limit {
            log::error!(
                "{:?}: address 0x{:X} exceeds 0x{:X}",
                self.opcode,
                self.address,
                addr_limit
            );
            return Err(Error::InvalidArgument);
        }
        if layout.size_bytes > 0 && self.size > layout.max_size() {
            log::error!(
                "{:?}: size {} exceeds {}",
                self.opcode,
                self.size,
                layout.max_size()
            );
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Serialize the frame
    ///
    /// With `checksum_enabled` the last byte is the CRC-7 of all preceding
    /// bytes; without it the frame is one byte shorter.
    pub fn encode(&self, checksum_enabled: bool) -> Result<FrameBuf> {
        self.validate()?;

        let mut buf = FrameBuf::new();
        let adr = self.address;
        let internal_hi = |clockless: bool| {
            let hi = (adr >> 8) as u8;
            if clockless {
                hi | CLOCKLESS_BIT
            } else {
                hi
            }
        };

        buf.push(self.opcode.as_u8())?;
        match self.opcode {
            Opcode::SingleRead => {
                buf.extend_from_slice(&adr.to_be_bytes()[1..])?;
            }
            Opcode::InternalRead => {
                buf.extend_from_slice(&[internal_hi(self.clockless), adr as u8, 0x00])?;
            }
            Opcode::InternalWrite => {
                buf.extend_from_slice(&[internal_hi(self.clockless), adr as u8])?;
                buf.extend_from_slice(&self.data.to_be_bytes())?;
            }
            Opcode::SingleWrite => {
                buf.extend_from_slice(&adr.to_be_bytes()[1..])?;
                buf.extend_from_slice(&self.data.to_be_bytes())?;
            }
            Opcode::Reset => {
                buf.extend_from_slice(&[0xFF; 3])?;
            }
            Opcode::Terminate | Opcode::Repeat => {
                buf.extend_from_slice(&[0x00; 3])?;
            }
            Opcode::DmaRead | Opcode::DmaWrite => {
                buf.extend_from_slice(&adr.to_be_bytes()[1..])?;
                buf.extend_from_slice(&self.size.to_be_bytes()[2..])?;
            }
            Opcode::DmaExtRead | Opcode::DmaExtWrite => {
                buf.extend_from_slice(&adr.to_be_bytes()[1..])?;
                buf.extend_from_slice(&self.size.to_be_bytes()[1..])?;
            }
        }

        debug_assert_eq!(buf.len() + 1, self.opcode.layout().header_len);

        if checksum_enabled {
            let crc = command_checksum(&buf);
            buf.push(crc)?;
        }

        Ok(buf)
    }
}

/// Serialize one command from raw parts
///
/// `opcode` is the raw wire byte; anything outside the protocol's opcode
/// set fails with [`Error::UnsupportedOpcode`].
pub fn serialize(
    opcode: u8,
    address: u32,
    data: u32,
    size: u32,
    clockless: bool,
    checksum_enabled: bool,
) -> Result<FrameBuf> {
    let opcode = Opcode::try_from(opcode)?;
    CommandFrame::new(opcode, address)
        .with_data(data)
        .with_size(size)
        .with_clockless(clockless)
        .encode(checksum_enabled)
}
