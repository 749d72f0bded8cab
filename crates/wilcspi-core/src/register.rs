//! 32-bit register access
//!
//! Registers below [`CLOCKLESS_THRESHOLD`] live in the clockless domain and
//! are only reachable through the internal opcodes with the clockless bit
//! set; everything else goes through the single read/write opcodes. The SPI
//! slave's own registers are addressed by offset through
//! [`RegisterAccess::internal_read`] and [`RegisterAccess::internal_write`].

use crate::config::{BusConfig, SessionOptions};
use crate::endian::{decode_payload, host_to_wire, wire_to_host};
use crate::error::Result;
use crate::protocol::Opcode;
use crate::regs::CLOCKLESS_THRESHOLD;
use crate::transfer::Orchestrator;
use crate::transport::BusTransport;

/// Register reads and writes over one transport
pub struct RegisterAccess<'a, B: BusTransport + ?Sized> {
    orch: Orchestrator<'a, B>,
    swap_bytes: bool,
}

impl<'a, B: BusTransport + ?Sized> RegisterAccess<'a, B> {
    /// Create a register accessor honoring `config.swap_bytes`
    pub fn new(bus: &'a mut B, config: &'a BusConfig, options: &'a SessionOptions) -> Self {
        Self {
            orch: Orchestrator::new(bus, config, options),
            swap_bytes: config.swap_bytes,
        }
    }

    /// Return values exactly as decoded from the wire
    pub fn without_swap(mut self) -> Self {
        self.swap_bytes = false;
        self
    }

    /// Read a chip register
    pub fn read_register(&mut self, address: u32) -> Result<u32> {
        let (opcode, clockless) = read_route(address);
        let word = self
            .orch
            .read_word(opcode, address, clockless)
            .map_err(|e| {
                log::error!("Failed cmd, read reg ({:08X}): {}", address, e);
                e
            })?;
        Ok(wire_to_host(decode_payload(word), self.swap_bytes))
    }

    /// Write a chip register
    pub fn write_register(&mut self, address: u32, value: u32) -> Result<()> {
        let (opcode, clockless) = write_route(address);
        self.orch
            .write_word(opcode, address, host_to_wire(value, self.swap_bytes), clockless)
            .map_err(|e| {
                log::error!("Failed cmd, write reg ({:08X}): {}", address, e);
                e
            })
    }

    /// Read a register of the SPI slave block by offset
    pub fn internal_read(&mut self, offset: u32) -> Result<u32> {
        let word = self
            .orch
            .read_word(Opcode::InternalRead, offset, false)
            .map_err(|e| {
                log::error!("Failed internal read cmd ({:04X}): {}", offset, e);
                e
            })?;
        Ok(wire_to_host(decode_payload(word), self.swap_bytes))
    }

    /// Write a register of the SPI slave block by offset
    pub fn internal_write(&mut self, offset: u32, value: u32) -> Result<()> {
        self.orch
            .write_word(
                Opcode::InternalWrite,
                offset,
                host_to_wire(value, self.swap_bytes),
                false,
            )
            .map_err(|e| {
                log::error!("Failed internal write cmd ({:04X}): {}", offset, e);
                e
            })
    }

    /// Read-modify-write setting `bits`
    pub fn set_bits(&mut self, address: u32, bits: u32) -> Result<()> {
        let value = self.read_register(address)?;
        self.write_register(address, value | bits)
    }
}

/// Opcode and clockless flag used to read `address`
pub fn read_route(address: u32) -> (Opcode, bool) {
    if address < CLOCKLESS_THRESHOLD {
        (Opcode::InternalRead, true)
    } else {
        (Opcode::SingleRead, false)
    }
}

/// Opcode and clockless flag used to write `address`
pub fn write_route(address: u32) -> (Opcode, bool) {
    if address < CLOCKLESS_THRESHOLD {
        (Opcode::InternalWrite, true)
    } else {
        (Opcode::SingleWrite, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clockless_routing() {
        assert_eq!(read_route(0x0), (Opcode::InternalRead, true));
        assert_eq!(read_route(0x2F), (Opcode::InternalRead, true));
        assert_eq!(read_route(0x30), (Opcode::SingleRead, false));
        assert_eq!(read_route(0x3B_0000), (Opcode::SingleRead, false));
        assert_eq!(write_route(0x10), (Opcode::InternalWrite, true));
        assert_eq!(write_route(0x1408), (Opcode::SingleWrite, false));
    }
}
