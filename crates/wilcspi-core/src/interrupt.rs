//! Interrupt status aggregation
//!
//! The chip reports pending interrupts together with the size of data it
//! wants to hand to the host. The status word presented to callers is the
//! same for both register layouts:
//!
//! ```text
//!  31      24 23            16 15                     0
//! +----------+----------------+-----------------------+
//! |    0     | line flags 7:0 | DMA word count        |
//! +----------+----------------+-----------------------+
//! ```
//!
//! With [`ProtocolCapability::ThroughputEnhanced`] the chip builds this word
//! itself in one internal register. The legacy layout spreads it over the
//! VMM size register and two flag registers.

use bitflags::bitflags;

use crate::config::{BusConfig, ProtocolCapability, SessionOptions};
use crate::error::Result;
use crate::protocol::RetryBudget;
use crate::register::RegisterAccess;
use crate::regs::{
    ENH_IRQ_CLEAR_OFFSET, ENH_IRQ_STATUS_OFFSET, HOST_RX_CTRL_0, IRQ_DMA_WD_CNT_MASK,
    IRQ_FLAGS_OFFSET, LEGACY_IRQ_CLEAR_BASE, LEGACY_IRQ_FLAGS_0, LEGACY_IRQ_FLAGS_1,
    MAX_NUM_INT, PRIMARY_INTR_LINES, VMM_CORE_CTL, VMM_TBL_CTL, VMM_TO_HOST_SIZE,
};
use crate::transport::BusTransport;

bitflags! {
    /// Control bits accepted by [`InterruptStatusAggregator::clear`] next
    /// to the interrupt line bits 0..8
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptControl: u32 {
        /// Select VMM table 0
        const SEL_VMM_TBL0 = 1 << MAX_NUM_INT;
        /// Select VMM table 1
        const SEL_VMM_TBL1 = 1 << (MAX_NUM_INT + 1);
        /// Kick the VMM core
        const EN_VMM = 1 << (MAX_NUM_INT + 2);
    }
}

/// Mask of the interrupt line bits of a clear request
pub const LINE_MASK: u32 = (1 << MAX_NUM_INT) - 1;

/// Mask of the first `lines` interrupt lines
pub fn active_line_mask(lines: u8) -> u32 {
    (1u32 << lines.min(MAX_NUM_INT)) - 1
}

/// Line flags of `status` that do not belong to an active line
pub fn unexpected_flags(status: u32, lines: u8) -> u32 {
    (status >> IRQ_FLAGS_OFFSET) & !active_line_mask(lines)
}

/// Assemble the status word from the legacy registers
///
/// `flags_1` is only consulted when more than five lines are active.
pub fn legacy_status(to_host_size: u32, flags_0: u32, flags_1: u32, lines: u8) -> u32 {
    let mut status = (to_host_size >> 2) & IRQ_DMA_WD_CNT_MASK;
    status |= (flags_0 >> 27) << IRQ_FLAGS_OFFSET;
    if lines > PRIMARY_INTR_LINES {
        status |= (flags_1 & 0x7) << (IRQ_FLAGS_OFFSET + PRIMARY_INTR_LINES as u32);
    }
    status
}

/// VMM table control word selected by a clear request
pub fn vmm_table_select(control: InterruptControl) -> u32 {
    let mut tbl = 0;
    if control.contains(InterruptControl::SEL_VMM_TBL0) {
        tbl |= 1 << 0;
    }
    if control.contains(InterruptControl::SEL_VMM_TBL1) {
        tbl |= 1 << 1;
    }
    tbl
}

/// Reads and clears interrupt status for the negotiated layout
pub struct InterruptStatusAggregator<'a, B: BusTransport + ?Sized> {
    regs: RegisterAccess<'a, B>,
    lines: u8,
    capability: ProtocolCapability,
    anomaly_budget: u16,
}

impl<'a, B: BusTransport + ?Sized> InterruptStatusAggregator<'a, B> {
    /// Create an aggregator for the session's configuration
    pub fn new(bus: &'a mut B, config: &'a BusConfig, options: &'a SessionOptions) -> Self {
        Self {
            regs: RegisterAccess::new(bus, config, options).without_swap(),
            lines: config.interrupt_line_count,
            capability: config.protocol_capability,
            anomaly_budget: options.irq_anomaly_budget,
        }
    }

    /// Read the aggregated status word
    pub fn read_status(&mut self) -> Result<u32> {
        match self.capability {
            ProtocolCapability::ThroughputEnhanced => self.regs.internal_read(ENH_IRQ_STATUS_OFFSET),
            ProtocolCapability::Legacy => self.read_legacy_status(),
        }
    }

    /// Read the pending DMA word count
    pub fn read_size(&mut self) -> Result<u32> {
        match self.capability {
            ProtocolCapability::ThroughputEnhanced => Ok(self
                .regs
                .internal_read(ENH_IRQ_STATUS_OFFSET)?
                & IRQ_DMA_WD_CNT_MASK),
            ProtocolCapability::Legacy => {
                let size = self.regs.read_register(VMM_TO_HOST_SIZE)?;
                Ok((size >> 2) & IRQ_DMA_WD_CNT_MASK)
            }
        }
    }

    /// Acknowledge interrupts
    ///
    /// Bits 0..8 of `mask` select interrupt lines, the bits above are
    /// [`InterruptControl`] flags.
    pub fn clear(&mut self, mask: u32) -> Result<()> {
        match self.capability {
            ProtocolCapability::ThroughputEnhanced => {
                self.regs.internal_write(ENH_IRQ_CLEAR_OFFSET, mask)
            }
            ProtocolCapability::Legacy => self.clear_legacy(mask),
        }
    }

    /// Clear the host RX interrupt
    pub fn clear_rx_interrupt(&mut self) -> Result<()> {
        let reg = self.regs.read_register(HOST_RX_CTRL_0)?;
        self.regs.write_register(HOST_RX_CTRL_0, reg & !0x1)
    }

    fn legacy_snapshot(&mut self) -> Result<u32> {
        let size = self.regs.read_register(VMM_TO_HOST_SIZE)?;
        let flags_0 = self.regs.read_register(LEGACY_IRQ_FLAGS_0)?;
        let flags_1 = if self.lines > PRIMARY_INTR_LINES {
            self.regs.read_register(LEGACY_IRQ_FLAGS_1)?
        } else {
            0
        };
        Ok(legacy_status(size, flags_0, flags_1, self.lines))
    }

    fn read_legacy_status(&mut self) -> Result<u32> {
        let mut budget = RetryBudget::new(self.anomaly_budget);
        loop {
            let status = self.legacy_snapshot()?;
            let unexpected = unexpected_flags(status, self.lines);
            if unexpected == 0 {
                return Ok(status);
            }

            log::warn!(
                "Unexpected interrupt(2): status={:08X}, lines={}, unknown flags={:02X}",
                status,
                self.lines,
                unexpected
            );
            if !budget.try_consume() {
                log::warn!("Unexpected interrupt flags persist, returning {:08X}", status);
                return Ok(status);
            }
        }
    }

    fn clear_legacy(&mut self, mask: u32) -> Result<()> {
        let lines = mask & LINE_MASK;

        for i in 0..self.lines.min(MAX_NUM_INT) {
            if lines & (1 << i) != 0 {
                self.regs
                    .write_register(LEGACY_IRQ_CLEAR_BASE + 4 * u32::from(i), 1)?;
            }
        }

        let stray = lines & !active_line_mask(self.lines);
        if stray != 0 {
            log::warn!(
                "Unexpected interrupt cleared: {:02X} (lines={})",
                stray,
                self.lines
            );
        }

        let control = InterruptControl::from_bits_truncate(mask);
        self.regs.write_register(VMM_TBL_CTL, vmm_table_select(control))?;

        if control.contains(InterruptControl::EN_VMM) {
            self.regs.write_register(VMM_CORE_CTL, 1)?;
        }

        Ok(())
    }
}
