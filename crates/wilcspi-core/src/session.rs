//! Bus session
//!
//! A [`BusSession`] owns one transport together with the configuration
//! negotiated with the chip. It starts [`SessionState::Uninitialized`];
//! [`BusSession::init`] negotiates checksum mode and packet size, reads the
//! chip id and moves it to [`SessionState::Ready`]. Every other operation
//! requires a ready session.
//!
//! All operations take `&mut self`: one session serializes access to its
//! bus and holds no global state.

use crate::config::{BusConfig, SessionOptions};
use crate::error::{Error, Result};
use crate::interrupt::InterruptStatusAggregator;
use crate::protocol::command::MAX_ADDRESS;
use crate::protocol::{Opcode, NUM_DATA_BYTES};
use crate::register::RegisterAccess;
use crate::regs::{
    CHIP_ID, INTR2_ENABLE, INTR_ENABLE, INTR_ENABLE_BASIC_BIT, INTR_ENABLE_LINE_SHIFT,
    MAX_NUM_INT, PIN_MUX_0, PIN_MUX_IRQ_BIT, PRIMARY_INTR_LINES, SPI_PROTOCOL_CRC_MASK,
    SPI_PROTOCOL_OFFSET, SPI_PROTOCOL_PKT_SZ_8K, SPI_PROTOCOL_PKT_SZ_MASK,
};
use crate::transfer::Orchestrator;
use crate::transport::BusTransport;

/// Largest block transfer expressible by the extended DMA opcodes
pub const MAX_BLOCK_LEN: usize = MAX_ADDRESS as usize;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing negotiated yet
    Uninitialized,
    /// Checksum mode and packet size negotiated, chip id known
    Ready,
}

/// One WILC chip on one bus
pub struct BusSession<B: BusTransport> {
    bus: B,
    config: BusConfig,
    options: SessionOptions,
    state: SessionState,
    chip_id: Option<u32>,
}

impl<B: BusTransport> BusSession<B> {
    /// Create an uninitialized session over `bus`
    pub fn new(bus: B, options: SessionOptions) -> Self {
        Self {
            bus,
            config: initial_config(&options),
            options,
            state: SessionState::Uninitialized,
            chip_id: None,
        }
    }

    /// Negotiated configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Options the session was created with
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Chip id read by the last successful [`init`](Self::init)
    pub fn chip_id(&self) -> Option<u32> {
        self.chip_id
    }

    /// Borrow the transport
    pub fn transport(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consume the session and return the transport
    pub fn into_inner(self) -> B {
        self.bus
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Uninitialized => Err(Error::NotReady),
        }
    }

    /// Register access with the caller-facing byte order
    fn registers(&mut self) -> RegisterAccess<'_, B> {
        RegisterAccess::new(&mut self.bus, &self.config, &self.options)
    }

    /// Register access with values as they are on the chip
    fn raw_registers(&mut self) -> RegisterAccess<'_, B> {
        RegisterAccess::new(&mut self.bus, &self.config, &self.options).without_swap()
    }

    fn interrupts(&mut self) -> InterruptStatusAggregator<'_, B> {
        InterruptStatusAggregator::new(&mut self.bus, &self.config, &self.options)
    }

    fn orchestrator(&mut self) -> Orchestrator<'_, B> {
        Orchestrator::new(&mut self.bus, &self.config, &self.options)
    }

    /// Negotiate the bus configuration and read the chip id
    ///
    /// The chip comes out of reset expecting checksums, but may still be
    /// running without them from an earlier session, so a failed first read
    /// is retried with checksums off. Checksums are then disabled on the chip
    /// and 8 KiB data packets selected. On a session that is already ready
    /// only the chip id is read again.
    pub fn init(&mut self) -> Result<()> {
        if self.state == SessionState::Ready {
            let id = self.raw_registers().read_register(CHIP_ID).map_err(|e| {
                log::error!("Fail cmd read chip id...");
                e
            })?;
            self.chip_id = Some(id);
            return Ok(());
        }

        if !self.bus.init() {
            log::error!("Failed to initialize the bus transport");
            return Err(Error::BusTransportFailure);
        }

        self.config = initial_config(&self.options);

        let reg = match self.raw_registers().internal_read(SPI_PROTOCOL_OFFSET) {
            Ok(reg) => reg,
            Err(e) => {
                log::warn!("Failed read with CRC on ({}), retrying with CRC off", e);
                self.config.checksum_enabled = false;
                self.raw_registers()
                    .internal_read(SPI_PROTOCOL_OFFSET)
                    .map_err(|e| {
                        log::error!("Failed internal read protocol");
                        e
                    })?
            }
        };
        log::debug!("spi protocol register: {:08X}", reg);

        let reg = (reg & !SPI_PROTOCOL_CRC_MASK & !SPI_PROTOCOL_PKT_SZ_MASK)
            | SPI_PROTOCOL_PKT_SZ_8K;
        self.raw_registers()
            .internal_write(SPI_PROTOCOL_OFFSET, reg)
            .map_err(|e| {
                log::error!("[wilc spi]: Failed internal write protocol reg");
                e
            })?;
        self.config.checksum_enabled = false;

        let id = self.raw_registers().read_register(CHIP_ID).map_err(|e| {
            log::error!("Fail cmd read chip id...");
            e
        })?;

        self.chip_id = Some(id);
        self.config.protocol_capability = self.options.protocol_capability;
        self.state = SessionState::Ready;
        log::info!(
            "WILC chip id 0x{:08X}, {:?} interrupts",
            id,
            self.config.protocol_capability
        );

        Ok(())
    }

    /// Release the transport and return to the uninitialized state
    pub fn deinit(&mut self) {
        self.bus.deinit();
        self.config = initial_config(&self.options);
        self.state = SessionState::Uninitialized;
        self.chip_id = None;
    }

    /// Send the Reset control command
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.orchestrator().control(Opcode::Reset).map_err(|e| {
            log::error!("Failed cmd reset");
            e
        })
    }

    /// Read a chip register
    pub fn read_register(&mut self, address: u32) -> Result<u32> {
        self.ensure_ready()?;
        self.registers().read_register(address)
    }

    /// Write a chip register
    pub fn write_register(&mut self, address: u32, value: u32) -> Result<()> {
        self.ensure_ready()?;
        self.registers().write_register(address, value)
    }

    /// Read `buf.len()` bytes of chip memory
    ///
    /// Transfers of four bytes or less must use the register operations.
    pub fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_ready()?;
        check_block_len(buf.len())?;
        self.orchestrator()
            .read_block(Opcode::DmaExtRead, address, buf)
            .map_err(|e| {
                log::error!("Failed block read, addr {:08X} len {}", address, buf.len());
                e
            })
    }

    /// Write `data` to chip memory
    ///
    /// Transfers of four bytes or less must use the register operations.
    pub fn write_block(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        check_block_len(data.len())?;
        self.orchestrator()
            .write_block(Opcode::DmaExtWrite, address, data)
            .map_err(|e| {
                log::error!("Failed block write, addr {:08X} len {}", address, data.len());
                e
            })
    }

    /// Route interrupts to the SPI interrupt pin with the basic enable bit
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_ready()?;
        let mut regs = self.raw_registers();
        regs.set_bits(PIN_MUX_0, PIN_MUX_IRQ_BIT)?;
        regs.set_bits(INTR_ENABLE, INTR_ENABLE_BASIC_BIT)
    }

    /// Enable `lines` interrupt lines and route them to the interrupt pin
    pub fn sync_interrupt_lines(&mut self, lines: u8) -> Result<()> {
        if lines > MAX_NUM_INT {
            log::error!("Too many interrupts ({} > {})", lines, MAX_NUM_INT);
            return Err(Error::InvalidArgument);
        }
        self.ensure_ready()?;
        self.config.interrupt_line_count = lines;

        let mut regs = self.raw_registers();
        regs.set_bits(PIN_MUX_0, PIN_MUX_IRQ_BIT)?;

        let primary = lines.min(PRIMARY_INTR_LINES);
        regs.set_bits(INTR_ENABLE, primary_enable_bits(primary))?;

        if lines > PRIMARY_INTR_LINES {
            regs.set_bits(INTR2_ENABLE, secondary_enable_bits(lines - PRIMARY_INTR_LINES))?;
        }

        Ok(())
    }

    /// Read the aggregated interrupt status word
    pub fn read_interrupt_status(&mut self) -> Result<u32> {
        self.ensure_ready()?;
        self.interrupts().read_status()
    }

    /// Acknowledge interrupts (line bits plus
    /// [`InterruptControl`](crate::interrupt::InterruptControl) flags)
    pub fn clear_interrupts(&mut self, mask: u32) -> Result<()> {
        self.ensure_ready()?;
        self.interrupts().clear(mask)
    }

    /// Read the pending DMA word count
    pub fn read_size(&mut self) -> Result<u32> {
        self.ensure_ready()?;
        self.interrupts().read_size()
    }

    /// Clear the host RX interrupt
    pub fn clear_rx_interrupt(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.interrupts().clear_rx_interrupt()
    }
}

fn initial_config(options: &SessionOptions) -> BusConfig {
    BusConfig {
        swap_bytes: options.swap_bytes,
        ..BusConfig::default()
    }
}

fn check_block_len(len: usize) -> Result<()> {
    if len <= NUM_DATA_BYTES || len > MAX_BLOCK_LEN {
        log::error!("Invalid block length {}", len);
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// Primary enable register bits for the first `lines` lines
pub fn primary_enable_bits(lines: u8) -> u32 {
    (0..u32::from(lines.min(PRIMARY_INTR_LINES)))
        .fold(0, |acc, i| acc | 1 << (INTR_ENABLE_LINE_SHIFT + i))
}

/// Secondary enable register bits for `lines` lines past the fifth
pub fn secondary_enable_bits(lines: u8) -> u32 {
    (0..u32::from(lines)).fold(0, |acc, i| acc | 1 << i)
}
