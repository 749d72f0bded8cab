//! wilcspi-dummy - In-memory WILC SPI slave emulator for testing
//!
//! [`DummyChip`] implements [`BusTransport`] by emulating the chip's SPI
//! slave byte by byte. Every byte clocked in is parsed as part of a command
//! or a data block, and every byte clocked out comes from a response queue
//! filled when a command completes. The first response byte is therefore the
//! one clocked right after the last command byte, as on the real bus.
//!
//! Each transport call models one chip-select assertion: a command still
//! incomplete at the end of a call is dropped, and bytes following a
//! completed command in the same call are ignored.
//!
//! The emulator keeps:
//!
//! - a sparse byte memory shared by registers (little-endian words) and DMA
//! - the SPI slave's internal register file, whose protocol register drives
//!   the emulator's own checksum mode and packet size
//! - a log of every accepted command
//!
//! Test hooks can script register read sequences, fail the transport after
//! a number of calls, delay the data-response markers and force a nonzero
//! state byte.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use wilcspi_core::crc7::command_checksum;
use wilcspi_core::protocol::{plan, Access, Opcode, DATA_MARKER_NIBBLE, MAX_PACKET_SIZE};
use wilcspi_core::regs::{
    CHIP_ID, SPI_PROTOCOL_CRC_MASK, SPI_PROTOCOL_OFFSET, SPI_PROTOCOL_PKT_SZ_MASK,
};
use wilcspi_core::transport::BusTransport;

#[cfg(test)]
mod tests;

/// Chip id reported by default (WILC3000, revision D0)
pub const DEFAULT_CHIP_ID: u32 = 0x0030_00D0;

/// Protocol register after reset: checksums on, 1 KiB data packets
pub const PROTOCOL_RESET_VALUE: u32 = 0x2C;

/// Byte clocked out when the response queue is empty
pub const IDLE_FILL: u8 = 0x00;

/// Placeholder checksum appended to read data blocks
///
/// The host consumes data block checksums without checking them.
pub const DATA_CRC_FILL: [u8; 2] = [0xA5, 0x5A];

/// Configuration for the emulated chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyConfig {
    /// Value of the chip id register
    pub chip_id: u32,
    /// Initial value of the SPI protocol register
    pub protocol_reg: u32,
    /// Data packet size; derived from the protocol register when unset
    pub packet_size: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            chip_id: DEFAULT_CHIP_ID,
            protocol_reg: PROTOCOL_RESET_VALUE,
            packet_size: None,
        }
    }
}

impl DummyConfig {
    /// Set the initial checksum mode
    pub fn with_checksum(mut self, enabled: bool) -> Self {
        if enabled {
            self.protocol_reg |= SPI_PROTOCOL_CRC_MASK;
        } else {
            self.protocol_reg &= !SPI_PROTOCOL_CRC_MASK;
        }
        self
    }

    /// Use a fixed data packet size
    pub fn with_packet_size(mut self, size: usize) -> Self {
        self.packet_size = Some(size);
        self
    }

    /// Set the chip id
    pub fn with_chip_id(mut self, id: u32) -> Self {
        self.chip_id = id;
        self
    }
}

/// Errors from parsing emulator options
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum DummyError {
    /// An option value could not be parsed
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Parse `key=value` programmer options
///
/// - `chip_id=0x3000D0` - chip id register value
/// - `checksum=on|off` - initial checksum mode
/// - `packet=<bytes>` - fixed data packet size
#[cfg(feature = "std")]
pub fn parse_options(options: &[(&str, &str)]) -> Result<DummyConfig, DummyError> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "chip_id" => {
                let digits = value.trim_start_matches("0x").trim_start_matches("0X");
                config.chip_id = u32::from_str_radix(digits, 16).map_err(|_| {
                    DummyError::InvalidParameter(format!("invalid chip_id: {}", value))
                })?;
            }
            "checksum" => {
                config = match *value {
                    "on" | "yes" | "1" => config.with_checksum(true),
                    "off" | "no" | "0" => config.with_checksum(false),
                    _ => {
                        return Err(DummyError::InvalidParameter(format!(
                            "invalid checksum: {} (expected on or off)",
                            value
                        )))
                    }
                };
            }
            "packet" => {
                let size: usize = value.parse().map_err(|_| {
                    DummyError::InvalidParameter(format!("invalid packet size: {}", value))
                })?;
                if size == 0 {
                    return Err(DummyError::InvalidParameter(
                        "packet size must be nonzero".into(),
                    ));
                }
                config.packet_size = Some(size);
            }
            _ => {
                log::warn!("dummy: ignoring unknown option {}={}", key, value);
            }
        }
    }

    Ok(config)
}

/// One command accepted by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedCommand {
    /// Opcode
    pub opcode: Opcode,
    /// Address or internal offset
    pub address: u32,
    /// Clockless bit of internal commands
    pub clockless: bool,
    /// Data word of register writes
    pub data: u32,
    /// Transfer size of DMA commands
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStage {
    Tag,
    Payload { left: usize },
    Checksum { left: usize },
}

/// A DMA write waiting for its data blocks
#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    address: u32,
    offset: usize,
    total: usize,
    stage: WriteStage,
}

/// Emulated WILC SPI slave
pub struct DummyChip {
    config: DummyConfig,
    memory: BTreeMap<u32, u8>,
    internal: BTreeMap<u32, u32>,
    scripted: BTreeMap<u32, VecDeque<u32>>,
    output: VecDeque<u8>,
    command: Vec<u8>,
    ignore_rest: bool,
    pending_write: Option<PendingWrite>,
    log: Vec<LoggedCommand>,
    write_tags: Vec<u8>,
    calls: usize,
    fail_after: Option<usize>,
    header_delay: usize,
    forced_state: Option<u8>,
    checksum_errors: usize,
    init_calls: usize,
    deinit_calls: usize,
}

impl DummyChip {
    /// Create an emulated chip
    pub fn new(config: DummyConfig) -> Self {
        let mut chip = Self {
            memory: BTreeMap::new(),
            internal: BTreeMap::new(),
            scripted: BTreeMap::new(),
            output: VecDeque::new(),
            command: Vec::new(),
            ignore_rest: false,
            pending_write: None,
            log: Vec::new(),
            write_tags: Vec::new(),
            calls: 0,
            fail_after: None,
            header_delay: 0,
            forced_state: None,
            checksum_errors: 0,
            init_calls: 0,
            deinit_calls: 0,
            config,
        };
        chip.internal
            .insert(SPI_PROTOCOL_OFFSET, chip.config.protocol_reg);
        chip.poke_word(CHIP_ID, chip.config.chip_id);
        chip
    }

    /// Create an emulated chip with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Returns true if the chip expects command checksums
    pub fn checksum_enabled(&self) -> bool {
        self.internal_reg(SPI_PROTOCOL_OFFSET) & SPI_PROTOCOL_CRC_MASK != 0
    }

    /// Data packet size used for read data and expected for write data
    pub fn packet_size(&self) -> usize {
        if let Some(size) = self.config.packet_size {
            return size;
        }
        let field = (self.internal_reg(SPI_PROTOCOL_OFFSET) & SPI_PROTOCOL_PKT_SZ_MASK) >> 4;
        (256usize << field).min(MAX_PACKET_SIZE)
    }

    /// Read a word of memory (little-endian)
    pub fn peek_word(&self, address: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.peek(address.wrapping_add(i as u32));
        }
        u32::from_le_bytes(bytes)
    }

    /// Write a word of memory (little-endian)
    pub fn poke_word(&mut self, address: u32, value: u32) {
        self.load(address, &value.to_le_bytes());
    }

    /// Read one byte of memory
    pub fn peek(&self, address: u32) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    /// Copy `data` into memory at `address`
    pub fn load(&mut self, address: u32, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.memory.insert(address.wrapping_add(i as u32), b);
        }
    }

    /// Copy `len` bytes of memory starting at `address`
    pub fn dump(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(address.wrapping_add(i as u32)))
            .collect()
    }

    /// Read an internal register of the SPI slave
    pub fn internal_reg(&self, offset: u32) -> u32 {
        self.internal.get(&offset).copied().unwrap_or(0)
    }

    /// Set an internal register of the SPI slave
    pub fn set_internal_reg(&mut self, offset: u32, value: u32) {
        self.internal.insert(offset, value);
    }

    /// Queue values returned by the next register reads of `address`
    ///
    /// Once the queue is drained, reads return memory again.
    pub fn script_reads(&mut self, address: u32, values: &[u32]) {
        self.scripted
            .entry(address)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Fail every transport call after the next `calls` calls
    pub fn fail_after_calls(&mut self, calls: Option<usize>) {
        self.fail_after = calls.map(|n| self.calls + n);
    }

    /// Clock out `bytes` filler bytes before every data-response marker
    pub fn set_header_delay(&mut self, bytes: usize) {
        self.header_delay = bytes;
    }

    /// Answer every command with `state` (no data phase when nonzero)
    pub fn force_state(&mut self, state: Option<u8>) {
        self.forced_state = state;
    }

    /// Commands accepted so far
    pub fn commands(&self) -> &[LoggedCommand] {
        &self.log
    }

    /// Forget the command log
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.write_tags.clear();
    }

    /// Register writes (address, value) in the order they were accepted
    pub fn register_writes(&self) -> Vec<(u32, u32)> {
        self.log
            .iter()
            .filter(|c| c.opcode == Opcode::SingleWrite)
            .map(|c| (c.address, c.data))
            .collect()
    }

    /// Number of register reads of `address`
    pub fn read_count(&self, address: u32) -> usize {
        self.log
            .iter()
            .filter(|c| c.opcode == Opcode::SingleRead && c.address == address)
            .count()
    }

    /// Tag bytes of the data blocks received so far
    pub fn write_tags(&self) -> &[u8] {
        &self.write_tags
    }

    /// Transport calls made so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Commands dropped because of a bad checksum
    pub fn checksum_errors(&self) -> usize {
        self.checksum_errors
    }

    /// Calls of the transport init hook
    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    /// Calls of the transport deinit hook
    pub fn deinit_calls(&self) -> usize {
        self.deinit_calls
    }

    fn begin_call(&mut self) -> bool {
        self.calls += 1;
        self.ignore_rest = false;
        match self.fail_after {
            Some(limit) if self.calls > limit => {
                log::debug!("dummy: injected transport failure on call {}", self.calls);
                false
            }
            _ => true,
        }
    }

    fn end_call(&mut self) {
        if !self.command.is_empty() {
            log::debug!(
                "dummy: dropping incomplete command {:02X?}",
                self.command
            );
            self.command.clear();
        }
        self.ignore_rest = false;
    }

    /// Clock one byte out of the chip
    fn clock_out(&mut self) -> u8 {
        self.output.pop_front().unwrap_or(IDLE_FILL)
    }

    /// Clock one byte in both directions
    fn clock(&mut self, mosi: u8) -> u8 {
        let miso = self.clock_out();
        if !self.ignore_rest {
            self.consume(mosi);
        }
        miso
    }

    fn consume(&mut self, byte: u8) {
        if let Some(write) = self.pending_write.take() {
            self.pending_write = self.consume_write_data(write, byte);
            return;
        }

        if self.command.is_empty() && Opcode::try_from(byte).is_err() {
            return;
        }
        self.command.push(byte);

        let Ok(opcode) = Opcode::try_from(self.command[0]) else {
            self.command.clear();
            return;
        };
        if self.command.len() == opcode.layout().command_len(self.checksum_enabled()) {
            let command = core::mem::take(&mut self.command);
            self.ignore_rest = true;
            self.execute(opcode, &command);
        }
    }

    fn execute(&mut self, opcode: Opcode, raw: &[u8]) {
        self.output.clear();

        let header = if self.checksum_enabled() {
            let (header, crc) = raw.split_at(raw.len() - 1);
            let expected = command_checksum(header);
            if crc[0] != expected {
                log::debug!(
                    "dummy: bad checksum {:02X} (expected {:02X}) for {:02X?}",
                    crc[0],
                    expected,
                    header
                );
                self.checksum_errors += 1;
                return;
            }
            header
        } else {
            raw
        };

        let cmd = decode(opcode, header);
        log::trace!("dummy: {:?}", cmd);
        self.log.push(cmd);

        let layout = opcode.layout();
        if layout.is_control_only() {
            self.output.push_back(IDLE_FILL);
        }
        self.output.push_back(opcode.as_u8());
        let state = self.forced_state.unwrap_or(0);
        self.output.push_back(state);
        if state != 0 {
            return;
        }

        match layout.access {
            Access::Control => {
                if opcode == Opcode::Reset {
                    self.pending_write = None;
                }
            }
            Access::RegisterRead => {
                let value = self.register_read(&cmd);
                self.push_data(&value.to_le_bytes());
            }
            Access::RegisterWrite => self.register_write(&cmd),
            Access::BlockRead => {
                let data = self.dump(cmd.address, cmd.size as usize);
                self.push_data(&data);
            }
            Access::BlockWrite => {
                if cmd.size > 0 {
                    self.pending_write = Some(PendingWrite {
                        address: cmd.address,
                        offset: 0,
                        total: cmd.size as usize,
                        stage: WriteStage::Tag,
                    });
                }
            }
        }
    }

    fn register_read(&mut self, cmd: &LoggedCommand) -> u32 {
        if cmd.opcode == Opcode::InternalRead && !cmd.clockless {
            return self.internal_reg(cmd.address);
        }
        if let Some(value) = self
            .scripted
            .get_mut(&cmd.address)
            .and_then(|queue| queue.pop_front())
        {
            return value;
        }
        self.peek_word(cmd.address)
    }

    fn register_write(&mut self, cmd: &LoggedCommand) {
        if cmd.opcode == Opcode::InternalWrite && !cmd.clockless {
            self.internal.insert(cmd.address, cmd.data);
            if cmd.address == SPI_PROTOCOL_OFFSET {
                log::debug!(
                    "dummy: protocol register {:08X}, checksum {}",
                    cmd.data,
                    if self.checksum_enabled() { "on" } else { "off" }
                );
            }
        } else {
            self.poke_word(cmd.address, cmd.data);
        }
    }

    /// Queue a data phase: per packet optional delay, marker, data, checksum
    fn push_data(&mut self, data: &[u8]) {
        let checksum = self.checksum_enabled();
        let Ok(segments) = plan(data.len(), self.packet_size()) else {
            return;
        };
        for chunk in segments {
            self.output
                .extend(core::iter::repeat(IDLE_FILL).take(self.header_delay));
            self.output.push_back(chunk.position.tag_byte());
            self.output.extend(data[chunk.range()].iter().copied());
            if checksum {
                self.output.extend(DATA_CRC_FILL);
            }
        }
    }

    fn consume_write_data(&mut self, mut write: PendingWrite, byte: u8) -> Option<PendingWrite> {
        match write.stage {
            WriteStage::Tag => {
                if byte & 0xF0 != DATA_MARKER_NIBBLE {
                    log::debug!("dummy: bad data block tag {:02X}, write aborted", byte);
                    return None;
                }
                self.write_tags.push(byte);
                let left = (write.total - write.offset).min(self.packet_size());
                write.stage = WriteStage::Payload { left };
                Some(write)
            }
            WriteStage::Payload { left } => {
                let address = write.address.wrapping_add(write.offset as u32);
                self.memory.insert(address, byte);
                write.offset += 1;
                if left > 1 {
                    write.stage = WriteStage::Payload { left: left - 1 };
                    Some(write)
                } else if self.checksum_enabled() {
                    write.stage = WriteStage::Checksum { left: 2 };
                    Some(write)
                } else {
                    next_block(write)
                }
            }
            WriteStage::Checksum { left } => {
                if left > 1 {
                    write.stage = WriteStage::Checksum { left: left - 1 };
                    Some(write)
                } else {
                    next_block(write)
                }
            }
        }
    }
}

fn next_block(mut write: PendingWrite) -> Option<PendingWrite> {
    if write.offset >= write.total {
        log::trace!(
            "dummy: DMA write of {} bytes at {:06X} complete",
            write.total,
            write.address
        );
        None
    } else {
        write.stage = WriteStage::Tag;
        Some(write)
    }
}

/// Decode a command header (checksum already stripped)
fn decode(opcode: Opcode, header: &[u8]) -> LoggedCommand {
    let be = |bytes: &[u8]| bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
    let mut cmd = LoggedCommand {
        opcode,
        address: 0,
        clockless: false,
        data: 0,
        size: 0,
    };

    match opcode {
        Opcode::SingleRead => cmd.address = be(&header[1..4]),
        Opcode::SingleWrite => {
            cmd.address = be(&header[1..4]);
            cmd.data = be(&header[4..8]);
        }
        Opcode::InternalRead | Opcode::InternalWrite => {
            cmd.clockless = header[1] & 0x80 != 0;
            cmd.address = (u32::from(header[1] & 0x7F) << 8) | u32::from(header[2]);
            if opcode == Opcode::InternalWrite {
                cmd.data = be(&header[3..7]);
            }
        }
        Opcode::DmaRead | Opcode::DmaWrite => {
            cmd.address = be(&header[1..4]);
            cmd.size = be(&header[4..6]);
        }
        Opcode::DmaExtRead | Opcode::DmaExtWrite => {
            cmd.address = be(&header[1..4]);
            cmd.size = be(&header[4..7]);
        }
        Opcode::Reset | Opcode::Terminate | Opcode::Repeat => {}
    }

    cmd
}

impl BusTransport for DummyChip {
    fn transmit(&mut self, data: &[u8]) -> bool {
        if !self.begin_call() {
            return false;
        }
        for &b in data {
            self.clock(b);
        }
        self.end_call();
        true
    }

    fn receive(&mut self, buf: &mut [u8]) -> bool {
        if !self.begin_call() {
            return false;
        }
        for b in buf.iter_mut() {
            *b = self.clock_out();
        }
        self.end_call();
        true
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
        if !self.begin_call() {
            return false;
        }
        for (t, r) in tx.iter().zip(rx.iter_mut()) {
            *r = self.clock(*t);
        }
        self.end_call();
        true
    }

    fn init(&mut self) -> bool {
        self.init_calls += 1;
        true
    }

    fn deinit(&mut self) {
        self.deinit_calls += 1;
        self.output.clear();
        self.pending_write = None;
    }
}
