//! Transfer orchestration
//!
//! The [`Orchestrator`] drives one complete operation against a transport:
//! encode the command, exchange it, validate the response, and run the data
//! phase segment by segment.
//!
//! Two transaction shapes are supported (see [`TransactionMode`]):
//!
//! - **Combined**: command, response header and a few dummy bytes go out in
//!   a single full-duplex `transact` whose length is known up front. For
//!   block reads the first data bytes already arrive during the dummy phase.
//! - **Split**: the command is transmitted, then the response header and the
//!   data phase are received separately.
//!
//! Block data beyond what arrived in the exchange is streamed in packets of
//! at most [`SessionOptions::max_packet`] bytes. Each streamed read packet is
//! preceded by its own bounded data-header scan. Written packets carry a tag
//! byte and, with checksums enabled, two checksum bytes which are always
//! zero. Read-side checksum bytes are consumed but not verified.
//!
//! A transport failure aborts the rest of the plan. Bytes already stored in
//! the caller's buffer are left in place.

use crate::config::{BusConfig, SessionOptions, TransactionMode};
use crate::error::{Error, Result};
use crate::protocol::{
    plan, scan_for_marker, Access, CommandFrame, Opcode, ResponseParser, RetryBudget,
    ScanOutcome, FRAME_CAPACITY, NUM_CRC_BYTES, NUM_DATA_BYTES, NUM_RSP_BYTES, NUM_SKIP_BYTES,
};
use crate::transport::BusTransport;

/// Data direction of an operation; the buffer length is the transfer size
#[derive(Debug)]
pub enum Direction<'b> {
    /// Control command without data
    None,
    /// Data flows from the chip into the buffer
    Read(&'b mut [u8]),
    /// Data flows from the buffer to the chip
    ///
    /// Register writes take exactly four bytes in wire payload order
    /// (least significant byte first).
    Write(&'b [u8]),
}

/// Runs operations against a transport with a given configuration
pub struct Orchestrator<'a, B: BusTransport + ?Sized> {
    bus: &'a mut B,
    config: &'a BusConfig,
    options: &'a SessionOptions,
}

impl<'a, B: BusTransport + ?Sized> Orchestrator<'a, B> {
    /// Create an orchestrator borrowing the session's parts
    pub fn new(bus: &'a mut B, config: &'a BusConfig, options: &'a SessionOptions) -> Self {
        Self {
            bus,
            config,
            options,
        }
    }

    fn checksum(&self) -> bool {
        self.config.checksum_enabled
    }

    fn parser(&self) -> ResponseParser {
        ResponseParser::new(self.checksum()).with_header_budget(self.options.combined_header_budget)
    }

    fn split(&self) -> bool {
        self.options.transaction_mode == TransactionMode::Split
    }

    /// Execute one operation
    ///
    /// The direction must match the opcode's access class: `None` for
    /// control opcodes, a four byte `Read`/`Write` for register opcodes and
    /// a non-empty `Read`/`Write` for block opcodes.
    pub fn execute(
        &mut self,
        opcode: Opcode,
        address: u32,
        clockless: bool,
        direction: Direction<'_>,
    ) -> Result<()> {
        match (opcode.layout().access, direction) {
            (Access::Control, Direction::None) => self.control(opcode),
            (Access::RegisterRead, Direction::Read(buf)) if buf.len() == NUM_DATA_BYTES => {
                let word = self.read_word(opcode, address, clockless)?;
                buf.copy_from_slice(&word);
                Ok(())
            }
            (Access::RegisterWrite, Direction::Write(data)) if data.len() == NUM_DATA_BYTES => {
                let mut word = [0u8; NUM_DATA_BYTES];
                word.copy_from_slice(data);
                self.write_word(opcode, address, u32::from_le_bytes(word), clockless)
            }
            (Access::BlockRead, Direction::Read(buf)) => self.read_block(opcode, address, buf),
            (Access::BlockWrite, Direction::Write(data)) => self.write_block(opcode, address, data),
            (access, direction) => {
                log::error!(
                    "{:?}: {:?} access does not match {:?}",
                    opcode,
                    access,
                    direction
                );
                Err(Error::InvalidArgument)
            }
        }
    }

    /// Send a control command (Reset, Terminate, Repeat)
    pub fn control(&mut self, opcode: Opcode) -> Result<()> {
        if !opcode.layout().is_control_only() {
            return Err(Error::InvalidArgument);
        }
        let frame = CommandFrame::control(opcode);
        if self.split() {
            self.split_command(&frame)
        } else {
            let (rx, range) = self.combined(&frame)?;
            self.parser().validate(opcode, &rx[range])?;
            Ok(())
        }
    }

    /// Read one 32-bit register; returns the payload in wire order
    pub fn read_word(
        &mut self,
        opcode: Opcode,
        address: u32,
        clockless: bool,
    ) -> Result<[u8; NUM_DATA_BYTES]> {
        if opcode.layout().access != Access::RegisterRead {
            return Err(Error::InvalidArgument);
        }
        let frame = CommandFrame::new(opcode, address).with_clockless(clockless);
        let mut word = [0u8; NUM_DATA_BYTES];

        if self.split() {
            self.split_command(&frame)?;
            self.read_stream(&mut word)?;
        } else {
            let (rx, range) = self.combined(&frame)?;
            let response = self.parser().validate(opcode, &rx[range])?;
            word.copy_from_slice(response.payload);
        }

        Ok(word)
    }

    /// Write one 32-bit register
    pub fn write_word(
        &mut self,
        opcode: Opcode,
        address: u32,
        value: u32,
        clockless: bool,
    ) -> Result<()> {
        if opcode.layout().access != Access::RegisterWrite {
            return Err(Error::InvalidArgument);
        }
        let frame = CommandFrame::new(opcode, address)
            .with_data(value)
            .with_clockless(clockless);

        if self.split() {
            self.split_command(&frame)
        } else {
            let (rx, range) = self.combined(&frame)?;
            self.parser().validate(opcode, &rx[range])?;
            Ok(())
        }
    }

    /// DMA read of `buf.len()` bytes starting at `address`
    pub fn read_block(&mut self, opcode: Opcode, address: u32, buf: &mut [u8]) -> Result<()> {
        if opcode.layout().access != Access::BlockRead || buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let size = u32::try_from(buf.len()).map_err(|_| Error::InvalidArgument)?;
        let frame = CommandFrame::new(opcode, address).with_size(size);
        log::trace!("{:?}: 0x{:06X}, {} bytes", opcode, address, buf.len());

        if self.split() {
            self.split_command(&frame)?;
            return self.read_stream(buf);
        }

        let (rx, range) = self.combined(&frame)?;
        let response = self.parser().validate(opcode, &rx[range])?;

        let mut segments = plan(buf.len(), self.options.max_packet)?;
        let Some(first) = segments.next() else {
            return Ok(());
        };

        // Some data may already have arrived in response to the dummy bytes
        let prefetched = response.payload.len().min(first.len);
        buf[..prefetched].copy_from_slice(&response.payload[..prefetched]);

        let first_end = first.offset + first.len;
        if prefetched < first.len {
            self.receive(&mut buf[prefetched..first_end], "data read error")?;
        }
        if self.checksum() && (prefetched < first.len || segments.len() > 0) {
            let mut crc = [0u8; NUM_CRC_BYTES];
            self.receive(&mut crc, "crc read err")?;
        }

        for chunk in segments {
            self.read_chunk(&mut buf[chunk.range()])?;
        }

        Ok(())
    }

    /// DMA write of `data` starting at `address`
    pub fn write_block(&mut self, opcode: Opcode, address: u32, data: &[u8]) -> Result<()> {
        if opcode.layout().access != Access::BlockWrite || data.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let size = u32::try_from(data.len()).map_err(|_| Error::InvalidArgument)?;
        let frame = CommandFrame::new(opcode, address).with_size(size);
        log::trace!("{:?}: 0x{:06X}, {} bytes", opcode, address, data.len());

        if self.split() {
            self.split_command(&frame)?;
        } else {
            let (rx, range) = self.combined(&frame)?;
            self.parser().validate(opcode, &rx[range])?;
        }

        self.write_stream(data)
    }

    /// Read a data phase as a sequence of independent packets
    pub fn read_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        for chunk in plan(buf.len(), self.options.max_packet)? {
            self.read_chunk(&mut buf[chunk.range()])?;
        }
        Ok(())
    }

    /// Write a data phase as tagged packets
    pub fn write_stream(&mut self, data: &[u8]) -> Result<()> {
        for chunk in plan(data.len(), self.options.max_packet)? {
            self.transmit(&[chunk.position.tag_byte()], "data block cmd write error")?;
            self.transmit(&data[chunk.range()], "data block write error")?;
            if self.checksum() {
                // Data block checksums are not generated; the chip accepts zeros
                self.transmit(&[0u8; NUM_CRC_BYTES], "crc write error")?;
            }
        }
        Ok(())
    }

    /// One streamed read packet: marker scan, payload, checksum
    fn read_chunk(&mut self, dst: &mut [u8]) -> Result<()> {
        let budget = RetryBudget::new(self.options.stream_header_budget);
        let bus = &mut *self.bus;
        let outcome = scan_for_marker(budget, || {
            let mut byte = [0u8];
            if bus.receive(&mut byte) {
                Ok(Some(byte[0]))
            } else {
                log::error!("resp rx error");
                Err(Error::BusTransportFailure)
            }
        })?;

        if let ScanOutcome::BudgetExhausted { last } = outcome {
            log::error!("resp rx error ({:02X?})", last);
            return Err(Error::DataHeaderTimeout);
        }

        self.receive(dst, "data rx error")?;

        if self.checksum() {
            let mut crc = [0u8; NUM_CRC_BYTES];
            self.receive(&mut crc, "crc rx error")?;
        }

        Ok(())
    }

    /// Combined exchange of the command, its response header and the dummy
    /// bytes; returns the receive buffer and the range holding the response
    fn combined(
        &mut self,
        frame: &CommandFrame,
    ) -> Result<([u8; FRAME_CAPACITY], core::ops::Range<usize>)> {
        let layout = frame.opcode.layout();
        let mut tx = frame.encode(self.checksum())?;
        let cmd_len = tx.len();
        let total = cmd_len + layout.combined_response_len(self.checksum());

        tx.pad(0, total - cmd_len).map_err(|e| {
            log::error!("spi buf size too small {},{}", total, FRAME_CAPACITY);
            e
        })?;

        let mut rx = [0u8; FRAME_CAPACITY];
        if !self.bus.transact(&tx, &mut rx[..total]) {
            log::error!("Failed cmd write, bus error");
            return Err(Error::BusTransportFailure);
        }

        Ok((rx, cmd_len..total))
    }

    /// Transmit the command, then receive and validate the response header
    fn split_command(&mut self, frame: &CommandFrame) -> Result<()> {
        let cmd = frame.encode(self.checksum())?;
        self.transmit(&cmd, "Failed cmd write, bus error")?;

        let mut header = [0u8; NUM_SKIP_BYTES + NUM_RSP_BYTES];
        let len = if frame.opcode.layout().is_control_only() {
            NUM_SKIP_BYTES + NUM_RSP_BYTES
        } else {
            NUM_RSP_BYTES
        };
        self.receive(&mut header[..len], "Failed cmd response read, bus error")?;
        self.parser().validate_header(frame.opcode, &header[..len])
    }

    fn transmit(&mut self, data: &[u8], what: &str) -> Result<()> {
        if self.bus.transmit(data) {
            Ok(())
        } else {
            log::error!("{}", what);
            Err(Error::BusTransportFailure)
        }
    }

    fn receive(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        if self.bus.receive(buf) {
            Ok(())
        } else {
            log::error!("{}", what);
            Err(Error::BusTransportFailure)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::ProtocolCapability;
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Transmit(Vec<u8>),
        Receive(usize),
        Transact(Vec<u8>),
    }

    /// Replays a fixed byte stream from the chip and records what was sent
    #[derive(Default)]
    struct ScriptedBus {
        incoming: VecDeque<u8>,
        calls: Vec<Call>,
        fail_at_call: Option<usize>,
    }

    impl ScriptedBus {
        fn new(incoming: &[u8]) -> Self {
            Self {
                incoming: incoming.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn step(&mut self, call: Call) -> bool {
            let index = self.calls.len();
            self.calls.push(call);
            self.fail_at_call != Some(index)
        }

        fn pop(&mut self, buf: &mut [u8]) {
            for b in buf.iter_mut() {
                *b = self.incoming.pop_front().unwrap_or(0);
            }
        }
    }

    impl BusTransport for ScriptedBus {
        fn transmit(&mut self, data: &[u8]) -> bool {
            self.step(Call::Transmit(data.to_vec()))
        }

        fn receive(&mut self, buf: &mut [u8]) -> bool {
            if !self.step(Call::Receive(buf.len())) {
                return false;
            }
            self.pop(buf);
            true
        }

        fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
            if !self.step(Call::Transact(tx.to_vec())) {
                return false;
            }
            self.pop(rx);
            true
        }
    }

    fn config(checksum: bool) -> BusConfig {
        BusConfig {
            checksum_enabled: checksum,
            interrupt_line_count: 0,
            protocol_capability: ProtocolCapability::ThroughputEnhanced,
            swap_bytes: false,
        }
    }

    #[test]
    fn test_combined_register_read() {
        // 4 filler bytes while the command is clocked out, then the response
        let mut bus = ScriptedBus::new(&[0, 0, 0, 0, 0xCA, 0x00, 0xF3, 0xD0, 0x00, 0x30, 0x00]);
        let cfg = config(false);
        let opts = SessionOptions::default();
        let word = Orchestrator::new(&mut bus, &cfg, &opts)
            .read_word(Opcode::SingleRead, 0x3B_0000, false)
            .unwrap();
        assert_eq!(word, [0xD0, 0x00, 0x30, 0x00]);

        // 4 command bytes + 10 response bytes in one exchange
        match &bus.calls[..] {
            [Call::Transact(tx)] => {
                assert_eq!(tx.len(), 14);
                assert_eq!(&tx[..4], &[0xCA, 0x3B, 0x00, 0x00]);
                assert!(tx[4..].iter().all(|&b| b == 0));
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[test]
    fn test_combined_write_with_checksum() {
        let mut incoming = vec![0u8; 9];
        incoming.extend_from_slice(&[0xC9, 0x00]);
        let mut bus = ScriptedBus::new(&incoming);
        let cfg = config(true);
        let opts = SessionOptions::default();
        Orchestrator::new(&mut bus, &cfg, &opts)
            .write_word(Opcode::SingleWrite, 0x1234, 0xDEAD_BEEF, false)
            .unwrap();
        match &bus.calls[..] {
            [Call::Transact(tx)] => {
                assert_eq!(tx.len(), 14);
                assert_eq!(
                    &tx[..9],
                    &[0xC9, 0x00, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0xD0]
                );
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[test]
    fn test_transport_failure_maps() {
        let mut bus = ScriptedBus::new(&[]);
        bus.fail_at_call = Some(0);
        let cfg = config(true);
        let opts = SessionOptions::default();
        assert_eq!(
            Orchestrator::new(&mut bus, &cfg, &opts).control(Opcode::Reset),
            Err(Error::BusTransportFailure)
        );
    }

    #[test]
    fn test_combined_block_read_multi_chunk() {
        // max packet 4, 10 bytes: segments 4 + 4 + 2
        let mut incoming = vec![0u8; 7];
        incoming.extend_from_slice(&[0xC8, 0x00, 0xF1, 1, 2]); // echo, state, marker, prefetch
        incoming.extend_from_slice(&[3, 4]); // rest of first segment
        incoming.extend_from_slice(&[0x00, 0xF2, 5, 6, 7, 8]); // filler, marker, second
        incoming.extend_from_slice(&[0xF3, 9, 10]); // last
        let mut bus = ScriptedBus::new(&incoming);
        let cfg = config(false);
        let opts = SessionOptions::default().with_max_packet(4);

        let mut buf = [0u8; 10];
        Orchestrator::new(&mut bus, &cfg, &opts)
            .read_block(Opcode::DmaExtRead, 0x1000, &mut buf)
            .unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(bus.calls[1], Call::Receive(2));
    }

    #[test]
    fn test_split_block_read_with_checksum() {
        let mut incoming = vec![0xC8, 0x00];
        incoming.extend_from_slice(&[0xF1, 1, 2, 3, 4, 0xEE, 0xEE]);
        incoming.extend_from_slice(&[0xF3, 5, 6, 0xEE, 0xEE]);
        let mut bus = ScriptedBus::new(&incoming);
        let cfg = config(true);
        let opts = SessionOptions::default()
            .with_max_packet(4)
            .with_transaction_mode(TransactionMode::Split);

        let mut buf = [0u8; 6];
        Orchestrator::new(&mut bus, &cfg, &opts)
            .read_block(Opcode::DmaExtRead, 0x2000, &mut buf)
            .unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
        match &bus.calls[0] {
            Call::Transmit(cmd) => assert_eq!(cmd.len(), 8),
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(bus.calls[1], Call::Receive(2));
    }

    #[test]
    fn test_stream_header_timeout() {
        let mut bus = ScriptedBus::new(&[0xC8, 0x00]);
        let cfg = config(false);
        let opts = SessionOptions::default().with_transaction_mode(TransactionMode::Split);
        let mut buf = [0u8; 8];
        assert_eq!(
            Orchestrator::new(&mut bus, &cfg, &opts).read_block(Opcode::DmaExtRead, 0, &mut buf),
            Err(Error::DataHeaderTimeout)
        );
        // command, header, then exactly ten single-byte marker polls
        assert_eq!(bus.calls.len(), 2 + 10);
    }

    #[test]
    fn test_write_stream_tags_and_zero_checksum() {
        let mut bus = ScriptedBus::new(&[]);
        let cfg = config(true);
        let opts = SessionOptions::default().with_max_packet(4);
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        Orchestrator::new(&mut bus, &cfg, &opts)
            .write_stream(&data)
            .unwrap();
        assert_eq!(
            bus.calls,
            vec![
                Call::Transmit(vec![0xF1]),
                Call::Transmit(vec![1, 2, 3, 4]),
                Call::Transmit(vec![0, 0]),
                Call::Transmit(vec![0xF2]),
                Call::Transmit(vec![5, 6, 7, 8]),
                Call::Transmit(vec![0, 0]),
                Call::Transmit(vec![0xF3]),
                Call::Transmit(vec![9]),
                Call::Transmit(vec![0, 0]),
            ]
        );
    }

    #[test]
    fn test_failure_mid_plan_keeps_partial_data() {
        let incoming = [0xC8, 0x00, 0xF1, 1, 2, 3, 4, 0xF3, 5, 6];
        let mut bus = ScriptedBus::new(&incoming);
        // command, header, marker, payload, then fail on the second marker
        bus.fail_at_call = Some(4);
        let cfg = config(false);
        let opts = SessionOptions::default()
            .with_max_packet(4)
            .with_transaction_mode(TransactionMode::Split);
        let mut buf = [0xAAu8; 6];
        assert_eq!(
            Orchestrator::new(&mut bus, &cfg, &opts).read_block(Opcode::DmaExtRead, 0, &mut buf),
            Err(Error::BusTransportFailure)
        );
        assert_eq!(buf, [1, 2, 3, 4, 0xAA, 0xAA]);
    }

    #[test]
    fn test_direction_must_match() {
        let mut bus = ScriptedBus::new(&[]);
        let cfg = config(false);
        let opts = SessionOptions::default();
        let mut orch = Orchestrator::new(&mut bus, &cfg, &opts);
        let mut buf = [0u8; 4];
        assert_eq!(
            orch.execute(Opcode::Reset, 0, false, Direction::Read(&mut buf)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            orch.execute(Opcode::SingleRead, 0, false, Direction::Read(&mut buf[..2])),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            orch.execute(Opcode::DmaExtWrite, 0, false, Direction::Write(&[])),
            Err(Error::InvalidArgument)
        );
        assert!(bus.calls.is_empty());
    }

    #[test]
    fn test_execute_register_write_bytes() {
        let mut bus = ScriptedBus::new(&[0, 0, 0, 0, 0, 0, 0, 0, 0xC9, 0x00]);
        let cfg = config(false);
        let opts = SessionOptions::default();
        Orchestrator::new(&mut bus, &cfg, &opts)
            .execute(
                Opcode::SingleWrite,
                0x1408,
                false,
                Direction::Write(&0x0000_0100u32.to_le_bytes()),
            )
            .unwrap();
        match &bus.calls[0] {
            Call::Transact(tx) => {
                assert_eq!(&tx[..8], &[0xC9, 0x00, 0x14, 0x08, 0x00, 0x00, 0x01, 0x00])
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
