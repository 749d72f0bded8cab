use super::*;

use wilcspi_core::config::{BusConfig, ProtocolCapability, SessionOptions, TransactionMode};
use wilcspi_core::interrupt::InterruptControl;
use wilcspi_core::protocol::Opcode;
use wilcspi_core::regs;
use wilcspi_core::transfer::{Direction, Orchestrator};
use wilcspi_core::{BusSession, Error, SessionState};

const MODES: [TransactionMode; 2] = [TransactionMode::Combined, TransactionMode::Split];

fn ready(chip: DummyChip, options: SessionOptions) -> BusSession<DummyChip> {
    let mut session = BusSession::new(chip, options);
    session.init().unwrap();
    session
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

#[test]
fn test_init_negotiates_checksum_off() {
    for mode in MODES {
        let options = SessionOptions::default().with_transaction_mode(mode);
        let session = ready(DummyChip::new_default(), options);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.chip_id(), Some(DEFAULT_CHIP_ID));
        assert!(!session.config().checksum_enabled);
        assert_eq!(
            session.config().protocol_capability,
            ProtocolCapability::ThroughputEnhanced
        );

        let chip = session.into_inner();
        assert_eq!(chip.init_calls(), 1);
        assert!(!chip.checksum_enabled());
        assert_eq!(chip.packet_size(), 8192);
        // checksum bits cleared, 8 KiB packets selected
        assert_eq!(chip.internal_reg(regs::SPI_PROTOCOL_OFFSET), 0x50);
        assert_eq!(chip.checksum_errors(), 0);
    }
}

#[test]
fn test_init_falls_back_when_chip_kept_checksum_off() {
    for mode in MODES {
        let chip = DummyChip::new(DummyConfig::default().with_checksum(false));
        let options = SessionOptions::default().with_transaction_mode(mode);
        let session = ready(chip, options);

        assert_eq!(session.chip_id(), Some(DEFAULT_CHIP_ID));
        assert!(!session.config().checksum_enabled);

        let chip = session.into_inner();
        assert_eq!(chip.commands()[0].opcode, Opcode::InternalRead);
        assert_eq!(chip.commands()[0].address, regs::SPI_PROTOCOL_OFFSET);
        assert_eq!(chip.internal_reg(regs::SPI_PROTOCOL_OFFSET), 0x50);
    }
}

#[test]
fn test_init_fallback_after_combined_echo_mismatch() {
    // In a combined exchange the chip answers one byte early when it does
    // not expect the checksum byte, so the first attempt is rejected.
    let chip = DummyChip::new(DummyConfig::default().with_checksum(false));
    let session = ready(chip, SessionOptions::default());
    let reads = session
        .transport()
        .commands()
        .iter()
        .filter(|c| c.opcode == Opcode::InternalRead)
        .count();
    assert_eq!(reads, 2);
}

#[test]
fn test_init_on_ready_session_only_reads_chip_id() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().clear_log();
    session.transport_mut().poke_word(regs::CHIP_ID, 0x0010_02A0);

    session.init().unwrap();
    assert_eq!(session.chip_id(), Some(0x0010_02A0));

    let chip = session.transport();
    assert_eq!(chip.commands().len(), 1);
    assert_eq!(chip.commands()[0].opcode, Opcode::SingleRead);
    assert_eq!(chip.commands()[0].address, regs::CHIP_ID);
    assert_eq!(chip.init_calls(), 1);
}

#[test]
fn test_deinit_then_init_again() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.deinit();
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.chip_id(), None);
    assert!(session.config().checksum_enabled);
    assert_eq!(session.read_register(0x1000), Err(Error::NotReady));

    // the chip still runs without checksums
    session.init().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.transport().deinit_calls(), 1);
    assert_eq!(session.transport().init_calls(), 2);
}

#[test]
fn test_legacy_capability_from_options() {
    let options = SessionOptions::default().with_capability(ProtocolCapability::Legacy);
    let session = ready(DummyChip::new_default(), options);
    assert_eq!(
        session.config().protocol_capability,
        ProtocolCapability::Legacy
    );
}

#[test]
fn test_register_round_trip() {
    for mode in MODES {
        let options = SessionOptions::default().with_transaction_mode(mode);
        let mut session = ready(DummyChip::new_default(), options);

        session.write_register(0x1000, 0xDEAD_BEEF).unwrap();
        assert_eq!(session.read_register(0x1000).unwrap(), 0xDEAD_BEEF);
        assert_eq!(session.transport().peek_word(0x1000), 0xDEAD_BEEF);
        assert_eq!(session.transport().dump(0x1000, 4), [0xEF, 0xBE, 0xAD, 0xDE]);
    }
}

#[test]
fn test_clockless_registers_use_internal_opcodes() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().clear_log();

    session.write_register(0x10, 0x5).unwrap();
    assert_eq!(session.read_register(0x10).unwrap(), 0x5);
    session.write_register(0x30, 0x6).unwrap();

    let log = session.transport().commands();
    assert_eq!(log[0].opcode, Opcode::InternalWrite);
    assert!(log[0].clockless);
    assert_eq!(log[0].address, 0x10);
    assert_eq!(log[1].opcode, Opcode::InternalRead);
    assert!(log[1].clockless);
    assert_eq!(log[2].opcode, Opcode::SingleWrite);
    assert!(!log[2].clockless);
}

#[test]
fn test_swap_bytes() {
    let options = SessionOptions::default().with_swap_bytes(true);
    let mut session = ready(DummyChip::new_default(), options);

    // negotiation and chip id are unaffected
    assert_eq!(session.chip_id(), Some(DEFAULT_CHIP_ID));

    session.write_register(0x1000, 0x1122_3344).unwrap();
    assert_eq!(session.transport().peek_word(0x1000), 0x4433_2211);
    assert_eq!(session.read_register(0x1000).unwrap(), 0x1122_3344);
}

#[test]
fn test_block_round_trip_default_packets() {
    for mode in MODES {
        let options = SessionOptions::default().with_transaction_mode(mode);
        let mut session = ready(DummyChip::new_default(), options);

        let data = pattern(20000);
        session.write_block(0x4_0000, &data).unwrap();
        assert_eq!(session.transport().write_tags(), &[0xF1, 0xF2, 0xF3]);
        assert_eq!(session.transport().dump(0x4_0000, data.len()), data);

        let mut buf = vec![0u8; data.len()];
        session.read_block(0x4_0000, &mut buf).unwrap();
        assert_eq!(buf, data);
    }
}

#[test]
fn test_single_packet_block() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    let data = pattern(500);
    session.write_block(0x8000, &data).unwrap();
    assert_eq!(session.transport().write_tags(), &[0xF3]);

    let mut buf = [0u8; 500];
    session.read_block(0x8000, &mut buf).unwrap();
    assert_eq!(&buf[..], &data[..]);
}

#[test]
fn test_block_transfers_all_modes() {
    for mode in MODES {
        for checksum in [false, true] {
            let mut chip = DummyChip::new(
                DummyConfig::default()
                    .with_checksum(checksum)
                    .with_packet_size(64),
            );
            let cfg = BusConfig {
                checksum_enabled: checksum,
                ..BusConfig::default()
            };
            let opts = SessionOptions::default()
                .with_transaction_mode(mode)
                .with_max_packet(64);

            let data = pattern(200);
            Orchestrator::new(&mut chip, &cfg, &opts)
                .write_block(Opcode::DmaExtWrite, 0x1_0000, &data)
                .unwrap();
            assert_eq!(chip.write_tags(), &[0xF1, 0xF2, 0xF2, 0xF3]);
            assert_eq!(chip.dump(0x1_0000, 200), data);

            let mut buf = [0u8; 200];
            Orchestrator::new(&mut chip, &cfg, &opts)
                .read_block(Opcode::DmaExtRead, 0x1_0000, &mut buf)
                .unwrap();
            assert_eq!(&buf[..], &data[..], "{:?} checksum={}", mode, checksum);
            assert_eq!(chip.checksum_errors(), 0);
        }
    }
}

#[test]
fn test_short_dma_opcodes() {
    let mut chip = DummyChip::new(DummyConfig::default().with_packet_size(128));
    chip.load(0x2000, &pattern(300));
    let cfg = BusConfig::default();
    let opts = SessionOptions::default().with_max_packet(128);

    let mut buf = [0u8; 300];
    Orchestrator::new(&mut chip, &cfg, &opts)
        .execute(Opcode::DmaRead, 0x2000, false, Direction::Read(&mut buf))
        .unwrap();
    assert_eq!(&buf[..], &pattern(300)[..]);

    Orchestrator::new(&mut chip, &cfg, &opts)
        .execute(Opcode::DmaWrite, 0x3000, false, Direction::Write(&buf))
        .unwrap();
    assert_eq!(chip.dump(0x3000, 300), pattern(300));
    assert_eq!(chip.commands()[1].size, 300);
}

#[test]
fn test_control_commands() {
    for mode in MODES {
        let options = SessionOptions::default().with_transaction_mode(mode);
        let mut session = ready(DummyChip::new_default(), options);
        session.reset().unwrap();
        let last = session.transport().commands().last().copied();
        assert_eq!(last.map(|c| c.opcode), Some(Opcode::Reset));
    }

    let mut chip = DummyChip::new_default();
    let cfg = BusConfig::default();
    let opts = SessionOptions::default();
    let mut orch = Orchestrator::new(&mut chip, &cfg, &opts);
    orch.execute(Opcode::Terminate, 0, false, Direction::None)
        .unwrap();
    orch.execute(Opcode::Repeat, 0, false, Direction::None).unwrap();
}

#[test]
fn test_block_length_limits() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    let mut small = [0u8; 4];
    assert_eq!(
        session.read_block(0x1000, &mut small),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        session.write_block(0x1000, &small),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn test_transport_failure_keeps_partial_data() {
    for (mode, calls) in [(TransactionMode::Split, 4), (TransactionMode::Combined, 2)] {
        let chip = DummyChip::new(DummyConfig::default().with_packet_size(64));
        let options = SessionOptions::default()
            .with_transaction_mode(mode)
            .with_max_packet(64);
        let mut session = ready(chip, options);
        let data = pattern(200);
        session.transport_mut().load(0x5000, &data);
        session.transport_mut().fail_after_calls(Some(calls));

        let mut buf = [0xEEu8; 200];
        let err = session.read_block(0x5000, &mut buf).unwrap_err();
        assert_eq!(err, Error::BusTransportFailure);
        assert!(err.is_retryable());
        assert_eq!(&buf[..64], &data[..64], "{:?}", mode);
        assert!(buf[64..].iter().all(|&b| b == 0xEE), "{:?}", mode);
    }
}

#[test]
fn test_header_delay() {
    // split mode polls up to ten bytes before each packet
    let options = SessionOptions::default().with_transaction_mode(TransactionMode::Split);
    let mut session = ready(DummyChip::new_default(), options);
    session.transport_mut().poke_word(0x1000, 0x1234_5678);

    session.transport_mut().set_header_delay(3);
    assert_eq!(session.read_register(0x1000).unwrap(), 0x1234_5678);

    session.transport_mut().set_header_delay(12);
    assert_eq!(session.read_register(0x1000), Err(Error::DataHeaderTimeout));
    let mut buf = [0u8; 64];
    assert_eq!(
        session.read_block(0x1000, &mut buf),
        Err(Error::DataHeaderTimeout)
    );
}

#[test]
fn test_header_delay_combined() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().poke_word(0x1000, 0x1234_5678);

    // three dummy bytes absorb a short delay
    session.transport_mut().set_header_delay(3);
    assert_eq!(session.read_register(0x1000).unwrap(), 0x1234_5678);

    // the word no longer fits in the exchange
    session.transport_mut().set_header_delay(4);
    assert_eq!(session.read_register(0x1000), Err(Error::BufferOverrun));

    // no marker at all inside the exchange
    let mut buf = [0u8; 64];
    assert_eq!(
        session.read_block(0x1000, &mut buf),
        Err(Error::DataHeaderTimeout)
    );
}

#[test]
fn test_forced_state() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().force_state(Some(0x04));
    assert_eq!(session.read_register(0x1000), Err(Error::UnexpectedState(0x04)));
    assert_eq!(
        session.write_register(0x1000, 1),
        Err(Error::UnexpectedState(0x04))
    );
}

#[test]
fn test_interrupt_line_enable_bits() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().poke_word(regs::INTR_ENABLE, 0x1);

    session.sync_interrupt_lines(7).unwrap();
    assert_eq!(session.config().interrupt_line_count, 7);

    let chip = session.transport();
    assert_eq!(chip.peek_word(regs::PIN_MUX_0), 1 << 8);
    assert_eq!(chip.peek_word(regs::INTR_ENABLE), 0x1 | (0b11111 << 27));
    assert_eq!(chip.peek_word(regs::INTR2_ENABLE), 0b11);
}

#[test]
fn test_interrupt_lines_primary_only() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.sync_interrupt_lines(2).unwrap();
    let chip = session.transport();
    assert_eq!(chip.peek_word(regs::INTR_ENABLE), 0b11 << 27);
    assert_eq!(chip.peek_word(regs::INTR2_ENABLE), 0);
    assert_eq!(chip.read_count(regs::INTR2_ENABLE), 0);
}

#[test]
fn test_basic_sync() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.sync().unwrap();
    let chip = session.transport();
    assert_eq!(chip.peek_word(regs::PIN_MUX_0), 1 << 8);
    assert_eq!(chip.peek_word(regs::INTR_ENABLE), 1 << 16);
}

#[test]
fn test_enhanced_interrupts() {
    for mode in MODES {
        let options = SessionOptions::default().with_transaction_mode(mode);
        let mut session = ready(DummyChip::new_default(), options);
        session
            .transport_mut()
            .set_internal_reg(regs::ENH_IRQ_STATUS_OFFSET, 0x0003_0010);

        assert_eq!(session.read_interrupt_status().unwrap(), 0x0003_0010);
        assert_eq!(session.read_size().unwrap(), 0x10);

        session.clear_interrupts(0x3).unwrap();
        assert_eq!(
            session.transport().internal_reg(regs::ENH_IRQ_CLEAR_OFFSET),
            0x3
        );
    }
}

fn legacy_session(lines: u8, options: SessionOptions) -> BusSession<DummyChip> {
    let options = options.with_capability(ProtocolCapability::Legacy);
    let mut session = ready(DummyChip::new_default(), options);
    session.sync_interrupt_lines(lines).unwrap();
    session.transport_mut().clear_log();
    session
}

#[test]
fn test_legacy_status() {
    let mut session = legacy_session(7, SessionOptions::default());
    let chip = session.transport_mut();
    chip.poke_word(regs::VMM_TO_HOST_SIZE, 0x100);
    chip.poke_word(regs::LEGACY_IRQ_FLAGS_0, 0b00101 << 27);
    chip.poke_word(regs::LEGACY_IRQ_FLAGS_1, 0b011);

    let status = session.read_interrupt_status().unwrap();
    assert_eq!(status, 0x40 | (0b0110_0101 << 16));
    assert_eq!(session.read_size().unwrap(), 0x40);
}

#[test]
fn test_legacy_status_rereads_on_unknown_flags() {
    let mut session = legacy_session(3, SessionOptions::default());
    let chip = session.transport_mut();
    chip.poke_word(regs::VMM_TO_HOST_SIZE, 0x100);
    chip.script_reads(regs::LEGACY_IRQ_FLAGS_0, &[(1 << 31) | (1 << 27), 1 << 27]);

    assert_eq!(session.read_interrupt_status().unwrap(), 0x0001_0040);

    let chip = session.transport();
    assert_eq!(chip.read_count(regs::LEGACY_IRQ_FLAGS_0), 2);
    assert_eq!(chip.read_count(regs::VMM_TO_HOST_SIZE), 2);
    assert_eq!(chip.read_count(regs::LEGACY_IRQ_FLAGS_1), 0);
}

#[test]
fn test_legacy_status_gives_up_after_budget() {
    let options = SessionOptions::default().with_irq_anomaly_budget(2);
    let mut session = legacy_session(3, options);
    session
        .transport_mut()
        .poke_word(regs::LEGACY_IRQ_FLAGS_0, 1 << 31);

    assert_eq!(session.read_interrupt_status().unwrap(), 1 << 20);
    assert_eq!(
        session.transport().read_count(regs::LEGACY_IRQ_FLAGS_0),
        3
    );
}

#[test]
fn test_legacy_clear_sequence() {
    let mut session = legacy_session(3, SessionOptions::default());

    let mask = 0b1011 | (InterruptControl::SEL_VMM_TBL1 | InterruptControl::EN_VMM).bits();
    session.clear_interrupts(mask).unwrap();

    assert_eq!(
        session.transport().register_writes(),
        vec![
            (regs::LEGACY_IRQ_CLEAR_BASE, 1),
            (regs::LEGACY_IRQ_CLEAR_BASE + 4, 1),
            (regs::VMM_TBL_CTL, 0x2),
            (regs::VMM_CORE_CTL, 1),
        ]
    );
}

#[test]
fn test_legacy_clear_without_vmm() {
    let mut session = legacy_session(2, SessionOptions::default());
    session
        .clear_interrupts(InterruptControl::SEL_VMM_TBL0.bits())
        .unwrap();
    assert_eq!(
        session.transport().register_writes(),
        vec![(regs::VMM_TBL_CTL, 0x1)]
    );
}

#[test]
fn test_clear_rx_interrupt() {
    let mut session = ready(DummyChip::new_default(), SessionOptions::default());
    session.transport_mut().poke_word(regs::HOST_RX_CTRL_0, 0x3);
    session.clear_rx_interrupt().unwrap();
    assert_eq!(session.transport().peek_word(regs::HOST_RX_CTRL_0), 0x2);
}

#[test]
fn test_parse_options() {
    let config = parse_options(&[("chip_id", "0x1002A0"), ("checksum", "off"), ("packet", "512")])
        .unwrap();
    assert_eq!(config.chip_id, 0x0010_02A0);
    assert_eq!(config.protocol_reg & regs::SPI_PROTOCOL_CRC_MASK, 0);
    assert_eq!(config.packet_size, Some(512));

    assert!(parse_options(&[("checksum", "maybe")]).is_err());
    assert!(parse_options(&[("packet", "0")]).is_err());
}
