//! Register and interrupt commands

use wilcspi_core::{BusSession, BusTransport};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Show what the session negotiated
pub fn run_init<B: BusTransport>(session: &BusSession<B>) -> CmdResult {
    let config = session.config();
    println!("Chip ID:      0x{:08X}", session.chip_id().unwrap_or(0));
    println!(
        "Checksums:    {}",
        if config.checksum_enabled { "on" } else { "off" }
    );
    println!("Transactions: {:?}", session.options().transaction_mode);
    println!("Interrupts:   {:?}", config.protocol_capability);
    Ok(())
}

/// Read a single register
pub fn run_read_reg<B: BusTransport>(session: &mut BusSession<B>, address: u32) -> CmdResult {
    let value = session.read_register(address)?;
    println!("0x{:08X}: 0x{:08X}", address, value);
    Ok(())
}

/// Write a single register
pub fn run_write_reg<B: BusTransport>(
    session: &mut BusSession<B>,
    address: u32,
    value: u32,
) -> CmdResult {
    session.write_register(address, value)?;
    println!("Wrote 0x{:08X} to 0x{:08X}", value, address);
    Ok(())
}

/// Show the interrupt status word and the pending RX size
pub fn run_irq_status<B: BusTransport>(session: &mut BusSession<B>) -> CmdResult {
    let status = session.read_interrupt_status()?;
    let size = session.read_size()?;
    println!("Status:  0x{:08X}", status);
    println!("RX size: {} bytes", size);
    Ok(())
}

/// Acknowledge interrupts
pub fn run_irq_clear<B: BusTransport>(session: &mut BusSession<B>, mask: u32) -> CmdResult {
    session.clear_interrupts(mask)?;
    println!("Cleared 0x{:08X}", mask);
    Ok(())
}

/// Enable interrupt lines
pub fn run_irq_sync<B: BusTransport>(session: &mut BusSession<B>, lines: Option<u8>) -> CmdResult {
    match lines {
        Some(n) => {
            session.sync_interrupt_lines(n)?;
            println!("Enabled {} interrupt line(s)", n);
        }
        None => {
            session.sync()?;
            println!("Enabled basic interrupt");
        }
    }
    Ok(())
}
