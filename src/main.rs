//! wilcspi - WILC SPI bus tool
//!
//! Opens a programmer, negotiates the bus with the chip and runs a single
//! register, memory or interrupt command.
//!
//! # Architecture
//!
//! Programmers only provide the raw byte primitives
//! ([`BusTransport`](wilcspi_core::BusTransport)):
//! - **dummy** - byte-level emulator of the chip's SPI slave
//! - **linux_spi** - Linux spidev device
//!
//! The protocol engine in `wilcspi-core` is the same for all of them.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use wilcspi_core::{BusSession, ProtocolCapability, SessionOptions, TransactionMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::ListProgrammers = cli.command {
        commands::list_programmers();
        return Ok(());
    }

    let options = load_options(&cli)?;
    log::debug!("Session options: {:?}", options);

    let transport = programmers::open_programmer(&cli.programmer)?;
    let mut session = BusSession::new(transport, options);
    session.init()?;

    let result = match cli.command {
        Commands::Init => commands::run_init(&session),
        Commands::Reset => session.reset().map_err(Into::into),
        Commands::ReadReg { address } => commands::run_read_reg(&mut session, address),
        Commands::WriteReg { address, value } => {
            commands::run_write_reg(&mut session, address, value)
        }
        Commands::ReadMem {
            address,
            length,
            output,
        } => commands::run_read_mem(&mut session, address, length as usize, &output),
        Commands::WriteMem { address, input } => {
            commands::run_write_mem(&mut session, address, &input)
        }
        Commands::IrqStatus => commands::run_irq_status(&mut session),
        Commands::IrqClear { mask } => commands::run_irq_clear(&mut session, mask),
        Commands::IrqSync { lines } => commands::run_irq_sync(&mut session, lines),
        Commands::ListProgrammers => Ok(()),
    };

    session.deinit();
    result
}

/// Build the session options from the config file and the command line
fn load_options(cli: &Cli) -> Result<SessionOptions, Box<dyn std::error::Error>> {
    let mut options = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
            SessionOptions::from_toml_str(&content)
                .map_err(|e| format!("Invalid config {:?}: {}", path, e))?
        }
        None => SessionOptions::default(),
    };

    if cli.split {
        options = options.with_transaction_mode(TransactionMode::Split);
    }
    if cli.legacy_irq {
        options = options.with_capability(ProtocolCapability::Legacy);
    }
    if cli.swap_bytes {
        options = options.with_swap_bytes(true);
    }

    Ok(options)
}
