//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, as name[:key=value,...] [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "wilcspi")]
#[command(author, version, about = "WILC SPI bus tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true, default_value = "dummy", help = programmer_help())]
    pub programmer: String,

    /// Session options file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Send command, response and data phases as separate transfers
    #[arg(long, global = true)]
    pub split: bool,

    /// Use the legacy interrupt register layout
    #[arg(long, global = true)]
    pub legacy_irq: bool,

    /// Swap register values between wire and host byte order
    #[arg(long, global = true)]
    pub swap_bytes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Negotiate the bus and show the chip id
    Init,

    /// Reset the chip's SPI interface
    Reset,

    /// Read a 32-bit register
    ReadReg {
        /// Register address (hex, e.g., 0x1000)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,
    },

    /// Write a 32-bit register
    WriteReg {
        /// Register address (hex, e.g., 0x1000)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Value to write (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        value: u32,
    },

    /// Read chip memory to file
    ReadMem {
        /// Start address (hex, e.g., 0x80000)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to read (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        length: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to chip memory
    WriteMem {
        /// Start address (hex, e.g., 0x80000)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show the pending interrupt status and RX size
    IrqStatus,

    /// Clear pending interrupts
    IrqClear {
        /// Status bits to clear (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        mask: u32,
    },

    /// Enable interrupt lines on the chip
    IrqSync {
        /// Number of interrupt lines (0-8); omit for the basic enable only
        #[arg(value_parser = clap::value_parser!(u8).range(0..=8))]
        lines: Option<u8>,
    },

    /// List supported programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x3b0000"), Ok(0x3B0000));
        assert_eq!(parse_hex_u32("0X10"), Ok(0x10));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("abc").is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::parse_from([
            "wilcspi",
            "read-reg",
            "0x1000",
            "--split",
            "-vv",
            "-p",
            "dummy:checksum=off",
        ]);
        assert!(cli.split);
        assert!(!cli.legacy_irq);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.programmer, "dummy:checksum=off");
        assert!(matches!(cli.command, Commands::ReadReg { address: 0x1000 }));
    }

    #[test]
    fn test_irq_sync_range() {
        let cli = Cli::parse_from(["wilcspi", "irq-sync", "3"]);
        assert!(matches!(cli.command, Commands::IrqSync { lines: Some(3) }));
        assert!(Cli::try_parse_from(["wilcspi", "irq-sync", "9"]).is_err());
    }
}
