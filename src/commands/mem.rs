//! Memory read and write commands

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use wilcspi_core::protocol::NUM_DATA_BYTES;
use wilcspi_core::{BusSession, BusTransport};

/// Bytes moved per block command (four data packets)
const MEM_CHUNK_SIZE: usize = 32 * 1024;

/// Size of the next block command
///
/// Block commands need more than one data word, so a short tail is merged
/// with the chunk before it.
fn next_chunk(remaining: usize) -> usize {
    let chunk = remaining.min(MEM_CHUNK_SIZE);
    let rest = remaining - chunk;
    if rest > 0 && rest <= NUM_DATA_BYTES {
        chunk - NUM_DATA_BYTES
    } else {
        chunk
    }
}

fn check_len(len: usize) -> Result<(), Box<dyn std::error::Error>> {
    if len <= NUM_DATA_BYTES {
        return Err(format!(
            "Memory transfers must be longer than {} bytes, use read-reg/write-reg",
            NUM_DATA_BYTES
        )
        .into());
    }
    Ok(())
}

fn chunk_address(base: u32, offset: usize) -> Result<u32, Box<dyn std::error::Error>> {
    u32::try_from(offset)
        .ok()
        .and_then(|off| base.checked_add(off))
        .ok_or_else(|| format!("Address 0x{:08X} + {} out of range", base, offset).into())
}

fn progress_bar(total: usize) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Read chip memory into a file
pub fn run_read_mem<B: BusTransport>(
    session: &mut BusSession<B>,
    address: u32,
    length: usize,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    check_len(length)?;

    let mut data = vec![0u8; length];
    let pb = progress_bar(length)?;

    let mut offset = 0usize;
    while offset < length {
        let chunk_size = next_chunk(length - offset);
        let chunk = &mut data[offset..offset + chunk_size];

        session.read_block(chunk_address(address, offset)?, chunk)?;

        offset += chunk_size;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Write a file into chip memory
pub fn run_write_mem<B: BusTransport>(
    session: &mut BusSession<B>,
    address: u32,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut data = Vec::new();
    File::open(input)?.read_to_end(&mut data)?;
    check_len(data.len())?;

    let pb = progress_bar(data.len())?;

    let mut offset = 0usize;
    while offset < data.len() {
        let chunk_size = next_chunk(data.len() - offset);

        let chunk = &data[offset..offset + chunk_size];
        session.write_block(chunk_address(address, offset)?, chunk)?;

        offset += chunk_size;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Write complete");

    println!("Wrote {} bytes to 0x{:08X}", data.len(), address);
    Ok(())
}
