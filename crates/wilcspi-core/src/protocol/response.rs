//! Response validation
//!
//! A response to a command is laid out as:
//!
//! ```text
//! [skip]  echo  state  [marker  payload  [crc crc]]
//! ```
//!
//! The skip byte only precedes control commands. The marker, payload and
//! checksum only follow read-class commands; the marker may be preceded by
//! any number of filler bytes while the chip prepares the data, which is why
//! it is searched for within a retry budget.

use crate::error::{Error, Result};

use super::buffer::ByteCursor;
use super::opcode::{Access, Opcode};
use super::retry::{scan_for_marker, RetryBudget, ScanOutcome};
use super::{NUM_CRC_BYTES, NUM_DATA_BYTES, NUM_SKIP_BYTES};

/// Default marker scan budget inside a combined exchange
pub const COMBINED_HEADER_BUDGET: u16 = 100;

/// A validated response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    /// Echoed opcode
    pub opcode: Opcode,
    /// State byte (always zero once validated)
    pub state: u8,
    /// Data-response marker of read-class responses
    pub marker: Option<u8>,
    /// Payload bytes: the register word for register reads, whatever data
    /// bytes already arrived for block reads, empty otherwise
    pub payload: &'a [u8],
    /// Trailing checksum of a register read, when checksums are enabled
    pub checksum: Option<[u8; NUM_CRC_BYTES]>,
}

/// Response validator for one checksum mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseParser {
    checksum_enabled: bool,
    header_budget: u16,
}

impl ResponseParser {
    /// Create a parser with the default marker budget
    pub fn new(checksum_enabled: bool) -> Self {
        Self {
            checksum_enabled,
            header_budget: COMBINED_HEADER_BUDGET,
        }
    }

    /// Set the marker scan budget
    pub fn with_header_budget(mut self, budget: u16) -> Self {
        self.header_budget = budget;
        self
    }

    /// Validate only the skip/echo/state prefix of a response
    pub fn validate_header(&self, opcode: Opcode, raw: &[u8]) -> Result<()> {
        let mut cur = ByteCursor::new(raw);
        check_header(opcode, &mut cur)
    }

    /// Validate a complete response to `opcode`
    pub fn validate<'a>(&self, opcode: Opcode, raw: &'a [u8]) -> Result<ResponseFrame<'a>> {
        let mut cur = ByteCursor::new(raw);
        check_header(opcode, &mut cur)?;

        let mut frame = ResponseFrame {
            opcode,
            state: 0,
            marker: None,
            payload: &[],
            checksum: None,
        };

        let layout = opcode.layout();
        if !layout.is_read() {
            return Ok(frame);
        }

        let outcome = scan_for_marker(RetryBudget::new(self.header_budget), || {
            Ok(cur.next_byte())
        })?;
        match outcome {
            ScanOutcome::Success(marker) => frame.marker = Some(marker),
            ScanOutcome::BudgetExhausted { last } => {
                log::error!(
                    "{:?}: no data response header (last byte {:02X?})",
                    opcode,
                    last
                );
                return Err(Error::DataHeaderTimeout);
            }
        }

        match layout.access {
            Access::RegisterRead => {
                frame.payload = cur.take(NUM_DATA_BYTES).map_err(|e| {
                    log::error!("{:?}: buffer overrun reading data", opcode);
                    e
                })?;
                if self.checksum_enabled {
                    frame.checksum = Some(cur.take_array::<NUM_CRC_BYTES>().map_err(|e| {
                        log::error!("{:?}: buffer overrun reading checksum", opcode);
                        e
                    })?);
                }
            }
            _ => {
                // Block reads: bytes clocked in during the dummy phase
                frame.payload = cur.rest();
            }
        }

        Ok(frame)
    }
}

fn check_header(opcode: Opcode, cur: &mut ByteCursor<'_>) -> Result<()> {
    if opcode.layout().is_control_only() {
        cur.skip(NUM_SKIP_BYTES)?;
    }

    let echo = cur.byte()?;
    if echo != opcode.as_u8() {
        log::error!(
            "Failed cmd response, cmd {:02X}, resp {:02X}",
            opcode.as_u8(),
            echo
        );
        return Err(Error::EchoMismatch {
            expected: opcode.as_u8(),
            found: echo,
        });
    }

    let state = cur.byte()?;
    if state != 0 {
        log::error!("{:?}: state response {:02X}", opcode, state);
        return Err(Error::UnexpectedState(state));
    }

    Ok(())
}
