//! Bounded retry loops
//!
//! Every resynchronization loop in the engine runs against an explicit
//! [`RetryBudget`] and reports how it ended through [`ScanOutcome`].

use crate::error::Result;

use super::is_data_marker;

/// Number of attempts a loop may make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u16,
}

impl RetryBudget {
    /// Allow `attempts` attempts
    pub const fn new(attempts: u16) -> Self {
        Self {
            remaining: attempts,
        }
    }

    /// Consume one attempt; returns false once the budget is spent
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Attempts left
    pub fn remaining(&self) -> u16 {
        self.remaining
    }
}

/// How a bounded scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The marker was found
    Success(u8),
    /// The budget ran out (or the source ran dry) before a marker was seen
    BudgetExhausted {
        /// Last byte examined, if any
        last: Option<u8>,
    },
}

/// Scan for a data-response marker
///
/// `next` yields the next byte from the bus, `Ok(None)` when no more bytes
/// are available, or an error which is propagated unchanged.
pub fn scan_for_marker<F>(mut budget: RetryBudget, mut next: F) -> Result<ScanOutcome>
where
    F: FnMut() -> Result<Option<u8>>,
{
    let mut last = None;
    while budget.try_consume() {
        match next()? {
            Some(byte) if is_data_marker(byte) => return Ok(ScanOutcome::Success(byte)),
            Some(byte) => last = Some(byte),
            None => break,
        }
    }
    Ok(ScanOutcome::BudgetExhausted { last })
}
