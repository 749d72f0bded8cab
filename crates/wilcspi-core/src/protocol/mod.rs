//! Wire protocol
//!
//! Pure, stateless building blocks: opcodes with their frame layouts,
//! bounded frame buffers, command encoding, response parsing and DMA chunk
//! planning. Nothing in here touches a transport.

pub mod buffer;
pub mod chunk;
pub mod command;
pub mod opcode;
pub mod response;
pub mod retry;

pub use buffer::{ByteCursor, FrameBuf, FRAME_CAPACITY};
pub use chunk::{plan, Chunk, ChunkPlan, ChunkPosition, MAX_PACKET_SIZE};
pub use command::{serialize, CommandFrame};
pub use opcode::{Access, FrameLayout, Opcode};
pub use response::{ResponseFrame, ResponseParser};
pub use retry::{scan_for_marker, RetryBudget, ScanOutcome};

/// Bytes of the command/state response
pub const NUM_RSP_BYTES: usize = 2;
/// Byte skipped before the response of control commands
pub const NUM_SKIP_BYTES: usize = 1;
/// Data-response marker byte
pub const NUM_DATA_HDR_BYTES: usize = 1;
/// Payload of a register read
pub const NUM_DATA_BYTES: usize = 4;
/// Checksum trailer of a data block
pub const NUM_CRC_BYTES: usize = 2;
/// Dummy bytes clocked after the response in a combined exchange
pub const NUM_DUMMY_BYTES: usize = 3;

/// High nibble of data-response markers and data block tags
pub const DATA_MARKER_NIBBLE: u8 = 0xF0;

/// Returns true if `byte` is a data-response marker
#[inline]
pub fn is_data_marker(byte: u8) -> bool {
    byte & 0xF0 == DATA_MARKER_NIBBLE
}
