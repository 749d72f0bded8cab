//! Host/wire value conversion
//!
//! The wire order of 32-bit register values is fixed (read payloads arrive
//! least significant byte first, write words are sent most significant byte
//! first in the command header). Hosts that need the value byte-swapped
//! before it reaches the caller set [`BusConfig::swap_bytes`]; every value
//! crossing the host boundary goes through [`wire_to_host`] or
//! [`host_to_wire`].
//!
//! [`BusConfig::swap_bytes`]: crate::config::BusConfig::swap_bytes

/// Convert a value decoded from the wire into the host representation
#[inline]
pub fn wire_to_host(value: u32, swap_bytes: bool) -> u32 {
    if swap_bytes {
        value.swap_bytes()
    } else {
        value
    }
}

/// Convert a host value into the representation encoded on the wire
#[inline]
pub fn host_to_wire(value: u32, swap_bytes: bool) -> u32 {
    // Byte swapping is an involution
    wire_to_host(value, swap_bytes)
}

/// Decode a read payload into a wire value
#[inline]
pub fn decode_payload(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}
