//! Helpers for the wire byte order.
//!
//! Both head fields are little-endian. Keeping the conversions here scopes the
//! Clippy expectations to the two places that touch raw integer bytes.

/// Serialise a `u32` in wire byte order (little-endian).
///
/// # Examples
///
/// ```
/// use wirework::byte_order::write_wire_u32;
///
/// assert_eq!(write_wire_u32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_wire_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame head is little-endian on the wire."
    )]
    value.to_le_bytes()
}

/// Parse a wire-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use wirework::byte_order::read_wire_u32;
///
/// assert_eq!(read_wire_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_wire_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame head is little-endian on the wire."
    )]
    u32::from_le_bytes(bytes)
}
