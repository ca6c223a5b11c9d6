//! Integer framing shared by the envelopes.  Every length and id on the
//! wire is a big-endian u32.

/// First four bytes of `bytes` as a big-endian u32.  Callers check length.
pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    let mut be = [0u8; 4];
    be.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(be)
}
