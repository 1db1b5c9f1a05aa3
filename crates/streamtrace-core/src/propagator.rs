//! In-band binary propagator (component F).
//!
//! Encodes/decodes a [`Pathway`] as a 20-byte binary blob carried in message
//! headers, either raw or base64-wrapped. Decoding never errors: malformed
//! or absent data simply yields "no pathway", matching the reference
//! behavior for headers produced by unrelated or stale producers.

use crate::pathway::Pathway;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Header carrying the raw 20-byte binary form.
pub const HEADER_BINARY: &str = "dd-pathway-ctx";
/// Header carrying the base64 form of the same 20 bytes.
pub const HEADER_BASE64: &str = "dd-pathway-ctx-base64";

const WIRE_LEN: usize = 20;
const TIME_SLOT_LEN: usize = 6;

/// Encodes `ns` as `floor(ns / 1_000_000)` milliseconds, zigzag varint in a
/// fixed 6-byte slot (continuation bit set on all but the last byte).
pub fn encode_time(ns: u64) -> [u8; TIME_SLOT_LEN] {
    let ms = (ns / 1_000_000) as i64;
    let zigzag = ((ms << 1) ^ (ms >> 63)) as u64;
    let mut out = [0u8; TIME_SLOT_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        let mut b = ((zigzag >> (7 * i)) & 0x7f) as u8;
        if i < TIME_SLOT_LEN - 1 {
            b |= 0x80;
        }
        *byte = b;
    }
    out
}

/// Decodes a fixed 6-byte zigzag-varint slot back into nanoseconds
/// (`ms * 1_000_000`). Continuation bits are ignored on decode since the
/// slot width is fixed.
pub fn decode_time(slot: &[u8]) -> u64 {
    let mut zigzag: u64 = 0;
    for (i, &b) in slot.iter().take(TIME_SLOT_LEN).enumerate() {
        zigzag |= u64::from(b & 0x7f) << (7 * i);
    }
    let ms = ((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64);
    (ms as u64).wrapping_mul(1_000_000)
}

/// Encodes `pathway` as the raw 20-byte binary form.
pub fn encode(pathway: &Pathway) -> [u8; WIRE_LEN] {
    let mut out = [0u8; WIRE_LEN];
    out[0..8].copy_from_slice(&pathway.hash.to_le_bytes());
    out[8..14].copy_from_slice(&encode_time(pathway.pathway_start_ns));
    out[14..20].copy_from_slice(&encode_time(pathway.edge_start_ns));
    out
}

/// Encodes `pathway` as base64 of the binary form.
pub fn encode_str(pathway: &Pathway) -> String {
    BASE64.encode(encode(pathway))
}

/// Decodes the raw 20-byte binary form. Returns `None` for any length other
/// than exactly 20 bytes (malformed data yields "no pathway", not an error).
pub fn decode(bytes: &[u8]) -> Option<Pathway> {
    if bytes.len() != WIRE_LEN {
        return None;
    }
    let hash = u64::from_le_bytes(bytes[0..8].try_into().ok()?);
    let pathway_start_ns = decode_time(&bytes[8..14]);
    let edge_start_ns = decode_time(&bytes[14..20]);
    Some(Pathway {
        hash,
        pathway_start_ns,
        edge_start_ns,
    })
}

/// Decodes a base64-encoded binary form. Returns `None` on any base64 or
/// length error.
pub fn decode_str(s: &str) -> Option<Pathway> {
    let raw = BASE64.decode(s).ok()?;
    decode(&raw)
}

/// A case-insensitive in-memory view of header name/value pairs, the shape
/// the propagator encodes into and decodes out of. Callers own the actual
/// header representation (map or list) used by their transport; this type
/// models the minimal contract this module needs.
pub trait HeaderCarrier {
    /// Looks up a header value by case-insensitive name.
    fn get(&self, name: &str) -> Option<&[u8]>;
    /// Removes any header matching `name` case-insensitively.
    fn remove(&mut self, name: &str);
    /// Inserts/overwrites a header.
    fn set(&mut self, name: &str, value: Vec<u8>);
}

/// Encodes `pathway` into `carrier`: removes any existing entry under
/// either header name (case-insensitive), then inserts the binary form
/// under [`HEADER_BINARY`].
pub fn inject(pathway: &Pathway, carrier: &mut impl HeaderCarrier) {
    carrier.remove(HEADER_BINARY);
    carrier.remove(HEADER_BASE64);
    carrier.set(HEADER_BINARY, encode(pathway).to_vec());
}

/// Decodes a pathway out of `carrier`. If both headers are present, the
/// binary form wins. Malformed or absent data yields `None`.
pub fn extract(carrier: &impl HeaderCarrier) -> Option<Pathway> {
    if let Some(bytes) = carrier.get(HEADER_BINARY) {
        return decode(bytes);
    }
    if let Some(bytes) = carrier.get(HEADER_BASE64) {
        let s = std::str::from_utf8(bytes).ok()?;
        return decode_str(s);
    }
    None
}
