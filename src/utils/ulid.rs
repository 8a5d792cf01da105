//! Time-sortable document identifiers.
//!
//! A document id is a 26-character ULID: 48 bits of millisecond
//! timestamp followed by 80 bits of entropy, Crockford-base32 encoded.
//! Ids generated later sort lexicographically after earlier ones.

/// Crockford base32 alphabet (no I, L, O, U).
const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

pub const ULID_LEN: usize = 26;

/// Generate a fresh identifier for the current instant.
pub fn generate() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    encode(millis, random_u80())
}

/// Check that `id` is a well-formed identifier: exactly 26 Crockford
/// characters, with the leading character inside the 48-bit timestamp
/// range.
pub fn is_valid(id: &str) -> bool {
    id.len() == ULID_LEN
        && id.bytes().all(|b| ENCODING.contains(&b))
        && id.as_bytes()[0] <= b'7'
}

fn encode(millis: u64, entropy: u128) -> String {
    // 130 bits of encoding space for 128 bits of value; the top two
    // bits stay zero, which caps the first character at '7'.
    let mut value = ((millis as u128) << 80) | (entropy & ((1u128 << 80) - 1));
    let mut out = [0u8; ULID_LEN];
    for slot in out.iter_mut().rev() {
        *slot = ENCODING[(value & 0x1f) as usize];
        value >>= 5;
    }
    out.iter().map(|&b| b as char).collect()
}

fn random_u80() -> u128 {
    // uuid v4 gives 122 random bits; the first ten bytes are enough.
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    let mut value = 0u128;
    for b in &bytes[..10] {
        value = (value << 8) | u128::from(*b);
    }
    value
}
