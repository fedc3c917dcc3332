//! ID utilities (join codes, bearer tokens, clock helpers).

use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;

/// Alphabet for join codes: 32 symbols, no visually ambiguous glyphs
/// (I, O, 0 and 1 are omitted).
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const JOIN_CODE_LENGTH: usize = 6;

/// Generate a human-typable join code. Uniqueness across live rooms is the
/// registry's job; this only guarantees the alphabet.
pub fn new_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate an opaque bearer token (URL-safe alphanumeric).
pub fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Current wall clock as unix milliseconds, the wire timestamp format.
pub fn now_ms() -> i64 {
    unix_ms(OffsetDateTime::now_utc())
}

pub fn unix_ms(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}
