//! Short, collision-resistant record identifiers.
//!
//! Item IDs look like `rf-k3x9q2`: a fixed prefix plus a base36 suffix
//! derived from a hash of the creation inputs. Hashing instead of a counter
//! keeps IDs stable-looking across clones without any coordination; the
//! caller supplies an `exists` probe so collisions retry with a new nonce.
//! Comment IDs extend their parent item ID (`rf-k3x9q2-c7m1p4`), which keeps
//! them unique per item and greppable back to it.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Prefix carried by every item ID.
pub const ID_PREFIX: &str = "rf";

const BASE_LEN: usize = 6;
const WIDE_LEN: usize = 8;
const NONCE_ATTEMPTS: u32 = 16;

/// Mint an item ID that does not collide with any ID accepted by `exists`.
#[must_use]
pub fn mint_item_id(title: &str, now: DateTime<Utc>, exists: impl Fn(&str) -> bool) -> String {
    let seed = format!("{title}|{}", now.timestamp_micros());
    for len in [BASE_LEN, WIDE_LEN] {
        for nonce in 0..NONCE_ATTEMPTS {
            let candidate = format!("{ID_PREFIX}-{}", hash_suffix(&seed, nonce, len));
            if !exists(&candidate) {
                return candidate;
            }
        }
    }
    // 32 hash collisions in a row means the probe is broken; widen with the
    // timestamp so the result is still unique per call site.
    format!(
        "{ID_PREFIX}-{}-{}",
        hash_suffix(&seed, NONCE_ATTEMPTS, WIDE_LEN),
        now.timestamp_micros()
    )
}

/// Mint a comment ID scoped under its parent item.
#[must_use]
pub fn mint_comment_id(
    item_id: &str,
    author: &str,
    now: DateTime<Utc>,
    exists: impl Fn(&str) -> bool,
) -> String {
    let seed = format!("{item_id}|{author}|{}", now.timestamp_micros());
    for len in [BASE_LEN, WIDE_LEN] {
        for nonce in 0..NONCE_ATTEMPTS {
            let candidate = format!("{item_id}-c{}", hash_suffix(&seed, nonce, len));
            if !exists(&candidate) {
                return candidate;
            }
        }
    }
    format!(
        "{item_id}-c{}-{}",
        hash_suffix(&seed, NONCE_ATTEMPTS, WIDE_LEN),
        now.timestamp_micros()
    )
}

fn hash_suffix(seed: &str, nonce: u32, len: usize) -> String {
    let hash = Sha256::digest(format!("{seed}|{nonce}").as_bytes());
    let num_bytes = if len <= BASE_LEN { 4 } else { 5 };
    encode_base36(&hash[..num_bytes], len)
}

fn encode_base36(bytes: &[u8], len: usize) -> String {
    let mut num: u64 = 0;
    for &b in bytes {
        num = (num << 8) | u64::from(b);
    }
    let alphabet = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut chars = Vec::new();
    let mut n = num;
    while n > 0 {
        let rem = usize::try_from(n % 36).unwrap_or(0);
        chars.push(alphabet[rem] as char);
        n /= 36;
    }
    chars.reverse();

    let mut s: String = chars.into_iter().collect();
    if s.len() < len {
        s = "0".repeat(len - s.len()) + &s;
    }
    if s.len() > len {
        s = s[s.len() - len..].to_string();
    }
    s
}
