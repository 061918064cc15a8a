//! Small input-validation and hashing helpers used by action handlers.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0987654321";
const NUMERIC: &[u8] = b"0123456789";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+@[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)+$").expect("valid email pattern")
});

// Mainland China mobile numbers: 11 digits starting with 1.
static MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[0-9]{10}$").expect("valid mobile pattern"));

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((2[0-4][0-9]|25[0-5]|[01]?[0-9][0-9]?)\.){3}(2[0-4][0-9]|25[0-5]|[01]?[0-9][0-9]?)$",
    )
    .expect("valid ipv4 pattern")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid number pattern"));

/// Random string of `len` characters, digits only when `numeric` is set.
#[must_use]
pub fn rand_str(len: usize, numeric: bool) -> String {
    let alphabet = if numeric { NUMERIC } else { ALPHANUMERIC };
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

/// Lowercase hex SHA-256 digest of `input`.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[must_use]
pub fn is_email(input: &str) -> bool {
    EMAIL.is_match(input)
}

#[must_use]
pub fn is_mobile(input: &str) -> bool {
    MOBILE.is_match(input)
}

#[must_use]
pub fn is_ipv4(input: &str) -> bool {
    IPV4.is_match(input)
}

/// `true` for a non-empty run of ASCII digits.
#[must_use]
pub fn is_number(input: &str) -> bool {
    NUMBER.is_match(input)
}
