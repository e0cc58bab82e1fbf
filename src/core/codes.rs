//! Pickup and recharge code generation.
//!
//! Codes are drawn independently at random. Uniqueness is enforced by the store
//! (unique index on recharge codes, partial unique index on pending pickup codes);
//! callers retry with a fresh code when [`is_unique_violation`] reports a clash.

use rand::Rng;
use sea_orm::{DbErr, SqlErr};

const PICKUP_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random uppercase alphanumeric pickup code of `length` characters.
#[must_use]
pub fn pickup_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(PICKUP_ALPHABET[rng.gen_range(0..PICKUP_ALPHABET.len())]))
        .collect()
}

/// Recharge code `PREFIX-AMOUNT-NNNN`, the suffix having exactly `suffix_digits` digits.
#[must_use]
pub fn recharge_code(prefix: &str, amount: i64, suffix_digits: u32) -> String {
    let digits = suffix_digits.clamp(1, 9);
    let low = 10_u32.pow(digits - 1);
    let suffix = rand::thread_rng().gen_range(low..low * 10);
    format!("{prefix}-{amount}-{suffix}")
}

/// Pickup codes are matched case-insensitively and stored uppercase.
#[must_use]
pub fn normalize_pickup_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether the database rejected a write because of a unique index.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
