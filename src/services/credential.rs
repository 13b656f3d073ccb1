// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login credential format checks and salted hashing.
//!
//! Credentials are 6-digit codes. Only a PBKDF2-HMAC-SHA256 hash is ever
//! stored, encoded as `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>` so
//! the parameters travel with the hash.

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

use crate::error::AppError;

/// Number of digits in a credential.
pub const CREDENTIAL_LEN: usize = 6;

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Reject anything but exactly six ASCII digits.
pub fn validate_format(credential: &str) -> Result<(), AppError> {
    if credential.len() == CREDENTIAL_LEN && credential.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "credential must be exactly {CREDENTIAL_LEN} digits"
        )))
    }
}

/// Hash a credential with a fresh random salt.
pub fn hash_credential(credential: &str) -> Result<String, AppError> {
    validate_format(credential)?;

    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| anyhow::anyhow!("system random source failed"))?;

    let iterations = NonZeroU32::new(ITERATIONS).ok_or_else(|| anyhow::anyhow!("zero iterations"))?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(ALGORITHM, iterations, &salt, credential.as_bytes(), &mut hash);

    Ok(format!(
        "{SCHEME}${ITERATIONS}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    ))
}

/// Check `credential` against a stored hash in constant time.
///
/// A malformed stored hash never matches.
pub fn verify_credential(credential: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        tracing::warn!("Stored credential hash has unexpected format");
        return false;
    };

    let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (hex::decode(salt), hex::decode(hash)) else {
        return false;
    };

    pbkdf2::verify(ALGORITHM, iterations, &salt, credential.as_bytes(), &hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert!(validate_format("012345").is_ok());
        assert!(validate_format("12345").is_err());
        assert!(validate_format("1234567").is_err());
        assert!(validate_format("12a456").is_err());
        assert!(validate_format("١٢٣٤٥٦").is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_credential("123456").unwrap();

        assert!(stored.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_credential("123456", &stored));
        assert!(!verify_credential("654321", &stored));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_credential("000000").unwrap();
        let b = hash_credential("000000").unwrap();
        assert_ne!(a, b);
        assert!(verify_credential("000000", &a));
        assert!(verify_credential("000000", &b));
    }

    #[test]
    fn test_malformed_stored_hash_never_matches() {
        assert!(!verify_credential("123456", ""));
        assert!(!verify_credential("123456", "123456"));
        assert!(!verify_credential("123456", "pbkdf2-sha256$0$00$00"));
        assert!(!verify_credential("123456", "pbkdf2-sha256$10$zz$00"));
    }

    #[test]
    fn test_hash_rejects_bad_format() {
        assert!(matches!(
            hash_credential("abc"),
            Err(AppError::Validation(_))
        ));
    }
}
