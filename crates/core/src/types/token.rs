//! Bearer tokens and public order references.
//!
//! Both come straight from the operating system's CSPRNG. If the OS source
//! fails, generation fails: there is no weaker fallback.

use core::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Number of random bytes in a bearer token (128 bits).
pub const TOKEN_BYTES: usize = 16;

/// Characters used in order references. No `I`, `O`, `0`, or `1`.
pub const ORDER_REF_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of an order reference.
pub const ORDER_REF_LENGTH: usize = 8;

/// Errors from token generation and parsing.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    /// The operating system random source failed.
    #[error("secure random source unavailable: {0}")]
    Rng(String),
    /// The input is not a well-formed token.
    #[error("malformed token")]
    Malformed,
}

fn fill_random<const N: usize>() -> Result<[u8; N], TokenError> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Rng(e.to_string()))?;
    Ok(bytes)
}

/// Generate a 128-bit random token, hex-encoded (32 lowercase characters).
///
/// # Errors
///
/// Returns `TokenError::Rng` if the OS random source fails.
pub fn generate_token() -> Result<MagicToken, TokenError> {
    let bytes = fill_random::<TOKEN_BYTES>()?;
    Ok(MagicToken(hex::encode(bytes)))
}

/// Generate an 8-character order reference such as `K7XH2QPM`.
///
/// Collisions are not checked here; the `orders.order_ref` unique constraint
/// rejects duplicates and the caller retries.
///
/// # Errors
///
/// Returns `TokenError::Rng` if the OS random source fails.
pub fn generate_order_ref() -> Result<OrderRef, TokenError> {
    let bytes = fill_random::<ORDER_REF_LENGTH>()?;
    // 256 is a multiple of 32, so the modulo mapping is unbiased.
    let code = bytes
        .iter()
        .map(|b| {
            let idx = usize::from(*b) % ORDER_REF_ALPHABET.len();
            #[allow(clippy::indexing_slicing)] // idx is reduced modulo the alphabet length
            let c = ORDER_REF_ALPHABET[idx];
            char::from(c)
        })
        .collect();
    Ok(OrderRef(code))
}

/// An opaque bearer credential: an order's magic link token or a login token.
///
/// Debug output is redacted so tokens never end up in logs by accident.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MagicToken(String);

impl MagicToken {
    /// Parse a token taken from a URL or form.
    ///
    /// Only 32 lowercase hex characters are accepted, so malformed input is
    /// rejected before any database lookup.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` for anything else.
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        let valid = s.len() == TOKEN_BYTES * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(TokenError::Malformed)
        }
    }

    /// Wrap a token read back from storage.
    #[must_use]
    pub const fn from_stored(s: String) -> Self {
        Self(s)
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MagicToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MagicToken([REDACTED])")
    }
}

impl fmt::Display for MagicToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short human-shareable public order code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderRef(String);

impl OrderRef {
    /// Wrap a reference read back from storage.
    #[must_use]
    pub const fn from_stored(s: String) -> Self {
        Self(s)
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_token_is_32_lowercase_hex() {
        for _ in 0..200 {
            let token = generate_token().unwrap();
            assert_eq!(token.as_str().len(), 32);
            assert!(
                token
                    .as_str()
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            );
        }
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..500)
            .map(|_| generate_token().unwrap().to_string())
            .collect();
        assert_eq!(tokens.len(), 500);
    }

    #[test]
    fn test_order_ref_uses_confusable_free_alphabet() {
        for _ in 0..500 {
            let order_ref = generate_order_ref().unwrap();
            let s = order_ref.as_str();
            assert_eq!(s.len(), ORDER_REF_LENGTH);
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || ('2'..='9').contains(&c)));
            assert!(!s.contains(['I', 'O', '0', '1']));
        }
    }

    #[test]
    fn test_alphabet_has_no_duplicates() {
        let unique: HashSet<u8> = ORDER_REF_ALPHABET.iter().copied().collect();
        assert_eq!(unique.len(), ORDER_REF_ALPHABET.len());
    }

    #[test]
    fn test_parse_accepts_generated_token() {
        let token = generate_token().unwrap();
        assert_eq!(MagicToken::parse(token.as_str()).unwrap(), token);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(MagicToken::parse("").is_err());
        assert!(MagicToken::parse("abc123").is_err());
        assert!(MagicToken::parse(&"A".repeat(32)).is_err());
        assert!(MagicToken::parse(&"g".repeat(32)).is_err());
        assert!(MagicToken::parse(&"a".repeat(33)).is_err());
        assert!(MagicToken::parse("../../../../etc/passwd0000000000").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = generate_token().unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains(token.as_str()));
        assert!(debug.contains("REDACTED"));
    }
}
