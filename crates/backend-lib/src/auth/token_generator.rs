// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
//! Secure token generation for session identifiers.
//!
//! Tokens are cryptographically random and URL-safe, so they can be used
//! as cookie values unchanged.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/** Generate a cryptographically secure random token
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Whether `token` could have come from [`generate_secure_token`].
///
/// Used to reject junk cookie values before they reach a store.
pub fn is_well_formed(token: &str) -> bool {
    // 32 bytes -> 43 base64 chars without padding
    token.len() == 43
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
