//! Token generation for public tracking links.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Number of random bytes in a share token (256 bits).
pub const SHARE_TOKEN_BYTES: usize = 32;

/// Generates an unguessable, URL-safe share token.
///
/// The token is 32 random bytes from the thread-local CSPRNG encoded as
/// unpadded URL-safe base64 (43 characters).
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Returns true if the input looks like a token produced by [`generate_share_token`].
pub fn is_well_formed_share_token(token: &str) -> bool {
    token.len() == 43
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
