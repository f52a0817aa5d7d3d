// ============================
// authgate-lib/src/auth/token.rs
// ============================
/** Secure session token generation.
Tokens identify sessions and double as the cookie value handed to
clients, so they are drawn from OS entropy and must be unguessable. */
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// Token size in bytes (128 bits of entropy)
const TOKEN_BYTES: usize = 16;

/** Generate a cryptographically secure random session token.
# Returns
A 32-character lowercase hex string with no separators. */
pub fn generate_session_token() -> String {
    let mut buffer = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    Uuid::from_bytes(buffer).simple().to_string()
}
