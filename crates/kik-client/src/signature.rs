//! Webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-kik-signature";

/// Sign `body` with the bot's shared secret, returning upper-case hex.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode_upper(mac.finalize().into_bytes())
}

/// Check a signature header value against the body.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
