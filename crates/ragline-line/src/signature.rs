// Webhook signature verification
//
// LINE signs the raw request body with HMAC-SHA256 keyed by the channel
// secret and sends the base64 digest in the x-line-signature header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the base64 signature for a raw body. Used by tests to build
/// valid deliveries.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a delivery signature against the raw body.
///
/// The digest comparison is constant-time via `Mac::verify_slice`.
pub fn verify(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let decoded = match BASE64.decode(signature) {
        Ok(decoded) => decoded,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&decoded).is_ok()
}
