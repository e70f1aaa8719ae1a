//! HMAC-SHA256 verification of provider callbacks.
//!
//! The signature covers `{timestamp}.{raw body}` and travels hex-encoded in
//! `x-webhook-signature`, optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Hex-encoded signature a provider holding `secret` would send.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    hex::encode(mac(secret, timestamp, body).finalize().into_bytes())
}

/// Constant-time check of a provided signature. Malformed hex is a mismatch.
pub fn verify_signature(secret: &str, timestamp: &str, body: &[u8], provided: &str) -> bool {
    let provided = provided.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let expected = mac(secret, timestamp, body).finalize().into_bytes();
    expected.as_slice().ct_eq(&provided).into()
}
