//! HMAC-SHA256 postback signatures
//!
//! The signed message is the concatenation `{user_id}{transaction_id}{amount}`
//! with the amount exactly as it appeared in the request. Signatures travel
//! as lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign a postback the way the network is expected to
pub fn compute_signature(secret: &str, user_id: &str, transaction_id: &str, amount: &str) -> String {
    // HMAC-SHA256 accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("any key length is valid");
    mac.update(user_id.as_bytes());
    mac.update(transaction_id.as_bytes());
    mac.update(amount.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex-encoded signature. Malformed hex
/// fails closed.
pub fn verify_signature(
    secret: &str,
    user_id: &str,
    transaction_id: &str,
    amount: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(user_id.as_bytes());
    mac.update(transaction_id.as_bytes());
    mac.update(amount.as_bytes());
    mac.verify_slice(&provided).is_ok()
}
