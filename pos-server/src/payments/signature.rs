//! Webhook signature check
//!
//! `signature_key = hex(SHA-512(order_id + status_code + gross_amount + server_key))`

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison against the expected signature
pub fn verify_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature_key: &str,
) -> bool {
    let expected = compute_signature(order_id, status_code, gross_amount, server_key);
    let provided = signature_key.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let sig = compute_signature("ORD-1", "200", "25000.00", "server-key");
        assert_eq!(sig.len(), 128);
        assert!(verify_signature("ORD-1", "200", "25000.00", "server-key", &sig));
        assert!(verify_signature("ORD-1", "200", "25000.00", "server-key", &sig.to_uppercase()));
        assert!(!verify_signature("ORD-1", "200", "1.00", "server-key", &sig));
        assert!(!verify_signature("ORD-1", "200", "25000.00", "other-key", &sig));
        assert!(!verify_signature("ORD-1", "200", "25000.00", "server-key", "deadbeef"));
    }

    #[test]
    fn test_known_vector() {
        // SHA-512 of the empty string
        assert_eq!(
            &compute_signature("", "", "", "")[..16],
            "cf83e1357eefb8bd"
        );
    }
}
