//! Notification signatures.
//!
//! The processor signs each notification with
//! `hex(sha512(order_id + status_code + gross_amount + server_key))`.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};

/// Expected signature for a notification.
#[must_use]
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &SecretString,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `signature` is valid for the notification fields.
#[must_use]
pub fn verify_notification(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    signature: &str,
    server_key: &SecretString,
) -> bool {
    let expected = notification_signature(order_id, status_code, gross_amount, server_key);
    constant_time_compare(&expected, &signature.to_ascii_lowercase())
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("SB-Mid-server-TEST".to_owned())
    }

    const SIGNED: &str = "d18164684009dd7abcbab15a516560f9d208d447df1037f947e1999af3aa4772414db46e7ad084f7b8463744974e15ef5ad9775ddce5fe1ba859906982f083a9";

    #[test]
    fn test_signature_matches_known_vector() {
        assert_eq!(
            notification_signature("NEXORA-1a2b3c4d-1700000000", "200", "150000.00", &key()),
            SIGNED
        );
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        assert!(verify_notification(
            "NEXORA-1a2b3c4d-1700000000",
            "200",
            "150000.00",
            &SIGNED.to_ascii_uppercase(),
            &key()
        ));
    }

    #[test]
    fn test_tampered_amount_rejected() {
        assert!(!verify_notification(
            "NEXORA-1a2b3c4d-1700000000",
            "200",
            "1.00",
            SIGNED,
            &key()
        ));
    }

    #[test]
    fn test_tampered_order_id_rejected() {
        assert!(!verify_notification(
            "NEXORA-ffffffff-1700000000",
            "200",
            "150000.00",
            SIGNED,
            &key()
        ));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
