//! Bearer tokens.
//!
//! Compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`
//! where the MAC is HMAC-SHA256 over the first two segments.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use nexora_core::{Role, UserId};

use crate::models::{Identity, User};

type HmacSha256 = Hmac<Sha256>;

/// Tokens stay valid for a week.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token encoding failed")]
    Encoding,
}

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Issues and verifies bearer tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Issue a token for `user`, valid for [`TOKEN_TTL_SECS`].
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: user.id,
            email: user.email.as_str().to_owned(),
            role: user.role,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        })
    }

    /// Sign arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Encoding)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of `now` (unix seconds).
    ///
    /// The signature is checked before the payload is even decoded.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or(TokenError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(signing_input)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let header = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::Malformed)?;
        if header != HEADER.as_bytes() {
            return Err(TokenError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Encoding)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(secret.to_owned()))
    }

    fn claims(iat: i64) -> Claims {
        Claims {
            sub: UserId::generate(),
            email: "ana@example.com".to_owned(),
            role: Role::Customer,
            iat,
            exp: iat + TOKEN_TTL_SECS,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let s = signer("k7Qp2vX9mL4rT8wZ1nB6cF3hJ5dG0sYa");
        let c = claims(1_700_000_000);
        let token = s.sign(&c).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(s.verify_at(&token, 1_700_000_100).unwrap(), c);
    }

    #[test]
    fn test_header_is_standard_hs256() {
        let token = signer("secret").sign(&claims(0)).unwrap();
        assert!(token.starts_with("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9."));
    }

    #[test]
    fn test_expired_token_rejected() {
        let s = signer("secret");
        let c = claims(1_000);
        let token = s.sign(&c).unwrap();
        assert_eq!(s.verify_at(&token, c.exp), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = signer("secret-one").sign(&claims(0)).unwrap();
        assert_eq!(
            signer("secret-two").verify_at(&token, 10),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let s = signer("secret");
        let token = s.sign(&claims(0)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut forged = claims(0);
        forged.role = Role::Admin;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        parts[1] = &forged_payload;
        assert_eq!(
            s.verify_at(&parts.join("."), 10),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let s = signer("secret");
        assert_eq!(s.verify_at("not-a-token", 0), Err(TokenError::Malformed));
        assert_eq!(s.verify_at("a.b.!!!", 0), Err(TokenError::Malformed));
    }
}
