// src/auth.rs - Credential hashing and JWT token pairs

use crate::config::AuthConfig;
use crate::core::{CoreError, Result};
use crate::models::TokenPair;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

const ISSUER: &str = "health-hub-ai";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// access / refresh
    pub kind: String,
    pub exp: u64,
    pub iat: u64,
    pub iss: String,
    /// Random nonce so rotated refresh tokens differ
    pub jti: String,
}

pub struct AuthService {
    jwt_secret: String,
    access_token_minutes: i64,
    refresh_token_days: i64,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_minutes: config.access_token_minutes,
            refresh_token_days: config.refresh_token_days,
        }
    }

    pub fn hash_password(&self, password: &str) -> String {
        let salt: [u8; 16] = rand::thread_rng().gen();
        let salt_hex = hex_encode(&salt);
        let digest = Sha256::digest(format!("{salt_hex}{password}").as_bytes());
        format!("{salt_hex}${}", hex_encode(&digest))
    }

    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        let Some((salt_hex, expected)) = stored.split_once('$') else {
            return false;
        };
        let digest = Sha256::digest(format!("{salt_hex}{password}").as_bytes());
        hex_encode(&digest) == expected
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn issue_token(&self, user_id: i64, kind: &str, lifetime_secs: i64) -> Result<String> {
        let now = Self::now();
        let claims = Claims {
            sub: user_id.to_string(),
            kind: kind.to_string(),
            exp: now + lifetime_secs.max(0) as u64,
            iat: now,
            iss: ISSUER.to_string(),
            jti: hex_encode(&rand::thread_rng().gen::<[u8; 8]>()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| CoreError::internal(format!("failed to sign token: {e}")))
    }

    /// Access + refresh pair for a freshly authenticated user
    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        let expires_in = self.access_token_minutes * 60;
        Ok(TokenPair {
            access_token: self.issue_token(user_id, "access", expires_in)?,
            refresh_token: self.issue_token(
                user_id,
                "refresh",
                self.refresh_token_days * 24 * 60 * 60,
            )?,
            token_type: "bearer".to_string(),
            expires_in,
        })
    }

    fn verify(&self, token: &str, expected_kind: &str) -> Result<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| CoreError::auth(format!("invalid token: {e}")))?;

        if data.claims.kind != expected_kind {
            return Err(CoreError::auth(format!(
                "expected a {expected_kind} token"
            )));
        }
        data.claims
            .sub
            .parse()
            .map_err(|_| CoreError::auth("malformed token subject"))
    }

    pub fn verify_access(&self, token: &str) -> Result<i64> {
        self.verify(token, "access")
    }

    pub fn verify_refresh(&self, token: &str) -> Result<i64> {
        self.verify(token, "refresh")
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn service() -> AuthService {
        AuthService::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            access_token_minutes: 30,
            refresh_token_days: 14,
        })
    }

    #[test]
    fn test_password_hash_round_trip() {
        let auth = service();
        let hash = auth.hash_password("hunter2");
        assert!(auth.verify_password("hunter2", &hash));
        assert!(!auth.verify_password("hunter3", &hash));
        // Salted: two hashes of the same password differ
        assert_ne!(hash, auth.hash_password("hunter2"));
    }

    #[test]
    fn test_token_pair_round_trip() {
        let auth = service();
        let pair = auth.issue_pair(42).unwrap();
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(auth.verify_access(&pair.access_token).unwrap(), 42);
        assert_eq!(auth.verify_refresh(&pair.refresh_token).unwrap(), 42);
    }

    #[test]
    fn test_token_kind_is_enforced() {
        let auth = service();
        let pair = auth.issue_pair(7).unwrap();
        assert!(auth.verify_access(&pair.refresh_token).is_err());
        assert!(auth.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let auth = service();
        assert!(auth.verify_access("not-a-token").is_err());
    }
}
