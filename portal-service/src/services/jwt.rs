//! JWT issuance and validation for portal-service.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// JWT service for token generation and validation. Tokens are HS256-signed
/// with a shared secret from configuration.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Token response returned to the client.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(token)
    }

    /// Validate an access token and return its claims.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Build the token response body for a freshly issued token.
    pub fn token_response(&self, access_token: String) -> TokenResponse {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.access_token_expiry_minutes * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "test-secret-at-least-32-bytes-long!".to_string(),
            access_token_expiry_minutes: 60,
        })
    }

    #[test]
    fn issued_tokens_validate_and_carry_claims() {
        let jwt = test_service();
        let user_id = Uuid::new_v4();

        let token = jwt
            .generate_access_token(user_id, "owner@example.com")
            .expect("Failed to generate token");
        let claims = jwt
            .validate_access_token(&token)
            .expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "owner@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let jwt = test_service();
        let token = jwt
            .generate_access_token(Uuid::new_v4(), "owner@example.com")
            .expect("Failed to generate token");

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(jwt.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn tokens_from_a_different_secret_are_rejected() {
        let jwt = test_service();
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-also-32-bytes-long!!".to_string(),
            access_token_expiry_minutes: 60,
        });

        let token = other
            .generate_access_token(Uuid::new_v4(), "owner@example.com")
            .expect("Failed to generate token");
        assert!(jwt.validate_access_token(&token).is_err());
    }
}
