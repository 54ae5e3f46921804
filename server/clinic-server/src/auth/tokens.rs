/// JWT access and refresh tokens
///
/// Both token kinds are HS256 JWTs signed with the configured secret. The
/// `token_type` claim keeps a refresh token from being used as an access token
/// and the other way around.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use database_layer::Role;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT token claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,

    /// JWT ID (unique token identifier)
    pub jti: String,

    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,

    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,

    /// Not before timestamp
    pub nbf: i64,

    /// Issuer
    pub iss: String,

    /// Account role at issue time
    pub role: Role,

    pub token_type: TokenType,
}

impl TokenClaims {
    pub fn new(user_id: Uuid, role: Role, token_type: TokenType, issuer: &str, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl.num_seconds(),
            nbf: now,
            iss: issuer.to_string(),
            role,
            token_type,
        }
    }

    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).context("Invalid user ID in token")
    }
}

/// Access and refresh token returned by login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// JWT token service
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            issuer: settings.issuer.clone(),
            access_ttl: Duration::minutes(settings.access_ttl_minutes),
            refresh_ttl: Duration::days(settings.refresh_ttl_days),
        }
    }

    /// Sign a token of the given type for a user
    pub fn issue(&self, user_id: Uuid, role: Role, token_type: TokenType) -> Result<String> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = TokenClaims::new(user_id, role, token_type, &self.issuer, ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to sign token: {}", e))
    }

    pub fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, role, TokenType::Access)?,
            refresh: self.issue(user_id, role, TokenType::Refresh)?,
        })
    }

    /// Validate signature, issuer, expiry and token type
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Invalid or expired token: {}", e))?
            .claims;

        if claims.token_type != expected {
            return Err(anyhow!("Unexpected token type"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClinicConfig;

    fn service() -> TokenService {
        TokenService::new(&ClinicConfig::default().auth)
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id, Role::Dermatologist, TokenType::Access).unwrap();
        let claims = tokens.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role, Role::Dermatologist);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4(), Role::Patient).unwrap();
        assert!(tokens.verify(&pair.refresh, TokenType::Access).is_err());
        assert!(tokens.verify(&pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = service();
        let claims = TokenClaims::new(
            Uuid::new_v4(),
            Role::Patient,
            TokenType::Access,
            "clinic-engine",
            Duration::minutes(-10),
        );
        let token = encode(&Header::new(Algorithm::HS256), &claims, &tokens.encoding_key).unwrap();
        assert!(tokens.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let mut settings = ClinicConfig::default().auth;
        settings.jwt_secret = "another-secret".to_string();
        let other = TokenService::new(&settings);
        let token = other.issue(Uuid::new_v4(), Role::Admin, TokenType::Access).unwrap();
        assert!(service().verify(&token, TokenType::Access).is_err());
    }
}
