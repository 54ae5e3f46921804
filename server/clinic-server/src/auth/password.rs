//! Password hashing and the account password policy
//!
//! Hashes are Argon2id PHC strings. Hashing runs on the blocking pool so a
//! burst of logins does not stall the async runtime.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Passwords rejected regardless of composition (compared case-insensitively)
const COMMON_PASSWORDS: [&str; 3] = ["password", "12345678", "admin"];

fn hasher() -> Result<Argon2<'static>> {
    // Memory: 19 MiB, 2 iterations, 1 lane, 32-byte output
    let params = Params::new(19456, 2, 1, Some(32))
        .map_err(|e| anyhow!("Failed to build Argon2 params: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Check a password against the account policy.
///
/// Returns the first violated rule as a client-facing message.
pub fn check_password_policy(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return Some("Password must contain at least one digit");
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Some("Password must contain at least one letter");
    }
    if password.chars().all(|c| c.is_numeric()) {
        return Some("Password cannot be only digits");
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Some("Password is too common");
    }
    None
}

/// Hash a password using Argon2id
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    let argon2 = hasher()?;

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {}", e))
    })
    .await
    .context("Password hashing task panicked")?
}

/// Verify a password against a stored PHC hash
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    let argon2 = hasher()?;

    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification error: {}", e)),
        }
    })
    .await
    .context("Password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_accepts_mixed_password() {
        assert_eq!(check_password_policy("clinica2024"), None);
    }

    #[test]
    fn test_policy_rejections() {
        assert!(check_password_policy("abc12").is_some());
        assert!(check_password_policy("abcdefghij").is_some());
        assert!(check_password_policy("1234567890").is_some());
        assert!(check_password_policy("12345678").is_some());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("clinica2024").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("clinica2024", &hash).await.unwrap());
        assert!(!verify_password("clinica2025", &hash).await.unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let result = tokio_test::block_on(verify_password("whatever1", "not-a-phc-string"));
        assert!(result.is_err());
    }
}
