//! Authentication: password policy and hashing, JWT issuing and validation

pub mod password;
pub mod tokens;

pub use tokens::{TokenClaims, TokenPair, TokenService, TokenType};
