//! Password hashing and verification
//!
//! Uses bcrypt for secure password hashing.

use crate::install::error::ProvisionError;
use bcrypt::hash;

pub use bcrypt::DEFAULT_COST;

/// Hash a password using bcrypt at the given cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, ProvisionError> {
    hash(password, cost).map_err(|e| ProvisionError::Hash(e.to_string()))
}

/// Verify a password against a hash
#[cfg(test)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ProvisionError> {
    bcrypt::verify(password, hash).map_err(|e| ProvisionError::Hash(e.to_string()))
}
