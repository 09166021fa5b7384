//! Credential handling
//!
//! Only password hashing is needed while installing; sessions belong to the
//! main application.

mod password;

pub use password::{hash_password, DEFAULT_COST};
#[cfg(test)]
pub use password::verify_password;
