//! Installation pipeline
//!
//! Brings a fresh deployment from "absent" to "ready" in five stages:
//!
//! 1. **Requirements**: database server and writable directories
//! 2. **Schema**: apply the schema source statement by statement
//! 3. **Administrator**: create or replace the admin account
//! 4. **Reference data**: seed the audit step templates once
//! 5. **Complete**

pub mod admin;
pub mod error;
pub mod orchestrator;
pub mod requirements;
pub mod schema;
pub mod seed;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{InstallOptions, Installer, StageAction};
