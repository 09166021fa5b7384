//! Application state management
//!
//! Contains shared state accessible across all handlers. The pipeline stage
//! is not part of it; clients carry the stage themselves.

use crate::db::{ConnectionFactory, PgConnectionFactory};
use crate::install::Installer;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState<F: ConnectionFactory = PgConnectionFactory> {
    pub installer: Installer<F>,
}

impl<F: ConnectionFactory> AppState<F> {
    pub fn new(installer: Installer<F>) -> Self {
        Self { installer }
    }
}

/// Type alias for shared state
pub type SharedState<F = PgConnectionFactory> = Arc<AppState<F>>;
