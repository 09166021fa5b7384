//! In-memory store used by the installer tests

use crate::db::{ConnectionFactory, InstallConnection};
use crate::install::error::{ConnectionError, StoreError};
use crate::install::types::{AdminAccount, StepTemplate};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct MemoryState {
    pub reachable: bool,
    pub server_version: i32,
    pub executed: Vec<String>,
    pub tables: Vec<String>,
    pub accounts: Vec<AdminAccount>,
    pub templates: Vec<StepTemplate>,
    /// 1-based execution count at which `execute_statement` fails
    pub fail_statement_at: Option<usize>,
    pub fail_account_insert: bool,
    pub fail_template_insert: bool,
    pub fail_template_count: bool,
    pub acquired: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            reachable: true,
            server_version: 150004,
            executed: Vec::new(),
            tables: Vec::new(),
            accounts: Vec::new(),
            templates: Vec::new(),
            fail_statement_at: None,
            fail_account_insert: false,
            fail_template_insert: false,
            fail_template_count: false,
            acquired: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryFactory {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let factory = Self::new();
        factory.state().reachable = false;
        factory
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn connection(&self) -> MemoryConnection {
        MemoryConnection {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    type Connection = MemoryConnection;

    async fn acquire(&self) -> Result<MemoryConnection, ConnectionError> {
        let mut state = self.state();
        if !state.reachable {
            return Err(ConnectionError::Unavailable("connection refused".to_string()));
        }
        state.acquired += 1;
        drop(state);
        Ok(self.connection())
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

/// Table name of a `CREATE TABLE [IF NOT EXISTS] name (...)` statement.
fn created_table(sql: &str) -> Option<(String, bool)> {
    let upper = sql.to_uppercase();
    let rest = upper.trim_start().strip_prefix("CREATE TABLE")?.trim_start();
    let (conditional, rest) = match rest.strip_prefix("IF NOT EXISTS") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, rest),
    };
    let name = rest
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()?
        .to_lowercase();
    Some((name, conditional))
}

#[async_trait]
impl InstallConnection for MemoryConnection {
    async fn server_version(&mut self) -> Result<i32, StoreError> {
        Ok(self.state().server_version)
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let attempt = state.executed.len() + 1;
        if state.fail_statement_at == Some(attempt) {
            return Err(StoreError::Backend("syntax error".to_string()));
        }
        if let Some((table, conditional)) = created_table(sql) {
            if state.tables.contains(&table) {
                if !conditional {
                    return Err(StoreError::Backend(format!(
                        "relation \"{}\" already exists",
                        table
                    )));
                }
            } else {
                state.tables.push(table);
            }
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn delete_account(&mut self, email: &str) -> Result<u64, StoreError> {
        let mut state = self.state();
        let before = state.accounts.len();
        state.accounts.retain(|a| a.email != email);
        Ok((before - state.accounts.len()) as u64)
    }

    async fn insert_account(&mut self, account: &AdminAccount) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_account_insert {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        if state.accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::Backend(
                "duplicate key value violates unique constraint \"users_email_key\"".to_string(),
            ));
        }
        state.accounts.push(account.clone());
        Ok(())
    }

    async fn count_step_templates(&mut self) -> Result<i64, StoreError> {
        let state = self.state();
        if state.fail_template_count {
            return Err(StoreError::Backend("relation \"step_templates\" does not exist".to_string()));
        }
        Ok(state.templates.len() as i64)
    }

    async fn insert_step_templates(&mut self, catalog: &[StepTemplate]) -> Result<u64, StoreError> {
        let mut state = self.state();
        if state.fail_template_insert {
            return Err(StoreError::Backend("insert failed".to_string()));
        }
        state.templates.extend_from_slice(catalog);
        Ok(catalog.len() as u64)
    }

    async fn table_count(&mut self) -> Result<i64, StoreError> {
        Ok(self.state().tables.len() as i64)
    }

    async fn account_count(&mut self) -> Result<Option<i64>, StoreError> {
        let state = self.state();
        if !state.tables.iter().any(|t| t == "users") {
            return Ok(None);
        }
        Ok(Some(state.accounts.len() as i64))
    }
}
