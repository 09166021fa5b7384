//! Database connection management
//!
//! The installer only sees the store through two capabilities: a
//! [`ConnectionFactory`] that hands out one connection per stage action, and
//! the [`InstallConnection`] it returns. PostgreSQL backs both in production.

pub mod queries;

use crate::config::DatabaseConfig;
use crate::install::error::{ConnectionError, StoreError};
use crate::install::types::{AdminAccount, StepTemplate};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Hands out store connections. A failure means the store is unreachable.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    type Connection: InstallConnection;

    async fn acquire(&self) -> Result<Self::Connection, ConnectionError>;
}

/// Operations the installer performs against the store.
#[async_trait]
pub trait InstallConnection: Send {
    /// Server version in `server_version_num` form (major * 10000 + minor).
    async fn server_version(&mut self) -> Result<i32, StoreError>;

    /// Execute one DDL or DML statement without parameters.
    async fn execute_statement(&mut self, sql: &str) -> Result<(), StoreError>;

    /// Delete accounts with `email`, returning how many were removed.
    async fn delete_account(&mut self, email: &str) -> Result<u64, StoreError>;

    async fn insert_account(&mut self, account: &AdminAccount) -> Result<(), StoreError>;

    async fn count_step_templates(&mut self) -> Result<i64, StoreError>;

    /// Insert the whole catalog, in order, as one logical operation.
    async fn insert_step_templates(&mut self, catalog: &[StepTemplate]) -> Result<u64, StoreError>;

    async fn table_count(&mut self) -> Result<i64, StoreError>;

    /// `None` while the users table does not exist yet.
    async fn account_count(&mut self) -> Result<Option<i64>, StoreError>;
}

/// Create a connection pool for the configured database.
///
/// No connection is opened here, so an unreachable server surfaces later as a
/// [`ConnectionError`] from [`ConnectionFactory::acquire`].
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool, ConnectionError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.connect_timeout = Some(config.connect_timeout);

    // An unreachable server must fail the requirements check quickly
    let mut pool_config = PoolConfig::new(config.max_pool_size);
    pool_config.timeouts.wait = Some(config.connect_timeout);
    pool_config.timeouts.create = Some(config.connect_timeout);
    cfg.pool = Some(pool_config);

    let pool = if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    };

    let pool = pool.map_err(|e| ConnectionError::Unavailable(format!("Failed to create pool: {}", e)))?;
    info!(
        "Connection pool configured for {}:{}/{} (TLS: {})",
        config.host, config.port, config.database, config.require_tls
    );
    Ok(pool)
}

/// Connection factory backed by a deadpool pool
#[derive(Clone)]
pub struct PgConnectionFactory {
    pool: Pool,
}

impl PgConnectionFactory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    type Connection = PgConnection;

    async fn acquire(&self) -> Result<PgConnection, ConnectionError> {
        let client = self.pool.get().await?;
        debug!("Acquired installer connection");
        Ok(PgConnection { client })
    }
}

/// A pooled PostgreSQL connection, held for one stage action.
pub struct PgConnection {
    client: Object,
}

#[async_trait]
impl InstallConnection for PgConnection {
    async fn server_version(&mut self) -> Result<i32, StoreError> {
        let row = self.client.query_one(queries::SERVER_VERSION_NUM, &[]).await?;
        let version: String = row.get(0);
        version
            .trim()
            .parse()
            .map_err(|_| StoreError::Backend(format!("Unexpected server_version_num '{}'", version)))
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), StoreError> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn delete_account(&mut self, email: &str) -> Result<u64, StoreError> {
        Ok(self.client.execute(queries::DELETE_ACCOUNT_BY_EMAIL, &[&email]).await?)
    }

    async fn insert_account(&mut self, account: &AdminAccount) -> Result<(), StoreError> {
        self.client
            .execute(
                queries::INSERT_ACCOUNT,
                &[
                    &account.name,
                    &account.email,
                    &account.password_hash,
                    &account.role,
                    &account.active,
                ],
            )
            .await?;
        Ok(())
    }

    async fn count_step_templates(&mut self) -> Result<i64, StoreError> {
        let row = self.client.query_one(queries::COUNT_STEP_TEMPLATES, &[]).await?;
        Ok(row.get(0))
    }

    async fn insert_step_templates(&mut self, catalog: &[StepTemplate]) -> Result<u64, StoreError> {
        let transaction = self.client.transaction().await?;
        let statement = transaction.prepare(queries::INSERT_STEP_TEMPLATE).await?;

        let mut inserted = 0;
        for template in catalog {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &template.phase_id,
                        &template.code,
                        &template.name,
                        &template.is_critical,
                        &template.estimated_hours,
                        &template.order_in_phase,
                    ],
                )
                .await?;
        }

        // Dropping the transaction on an early return rolls it back
        transaction.commit().await?;
        Ok(inserted)
    }

    async fn table_count(&mut self) -> Result<i64, StoreError> {
        let row = self.client.query_one(queries::COUNT_PUBLIC_TABLES, &[]).await?;
        Ok(row.get(0))
    }

    async fn account_count(&mut self) -> Result<Option<i64>, StoreError> {
        let exists: bool = self.client.query_one(queries::USERS_TABLE_EXISTS, &[]).await?.get(0);
        if !exists {
            return Ok(None);
        }
        let row = self.client.query_one(queries::COUNT_ACCOUNTS, &[]).await?;
        Ok(Some(row.get(0)))
    }
}
