//! PostgreSQL connection pool and transaction-scoped units of work
//!
//! [`Database`] owns the pool. Every repository call takes a
//! [`UnitOfWork`], which either runs on a pooled connection or inside a
//! transaction opened with [`Database::begin`]:
//!
//! ```rust,ignore
//! let mut uow = db.begin().await?;
//! let created = repo.create(&mut uow, &request).await;
//! let created = uow.resolve(created).await?; // commit on Ok, rollback on Err
//! ```

use std::path::Path;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};

use crate::{
    config::DatabaseConfig,
    error::{ApiError, ApiOperation, Error, Result},
    health::{Closable, Monitorable},
};

/// Build connection options from configuration
///
/// Credentials are passed as discrete options, so passwords never need URL
/// encoding.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let ssl_mode: PgSslMode = config.ssl_mode.parse()?;

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(ssl_mode))
}

/// Connection string with the credentials left out, for logs
fn display_target(config: &DatabaseConfig) -> String {
    format!(
        "postgres://<redacted>@{}:{}/{}",
        config.host, config.port, config.name
    )
}

/// Attempt to create a database pool (single try)
async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let options = connect_options(config)?;

    PgPoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.max_idle_conns)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect_with(options)
        .await
        .map_err(|e| {
            Error::Internal(format!(
                "Failed to connect to database at '{}': {}\n\n\
                Troubleshooting:\n\
                1. Verify database is running and accessible\n\
                2. Check host, port and database name\n\
                3. Check credentials and ssl_mode ('{}')\n\
                4. Ensure max_open_conns ({}) doesn't exceed database limits\n\n\
                Original error: {}",
                display_target(config),
                categorize_db_error(&e),
                config.ssl_mode,
                config.max_open_conns,
                e
            ))
        })
}

/// Create the pool, retrying with exponential backoff
async fn create_pool_with_retries(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                tracing::info!(
                    database = %display_target(config),
                    max_open = config.max_open_conns,
                    max_idle = config.max_idle_conns,
                    attempts = attempt + 1,
                    "Database connection pool created"
                );
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));
                tracing::warn!(
                    "Database connection attempt {} failed. Retrying in {:?}...",
                    attempt,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Categorize database error for better user guidance
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "Configuration error",
        Error::Database(_) => "Database rejected the connection",
        Error::Io(_) => "Network I/O error - check connectivity",
        Error::Tls(_) => "TLS/SSL error - check ssl_mode and certificates",
        Error::PoolTimedOut => "Connection pool timeout - database may be overloaded",
        Error::PoolClosed => "Connection pool closed",
        _ => "Connection error",
    }
}

/// Handle to the PostgreSQL pool
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the configured pool sizing and retry policy
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: create_pool_with_retries(config).await?,
        })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Unit of work running on pooled connections, without a transaction
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.pool.clone())
    }

    /// Unit of work inside a freshly opened transaction
    pub async fn begin(&self) -> std::result::Result<UnitOfWork, ApiError> {
        let mut uow = self.unit_of_work();
        uow.begin().await?;
        Ok(uow)
    }

    /// Ping the database
    pub async fn is_connected(&self) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!(error = %e, "Database health check could not acquire a connection");
            e
        })?;
        conn.ping().await.map_err(|e| {
            tracing::error!(error = %e, "Database health check ping failed");
            e
        })?;
        Ok(true)
    }

    /// Close the pool, waiting for checked out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection pool closed");
    }

    /// Apply pending migrations from `dir`
    ///
    /// A missing directory is logged and skipped.
    pub async fn migrate_up(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::info!(dir = %dir.display(), "Migrations directory does not exist, skipping");
            return Ok(());
        }

        let migrator = Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        tracing::info!(dir = %dir.display(), "Migrations applied");
        Ok(())
    }

    /// Revert every applied migration found in `dir`
    ///
    /// Requires reversible (`.up.sql` / `.down.sql`) migrations.
    pub async fn migrate_down(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::info!(dir = %dir.display(), "Migrations directory does not exist, skipping");
            return Ok(());
        }

        let migrator = Migrator::new(dir).await?;
        migrator.undo(&self.pool, 0).await?;
        tracing::info!(dir = %dir.display(), "Migrations reverted");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Monitorable for Database {
    async fn is_connected(&self) -> Result<bool> {
        Database::is_connected(self).await
    }
}

#[async_trait::async_trait]
impl Closable for Database {
    async fn close(&self) {
        Database::close(self).await
    }
}

/// Lifecycle of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Statements run on pooled connections
    NoTransaction,
    /// A transaction is open
    Active,
    /// The transaction was committed
    Committed,
    /// The transaction was rolled back
    RolledBack,
}

/// Per-request database handle
///
/// Not shared between requests. Dropping it while a transaction is still
/// open rolls the transaction back.
pub struct UnitOfWork {
    pool: PgPool,
    conn: Option<PoolConnection<Postgres>>,
    tx: Option<Transaction<'static, Postgres>>,
    state: TransactionState,
}

impl UnitOfWork {
    fn new(pool: PgPool) -> Self {
        Self {
            pool,
            conn: None,
            tx: None,
            state: TransactionState::NoTransaction,
        }
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Open a transaction
    pub async fn begin(&mut self) -> std::result::Result<(), ApiError> {
        if self.tx.is_some() {
            tracing::error!("Cannot begin a transaction: one is already active");
            return Err(ApiError::internal("transaction already active")
                .with_operation(ApiOperation::Transaction));
        }

        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Could not begin transaction");
            ApiError::unknown_database(
                ApiOperation::Transaction,
                format!("Could not begin transaction: {}", e),
            )
        })?;

        self.conn = None;
        self.tx = Some(tx);
        self.state = TransactionState::Active;
        tracing::debug!("Transaction started");
        Ok(())
    }

    /// Connection to run statements on
    ///
    /// The open transaction when there is one, otherwise a pooled connection
    /// kept for the lifetime of this unit of work.
    pub async fn executor(&mut self) -> std::result::Result<&mut PgConnection, ApiError> {
        if let Some(tx) = self.tx.as_mut() {
            return Ok(&mut **tx);
        }

        if self.conn.is_none() {
            let conn = self.pool.acquire().await.map_err(|e| {
                tracing::error!(error = %e, "Could not acquire a database connection");
                ApiError::unknown_database(
                    ApiOperation::Transaction,
                    format!("Could not acquire a database connection: {}", e),
                )
            })?;
            self.conn = Some(conn);
        }

        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(ApiError::internal("database connection unavailable")
                .with_operation(ApiOperation::Transaction)),
        }
    }

    /// Commit on `Ok`, roll back on `Err`
    ///
    /// The original error is returned after a rollback. Resolving without an
    /// open transaction is an error.
    pub async fn resolve<T>(
        &mut self,
        outcome: std::result::Result<T, ApiError>,
    ) -> std::result::Result<T, ApiError> {
        let Some(tx) = self.tx.take() else {
            tracing::error!(
                outcome_error = ?outcome.as_ref().err(),
                "Cannot resolve unit of work: null transaction"
            );
            return Err(ApiError::internal("null transaction").with_operation(ApiOperation::Transaction));
        };

        match outcome {
            Ok(value) => {
                if let Err(e) = tx.commit().await {
                    self.state = TransactionState::RolledBack;
                    tracing::error!(error = %e, "Transaction commit failed");
                    return Err(ApiError::unknown_database(
                        ApiOperation::Transaction,
                        format!("Could not commit transaction: {}", e),
                    ));
                }
                self.state = TransactionState::Committed;
                tracing::debug!("Transaction committed");
                Ok(value)
            }
            Err(error) => {
                tracing::error!(error = %error, "Transaction rolled back");
                if let Err(e) = tx.rollback().await {
                    self.state = TransactionState::RolledBack;
                    tracing::error!(error = %e, "Transaction rollback failed");
                    return Err(ApiError::unknown_database(
                        ApiOperation::Transaction,
                        format!("Could not roll back transaction: {}", e),
                    ));
                }
                self.state = TransactionState::RolledBack;
                Err(error)
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        // sqlx rolls back a dropped transaction
        if self.tx.is_some() {
            tracing::warn!("Unit of work dropped with an open transaction, rolling back");
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("state", &self.state)
            .field("has_connection", &self.conn.is_some())
            .finish()
    }
}
