//! Application state management

use std::sync::Arc;

use axum::Router;

#[cfg(feature = "database")]
use crate::{database::Database, error::ApiError};
use crate::{
    config::Config,
    error::Result,
    health::{self, AppStateManager, Closable, Monitorable},
};

/// Name the database is registered under
#[cfg(feature = "database")]
pub const DATABASE_DEPENDENCY: &str = "postgres";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,

    #[cfg(feature = "database")]
    db: Option<Database>,

    dependencies: Arc<AppStateManager>,
}

impl AppState {
    /// State with no dependencies
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            #[cfg(feature = "database")]
            db: None,
            dependencies: Arc::new(AppStateManager::new()),
        }
    }

    /// Create a new builder for AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The database, if one is configured
    #[cfg(feature = "database")]
    pub fn db(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// The database, or an internal error for services that need one
    #[cfg(feature = "database")]
    pub fn require_db(&self) -> std::result::Result<&Database, ApiError> {
        self.db.as_ref().ok_or_else(|| {
            tracing::error!("Database requested but not configured");
            ApiError::internal("Database is not configured.")
        })
    }

    /// Registered long-lived dependencies
    pub fn dependencies(&self) -> &Arc<AppStateManager> {
        &self.dependencies
    }

    /// `GET /sys/health` for this service
    pub fn health_router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        health::router(self.config.service.name.clone(), Arc::clone(&self.dependencies))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("AppState");
        debug.field("service", &self.config.service.name);
        #[cfg(feature = "database")]
        debug.field("db", &self.db.is_some());
        debug.field("dependencies", &self.dependencies).finish()
    }
}

/// Builder for AppState
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    #[cfg(feature = "database")]
    db: Option<Database>,
    closables: Vec<(String, Arc<dyn Closable>)>,
    monitorables: Vec<(String, Arc<dyn Monitorable>)>,
}

impl AppStateBuilder {
    /// Create a new builder
    ///
    /// Without an explicit config, `Config::default()` is used.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing database instead of connecting from config
    #[cfg(feature = "database")]
    pub fn database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Register an extra dependency to close at shutdown
    pub fn closable(mut self, name: impl Into<String>, dependency: Arc<dyn Closable>) -> Self {
        self.closables.push((name.into(), dependency));
        self
    }

    /// Register an extra dependency to report in health checks
    pub fn monitorable(mut self, name: impl Into<String>, dependency: Arc<dyn Monitorable>) -> Self {
        self.monitorables.push((name.into(), dependency));
        self
    }

    /// Build the AppState
    ///
    /// This will:
    /// - Connect to the database when the config has a `[database]` section
    /// - Apply migrations from `database.migrations_dir` when set
    /// - Register the database for health checks and shutdown
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();
        let mut dependencies = AppStateManager::new();

        #[cfg(feature = "database")]
        let db = match (self.db, &config.database) {
            (Some(db), _) => Some(db),
            (None, Some(db_config)) => {
                let db = Database::connect(db_config).await?;
                if let Some(dir) = &db_config.migrations_dir {
                    db.migrate_up(dir).await?;
                }
                Some(db)
            }
            (None, None) => {
                tracing::debug!("No database configured");
                None
            }
        };

        #[cfg(feature = "database")]
        if let Some(db) = &db {
            let shared = Arc::new(db.clone());
            dependencies.add_monitorable(DATABASE_DEPENDENCY, shared.clone());
            dependencies.add_closable(DATABASE_DEPENDENCY, shared);
        }

        for (name, dependency) in self.monitorables {
            dependencies.add_monitorable(name, dependency);
        }
        for (name, dependency) in self.closables {
            dependencies.add_closable(name, dependency);
        }

        Ok(AppState {
            config: Arc::new(config),
            #[cfg(feature = "database")]
            db,
            dependencies: Arc::new(dependencies),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_without_database() {
        let state = AppState::builder().build().await.unwrap();
        assert_eq!(state.config().service.name, "acton-resource");
        assert_eq!(state.dependencies().monitorable_names().count(), 0);
        #[cfg(feature = "database")]
        assert!(state.require_db().is_err());
    }

    #[cfg(feature = "database")]
    #[tokio::test]
    async fn test_provided_database_is_registered() {
        let options = crate::database::connect_options(&crate::config::DatabaseConfig::default())
            .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy_with(options);

        let state = AppState::builder()
            .database(Database::from_pool(pool))
            .build()
            .await
            .unwrap();

        assert!(state.db().is_some());
        assert_eq!(
            state.dependencies().monitorable_names().collect::<Vec<_>>(),
            vec![DATABASE_DEPENDENCY]
        );
    }
}
