//! Persistence of permission grants.
//!
//! [`PermissionStore`] is the logical interface; one adapter exists per storage
//! engine and the choice is made once, at startup, from the configured dialect.

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::authz::errors::AuthzError;
use crate::authz::types::{Candidate, Permission, ResourceType};
use crate::errors::GateError;
use crate::settings::Database as DbCfg;

pub use memory::MemoryPermissionStore;
pub use sql::{PostgresPermissionStore, SqlitePermissionStore};

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Grants of `resource_type` whose bits contain `permission` and whose
    /// pattern may cover `resource`. May return false positives.
    async fn find_candidates(
        &self,
        resource: &str,
        resource_type: ResourceType,
        permission: Permission,
    ) -> Result<Vec<Candidate>, AuthzError>;

    /// Current bits of the grant for this tuple, if any.
    async fn exists(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
    ) -> Result<Option<Permission>, AuthzError>;

    /// Inserts the tuple or ORs `permission` into the stored bits, atomically.
    async fn upsert(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
        permission: Permission,
    ) -> Result<(), AuthzError>;
}

/// Storage dialect identifier from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDialect {
    Sqlite,
    Postgres,
}

impl StorageDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageDialect::Sqlite => "sqlite",
            StorageDialect::Postgres => "postgres",
        }
    }

    /// Dialect implied by a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self, AuthzError> {
        let scheme = url.split_once(':').map(|(s, _)| s).unwrap_or(url);
        scheme.parse()
    }

    fn backend(self) -> DatabaseBackend {
        match self {
            StorageDialect::Sqlite => DatabaseBackend::Sqlite,
            StorageDialect::Postgres => DatabaseBackend::Postgres,
        }
    }
}

impl fmt::Display for StorageDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageDialect {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageDialect::Sqlite),
            "postgres" | "postgresql" => Ok(StorageDialect::Postgres),
            other => Err(AuthzError::UnknownDialect(other.to_string())),
        }
    }
}

/// Connects to the configured database, applies pending migrations and
/// returns the adapter for the configured dialect.
pub async fn connect(cfg: &DbCfg) -> Result<Arc<dyn PermissionStore>, GateError> {
    let dialect = cfg.dialect()?;
    let db = Database::connect(&cfg.url).await?;
    // Nothing is created in a database we are about to reject
    ensure_backend(&db, dialect)?;
    Migrator::up(&db, None).await?;
    Ok(for_dialect(db, dialect)?)
}

fn ensure_backend(db: &DatabaseConnection, dialect: StorageDialect) -> Result<(), AuthzError> {
    let actual = db.get_database_backend();
    if actual != dialect.backend() {
        tracing::error!(configured = %dialect, actual = ?actual, "Storage dialect does not match connection");
        return Err(AuthzError::DialectMismatch {
            configured: dialect.as_str(),
            actual: format!("{actual:?}").to_lowercase(),
        });
    }
    Ok(())
}

/// Wraps an open connection in the adapter for `dialect`.
pub fn for_dialect(
    db: DatabaseConnection,
    dialect: StorageDialect,
) -> Result<Arc<dyn PermissionStore>, AuthzError> {
    ensure_backend(&db, dialect)?;
    tracing::info!(%dialect, "Permission store ready");
    let store: Arc<dyn PermissionStore> = match dialect {
        StorageDialect::Sqlite => Arc::new(SqlitePermissionStore::new(db)),
        StorageDialect::Postgres => Arc::new(PostgresPermissionStore::new(db)),
    };
    Ok(store)
}

/// `LIKE` operand for the candidate prefilter: the first character of the
/// resource followed by `%`, with `\`, `%` and `_` escaped for `ESCAPE '\'`.
/// The engine re-checks every candidate, so extra rows (case folding) are
/// harmless; a missing row would not be.
pub fn like_prefix(resource: &str) -> String {
    match resource.chars().next() {
        Some(first @ ('\\' | '%' | '_')) => format!("\\{first}%"),
        Some(first) => format!("{first}%"),
        None => "%".to_string(),
    }
}
