use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, QueryResult, Statement, Value};
use std::marker::PhantomData;

use super::{like_prefix, PermissionStore};
use crate::authz::errors::AuthzError;
use crate::authz::types::{Candidate, Permission, ResourceType};

/// Statement text for one SQL engine. The logical queries are the same for
/// every dialect; only placeholder syntax differs.
pub trait Dialect: Send + Sync + 'static {
    const BACKEND: DatabaseBackend;

    /// Binds: resource, LIKE prefix (escaped with `\`), resource type,
    /// permission, permission.
    const FIND_CANDIDATES: &'static str;
    /// Binds: group, resource type, pattern.
    const EXISTS: &'static str;
    /// Binds: group, resource type, pattern, permission.
    const UPSERT: &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Dialect for Sqlite {
    const BACKEND: DatabaseBackend = DatabaseBackend::Sqlite;

    const FIND_CANDIDATES: &'static str = "SELECT groupname, resource, permission FROM permissions \
         WHERE (resource = ? OR resource = '*' OR resource LIKE ? ESCAPE '\\') \
         AND resource_type = ? AND (permission & ?) = ?";
    const EXISTS: &'static str = "SELECT permission FROM permissions \
         WHERE groupname = ? AND resource_type = ? AND resource = ?";
    const UPSERT: &'static str = "INSERT INTO permissions (groupname, resource_type, resource, permission) \
         VALUES (?, ?, ?, ?) \
         ON CONFLICT (groupname, resource_type, resource) \
         DO UPDATE SET permission = permissions.permission | excluded.permission";
}

impl Dialect for Postgres {
    const BACKEND: DatabaseBackend = DatabaseBackend::Postgres;

    const FIND_CANDIDATES: &'static str = "SELECT groupname, resource, permission FROM permissions \
         WHERE (resource = $1 OR resource = '*' OR resource LIKE $2 ESCAPE '\\') \
         AND resource_type = $3 AND (permission & $4) = $5";
    const EXISTS: &'static str = "SELECT permission FROM permissions \
         WHERE groupname = $1 AND resource_type = $2 AND resource = $3";
    const UPSERT: &'static str = "INSERT INTO permissions (groupname, resource_type, resource, permission) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (groupname, resource_type, resource) \
         DO UPDATE SET permission = permissions.permission | excluded.permission";
}

/// [`PermissionStore`] over a SeaORM connection, parameterized by dialect.
#[derive(Debug, Clone)]
pub struct SqlPermissionStore<D: Dialect> {
    db: DatabaseConnection,
    _dialect: PhantomData<D>,
}

pub type SqlitePermissionStore = SqlPermissionStore<Sqlite>;
pub type PostgresPermissionStore = SqlPermissionStore<Postgres>;

impl<D: Dialect> SqlPermissionStore<D> {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _dialect: PhantomData,
        }
    }

    fn statement<I>(sql: &'static str, values: I) -> Statement
    where
        I: IntoIterator<Item = Value>,
    {
        Statement::from_sql_and_values(D::BACKEND, sql, values)
    }
}

fn decode_permission(group: &str, bits: i32) -> Result<Permission, AuthzError> {
    Permission::from_column(bits).ok_or_else(|| AuthzError::CorruptGrant {
        group: group.to_string(),
        reason: format!("permission bits {bits} out of range"),
    })
}

fn decode_candidate(row: &QueryResult) -> Result<Candidate, AuthzError> {
    let group: String = row
        .try_get("", "groupname")
        .map_err(AuthzError::persistence("decode candidate grant"))?;
    let pattern: String = row
        .try_get("", "resource")
        .map_err(AuthzError::persistence("decode candidate grant"))?;
    let bits: i32 = row
        .try_get("", "permission")
        .map_err(AuthzError::persistence("decode candidate grant"))?;
    let permission = decode_permission(&group, bits).inspect_err(|e| {
        tracing::error!(error = %e, %group, %pattern, "Corrupt grant row in candidate set");
    })?;
    Ok(Candidate {
        group,
        pattern,
        permission,
    })
}

#[async_trait]
impl<D: Dialect> PermissionStore for SqlPermissionStore<D> {
    async fn find_candidates(
        &self,
        resource: &str,
        resource_type: ResourceType,
        permission: Permission,
    ) -> Result<Vec<Candidate>, AuthzError> {
        let stmt = Self::statement(
            D::FIND_CANDIDATES,
            [
                resource.into(),
                like_prefix(resource).into(),
                resource_type.as_i32().into(),
                permission.to_column().into(),
                permission.to_column().into(),
            ],
        );
        let rows = self.db.query_all(stmt).await.map_err(|e| {
            tracing::error!(error = %e, %resource, %resource_type, "Candidate grant query failed");
            AuthzError::Persistence {
                operation: "query candidate grants",
                source: e,
            }
        })?;
        rows.iter().map(decode_candidate).collect()
    }

    async fn exists(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
    ) -> Result<Option<Permission>, AuthzError> {
        let stmt = Self::statement(
            D::EXISTS,
            [group.into(), resource_type.as_i32().into(), pattern.into()],
        );
        let Some(row) = self
            .db
            .query_one(stmt)
            .await
            .map_err(AuthzError::persistence("look up grant"))?
        else {
            return Ok(None);
        };
        let bits: i32 = row
            .try_get("", "permission")
            .map_err(AuthzError::persistence("decode grant permission"))?;
        decode_permission(group, bits).map(Some)
    }

    async fn upsert(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
        permission: Permission,
    ) -> Result<(), AuthzError> {
        let stmt = Self::statement(
            D::UPSERT,
            [
                group.into(),
                resource_type.as_i32().into(),
                pattern.into(),
                permission.to_column().into(),
            ],
        );
        self.db.execute(stmt).await.map_err(|e| {
            tracing::error!(error = %e, %group, %resource_type, %pattern, "Grant upsert failed");
            AuthzError::Persistence {
                operation: "write grant",
                source: e,
            }
        })?;
        Ok(())
    }
}
