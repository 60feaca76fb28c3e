use std::collections::HashMap;
use std::sync::Arc;

use groupgate::authz::Authorizer;
use groupgate::directory::{DirectoryFile, StaticDirectory};
use groupgate::store::SqlitePermissionStore;
use sea_orm::DatabaseConnection;

/// Builder for the group directory used by a test
pub struct DirectoryBuilder {
    file: DirectoryFile,
    admin_group: Option<String>,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self {
            file: DirectoryFile {
                administrators: Vec::new(),
                groups: HashMap::new(),
            },
            admin_group: None,
        }
    }

    pub fn administrator(mut self, user: &str) -> Self {
        self.file.administrators.push(user.to_string());
        self
    }

    pub fn member(mut self, user: &str, group: &str) -> Self {
        self.file
            .groups
            .entry(group.to_string())
            .or_default()
            .push(user.to_string());
        self
    }

    pub fn admin_group(mut self, group: &str) -> Self {
        self.admin_group = Some(group.to_string());
        self
    }

    pub fn build(self) -> StaticDirectory {
        StaticDirectory::new(self.file, self.admin_group)
    }

    /// Authorizer over the SQLite store on `db`
    pub fn authorizer(self, db: &DatabaseConnection) -> Authorizer {
        Authorizer::new(
            Arc::new(SqlitePermissionStore::new(db.clone())),
            Arc::new(self.build()),
        )
    }
}

impl Default for DirectoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
