//! Group directory: resolves administrator status and group memberships.
//!
//! The engine only depends on the [`GroupDirectory`] trait. [`StaticDirectory`]
//! serves memberships from a JSON file, which is how small deployments and the
//! test suite provide them.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DirectoryError {
    #[error("Failed to read directory file `{path}`")]
    #[diagnostic(
        code(groupgate::directory::read),
        help("Set directory.path to a readable JSON file")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse directory file `{path}`")]
    #[diagnostic(
        code(groupgate::directory::parse),
        help("Expected {{ \"administrators\": [..], \"groups\": {{ \"<group>\": [\"<user>\", ..] }} }}")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Directory lookup for `{user}` failed: {reason}")]
    #[diagnostic(code(groupgate::directory::lookup))]
    Lookup { user: String, reason: String },
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn is_administrator(&self, user: &str) -> Result<bool, DirectoryError>;

    /// Names of every group `user` belongs to, in no particular order.
    async fn groups_of(&self, user: &str) -> Result<Vec<String>, DirectoryError>;
}

/// On-disk layout of the directory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub administrators: Vec<String>,
    /// group name -> member user names
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

/// In-memory directory built from a [`DirectoryFile`].
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    administrators: BTreeSet<String>,
    admin_group: Option<String>,
    /// user -> groups
    memberships: HashMap<String, BTreeSet<String>>,
}

impl StaticDirectory {
    pub fn new(file: DirectoryFile, admin_group: Option<String>) -> Self {
        let mut memberships: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (group, members) in file.groups {
            for member in members {
                memberships
                    .entry(member)
                    .or_default()
                    .insert(group.clone());
            }
        }
        Self {
            administrators: file.administrators.into_iter().collect(),
            admin_group,
            memberships,
        }
    }

    pub fn load(path: &Path, admin_group: Option<String>) -> Result<Self, DirectoryError> {
        tracing::info!(path = %path.display(), "Loading group directory");
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: DirectoryFile =
            serde_json::from_str(&content).map_err(|source| DirectoryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(
            administrators = file.administrators.len(),
            groups = file.groups.len(),
            "Group directory loaded"
        );
        Ok(Self::new(file, admin_group))
    }

    fn is_member(&self, user: &str, group: &str) -> bool {
        self.memberships
            .get(user)
            .is_some_and(|groups| groups.contains(group))
    }
}

#[async_trait]
impl GroupDirectory for StaticDirectory {
    async fn is_administrator(&self, user: &str) -> Result<bool, DirectoryError> {
        if self.administrators.contains(user) {
            return Ok(true);
        }
        Ok(self
            .admin_group
            .as_deref()
            .is_some_and(|group| self.is_member(user, group)))
    }

    async fn groups_of(&self, user: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .memberships
            .get(user)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default())
    }
}
