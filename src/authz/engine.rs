use std::collections::BTreeSet;
use std::sync::Arc;

use crate::authz::errors::AuthzError;
use crate::authz::matcher;
use crate::authz::types::{GrantOutcome, Permission, ResourceType};
use crate::directory::GroupDirectory;
use crate::store::PermissionStore;

/// Answers "may this user do this to that resource" and records grants.
///
/// Holds no mutable state; the store and the directory are shared with every
/// concurrent request.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PermissionStore>,
    directory: Arc<dyn GroupDirectory>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn PermissionStore>, directory: Arc<dyn GroupDirectory>) -> Self {
        Self { store, directory }
    }

    /// Check whether `user` holds `permission` on `resource` of `resource_type`.
    ///
    /// Administrators are always allowed. Otherwise the user must belong to a
    /// group with a grant whose pattern matches `resource` and whose bits
    /// contain every bit of `permission`. No grant is a plain deny, not an error.
    pub async fn can_perform_action(
        &self,
        user: &str,
        resource: &str,
        resource_type: ResourceType,
        permission: Permission,
    ) -> Result<bool, AuthzError> {
        // 1. Administrator bypass
        if self.directory.is_administrator(user).await? {
            tracing::debug!(%user, %resource, %resource_type, %permission, "Allowed: administrator");
            return Ok(true);
        }

        if permission.is_empty() {
            return Err(AuthzError::InvalidRequest(
                "requested permission is empty".to_string(),
            ));
        }

        // 2-3. Groups holding a matching grant
        let authorized = self
            .permitted_groups(resource, resource_type, permission)
            .await?;
        if authorized.is_empty() {
            tracing::debug!(%user, %resource, %resource_type, %permission, "Denied: no matching grant");
            return Ok(false);
        }

        // 4. The user's memberships, sorted for binary search
        let mut memberships = self.directory.groups_of(user).await?;
        memberships.sort();

        // 5. First shared group wins
        for group in &authorized {
            if memberships.binary_search(group).is_ok() {
                tracing::debug!(%user, %resource, %resource_type, %permission, %group, "Allowed");
                return Ok(true);
            }
        }

        tracing::debug!(%user, %resource, %resource_type, %permission, "Denied: not a member of any granted group");
        Ok(false)
    }

    /// True when the directory knows `user`: an administrator or a member of
    /// at least one group.
    pub async fn is_known_user(&self, user: &str) -> Result<bool, AuthzError> {
        if user.is_empty() {
            return Ok(false);
        }
        if self.directory.is_administrator(user).await? {
            return Ok(true);
        }
        Ok(!self.directory.groups_of(user).await?.is_empty())
    }

    /// Groups whose grant genuinely covers `resource` for `permission`,
    /// after re-validating the storage prefilter with the matcher.
    pub async fn permitted_groups(
        &self,
        resource: &str,
        resource_type: ResourceType,
        permission: Permission,
    ) -> Result<Vec<String>, AuthzError> {
        let candidates = self
            .store
            .find_candidates(resource, resource_type, permission)
            .await?;

        let groups: BTreeSet<String> = candidates
            .into_iter()
            .filter(|c| {
                c.permission.contains(permission) && matcher::matches(&c.pattern, resource)
            })
            .map(|c| c.group)
            .collect();
        Ok(groups.into_iter().collect())
    }

    /// Authorize `group` for `permission` on resources matching `pattern`.
    ///
    /// Merges into an existing grant for the same tuple; stored bits only
    /// ever grow.
    pub async fn grant(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
        permission: Permission,
    ) -> Result<GrantOutcome, AuthzError> {
        if permission.is_empty() {
            return Err(AuthzError::InvalidRequest(
                "a grant needs at least one action".to_string(),
            ));
        }
        if group.is_empty() || pattern.is_empty() {
            return Err(AuthzError::InvalidRequest(
                "group and resource pattern must not be empty".to_string(),
            ));
        }

        let outcome = match self.store.exists(group, resource_type, pattern).await? {
            Some(current) if current.contains(permission) => {
                GrantOutcome::Unchanged { permission: current }
            }
            Some(current) => {
                // The upsert ORs in storage, so a concurrent writer cannot be lost.
                self.store
                    .upsert(group, resource_type, pattern, permission)
                    .await?;
                GrantOutcome::Merged {
                    previous: current,
                    permission: current | permission,
                }
            }
            None => {
                self.store
                    .upsert(group, resource_type, pattern, permission)
                    .await?;
                GrantOutcome::Created { permission }
            }
        };

        match outcome {
            GrantOutcome::Unchanged { .. } => {
                tracing::debug!(%group, %resource_type, %pattern, %permission, "Grant already covered")
            }
            _ => tracing::info!(
                %group,
                %resource_type,
                %pattern,
                stored = %outcome.permission(),
                "Grant recorded"
            ),
        }
        Ok(outcome)
    }
}
