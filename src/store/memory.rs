use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::PermissionStore;
use crate::authz::errors::AuthzError;
use crate::authz::types::{Candidate, Permission, ResourceType};

type GrantKey = (String, ResourceType, String);

/// Process-local [`PermissionStore`], for tests and embedding.
///
/// Mirrors the SQL adapters, including the first-character prefilter.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: Mutex<HashMap<GrantKey, Permission>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GrantKey, Permission>> {
        // A poisoned map still holds consistent entries: every write is a single insert.
        self.grants.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Same rows the SQL `LIKE` prefix admits, minus its ASCII case folding.
fn passes_prefilter(pattern: &str, resource: &str) -> bool {
    if pattern == resource || pattern == "*" {
        return true;
    }
    match resource.chars().next() {
        Some(first) => pattern.starts_with(first),
        None => true,
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn find_candidates(
        &self,
        resource: &str,
        resource_type: ResourceType,
        permission: Permission,
    ) -> Result<Vec<Candidate>, AuthzError> {
        let grants = self.lock();
        let mut candidates: Vec<Candidate> = grants
            .iter()
            .filter(|((_, rt, pattern), bits)| {
                *rt == resource_type
                    && bits.contains(permission)
                    && passes_prefilter(pattern, resource)
            })
            .map(|((group, _, pattern), bits)| Candidate {
                group: group.clone(),
                pattern: pattern.clone(),
                permission: *bits,
            })
            .collect();
        candidates.sort_by(|a, b| (&a.group, &a.pattern).cmp(&(&b.group, &b.pattern)));
        Ok(candidates)
    }

    async fn exists(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
    ) -> Result<Option<Permission>, AuthzError> {
        let key = (group.to_string(), resource_type, pattern.to_string());
        Ok(self.lock().get(&key).copied())
    }

    async fn upsert(
        &self,
        group: &str,
        resource_type: ResourceType,
        pattern: &str,
        permission: Permission,
    ) -> Result<(), AuthzError> {
        let key = (group.to_string(), resource_type, pattern.to_string());
        *self.lock().entry(key).or_insert(Permission::empty()) |= permission;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_union() {
        let store = MemoryPermissionStore::new();
        store
            .upsert("eng", ResourceType::Group, "svc-*", Permission::UPDATE)
            .await
            .unwrap();
        store
            .upsert("eng", ResourceType::Group, "svc-*", Permission::CREATE | Permission::UPDATE)
            .await
            .unwrap();
        assert_eq!(
            store.exists("eng", ResourceType::Group, "svc-*").await.unwrap(),
            Some(Permission::CREATE | Permission::UPDATE)
        );
    }

    #[tokio::test]
    async fn test_candidates_follow_sql_prefilter() {
        let store = MemoryPermissionStore::new();
        for (group, pattern) in [("eng", "svc-*"), ("all", "*"), ("exact", "svc-x"), ("web", "web-*")] {
            store
                .upsert(group, ResourceType::Group, pattern, Permission::CREATE)
                .await
                .unwrap();
        }

        let groups: Vec<String> = store
            .find_candidates("sales", ResourceType::Group, Permission::CREATE)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.group)
            .collect();
        assert_eq!(groups, vec!["all", "eng", "exact"]);

        assert!(store
            .find_candidates("sales", ResourceType::Service, Permission::CREATE)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .find_candidates("svc-x", ResourceType::Group, Permission::DELETE)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_prefilter_for_empty_resource() {
        assert!(passes_prefilter("anything", ""));
        assert!(passes_prefilter("*", ""));
    }

    #[test]
    fn test_prefilter_treats_like_metacharacters_literally() {
        assert!(passes_prefilter("\\svc-*", "\\svc-a"));
        assert!(passes_prefilter("_svc-*", "_svc-a"));
        assert!(!passes_prefilter("xsvc-*", "_svc-a"));
        assert!(!passes_prefilter("xsvc-*", "%svc-a"));
    }
}
