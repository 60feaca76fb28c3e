use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class of resource a grant pattern applies to.
///
/// Stored as a small integer in the `resource_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Group,
    Service,
}

impl ResourceType {
    pub fn as_i32(self) -> i32 {
        match self {
            ResourceType::Group => 1,
            ResourceType::Service => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Group => "group",
            ResourceType::Service => "service",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "group" => Ok(ResourceType::Group),
            "service" | "svc" => Ok(ResourceType::Service),
            other => Err(format!("unknown resource type `{other}` (expected group or service)")),
        }
    }
}

/// A single action a grant can authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Create, Action::Update, Action::Delete];

    fn from_flag(flag: Permission) -> Option<Self> {
        Action::ALL
            .into_iter()
            .find(|a| Permission::from(*a) == flag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(format!(
                "unknown action `{other}` (expected create, update or delete)"
            )),
        }
    }
}

bitflags! {
    /// Bitmask over [`Action`]s. Only the three defined bits can ever be set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permission: u8 {
        const CREATE = 1;
        const UPDATE = 1 << 1;
        const DELETE = 1 << 2;
    }
}

impl Permission {
    /// Validates the integer held in the `permission` column.
    pub fn from_column(value: i32) -> Option<Self> {
        u8::try_from(value).ok().and_then(Permission::from_bits)
    }

    pub fn to_column(self) -> i32 {
        i32::from(self.bits())
    }

    pub fn actions(self) -> Vec<Action> {
        self.iter().filter_map(Action::from_flag).collect()
    }
}

impl From<Action> for Permission {
    fn from(action: Action) -> Self {
        match action {
            Action::Create => Permission::CREATE,
            Action::Update => Permission::UPDATE,
            Action::Delete => Permission::DELETE,
        }
    }
}

impl FromIterator<Action> for Permission {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Permission::empty(), |acc, a| acc | Permission::from(a))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.actions().into_iter().map(Action::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.actions().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let actions = Vec::<Action>::deserialize(deserializer)?;
        Ok(actions.into_iter().collect())
    }
}

/// A grant row returned by the storage prefilter, before pattern re-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub group: String,
    pub pattern: String,
    /// Stored bits of the row, already checked to be in range.
    pub permission: Permission,
}

/// What [`crate::authz::engine::Authorizer::grant`] did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum GrantOutcome {
    Created { permission: Permission },
    Merged { previous: Permission, permission: Permission },
    Unchanged { permission: Permission },
}

impl GrantOutcome {
    /// Bits stored for the tuple after the grant.
    pub fn permission(&self) -> Permission {
        match self {
            GrantOutcome::Created { permission }
            | GrantOutcome::Merged { permission, .. }
            | GrantOutcome::Unchanged { permission } => *permission,
        }
    }
}
