pub mod engine;
pub mod errors;
pub mod matcher;
pub mod types;
pub mod web;

pub use engine::Authorizer;
pub use errors::AuthzError;
pub use types::{Action, Candidate, GrantOutcome, Permission, ResourceType};
