//! groupgate - group-scoped permission grants
//!
//! Decides whether a user may create, update or delete a group or service
//! record, based on grants stored per group with wildcard resource patterns.

pub mod authz;
pub mod directory;
pub mod errors;
pub mod jobs;
pub mod session;
pub mod settings;
pub mod store;
