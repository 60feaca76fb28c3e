use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;

/// Application-level failures of the `groupgate` binary.
#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("Database error: {0}")]
    #[diagnostic(code(groupgate::db))]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Authz(#[from] AuthzError),

    #[error("{0}")]
    #[diagnostic(code(groupgate::other))]
    Other(String),
}
