use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Permission store failed to {operation}")]
    #[diagnostic(
        code(groupgate::authz::persistence),
        help("Check that the database is reachable and the `permissions` table has been migrated")
    )]
    Persistence {
        operation: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("Corrupt grant row for group `{group}`: {reason}")]
    #[diagnostic(
        code(groupgate::authz::corrupt_grant),
        help("Stored permission bits must combine create=1, update=2, delete=4; resource types are group=1, service=2")
    )]
    CorruptGrant { group: String, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Invalid request: {0}")]
    #[diagnostic(code(groupgate::authz::invalid_request))]
    InvalidRequest(String),

    #[error("Unknown storage dialect `{0}`")]
    #[diagnostic(
        code(groupgate::authz::unknown_dialect),
        help("Supported dialects: sqlite, postgres")
    )]
    UnknownDialect(String),

    #[error("Configured dialect `{configured}` does not match the `{actual}` connection")]
    #[diagnostic(
        code(groupgate::authz::dialect_mismatch),
        help("Set database.dialect to match the scheme of database.url, or leave it unset")
    )]
    DialectMismatch {
        configured: &'static str,
        actual: String,
    },
}

impl AuthzError {
    pub(crate) fn persistence(operation: &'static str) -> impl FnOnce(sea_orm::DbErr) -> Self {
        move |source| AuthzError::Persistence { operation, source }
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthzError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
