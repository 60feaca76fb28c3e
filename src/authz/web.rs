use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::authz::engine::Authorizer;
use crate::authz::types::{Action, GrantOutcome, Permission, ResourceType};
use crate::session::{SessionCookie, SessionStore};
use crate::settings::Session as SessionCfg;

#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub sessions: Arc<SessionStore>,
    pub session_cfg: Arc<SessionCfg>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user: String,
    pub resource: String,
    pub resource_type: ResourceType,
    pub action: Action,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub group: String,
    pub resource_type: ResourceType,
    pub pattern: String,
    pub actions: Vec<Action>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/check", post(handle_check))
        .route("/v1/session", post(handle_session))
        .route("/v1/grants", post(handle_grant))
        .route("/v1/logout", post(handle_logout))
        .route("/healthz", get(health))
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    match state
        .authorizer
        .can_perform_action(
            &req.user,
            &req.resource,
            req.resource_type,
            Permission::from(req.action),
        )
        .await
    {
        Ok(allowed) => Json(CheckResponse { allowed }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, user = %req.user, "Authorization check failed");
            e.into_response()
        }
    }
}

/// Open a session for the user named in the trusted identity header.
///
/// Authentication happens in the proxy in front of us; the directory only has
/// to know the user.
async fn handle_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(user) = headers
        .get(state.session_cfg.trusted_user_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return error_response(StatusCode::UNAUTHORIZED, "authenticated user header missing");
    };

    match state.authorizer.is_known_user(user).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(%user, "Session refused: user unknown to directory");
            return error_response(StatusCode::FORBIDDEN, "unknown user");
        }
        Err(e) => return e.into_response(),
    }

    let cookie = SessionCookie::new(state.sessions.create(user));
    tracing::info!(%user, "Session opened");
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cookie.to_cookie_header(&state.session_cfg))],
    )
        .into_response()
}

/// Record a grant on behalf of the logged-in user, who must be allowed to
/// update the target group.
async fn handle_grant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GrantRequest>,
) -> Response {
    let Some(actor) = SessionCookie::from_headers(&headers, &state.session_cfg.cookie_name)
        .and_then(|cookie| state.sessions.get(&cookie.session_id))
    else {
        return error_response(StatusCode::UNAUTHORIZED, "login required");
    };

    match state
        .authorizer
        .can_perform_action(&actor, &req.group, ResourceType::Group, Permission::UPDATE)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(%actor, group = %req.group, "Grant refused: actor may not update group");
            return error_response(StatusCode::FORBIDDEN, "not allowed to manage this group");
        }
        Err(e) => return e.into_response(),
    }

    let permission: Permission = req.actions.iter().copied().collect();
    match state
        .authorizer
        .grant(&req.group, req.resource_type, &req.pattern, permission)
        .await
    {
        Ok(outcome) => {
            tracing::info!(%actor, group = %req.group, pattern = %req.pattern, "Grant requested");
            Json::<GrantOutcome>(outcome).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(cookie) = SessionCookie::from_headers(&headers, &state.session_cfg.cookie_name) {
        state.sessions.expire(&cookie.session_id);
    }
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            SessionCookie::delete_cookie_header(&state.session_cfg),
        )],
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn serve(addr: &str, state: AppState) -> miette::Result<()> {
    use miette::IntoDiagnostic;

    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    tracing::info!(%addr, "groupgate listening");
    axum::serve(listener, router(state)).await.into_diagnostic()?;
    Ok(())
}
