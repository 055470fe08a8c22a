//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{domain::UserId, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Currently registered identities, sorted
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let users = state
        .hub
        .registry()
        .identities()
        .await
        .into_iter()
        .map(UserId::into_string)
        .collect();
    Json(users)
}
