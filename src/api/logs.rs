//! System log endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::audit::{LogEntry, LogQuery},
};

/// List recent system log entries, newest first
#[utoipa::path(
    get,
    path = "/private/system-logs",
    tag = "system-logs",
    security(("bearer_auth" = [])),
    params(LogQuery),
    responses(
        (status = 200, description = "System log entries", body = Vec<LogEntry>),
        (status = 403, description = "Not allowed for this role")
    )
)]
pub async fn list_logs(
    State(state): State<crate::AppState>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<LogEntry>>> {
    let entries = state.services.audit.recent(query.limit()).await?;
    Ok(Json(entries))
}
