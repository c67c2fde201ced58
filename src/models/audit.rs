//! System log (audit trail) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Event categories written to the system log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditCategory {
    Borrow,
    Book,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Borrow => "BORROW",
            AuditCategory::Book => "BOOK",
        }
    }
}

/// Event handed to the audit sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub user_id: Option<i64>,
    pub category: AuditCategory,
    pub action: String,
    pub description: Option<String>,
}

impl AuditEvent {
    pub fn new(user_id: Option<i64>, category: AuditCategory, action: &str) -> Self {
        Self {
            user_id,
            category,
            action: action.to_string(),
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Persisted system log row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LogEntry {
    pub id: i32,
    pub date_time: DateTime<Utc>,
    pub user_id: Option<i64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub category: String,
    pub action: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// Maximum number of entries (default 50, max 500)
    pub limit: Option<i64>,
}

impl LogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}
