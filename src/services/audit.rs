//! Audit sink for the system log
//!
//! Recording is fire-and-forget: a failed write is logged and never reaches the caller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::audit::{AuditEvent, LogEntry},
    repository::logs::LogsRepository,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Queue an event. Must not block the caller.
    fn record(&self, event: AuditEvent);

    /// Newest entries first
    async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>>;
}

/// Writes events to the `log` table on a spawned task
#[derive(Clone)]
pub struct PgAuditSink {
    logs: LogsRepository,
}

impl PgAuditSink {
    pub fn new(logs: LogsRepository) -> Self {
        Self { logs }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    fn record(&self, event: AuditEvent) {
        let logs = self.logs.clone();
        tokio::spawn(async move {
            if let Err(e) = logs.insert(&event).await {
                tracing::warn!(
                    action = %event.action,
                    category = event.category.as_str(),
                    error = %e,
                    "Failed to write audit log entry"
                );
            }
        });
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>> {
        self.logs.recent(limit).await
    }
}

/// Keeps events in process memory (memory backend and tests)
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(action = %event.action, "Audit log poisoned, dropping entry");
            return;
        };
        let id = entries.len() as i32 + 1;
        entries.push(LogEntry {
            id,
            date_time: Utc::now(),
            user_id: event.user_id,
            category: event.category.as_str().to_string(),
            action: event.action,
            description: event.description,
        });
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("Audit log poisoned".to_string()))?;
        Ok(entries.iter().rev().take(limit.max(0) as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditCategory;

    #[tokio::test]
    async fn test_memory_sink_returns_newest_first() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::new(Some(1), AuditCategory::Borrow, "CHECKOUT"));
        sink.record(AuditEvent::new(Some(1), AuditCategory::Borrow, "RETURN").describe("unit 3"));

        let recent = sink.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "RETURN");
        assert_eq!(recent[0].description.as_deref(), Some("unit 3"));
        assert_eq!(recent[1].category, "BORROW");

        assert_eq!(sink.recent(1).await.unwrap().len(), 1);
    }
}
