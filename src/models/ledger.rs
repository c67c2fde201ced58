//! Ledger (borrowed book) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One borrow event. Open while `return_date` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LedgerEntry {
    pub id: i32,
    pub unit_id: i32,
    pub user_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Ledger entry enriched with the unit's catalog reference, for history listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LedgerEntryDetails {
    pub id: i32,
    pub unit_id: i32,
    pub book_id: i32,
    pub user_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_open: bool,
}

impl LedgerEntryDetails {
    pub fn new(entry: LedgerEntry, book_id: i32) -> Self {
        Self {
            is_open: entry.is_open(),
            id: entry.id,
            unit_id: entry.unit_id,
            book_id,
            user_id: entry.user_id,
            borrow_date: entry.borrow_date,
            return_date: entry.return_date,
        }
    }
}
