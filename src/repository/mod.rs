//! Repository layer for lending persistence
//!
//! Lending transitions go through [`LendingStore::begin`], which hands out a
//! [`UnitTransaction`] holding exclusive access to a single unit until it is committed or
//! dropped. Dropping a transaction without committing discards every staged write.

pub mod logs;
pub mod memory;
pub mod units;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        ledger::{LedgerEntry, LedgerEntryDetails},
        lending_unit::{CreateLendingUnit, LendingUnit, UnitStatus, UpdateLendingUnit},
    },
};

/// A unit whose availability disagrees with its open ledger entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInconsistency {
    pub unit_id: i32,
    pub status: UnitStatus,
    pub open_entries: i64,
}

/// Exclusive, all-or-nothing access to one lending unit and its ledger entries
#[async_trait]
pub trait UnitTransaction: Send {
    /// Unit as it was when the transaction started, with staged status changes applied
    fn unit(&self) -> &LendingUnit;

    /// Every open ledger entry for the unit. More than one means the ledger is corrupt.
    async fn open_entries(&mut self) -> AppResult<Vec<LedgerEntry>>;

    async fn set_status(&mut self, status: UnitStatus) -> AppResult<()>;

    async fn append_entry(&mut self, user_id: i64, borrow_date: DateTime<Utc>) -> AppResult<LedgerEntry>;

    async fn close_entry(&mut self, entry_id: i32, return_date: DateTime<Utc>) -> AppResult<LedgerEntry>;

    /// Soft-delete the unit. Its ledger entries are kept.
    async fn archive(&mut self) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Persistence contract for lending units and the ledger
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Start a unit-scoped transaction. `None` when the unit does not exist.
    async fn begin(&self, unit_id: i32) -> AppResult<Option<Box<dyn UnitTransaction>>>;

    async fn get_unit(&self, unit_id: i32) -> AppResult<Option<LendingUnit>>;

    /// Fails with `BookNotFound` when the book does not exist
    async fn create_unit(&self, book_id: i32, data: &CreateLendingUnit) -> AppResult<LendingUnit>;

    async fn update_unit(
        &self,
        book_id: i32,
        unit_id: i32,
        data: &UpdateLendingUnit,
    ) -> AppResult<Option<LendingUnit>>;

    /// All entries of a borrower, in creation order
    async fn history(&self, user_id: i64) -> AppResult<Vec<LedgerEntryDetails>>;

    async fn inconsistent_units(&self) -> AppResult<Vec<UnitInconsistency>>;

    async fn ping(&self) -> AppResult<()>;
}

/// PostgreSQL repositories sharing one connection pool
#[derive(Clone)]
pub struct Repository {
    pub units: units::UnitsRepository,
    pub logs: logs::LogsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            units: units::UnitsRepository::new(pool.clone()),
            logs: logs::LogsRepository::new(pool),
        }
    }
}
