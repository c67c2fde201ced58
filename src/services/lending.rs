//! Lending state machine
//!
//! ```text
//! AVAILABLE --checkout(identity)--> RESERVED
//! RESERVED  --return()-----------> AVAILABLE
//! ```
//!
//! Each transition reads the unit, validates the move, writes the new status and the
//! ledger change inside one unit-scoped store transaction. Anything short of a commit
//! leaves the unit and its ledger untouched.

use std::sync::Arc;

use chrono::Utc;

use super::{audit::AuditSink, ledger};
use crate::{
    error::{AppError, AppResult, LendingError, LendingResult},
    models::{
        audit::{AuditCategory, AuditEvent},
        ledger::{LedgerEntry, LedgerEntryDetails},
        lending_unit::{CreateLendingUnit, LendingUnit, UnitStatus, UpdateLendingUnit},
    },
    repository::{LendingStore, UnitInconsistency},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Checkout,
    Return,
}

impl Transition {
    /// Target status, or `None` when the transition is not defined from `from`
    pub fn apply(self, from: UnitStatus) -> Option<UnitStatus> {
        match (self, from) {
            (Transition::Checkout, UnitStatus::Available) => Some(UnitStatus::Reserved),
            (Transition::Return, UnitStatus::Reserved) => Some(UnitStatus::Available),
            _ => None,
        }
    }

    fn rejection(self, unit_id: i32) -> LendingError {
        match self {
            Transition::Checkout => LendingError::Unavailable(unit_id),
            Transition::Return => LendingError::NoOpenLoan(unit_id),
        }
    }
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn LendingStore>,
    audit: Arc<dyn AuditSink>,
}

impl LendingService {
    pub fn new(store: Arc<dyn LendingStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Reserve a unit for `user_id` and open a ledger entry
    pub async fn checkout(&self, unit_id: i32, user_id: i64) -> LendingResult<LedgerEntry> {
        let mut tx = self
            .store
            .begin(unit_id)
            .await?
            .ok_or(LendingError::NotFound(unit_id))?;

        let current = tx.unit().status;
        let next = Transition::Checkout
            .apply(current)
            .ok_or_else(|| Transition::Checkout.rejection(unit_id))?;

        // An AVAILABLE unit with an open entry means the ledger was edited behind our back
        if let Some(open) = ledger::single_open_entry(unit_id, tx.open_entries().await?)? {
            return Err(AppError::Internal(format!(
                "Lending unit {} is AVAILABLE but ledger entry {} is open",
                unit_id, open.id
            ))
            .into());
        }

        tx.set_status(next).await?;
        let entry = tx.append_entry(user_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(unit_id, user_id, entry_id = entry.id, "Lending unit checked out");
        self.audit.record(
            AuditEvent::new(Some(user_id), AuditCategory::Borrow, "CHECKOUT")
                .describe(format!("Borrowed lending unit {}", unit_id)),
        );

        Ok(entry)
    }

    /// Release a unit and close its open ledger entry
    pub async fn return_unit(&self, unit_id: i32) -> LendingResult<LedgerEntry> {
        let mut tx = self
            .store
            .begin(unit_id)
            .await?
            .ok_or(LendingError::NotFound(unit_id))?;

        let current = tx.unit().status;
        let next = Transition::Return
            .apply(current)
            .ok_or_else(|| Transition::Return.rejection(unit_id))?;

        let open = ledger::single_open_entry(unit_id, tx.open_entries().await?)?.ok_or_else(|| {
            AppError::Internal(format!(
                "Lending unit {} is RESERVED without an open ledger entry",
                unit_id
            ))
        })?;

        tx.set_status(next).await?;
        let entry = tx.close_entry(open.id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(unit_id, user_id = entry.user_id, entry_id = entry.id, "Lending unit returned");
        self.audit.record(
            AuditEvent::new(Some(entry.user_id), AuditCategory::Borrow, "RETURN")
                .describe(format!("Returned lending unit {}", unit_id)),
        );

        Ok(entry)
    }

    /// Every ledger entry of a borrower, oldest first
    pub async fn history(&self, user_id: i64) -> AppResult<Vec<LedgerEntryDetails>> {
        self.store.history(user_id).await
    }

    /// Open ledger entries of a borrower
    pub async fn active_loans(&self, user_id: i64) -> AppResult<Vec<LedgerEntryDetails>> {
        let mut entries = self.store.history(user_id).await?;
        entries.retain(|e| e.is_open);
        Ok(entries)
    }

    pub async fn create_unit(
        &self,
        book_id: i32,
        data: &CreateLendingUnit,
        actor: i64,
    ) -> AppResult<LendingUnit> {
        let unit = self.store.create_unit(book_id, data).await?;

        self.audit.record(
            AuditEvent::new(Some(actor), AuditCategory::Book, "CREATE_INSTANCE")
                .describe(format!("Created lending unit {} for book {}", unit.id, book_id)),
        );
        Ok(unit)
    }

    pub async fn get_unit(&self, book_id: i32, unit_id: i32) -> AppResult<LendingUnit> {
        self.store
            .get_unit(unit_id)
            .await?
            .filter(|unit| unit.book_id == book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book instance {} not found", unit_id)))
    }

    pub async fn update_unit(
        &self,
        book_id: i32,
        unit_id: i32,
        data: &UpdateLendingUnit,
        actor: i64,
    ) -> AppResult<LendingUnit> {
        let unit = self
            .store
            .update_unit(book_id, unit_id, data)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book instance {} not found", unit_id)))?;

        self.audit.record(
            AuditEvent::new(Some(actor), AuditCategory::Book, "UPDATE_INSTANCE")
                .describe(format!("Updated lending unit {}", unit_id)),
        );
        Ok(unit)
    }

    /// Archive a unit. Rejected while it is on loan.
    pub async fn delete_unit(&self, book_id: i32, unit_id: i32, actor: i64) -> AppResult<()> {
        let not_found = || AppError::NotFound(format!("Book instance {} not found", unit_id));

        let mut tx = self.store.begin(unit_id).await?.ok_or_else(not_found)?;
        if tx.unit().book_id != book_id {
            return Err(not_found());
        }
        if tx.unit().status == UnitStatus::Reserved {
            return Err(AppError::Conflict(format!(
                "Book instance {} is on loan and cannot be deleted",
                unit_id
            )));
        }

        tx.archive().await?;
        tx.commit().await?;

        self.audit.record(
            AuditEvent::new(Some(actor), AuditCategory::Book, "DELETE_INSTANCE")
                .describe(format!("Deleted lending unit {}", unit_id)),
        );
        Ok(())
    }

    /// Log every unit whose status disagrees with its ledger
    pub async fn audit_consistency(&self) -> AppResult<Vec<UnitInconsistency>> {
        let issues = self.store.inconsistent_units().await?;
        for issue in &issues {
            tracing::warn!(
                unit_id = issue.unit_id,
                status = %issue.status,
                open_entries = issue.open_entries,
                "Lending unit status disagrees with its ledger"
            );
        }
        Ok(issues)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
