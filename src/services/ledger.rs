//! Ledger consistency rules
//!
//! A unit is RESERVED exactly when it has one open ledger entry, and never has more than one.

use crate::{
    error::{AppError, AppResult},
    models::{ledger::LedgerEntry, lending_unit::{LendingUnit, UnitStatus}},
    repository::UnitInconsistency,
};

/// Status a unit must have given its number of open entries
pub fn expected_status(open_entries: usize) -> UnitStatus {
    if open_entries == 0 {
        UnitStatus::Available
    } else {
        UnitStatus::Reserved
    }
}

/// The single open entry among `entries`, if any.
///
/// More than one open entry is a broken ledger and surfaces as an internal error.
pub fn single_open_entry(unit_id: i32, entries: Vec<LedgerEntry>) -> AppResult<Option<LedgerEntry>> {
    let mut open = entries.into_iter().filter(LedgerEntry::is_open);
    let first = open.next();
    if open.next().is_some() {
        return Err(AppError::Internal(format!(
            "Lending unit {} has more than one open ledger entry",
            unit_id
        )));
    }
    Ok(first)
}

/// Compare a unit's status with its ledger. `None` when they agree.
pub fn check_unit(unit: &LendingUnit, entries: &[LedgerEntry]) -> Option<UnitInconsistency> {
    let open_entries = entries
        .iter()
        .filter(|e| e.unit_id == unit.id && e.is_open())
        .count();

    let consistent = open_entries <= 1 && expected_status(open_entries) == unit.status;
    if consistent {
        None
    } else {
        Some(UnitInconsistency {
            unit_id: unit.id,
            status: unit.status,
            open_entries: open_entries as i64,
        })
    }
}
