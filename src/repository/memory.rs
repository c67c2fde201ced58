//! In-memory lending store.
//!
//! Each unit lives behind its own async mutex, so transactions on different units never
//! contend. Writes are staged on a copy of the unit's slot and only published on commit.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LendingStore, UnitInconsistency, UnitTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        ledger::{LedgerEntry, LedgerEntryDetails},
        lending_unit::{CreateLendingUnit, LendingUnit, UnitStatus, UpdateLendingUnit},
    },
    services::ledger,
};

#[derive(Debug, Clone)]
struct UnitSlot {
    unit: LendingUnit,
    archived: bool,
    entries: Vec<LedgerEntry>,
}

pub struct MemoryLendingStore {
    units: DashMap<i32, Arc<Mutex<UnitSlot>>>,
    /// Known book ids. `None` accepts any book.
    catalog: Option<HashSet<i32>>,
    next_unit_id: AtomicI32,
    next_entry_id: Arc<AtomicI32>,
}

impl MemoryLendingStore {
    pub fn new() -> Self {
        Self {
            units: DashMap::new(),
            catalog: None,
            next_unit_id: AtomicI32::new(1),
            next_entry_id: Arc::new(AtomicI32::new(1)),
        }
    }

    /// Store that only accepts units for the given books
    pub fn with_catalog(book_ids: impl IntoIterator<Item = i32>) -> Self {
        Self {
            catalog: Some(book_ids.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Snapshot of every slot handle. The map guard is released before any slot is locked.
    fn slots(&self) -> Vec<Arc<Mutex<UnitSlot>>> {
        self.units.iter().map(|entry| entry.value().clone()).collect()
    }

    fn slot(&self, unit_id: i32) -> Option<Arc<Mutex<UnitSlot>>> {
        self.units.get(&unit_id).map(|entry| entry.value().clone())
    }

    /// All ledger entries of a unit, archived or not. Used by consistency checks in tests.
    pub async fn entries_for(&self, unit_id: i32) -> Vec<LedgerEntry> {
        match self.slot(unit_id) {
            Some(slot) => slot.lock().await.entries.clone(),
            None => Vec::new(),
        }
    }
}

impl Default for MemoryLendingStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryUnitTransaction {
    guard: OwnedMutexGuard<UnitSlot>,
    staged: UnitSlot,
    next_entry_id: Arc<AtomicI32>,
}

#[async_trait]
impl UnitTransaction for MemoryUnitTransaction {
    fn unit(&self) -> &LendingUnit {
        &self.staged.unit
    }

    async fn open_entries(&mut self) -> AppResult<Vec<LedgerEntry>> {
        Ok(self.staged.entries.iter().filter(|e| e.is_open()).cloned().collect())
    }

    async fn set_status(&mut self, status: UnitStatus) -> AppResult<()> {
        self.staged.unit.status = status;
        Ok(())
    }

    async fn append_entry(&mut self, user_id: i64, borrow_date: DateTime<Utc>) -> AppResult<LedgerEntry> {
        let entry = LedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::SeqCst),
            unit_id: self.staged.unit.id,
            user_id,
            borrow_date,
            return_date: None,
        };
        self.staged.entries.push(entry.clone());
        Ok(entry)
    }

    async fn close_entry(&mut self, entry_id: i32, return_date: DateTime<Utc>) -> AppResult<LedgerEntry> {
        let entry = self
            .staged
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id && e.is_open())
            .ok_or_else(|| AppError::Internal(format!("Ledger entry {} is not open", entry_id)))?;
        entry.return_date = Some(return_date);
        Ok(entry.clone())
    }

    async fn archive(&mut self) -> AppResult<()> {
        self.staged.archived = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitTransaction { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl LendingStore for MemoryLendingStore {
    async fn begin(&self, unit_id: i32) -> AppResult<Option<Box<dyn UnitTransaction>>> {
        let Some(slot) = self.slot(unit_id) else {
            return Ok(None);
        };

        let guard = slot.lock_owned().await;
        if guard.archived {
            return Ok(None);
        }

        let staged = (*guard).clone();
        Ok(Some(Box::new(MemoryUnitTransaction {
            guard,
            staged,
            next_entry_id: self.next_entry_id.clone(),
        })))
    }

    async fn get_unit(&self, unit_id: i32) -> AppResult<Option<LendingUnit>> {
        let Some(slot) = self.slot(unit_id) else {
            return Ok(None);
        };
        let slot = slot.lock().await;
        Ok((!slot.archived).then(|| slot.unit.clone()))
    }

    async fn create_unit(&self, book_id: i32, data: &CreateLendingUnit) -> AppResult<LendingUnit> {
        if let Some(catalog) = &self.catalog {
            if !catalog.contains(&book_id) {
                return Err(AppError::BookNotFound(format!("Book {} does not exist", book_id)));
            }
        }

        let unit = LendingUnit {
            id: self.next_unit_id.fetch_add(1, Ordering::SeqCst),
            book_id,
            status: UnitStatus::Available,
            language: data.language.clone(),
        };
        self.units.insert(
            unit.id,
            Arc::new(Mutex::new(UnitSlot {
                unit: unit.clone(),
                archived: false,
                entries: Vec::new(),
            })),
        );
        Ok(unit)
    }

    async fn update_unit(
        &self,
        book_id: i32,
        unit_id: i32,
        data: &UpdateLendingUnit,
    ) -> AppResult<Option<LendingUnit>> {
        let Some(slot) = self.slot(unit_id) else {
            return Ok(None);
        };
        let mut slot = slot.lock().await;
        if slot.archived || slot.unit.book_id != book_id {
            return Ok(None);
        }
        if let Some(language) = &data.language {
            slot.unit.language = Some(language.clone());
        }
        Ok(Some(slot.unit.clone()))
    }

    async fn history(&self, user_id: i64) -> AppResult<Vec<LedgerEntryDetails>> {
        let mut result = Vec::new();
        for slot in self.slots() {
            let slot = slot.lock().await;
            result.extend(
                slot.entries
                    .iter()
                    .filter(|e| e.user_id == user_id)
                    .map(|e| LedgerEntryDetails::new(e.clone(), slot.unit.book_id)),
            );
        }
        result.sort_by_key(|e| e.id);
        Ok(result)
    }

    async fn inconsistent_units(&self) -> AppResult<Vec<UnitInconsistency>> {
        let mut result = Vec::new();
        for slot in self.slots() {
            let slot = slot.lock().await;
            if let Some(issue) = ledger::check_unit(&slot.unit, &slot.entries) {
                result.push(issue);
            }
        }
        result.sort_by_key(|i| i.unit_id);
        Ok(result)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
