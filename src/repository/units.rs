//! PostgreSQL lending store (book_instance / borrowed_book tables)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{LendingStore, UnitInconsistency, UnitTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        ledger::{LedgerEntry, LedgerEntryDetails},
        lending_unit::{CreateLendingUnit, LendingUnit, UnitStatus, UpdateLendingUnit},
    },
};

const ENTRY_COLUMNS: &str = "id, book_instance_id AS unit_id, user_id, borrow_date, return_date";

#[derive(Clone)]
pub struct UnitsRepository {
    pool: Pool<Postgres>,
}

impl UnitsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Row-locked transaction over one `book_instance` row
pub struct PgUnitTransaction {
    tx: Transaction<'static, Postgres>,
    unit: LendingUnit,
}

#[async_trait]
impl UnitTransaction for PgUnitTransaction {
    fn unit(&self) -> &LendingUnit {
        &self.unit
    }

    async fn open_entries(&mut self) -> AppResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {} FROM borrowed_book WHERE book_instance_id = $1 AND return_date IS NULL ORDER BY id",
            ENTRY_COLUMNS
        ))
        .bind(self.unit.id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn set_status(&mut self, status: UnitStatus) -> AppResult<()> {
        sqlx::query("UPDATE book_instance SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(self.unit.id)
            .execute(&mut *self.tx)
            .await?;
        self.unit.status = status;
        Ok(())
    }

    async fn append_entry(&mut self, user_id: i64, borrow_date: DateTime<Utc>) -> AppResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO borrowed_book (book_instance_id, user_id, borrow_date)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(self.unit.id)
        .bind(user_id)
        .bind(borrow_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn close_entry(&mut self, entry_id: i32, return_date: DateTime<Utc>) -> AppResult<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            UPDATE borrowed_book SET return_date = $1
            WHERE id = $2 AND book_instance_id = $3 AND return_date IS NULL
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(return_date)
        .bind(entry_id)
        .bind(self.unit.id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Ledger entry {} is not open", entry_id)))
    }

    async fn archive(&mut self) -> AppResult<()> {
        sqlx::query("UPDATE book_instance SET archived_at = NOW() WHERE id = $1")
            .bind(self.unit.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LendingStore for UnitsRepository {
    async fn begin(&self, unit_id: i32) -> AppResult<Option<Box<dyn UnitTransaction>>> {
        let mut tx = self.pool.begin().await?;

        // Row lock held until commit or rollback
        let unit = sqlx::query_as::<_, LendingUnit>(
            r#"
            SELECT id, book_id, status, language FROM book_instance
            WHERE id = $1 AND archived_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(unit_id)
        .fetch_optional(&mut *tx)
        .await?;

        Ok(unit.map(|unit| Box::new(PgUnitTransaction { tx, unit }) as Box<dyn UnitTransaction>))
    }

    async fn get_unit(&self, unit_id: i32) -> AppResult<Option<LendingUnit>> {
        let unit = sqlx::query_as::<_, LendingUnit>(
            "SELECT id, book_id, status, language FROM book_instance WHERE id = $1 AND archived_at IS NULL",
        )
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(unit)
    }

    async fn create_unit(&self, book_id: i32, data: &CreateLendingUnit) -> AppResult<LendingUnit> {
        let result = sqlx::query_as::<_, LendingUnit>(
            r#"
            INSERT INTO book_instance (book_id, status, language)
            VALUES ($1, $2, $3)
            RETURNING id, book_id, status, language
            "#,
        )
        .bind(book_id)
        .bind(UnitStatus::Available)
        .bind(&data.language)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(unit) => Ok(unit),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(AppError::BookNotFound(format!("Book {} does not exist", book_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_unit(
        &self,
        book_id: i32,
        unit_id: i32,
        data: &UpdateLendingUnit,
    ) -> AppResult<Option<LendingUnit>> {
        let unit = sqlx::query_as::<_, LendingUnit>(
            r#"
            UPDATE book_instance SET language = COALESCE($1, language)
            WHERE id = $2 AND book_id = $3 AND archived_at IS NULL
            RETURNING id, book_id, status, language
            "#,
        )
        .bind(&data.language)
        .bind(unit_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(unit)
    }

    async fn history(&self, user_id: i64) -> AppResult<Vec<LedgerEntryDetails>> {
        let entries = sqlx::query_as::<_, LedgerEntryDetails>(
            r#"
            SELECT b.id, b.book_instance_id AS unit_id, u.book_id, b.user_id,
                   b.borrow_date, b.return_date, (b.return_date IS NULL) AS is_open
            FROM borrowed_book b
            JOIN book_instance u ON u.id = b.book_instance_id
            WHERE b.user_id = $1
            ORDER BY b.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn inconsistent_units(&self) -> AppResult<Vec<UnitInconsistency>> {
        let rows: Vec<(i32, UnitStatus, i64)> = sqlx::query_as(
            r#"
            SELECT u.id, u.status,
                   COUNT(b.id) FILTER (WHERE b.return_date IS NULL) AS open_entries
            FROM book_instance u
            LEFT JOIN borrowed_book b ON b.book_instance_id = u.id
            GROUP BY u.id, u.status
            HAVING (u.status = 'RESERVED')
                <> (COUNT(b.id) FILTER (WHERE b.return_date IS NULL) = 1)
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(unit_id, status, open_entries)| UnitInconsistency {
                unit_id,
                status,
                open_entries,
            })
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
