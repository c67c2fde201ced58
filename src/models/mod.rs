//! Data models for Libris

pub mod audit;
pub mod ledger;
pub mod lending_unit;
pub mod permission;
pub mod user;

// Re-export commonly used types
pub use audit::{AuditCategory, AuditEvent, LogEntry};
pub use ledger::{LedgerEntry, LedgerEntryDetails};
pub use lending_unit::{LendingUnit, UnitStatus};
pub use permission::{HttpMethod, PermissionRule, PermissionTable};
pub use user::{Identity, Role, UserClaims};
