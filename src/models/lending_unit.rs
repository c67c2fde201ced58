//! Lending unit (book instance) model and related types

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

/// Availability of a lending unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitStatus {
    #[default]
    Available,
    Reserved,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Reserved => "RESERVED",
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Ok(UnitStatus::Available),
            "RESERVED" => Ok(UnitStatus::Reserved),
            _ => Err(format!("Invalid unit status: {}", s)),
        }
    }
}

// Stored as TEXT in the book_instance table
impl sqlx::Type<Postgres> for UnitStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for UnitStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for UnitStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// One checkoutable copy of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LendingUnit {
    pub id: i32,
    pub book_id: i32,
    pub status: UnitStatus,
    pub language: Option<String>,
}

/// Create lending unit request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateLendingUnit {
    #[validate(length(min = 1, max = 64))]
    pub language: Option<String>,
}

/// Update lending unit request. Availability is not writable here.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateLendingUnit {
    #[validate(length(min = 1, max = 64))]
    pub language: Option<String>,
}
