use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Row Representation ---

/// Record
///
/// A single row as a JSON object keyed by column name. Request bodies for
/// create/update arrive in the same shape.
pub type Record = Map<String, Value>;

/// Equality filters keyed by field name. Ordered so generated SQL is deterministic.
pub type FilterMap = BTreeMap<String, String>;

/// CreatedId
///
/// Payload of a successful create or update: the affected primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct CreatedId {
    pub id: i64,
}

// --- Query Shapes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One sort key of a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Desc }
    }
}

/// Zero-based row window derived from `page`/`size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// ListQuery
///
/// The fully validated shape of a list request, handed to `Repository::select`.
/// Every field name in it has already been checked against the model's field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: FilterMap,
    pub order: Vec<OrderBy>,
    /// Projection; `None` selects every column.
    pub fields: Option<Vec<String>>,
    pub page: Option<PageWindow>,
}

// --- Soft Delete ---

/// Outcome of a soft delete, kept explicit so "missing" and "already deleted" differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDelete {
    Deleted,
    AlreadyDeleted,
    NotFound,
}

/// Column and sentinel value that mark a row as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteRule {
    pub field: String,
    pub sentinel: i64,
}

impl Default for SoftDeleteRule {
    fn default() -> Self {
        Self { field: "status".to_string(), sentinel: -1 }
    }
}
