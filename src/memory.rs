use std::{
    cmp::Ordering,
    sync::atomic::{AtomicI64, Ordering as AtomicOrdering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    models::{Direction, ListQuery, Record, SoftDelete},
    repository::{Repository, RepositoryError},
};

/// MemoryRepository
///
/// An in-process `Repository` holding its rows behind a `RwLock`.
/// Filter semantics mirror the Postgres implementation: values match on their text form.
pub struct MemoryRepository {
    table: String,
    fields: Vec<String>,
    rows: RwLock<Vec<Record>>,
    next_id: AtomicI64,
}

impl MemoryRepository {
    /// Creates an empty table. An `id` column is added when `fields` lacks one.
    pub fn new<I, S>(table: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rows(table, fields, Vec::new())
    }

    /// Creates a table pre-filled with `rows`; ids continue after the largest seeded id.
    pub fn with_rows<I, S>(table: impl Into<String>, fields: I, rows: Vec<Record>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if !fields.iter().any(|f| f == "id") {
            fields.insert(0, "id".to_string());
        }
        let max_id = rows.iter().filter_map(row_id).max().unwrap_or(0);
        Self {
            table: table.into(),
            fields,
            rows: RwLock::new(rows),
            next_id: AtomicI64::new(max_id + 1),
        }
    }

    /// Snapshot of every stored row, including soft-deleted ones.
    pub async fn rows(&self) -> Vec<Record> {
        self.rows.read().await.clone()
    }

    fn check_known<'a>(&self, keys: impl Iterator<Item = &'a String>) -> Result<(), RepositoryError> {
        for key in keys {
            if !self.fields.contains(key) {
                return Err(RepositoryError::UnknownField(key.clone()));
            }
        }
        Ok(())
    }
}

// --- Value helpers ---

/// Text form used for equality filters, matching `column::text` in Postgres.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn row_id(row: &Record) -> Option<i64> {
    row.get("id").and_then(as_i64)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn table(&self) -> &str {
        &self.table
    }

    async fn fields(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.fields.clone())
    }

    async fn select(&self, query: &ListQuery) -> Result<Vec<Record>, RepositoryError> {
        let rows = self.rows.read().await;

        let mut matched: Vec<&Record> = rows
            .iter()
            .filter(|row| {
                query.filters.iter().all(|(field, expected)| {
                    row.get(field).and_then(as_text).as_deref() == Some(expected.as_str())
                })
            })
            .collect();

        matched.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|key| {
                    let ord = compare_values(a.get(&key.field), b.get(&key.field));
                    match key.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let (offset, limit) = match query.page {
            Some(page) => (
                usize::try_from(page.offset).unwrap_or(usize::MAX),
                usize::try_from(page.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| match &query.fields {
                Some(fields) => fields
                    .iter()
                    .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
                    .collect(),
                None => row.clone(),
            })
            .collect())
    }

    async fn insert(&self, params: Record) -> Result<i64, RepositoryError> {
        if params.is_empty() {
            return Err(RepositoryError::EmptyPayload);
        }
        self.check_known(params.keys())?;

        let mut rows = self.rows.write().await;
        let id = match params.get("id").and_then(as_i64) {
            Some(id) => {
                let next = id
                    .checked_add(1)
                    .filter(|_| id > 0)
                    .ok_or_else(|| RepositoryError::InvalidIdentifier(id.to_string()))?;
                if rows.iter().any(|row| row_id(row) == Some(id)) {
                    return Err(RepositoryError::Conflict(format!(
                        "duplicate id {id} in {}",
                        self.table
                    )));
                }
                self.next_id.fetch_max(next, AtomicOrdering::SeqCst);
                id
            }
            None => self.next_id.fetch_add(1, AtomicOrdering::SeqCst),
        };

        let mut row: Record = self
            .fields
            .iter()
            .map(|f| (f.clone(), Value::Null))
            .collect();
        row.extend(params);
        row.insert("id".to_string(), Value::from(id));
        rows.push(row);
        Ok(id)
    }

    async fn find(&self, id: i64) -> Result<Option<Record>, RepositoryError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|row| row_id(row) == Some(id)).cloned())
    }

    async fn update(&self, id: i64, params: Record) -> Result<u64, RepositoryError> {
        if params.is_empty() {
            return Err(RepositoryError::EmptyPayload);
        }
        self.check_known(params.keys())?;

        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row_id(row) == Some(id)) {
            Some(row) => {
                row.extend(params);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn soft_delete(
        &self,
        id: i64,
        field: &str,
        sentinel: i64,
    ) -> Result<SoftDelete, RepositoryError> {
        if !self.fields.iter().any(|f| f == field) {
            return Err(RepositoryError::UnknownField(field.to_string()));
        }

        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|row| row_id(row) == Some(id)) else {
            return Ok(SoftDelete::NotFound);
        };
        if row.get(field).and_then(as_i64) == Some(sentinel) {
            return Ok(SoftDelete::AlreadyDeleted);
        }
        row.insert(field.to_string(), Value::from(sentinel));
        Ok(SoftDelete::Deleted)
    }
}
