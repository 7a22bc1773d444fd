use crate::models::{ListQuery, Record, SoftDelete};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// RepositoryError
///
/// Failures raised by a model. Their display text is what clients receive as `msg`.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("no fields to write")]
    EmptyPayload,
    #[error("{0}")]
    Conflict(String),
}

/// Repository Trait
///
/// The data model behind one resource: a single table addressed by an integer `id`.
/// The dispatcher only talks to this contract, so handlers work the same against
/// Postgres (`PostgresRepository`) and memory (`MemoryRepository`).
///
/// **Send + Sync + async_trait** keep `Arc<dyn Repository>` shareable across axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Name of the backing table; also the default resource name.
    fn table(&self) -> &str;

    /// Column names, in declaration order.
    async fn fields(&self) -> Result<Vec<String>, RepositoryError>;

    /// Filtered, ordered, projected and paginated rows.
    async fn select(&self, query: &ListQuery) -> Result<Vec<Record>, RepositoryError>;

    /// Inserts a row and returns its generated id.
    async fn insert(&self, params: Record) -> Result<i64, RepositoryError>;

    async fn find(&self, id: i64) -> Result<Option<Record>, RepositoryError>;

    /// Updates the given columns; returns the number of rows matched.
    async fn update(&self, id: i64, params: Record) -> Result<u64, RepositoryError>;

    /// Marks a row deleted by writing `sentinel` into `field`. The row is never removed.
    async fn soft_delete(
        &self,
        id: i64,
        field: &str,
        sentinel: i64,
    ) -> Result<SoftDelete, RepositoryError>;
}

/// RepositoryState
///
/// The shared handle to a model.
pub type RepositoryState = Arc<dyn Repository>;

/// Accepts plain SQL identifiers only (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// PostgresRepository
///
/// A `Repository` over one Postgres table. Rows travel as JSONB (`to_jsonb`,
/// `jsonb_populate_record`) so any table shape works without compile-time row types.
pub struct PostgresRepository {
    pool: PgPool,
    table: String,
    fields: OnceCell<Vec<String>>,
}

impl PostgresRepository {
    /// Creates a repository for `table`; rejects names that are not plain identifiers.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, RepositoryError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(RepositoryError::InvalidIdentifier(table));
        }
        Ok(Self {
            pool,
            table,
            fields: OnceCell::new(),
        })
    }

    /// Pushes `"a" = r."a", "b" = r."b"` for an update from a populated record alias.
    fn push_assignments(builder: &mut QueryBuilder<'_, Postgres>, params: &Record) {
        let mut separated = builder.separated(", ");
        for key in params.keys() {
            let column = quote_ident(key);
            separated.push(format!("{column} = r.{column}"));
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    fn table(&self) -> &str {
        &self.table
    }

    /// fields
    ///
    /// Reads the column list from `information_schema` once and caches it.
    async fn fields(&self) -> Result<Vec<String>, RepositoryError> {
        let fields = self
            .fields
            .get_or_try_init(|| async {
                sqlx::query_scalar::<_, String>(
                    r#"
                    SELECT column_name::text
                    FROM information_schema.columns
                    WHERE table_schema = current_schema() AND table_name = $1
                    ORDER BY ordinal_position
                    "#,
                )
                .bind(&self.table)
                .fetch_all(&self.pool)
                .await
            })
            .await?;
        Ok(fields.clone())
    }

    /// select
    ///
    /// Builds the query with `QueryBuilder` so filter values are always bound parameters.
    /// Filters compare on the text form of the column (`col::text = $n`), which lets
    /// query-string values match integer, boolean and text columns alike.
    async fn select(&self, query: &ListQuery) -> Result<Vec<Record>, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT to_jsonb(t) AS record FROM (SELECT ");

        match &query.fields {
            Some(fields) if !fields.is_empty() => {
                let columns: Vec<String> = fields.iter().map(|f| quote_ident(f)).collect();
                builder.push(columns.join(", "));
            }
            _ => {
                builder.push("*");
            }
        }
        builder.push(" FROM ");
        builder.push(quote_ident(&self.table));

        for (i, (field, value)) in query.filters.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            builder.push(quote_ident(field));
            builder.push("::text = ");
            builder.push_bind(value.clone());
        }

        if !query.order.is_empty() {
            let keys: Vec<String> = query
                .order
                .iter()
                .map(|o| format!("{} {}", quote_ident(&o.field), o.direction.as_sql()))
                .collect();
            builder.push(" ORDER BY ");
            builder.push(keys.join(", "));
        }

        if let Some(page) = query.page {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX));
            builder.push(" OFFSET ");
            builder.push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));
        }
        builder.push(") AS t");

        let rows = builder
            .build_query_scalar::<Json<Record>>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("select on {} failed: {:?}", self.table, e);
                e
            })?;
        Ok(rows.into_iter().map(|Json(record)| record).collect())
    }

    /// insert
    ///
    /// Casts the JSON payload onto the table's row type with `jsonb_populate_record`,
    /// so column types are converted by Postgres itself.
    async fn insert(&self, params: Record) -> Result<i64, RepositoryError> {
        if params.is_empty() {
            return Err(RepositoryError::EmptyPayload);
        }
        if let Some(bad) = params.keys().find(|k| !is_identifier(k)) {
            return Err(RepositoryError::InvalidIdentifier(bad.clone()));
        }
        let columns: Vec<String> = params.keys().map(|k| quote_ident(k)).collect();
        let columns = columns.join(", ");
        let table = quote_ident(&self.table);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "
        ));
        builder.push_bind(Json(params));
        builder.push(r#") RETURNING "id"::bigint"#);

        let id = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("insert into {} failed: {:?}", self.table, e);
                e
            })?;
        Ok(id)
    }

    async fn find(&self, id: i64) -> Result<Option<Record>, RepositoryError> {
        let sql = format!(
            r#"SELECT to_jsonb(t) AS record FROM {} AS t WHERE t."id" = $1"#,
            quote_ident(&self.table)
        );
        let row = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(record)| record))
    }

    /// update
    ///
    /// `UPDATE .. SET col = r.col FROM jsonb_populate_record(..) AS r`; only the keys
    /// present in `params` are written.
    async fn update(&self, id: i64, params: Record) -> Result<u64, RepositoryError> {
        if params.is_empty() {
            return Err(RepositoryError::EmptyPayload);
        }
        if let Some(bad) = params.keys().find(|k| !is_identifier(k)) {
            return Err(RepositoryError::InvalidIdentifier(bad.clone()));
        }
        let table = quote_ident(&self.table);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {table} SET "));
        Self::push_assignments(&mut builder, &params);
        builder.push(format!(" FROM jsonb_populate_record(NULL::{table}, "));
        builder.push_bind(Json(params));
        builder.push(format!(r#") AS r WHERE {table}."id" = "#));
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await.map_err(|e| {
            tracing::error!("update on {} failed: {:?}", self.table, e);
            e
        })?;
        Ok(result.rows_affected())
    }

    /// soft_delete
    ///
    /// Writes the sentinel only when it differs from the stored value, then tells
    /// "already deleted" and "missing" apart with an existence probe.
    async fn soft_delete(
        &self,
        id: i64,
        field: &str,
        sentinel: i64,
    ) -> Result<SoftDelete, RepositoryError> {
        if !is_identifier(field) {
            return Err(RepositoryError::InvalidIdentifier(field.to_string()));
        }
        let table = quote_ident(&self.table);
        let column = quote_ident(field);

        let sql = format!(
            r#"UPDATE {table} SET {column} = $1 WHERE "id" = $2 AND {column} IS DISTINCT FROM $1"#
        );
        let result = sqlx::query(&sql)
            .bind(sentinel)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("soft delete on {} failed: {:?}", self.table, e);
                e
            })?;
        if result.rows_affected() > 0 {
            return Ok(SoftDelete::Deleted);
        }

        let exists_sql = format!(r#"SELECT EXISTS (SELECT 1 FROM {table} WHERE "id" = $1)"#);
        let exists = sqlx::query_scalar::<_, bool>(&exists_sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists {
            SoftDelete::AlreadyDeleted
        } else {
            SoftDelete::NotFound
        })
    }
}
