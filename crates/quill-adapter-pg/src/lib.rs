//! Postgres collaborators for Quill.
//!
//! - [`PgAuditStorage`] persists audit entries in an `audits` table.
//! - [`introspect`] lists a table's columns so a model definition can be
//!   built once, at registration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_audit::{AuditAction, AuditEntry, AuditError, AuditFilter, AuditStorage};
use quill_core::AuditConfig;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

pub mod introspect;

const ENTRY_COLUMNS: &str =
    "id, auditable_type, auditable_id, changes, action, user_id, created_at";

/// Quote an identifier, allowing `schema.table`.
pub(crate) fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn storage_error(e: sqlx::Error) -> AuditError {
    AuditError::StorageError(e.to_string())
}

/// Audit storage backed by a Postgres table.
///
/// Expected columns:
///
/// | column | type |
/// |--------|------|
/// | `id` | `uuid primary key` |
/// | `auditable_type` | `text not null` |
/// | `auditable_id` | `text` |
/// | `changes` | `text not null` |
/// | `action` | `text not null` |
/// | `user_id` | `text` |
/// | `created_at` | `timestamptz not null` |
pub struct PgAuditStorage {
    pool: PgPool,
    table: String,
}

impl PgAuditStorage {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Connect using the database settings of an audit configuration.
    pub async fn connect(config: &AuditConfig) -> anyhow::Result<Self> {
        let url = config
            .storage
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("audit.storage.database_url is not set"))?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool, config.storage.table.clone()))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the audit table and its lookup index if missing.
    pub async fn ensure_table(&self) -> anyhow::Result<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_index_sql(&self.table))
            .execute(&self.pool)
            .await?;
        tracing::info!(table = %self.table, "Audit table ready");
        Ok(())
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        create table if not exists {} (
          id uuid primary key,
          auditable_type text not null,
          auditable_id text,
          changes text not null,
          action text not null,
          user_id text,
          created_at timestamptz not null default now()
        )
        "#,
        quote_ident(table)
    )
}

fn create_index_sql(table: &str) -> String {
    let index = format!("{}_auditable_idx", table.replace('.', "_"));
    format!(
        "create index if not exists {} on {} (auditable_type, auditable_id)",
        quote_ident(&index),
        quote_ident(table)
    )
}

/// Append the `where` clause for a filter.
fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a AuditFilter) {
    let mut prefix = " where ";
    let mut next = |builder: &mut QueryBuilder<'a, Postgres>, column: &str| {
        builder.push(prefix).push(column);
        prefix = " and ";
    };

    if let Some(ref auditable_type) = filter.auditable_type {
        next(builder, "auditable_type = ");
        builder.push_bind(auditable_type.as_str());
    }
    if let Some(ref auditable_id) = filter.auditable_id {
        next(builder, "auditable_id = ");
        builder.push_bind(auditable_id.as_str());
    }
    if let Some(action) = filter.action {
        next(builder, "action = ");
        builder.push_bind(action.as_str());
    }
    if let Some(ref user_id) = filter.user_id {
        next(builder, "user_id = ");
        builder.push_bind(user_id.as_str());
    }
    if let Some(start) = filter.start_time {
        next(builder, "created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filter.end_time {
        next(builder, "created_at <= ");
        builder.push_bind(end);
    }
}

fn select_query<'a>(table: &str, filter: &'a AuditFilter) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "select {} from {}",
        ENTRY_COLUMNS,
        quote_ident(table)
    ));
    push_filter(&mut builder, filter);
    builder.push(if filter.newest_first {
        " order by created_at desc, id desc"
    } else {
        " order by created_at asc, id asc"
    });
    if let Some(limit) = filter.limit {
        builder.push(" limit ").push_bind(limit as i64);
    }
    if let Some(offset) = filter.offset {
        builder.push(" offset ").push_bind(offset as i64);
    }
    builder
}

fn count_query<'a>(table: &str, filter: &'a AuditFilter) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("select count(*) from {}", quote_ident(table)));
    push_filter(&mut builder, filter);
    builder
}

fn entry_from_row(row: &PgRow) -> Result<AuditEntry, AuditError> {
    let action: String = row.try_get("action").map_err(storage_error)?;
    let action: AuditAction = action.parse().map_err(AuditError::StorageError)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage_error)?;

    Ok(AuditEntry {
        id: row.try_get("id").map_err(storage_error)?,
        auditable_type: row.try_get("auditable_type").map_err(storage_error)?,
        auditable_id: row.try_get("auditable_id").map_err(storage_error)?,
        changes: row.try_get("changes").map_err(storage_error)?,
        action,
        user_id: row.try_get("user_id").map_err(storage_error)?,
        created_at,
    })
}

#[async_trait]
impl AuditStorage for PgAuditStorage {
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let sql = format!(
            "insert into {} ({}) values ($1, $2, $3, $4, $5, $6, $7)",
            quote_ident(&self.table),
            ENTRY_COLUMNS
        );
        sqlx::query(&sql)
            .bind(entry.id)
            .bind(&entry.auditable_type)
            .bind(&entry.auditable_id)
            .bind(&entry.changes)
            .bind(entry.action.as_str())
            .bind(&entry.user_id)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let rows = select_query(&self.table, &filter)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        let (count,): (i64,) = count_query(&self.table, &filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(count.max(0) as usize)
    }

    async fn get(&self, entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        let sql = format!(
            "select {} from {} where id = $1",
            ENTRY_COLUMNS,
            quote_ident(&self.table)
        );
        let row = sqlx::query(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn nullify(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<usize, AuditError> {
        let sql = format!(
            "update {} set auditable_id = null where auditable_type = $1 and auditable_id = $2",
            quote_ident(&self.table)
        );
        let result = sqlx::query(&sql)
            .bind(auditable_type)
            .bind(auditable_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() as usize)
    }
}
