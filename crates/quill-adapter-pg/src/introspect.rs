//! Column listing for audited tables.
//!
//! Reads `information_schema` once so a [`ModelDefinition`] can be built from
//! a live table instead of declared by hand. Nothing here runs per save.

use quill_audit::ModelDefinition;
use sqlx::{PgPool, Row};

/// Columns and primary key of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub schema: String,
    pub table: String,
    /// Column names in ordinal order.
    pub columns: Vec<String>,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
}

impl TableColumns {
    /// Build a model definition for `type_name` from these columns.
    ///
    /// Composite primary keys are not supported; audit entries reference a
    /// record by a single identifier.
    pub fn into_model(self, type_name: impl Into<String>) -> anyhow::Result<ModelDefinition> {
        if self.columns.is_empty() {
            return Err(anyhow::anyhow!(
                "Table '{}.{}' has no columns (does it exist?)",
                self.schema,
                self.table
            ));
        }

        let definition = ModelDefinition::new(type_name, self.columns);
        match self.primary_key.as_slice() {
            [] => Ok(definition),
            [key] => Ok(definition.primary_key(key.clone())),
            keys => Err(anyhow::anyhow!(
                "Table '{}.{}' has a composite primary key ({}); audited tables need a single key column",
                self.schema,
                self.table,
                keys.join(", ")
            )),
        }
    }
}

/// List the columns and primary key of a table.
pub async fn table_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> anyhow::Result<TableColumns> {
    let col_rows = sqlx::query(
        r#"
        select column_name
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    let columns = col_rows
        .into_iter()
        .map(|r| r.get::<String, _>("column_name"))
        .collect();

    let pk_rows = sqlx::query(
        r#"
        select kcu.column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        where tc.constraint_type = 'PRIMARY KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        order by kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    let primary_key = pk_rows
        .into_iter()
        .map(|r| r.get::<String, _>("column_name"))
        .collect();

    Ok(TableColumns {
        schema: schema.to_string(),
        table: table.to_string(),
        columns,
        primary_key,
    })
}

/// Introspect a table and build the model definition for `type_name`.
pub async fn model_definition(
    pool: &PgPool,
    schema: &str,
    table: &str,
    type_name: &str,
) -> anyhow::Result<ModelDefinition> {
    let columns = table_columns(pool, schema, table).await?;
    tracing::debug!(
        schema = %schema,
        table = %table,
        columns = columns.columns.len(),
        "Introspected audited table"
    );
    columns.into_model(type_name)
}
