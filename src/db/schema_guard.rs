//! Startup reconciliation of a table's live column constraints with the
//! shape the server expects.
//!
//! A missing table is created. A table whose columns differ in name, primary
//! key flag or not-null flag is rebuilt: a shadow table with the expected
//! shape is filled from the old one, the old one is dropped and the shadow is
//! renamed into place, all inside one transaction. A conformant table is left
//! untouched, so running the guard twice is a no-op the second time.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub primary_key: bool,
    pub not_null: bool,
    /// Extra column constraints emitted verbatim, e.g. `AUTOINCREMENT` or `UNIQUE`.
    pub constraints: &'static str,
    /// SQL literal used as the column default and as the replacement for
    /// nulls in a not-null column during migration.
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Created,
    Migrated,
    Unchanged,
    /// The table exists with a different shape and was left as it is.
    Mismatched,
}

impl TableSpec {
    pub fn create_sql(&self, table_name: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnSpec::definition)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({columns})", quote_ident(table_name))
    }

    pub fn matches(&self, live: &[LiveColumn]) -> bool {
        live.len() == self.columns.len()
            && self.columns.iter().all(|expected| {
                live.iter().any(|column| {
                    column.name == expected.name
                        && column.primary_key == expected.primary_key
                        && column.not_null == expected.not_null
                })
            })
    }
}

impl ColumnSpec {
    fn definition(&self) -> String {
        let mut definition = format!("{} {}", quote_ident(self.name), self.sql_type);
        if self.primary_key {
            definition.push_str(" PRIMARY KEY");
        }
        if !self.constraints.is_empty() {
            definition.push(' ');
            definition.push_str(self.constraints);
        }
        if self.not_null {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(default);
        }
        definition
    }

    fn copy_expression(&self) -> String {
        match (self.not_null, self.default) {
            (true, Some(default)) => format!("COALESCE({}, {default})", quote_ident(self.name)),
            _ => quote_ident(self.name),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub async fn live_columns(pool: &SqlitePool, table: &str) -> Result<Vec<LiveColumn>, AppError> {
    let rows: Vec<(String, i64, i64)> =
        sqlx::query_as(r#"SELECT name, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#)
            .bind(table)
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(name, not_null, pk)| LiveColumn {
            name,
            not_null: not_null != 0,
            primary_key: pk != 0,
        })
        .collect())
}

pub async fn ensure_table(pool: &SqlitePool, spec: &TableSpec) -> Result<GuardOutcome, AppError> {
    let live = live_columns(pool, spec.name).await?;

    if live.is_empty() {
        return create_table(pool, spec).await;
    }

    if spec.matches(&live) {
        info!(table = spec.name, "schema guard found conformant table");
        return Ok(GuardOutcome::Unchanged);
    }

    warn!(table = spec.name, "schema guard found mismatched columns, migrating");
    migrate(pool, spec, &live).await?;
    info!(table = spec.name, "schema guard migrated table");
    Ok(GuardOutcome::Migrated)
}

/// Like [`ensure_table`] for externally seeded files: a missing table is
/// created, an existing one is never rebuilt.
pub async fn ensure_table_present(
    pool: &SqlitePool,
    spec: &TableSpec,
) -> Result<GuardOutcome, AppError> {
    let live = live_columns(pool, spec.name).await?;

    if live.is_empty() {
        return create_table(pool, spec).await;
    }

    if spec.matches(&live) {
        info!(table = spec.name, "schema guard found conformant table");
        Ok(GuardOutcome::Unchanged)
    } else {
        warn!(
            table = spec.name,
            "schema guard found mismatched columns, leaving table as seeded"
        );
        Ok(GuardOutcome::Mismatched)
    }
}

async fn create_table(pool: &SqlitePool, spec: &TableSpec) -> Result<GuardOutcome, AppError> {
    sqlx::query(&spec.create_sql(spec.name))
        .execute(pool)
        .await?;
    info!(table = spec.name, "schema guard created table");
    Ok(GuardOutcome::Created)
}

async fn migrate(pool: &SqlitePool, spec: &TableSpec, live: &[LiveColumn]) -> Result<(), AppError> {
    let shadow = format!("{}__migrating", spec.name);
    let carried = spec
        .columns
        .iter()
        .filter(|expected| live.iter().any(|column| column.name == expected.name))
        .collect::<Vec<_>>();

    // Dropping the transaction without commit rolls every step back.
    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(&shadow)))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&spec.create_sql(&shadow))
        .execute(&mut *tx)
        .await?;

    if !carried.is_empty() {
        let target_columns = carried
            .iter()
            .map(|column| quote_ident(column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let source_columns = carried
            .iter()
            .map(|column| column.copy_expression())
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!(
            "INSERT INTO {} ({target_columns}) SELECT {source_columns} FROM {}",
            quote_ident(&shadow),
            quote_ident(spec.name)
        ))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(&format!("DROP TABLE {}", quote_ident(spec.name)))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(&shadow),
        quote_ident(spec.name)
    ))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
