//! The mutable users store.
//!
//! Also hosts the general-purpose operations that run against this file:
//! caller-supplied SELECT statements and table metadata lookups.

use std::path::Path;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    connect, connect_memory, file_options,
    rows::{rows_to_json, JsonRow},
    schema_guard::{ensure_table, ColumnSpec, TableSpec},
};
use crate::errors::AppError;

pub const USERS_TABLE: TableSpec = TableSpec {
    name: "users",
    columns: &[
        ColumnSpec {
            name: "id",
            sql_type: "INTEGER",
            primary_key: true,
            not_null: true,
            constraints: "AUTOINCREMENT",
            default: None,
        },
        ColumnSpec {
            name: "name",
            sql_type: "TEXT",
            primary_key: false,
            not_null: true,
            constraints: "",
            default: Some("'Unknown'"),
        },
    ],
};

pub const SEED_USERS: [&str; 3] = ["Alice Johnson", "Bob Smith", "Charlie Brown"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub notnull: bool,
    pub dflt_value: Option<String>,
    pub pk: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeOutcome {
    pub cleared: u64,
    pub seeded: usize,
    pub existing: i64,
}

#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let pool = connect(file_options(path)?).await?;
        Self::from_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self, AppError> {
        Self::from_pool(connect_memory().await?).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AppError> {
        ensure_table(&pool, &USERS_TABLE).await?;
        Ok(Self { pool })
    }

    pub async fn add_user(&self, name: &str) -> Result<i64, AppError> {
        let result = sqlx::query("INSERT INTO users (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT id, name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound(id));
        }
        Ok(())
    }

    pub async fn update_user(&self, id: i64, name: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET name = ?1 WHERE id = ?2")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound(id));
        }
        Ok(())
    }

    /// Optionally clears the table, then seeds the sample users if it is
    /// empty. Both steps share one transaction.
    pub async fn initialize(&self, reset: bool) -> Result<InitializeOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut cleared = 0;
        if reset {
            cleared = sqlx::query("DELETE FROM users")
                .execute(&mut *tx)
                .await?
                .rows_affected();
            sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'users'")
                .execute(&mut *tx)
                .await?;
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;

        let mut seeded = 0;
        if existing == 0 {
            for name in SEED_USERS {
                sqlx::query("INSERT INTO users (name) VALUES (?1)")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                seeded += 1;
            }
        }

        tx.commit().await?;
        Ok(InitializeOutcome {
            cleared,
            seeded,
            existing,
        })
    }

    /// Runs a caller-supplied statement with `query_only` switched on, so any
    /// write it attempts fails inside SQLite.
    pub async fn run_query(&self, query: &str) -> Result<Vec<JsonRow>, AppError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query("PRAGMA query_only = ON")
            .execute(&mut *conn)
            .await?;
        let rows = sqlx::query(query).fetch_all(&mut *conn).await;
        sqlx::query("PRAGMA query_only = OFF")
            .execute(&mut *conn)
            .await?;

        rows_to_json(&rows?)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let tables = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT cid, name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cid, name, column_type, notnull, dflt_value, pk)| ColumnInfo {
                cid,
                name,
                column_type,
                notnull: notnull != 0,
                dflt_value,
                pk: pk != 0,
            })
            .collect())
    }
}
