//! The read-only ETF reference store.
//!
//! Rows are loaded by an external seeding step. The server only ever opens
//! the file read-only once the schema guard has made sure the table exists.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{
    connect, file_options,
    schema_guard::{ensure_table_present, ColumnSpec, TableSpec},
};
use crate::errors::AppError;

pub const ETFS_TABLE: TableSpec = TableSpec {
    name: "etfs",
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
            name: "symbol",
            sql_type: "TEXT",
            primary_key: false,
            not_null: true,
            constraints: "UNIQUE",
            default: None,
        },
        ColumnSpec {
            name: "name",
            sql_type: "TEXT",
            primary_key: false,
            not_null: true,
            constraints: "",
            default: Some("''"),
        },
        ColumnSpec {
            name: "aum",
            sql_type: "REAL",
            primary_key: false,
            not_null: true,
            constraints: "",
            default: Some("0"),
        },
        ColumnSpec {
            name: "avg_volume",
            sql_type: "INTEGER",
            primary_key: false,
            not_null: true,
            constraints: "",
            default: Some("0"),
        },
        ColumnSpec {
            name: "price",
            sql_type: "REAL",
            primary_key: false,
            not_null: true,
            constraints: "",
            default: Some("0"),
        },
        ColumnSpec {
            name: "risk_rating",
            sql_type: "TEXT",
            primary_key: false,
            not_null: true,
            constraints: "CHECK (risk_rating IN ('Low', 'Medium', 'High'))",
            default: Some("'Medium'"),
        },
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRating {
    Low,
    Medium,
    High,
}

impl RiskRating {
    pub const NAMES: [&'static str; 3] = ["Low", "Medium", "High"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Aum,
    Volume,
    Price,
}

impl SortKey {
    pub const NAMES: [&'static str; 3] = ["aum", "volume", "price"];

    fn column(self) -> &'static str {
        match self {
            Self::Aum => "aum",
            Self::Volume => "avg_volume",
            Self::Price => "price",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Etf {
    pub symbol: String,
    pub name: String,
    pub aum: f64,
    pub avg_volume: i64,
    pub price: f64,
    pub risk_rating: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RiskSummary {
    pub risk_rating: String,
    pub count: i64,
    pub avg_price: f64,
    pub total_aum_millions: f64,
    pub avg_volume: f64,
}

const ETF_COLUMNS: &str = "symbol, name, aum, avg_volume, price, risk_rating";

#[derive(Debug, Clone)]
pub struct EtfStore {
    pool: SqlitePool,
}

impl EtfStore {
    /// Creates the table if the file lacks it, using a short-lived writable
    /// connection, then reopens the file read-only for serving. A seeded table
    /// of a different shape is served as it is.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let writable = connect(file_options(path)?).await?;
        let guarded = ensure_table_present(&writable, &ETFS_TABLE).await;
        writable.close().await;
        guarded?;

        let options = file_options(path)?.create_if_missing(false).read_only(true);
        Ok(Self {
            pool: connect(options).await?,
        })
    }

    pub async fn by_risk(&self, risk: RiskRating, limit: i64) -> Result<Vec<Etf>, AppError> {
        let etfs = sqlx::query_as::<_, Etf>(&format!(
            "SELECT {ETF_COLUMNS} FROM etfs WHERE risk_rating = ?1 ORDER BY aum DESC LIMIT ?2"
        ))
        .bind(risk.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(etfs)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Etf>, AppError> {
        let etfs = sqlx::query_as::<_, Etf>(&format!(
            "SELECT {ETF_COLUMNS} FROM etfs \
             WHERE symbol LIKE '%' || ?1 || '%' OR name LIKE '%' || ?1 || '%' \
             ORDER BY aum DESC"
        ))
        .bind(term)
        .fetch_all(&self.pool)
        .await?;
        Ok(etfs)
    }

    pub async fn top(&self, sort_by: SortKey, limit: i64) -> Result<Vec<Etf>, AppError> {
        let etfs = sqlx::query_as::<_, Etf>(&format!(
            "SELECT {ETF_COLUMNS} FROM etfs ORDER BY {} DESC LIMIT ?1",
            sort_by.column()
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(etfs)
    }

    pub async fn summary(&self) -> Result<Vec<RiskSummary>, AppError> {
        let summary = sqlx::query_as::<_, RiskSummary>(
            "SELECT risk_rating, \
                    COUNT(*) AS count, \
                    AVG(price) AS avg_price, \
                    SUM(aum) / 1e6 AS total_aum_millions, \
                    AVG(avg_volume) AS avg_volume \
             FROM etfs \
             GROUP BY risk_rating \
             ORDER BY total_aum_millions DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(summary)
    }
}
