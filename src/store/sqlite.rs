use std::io::Write;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, SqlitePool, TypeInfo, ValueRef};
use tempfile::{NamedTempFile, TempPath};

use super::{Row, TabularStore, Value};
use crate::error::Result;

/// SQLite-backed [`TabularStore`].
///
/// A collection extracted from a package is spilled to a private temporary
/// file and opened read-only; the file is removed when the store is dropped.
pub struct SqliteStore {
    pool: SqlitePool,
    _file: Option<TempPath>,
}

impl SqliteStore {
    /// Open a collection database held in memory.
    pub async fn open(bytes: &[u8]) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        let path = file.into_temp_path();

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            // Modern collections declare `COLLATE unicase` columns
            .collation("unicase", |a: &str, b: &str| {
                a.to_lowercase().cmp(&b.to_lowercase())
            });
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        log::debug!("Opened collection store ({} bytes)", bytes.len());
        Ok(Self {
            pool,
            _file: Some(path),
        })
    }

    /// Wrap an existing pool, e.g. an in-memory database.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool, _file: None }
    }

    /// Close the pool; the backing file goes away with `self`.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn convert_row(row: &SqliteRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => Value::Real(row.try_get_unchecked::<f64, _>(idx)?),
                "TEXT" => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
                _ => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            }
        };
        values.push(value);
    }
    Ok(Row(values))
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(convert_row).collect()
    }
}
