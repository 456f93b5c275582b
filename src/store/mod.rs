//! The tabular-store boundary.
//!
//! Extractors never talk to a database engine directly. They issue fixed,
//! read-only query strings through [`TabularStore`] and consume typed
//! [`Row`]s. [`SqliteStore`] is the concrete collaborator used for real
//! packages; tests can point it at an in-memory pool.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::{DecodeError, Result};

/// A single SQL value, tagged with its storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One result row, columns in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get(&self, idx: usize) -> Result<&Value> {
        self.0
            .get(idx)
            .ok_or_else(|| DecodeError::Store(format!("column {idx} out of range")))
    }

    pub fn int(&self, idx: usize) -> Result<i64> {
        match self.get(idx)? {
            Value::Integer(v) => Ok(*v),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| DecodeError::Store(format!("column {idx}: {s:?} is not an integer"))),
            other => Err(DecodeError::Store(format!(
                "column {idx}: expected integer, found {other:?}"
            ))),
        }
    }

    /// Text value; NULL reads as the empty string, as Anki treats it.
    pub fn text(&self, idx: usize) -> Result<String> {
        match self.get(idx)? {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Blob(b) => String::from_utf8(b.clone())
                .map_err(|_| DecodeError::Store(format!("column {idx}: blob is not UTF-8 text"))),
            Value::Real(v) => Ok(v.to_string()),
        }
    }

    /// Blob value; NULL reads as empty, text as its UTF-8 bytes.
    pub fn blob(&self, idx: usize) -> Result<&[u8]> {
        match self.get(idx)? {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.as_bytes()),
            Value::Null => Ok(&[]),
            other => Err(DecodeError::Store(format!(
                "column {idx}: expected blob, found {other:?}"
            ))),
        }
    }
}

/// Read-only query capability over an embedded relational database.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Run a fixed `SELECT`/`PRAGMA` and return every row.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Names of all ordinary tables.
    async fn table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .await?;
        rows.iter().map(|r| r.text(0)).collect()
    }

    /// Column names of `table`, in declaration order.
    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DecodeError::Store(format!("invalid table name {table:?}")));
        }
        let rows = self.query(&format!("PRAGMA table_info({table})")).await?;
        // table_info columns: cid, name, type, notnull, dflt_value, pk
        rows.iter().map(|r| r.text(1)).collect()
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.table_names().await?.iter().any(|t| t == table))
    }
}
