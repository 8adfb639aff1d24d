//! Row model and the store capability consumed by the reconciliation protocol

use crate::error::Result;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// A single typed scalar as read from (or written to) a store.
///
/// Comparison is typed: no coercion across variants, so `Integer(1)` and
/// `Text("1")` are different values, and `Null` differs from any non-null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Parse a command-line filter string into the narrowest matching type.
    ///
    /// Tries integer, float, boolean, then datetime before falling back to
    /// text. The quoting rules in [`crate::sql`] depend on which variant
    /// this produces.
    pub fn parse_filter(raw: &str) -> Value {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        match raw {
            "true" => return Value::Boolean(true),
            "false" => return Value::Boolean(false),
            _ => {}
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Value::Timestamp(ts);
        }
        Value::Text(raw.to_string())
    }

    /// Whether SQL text rendering of this value needs single quotes.
    pub fn needs_quoting(&self) -> bool {
        matches!(self, Value::Text(_) | Value::Timestamp(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A row as a column name to value mapping.
///
/// Insertion order is preserved for stable diagnostics; diffing treats the
/// keys as a set. Rows carry no identity of their own — identity comes from
/// the [`RowLocator`] that fetched them.
pub type Row = IndexMap<String, Value>;

/// Addresses exactly one row on a given store.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLocator {
    pub table: String,
    pub key_column: String,
    pub key_value: Value,
}

impl RowLocator {
    pub fn new(table: impl Into<String>, key_column: impl Into<String>, key_value: Value) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
            key_value,
        }
    }
}

impl fmt::Display for RowLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} where {} = {}",
            self.table, self.key_column, self.key_value
        )
    }
}

/// Column type information as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// The capability a host database exposes to the protocol.
///
/// Every mutating method reports an affected-row count; the protocol treats
/// any count other than 1 as a verification failure. Implementations own
/// their connection exclusively for the run and release it on drop.
pub trait DataStore {
    /// Host alias this store was connected under (for operator messages).
    fn alias(&self) -> &str;

    /// Run a select and return at most one row. More than one matching row
    /// is an `AmbiguousRow` error, not a truncated result.
    fn fetch_one(&mut self, query: &str, params: &[Value]) -> Result<Option<Row>>;

    /// Execute a parameterized statement, returning the affected-row count.
    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<usize>;

    /// Type, nullability and default for a single column.
    fn column_metadata(&mut self, table: &str, column: &str) -> Result<ColumnMeta>;

    fn begin_transaction(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Export the row at `locator` to a durable snapshot file, returning the
    /// number of rows the snapshot holds.
    fn export_row(&mut self, locator: &RowLocator, dest: &Path) -> Result<usize>;

    /// Import a snapshot file into `table`, returning the number of rows
    /// inserted.
    fn import_row(&mut self, src: &Path, table: &str) -> Result<usize>;
}
