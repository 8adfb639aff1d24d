//! DuckDB-backed implementation of the [`DataStore`] capability
//!
//! Each host is reached by attaching it to an in-memory DuckDB connection
//! (mysql, postgres, sqlite or a duckdb file, depending on the configured
//! ATTACH statement) and switching the default catalog to it, so the
//! protocol can use unqualified table names. Row snapshots are CSV files
//! written with `COPY ... TO` and read back with `read_csv_auto`.

use crate::error::{CloneRowError, Result};
use crate::sql;
use crate::store::{ColumnMeta, DataStore, Row, RowLocator, Value};
use duckdb::params_from_iter;
use duckdb::types::{TimeUnit, Value as DbValue};
use duckdb::Connection;
use std::path::Path;

pub struct DuckDbStore {
    alias: String,
    connection: Connection,
}

impl DuckDbStore {
    /// Attach the configured host and make it the default catalog.
    pub fn connect(alias: &str, attach_statement: &str) -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(|e| {
            CloneRowError::connection(format!("Failed to open DuckDB session: {}", e))
        })?;

        connection.execute_batch(attach_statement).map_err(|e| {
            CloneRowError::connection(format!("Failed to attach host '{}': {}", alias, e))
        })?;

        let catalog = attached_catalog(attach_statement)
            .unwrap_or_else(|| alias.to_string());
        connection
            .execute_batch(&format!("USE {}", catalog))
            .map_err(|e| {
                CloneRowError::connection(format!(
                    "Failed to select catalog '{}' for host '{}': {}",
                    catalog, alias, e
                ))
            })?;

        log::info!("Connected to {} (catalog {})", alias, catalog);

        Ok(Self {
            alias: alias.to_string(),
            connection,
        })
    }
}

impl DataStore for DuckDbStore {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn fetch_one(&mut self, query: &str, params: &[Value]) -> Result<Option<Row>> {
        let db_params: Vec<DbValue> = params.iter().map(to_db_value).collect();

        let mut stmt = self.connection.prepare(query)?;
        let mut fetched: Vec<Vec<DbValue>> = Vec::new();
        {
            let mut rows = stmt.query(params_from_iter(db_params))?;
            while let Some(row) = rows.next()? {
                let column_count = row.as_ref().column_count();
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(row.get::<_, DbValue>(i)?);
                }
                fetched.push(values);
                if fetched.len() > 1 {
                    break;
                }
            }
        }

        if fetched.len() > 1 {
            return Err(CloneRowError::ambiguous_row(format!(
                "Only one row expected on {} for: {}",
                self.alias, query
            )));
        }

        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        Ok(fetched.pop().map(|values| {
            names
                .into_iter()
                .zip(values.into_iter().map(from_db_value))
                .collect()
        }))
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<usize> {
        let db_params: Vec<DbValue> = params.iter().map(to_db_value).collect();
        let affected = self
            .connection
            .execute(statement, params_from_iter(db_params))?;
        log::debug!("{}: {} ({} rows)", self.alias, statement, affected);
        Ok(affected)
    }

    fn column_metadata(&mut self, table: &str, column: &str) -> Result<ColumnMeta> {
        let row = self
            .fetch_one(
                "select data_type, is_nullable, column_default \
                 from information_schema.columns \
                 where table_name = ? and column_name = ?",
                &[
                    Value::Text(table.to_string()),
                    Value::Text(column.to_string()),
                ],
            )?
            .ok_or_else(|| {
                CloneRowError::integrity(format!(
                    "No column metadata for {}.{} on {}",
                    table, column, self.alias
                ))
            })?;

        let data_type = match row.get("data_type") {
            Some(Value::Text(t)) => t.clone(),
            other => {
                return Err(CloneRowError::integrity(format!(
                    "Unexpected data_type metadata for {}.{}: {:?}",
                    table, column, other
                )))
            }
        };
        let nullable = matches!(row.get("is_nullable"), Some(Value::Text(v)) if v == "YES")
            || matches!(row.get("is_nullable"), Some(Value::Boolean(true)));
        let default = match row.get("column_default") {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.to_string()),
        };

        Ok(ColumnMeta {
            data_type,
            nullable,
            default,
        })
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.connection.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.connection.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn export_row(&mut self, locator: &RowLocator, dest: &Path) -> Result<usize> {
        let copy = format!(
            "COPY (select * from {} where {} = {}) TO '{}' (FORMAT CSV, HEADER)",
            locator.table,
            locator.key_column,
            sql::quote_value(&locator.key_value),
            dest.display()
        );
        self.connection.execute_batch(&copy)?;

        // Count what actually landed in the snapshot file, so verification
        // covers the artifact itself rather than the statement's claim.
        let exported: i64 = self.connection.query_row(
            &format!(
                "select count(*) from read_csv_auto('{}')",
                dest.display()
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(exported as usize)
    }

    fn import_row(&mut self, src: &Path, table: &str) -> Result<usize> {
        let statement = format!(
            "insert into {} select * from read_csv_auto('{}')",
            table,
            src.display()
        );
        let affected = self.connection.execute(&statement, [])?;
        Ok(affected)
    }
}

impl Drop for DuckDbStore {
    fn drop(&mut self) {
        log::debug!("Releasing connection for host {}", self.alias);
    }
}

/// Pull the catalog name out of an `ATTACH ... AS name ...` statement.
fn attached_catalog(attach_statement: &str) -> Option<String> {
    let lower = attach_statement.to_lowercase();
    let pos = lower.find(" as ")?;
    let rest = attach_statement[pos + 4..].trim_start();
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn to_db_value(value: &Value) -> DbValue {
    match value {
        Value::Null => DbValue::Null,
        Value::Boolean(b) => DbValue::Boolean(*b),
        Value::Integer(i) => DbValue::BigInt(*i),
        Value::Float(f) => DbValue::Double(*f),
        Value::Text(s) => DbValue::Text(s.clone()),
        Value::Timestamp(ts) => DbValue::Timestamp(
            TimeUnit::Microsecond,
            ts.and_utc().timestamp_micros(),
        ),
    }
}

fn from_db_value(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Boolean(b),
        DbValue::TinyInt(i) => Value::Integer(i as i64),
        DbValue::SmallInt(i) => Value::Integer(i as i64),
        DbValue::Int(i) => Value::Integer(i as i64),
        DbValue::BigInt(i) => Value::Integer(i),
        DbValue::HugeInt(i) => Value::Integer(i as i64),
        DbValue::UTinyInt(i) => Value::Integer(i as i64),
        DbValue::USmallInt(i) => Value::Integer(i as i64),
        DbValue::UInt(i) => Value::Integer(i as i64),
        DbValue::UBigInt(i) => Value::Integer(i as i64),
        DbValue::Float(f) => Value::Float(f as f64),
        DbValue::Double(f) => Value::Float(f),
        DbValue::Decimal(d) => match d.to_string().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(d.to_string()),
        },
        DbValue::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(dt) => Value::Timestamp(dt.naive_utc()),
                None => Value::Null,
            }
        }
        DbValue::Text(s) => Value::Text(s),
        DbValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        other => Value::Text(format!("{:?}", other)),
    }
}
