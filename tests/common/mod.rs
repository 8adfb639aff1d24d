//! Shared test helpers: an in-memory DataStore and scripted decisions

use clonerow::error::{CloneRowError, Result};
use clonerow::protocol::{Decision, DecisionSource};
use clonerow::store::{ColumnMeta, DataStore, Row, RowLocator, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build a row from column/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// In-memory store that interprets the exact statement shapes the protocol
/// generates. Transactions snapshot the whole table map; exports land in an
/// in-memory snapshot map keyed by destination path.
pub struct MockStore {
    alias: String,
    pub tables: HashMap<String, Vec<Row>>,
    /// Declared column order per table, so inserts produce full rows with
    /// nulls the way a real database would.
    pub columns: HashMap<String, Vec<String>>,
    pub snapshots: HashMap<PathBuf, Vec<Row>>,
    pub executed: Vec<String>,
    pub metadata: HashMap<(String, String), ColumnMeta>,
    /// Simulates a concurrent writer changing row cardinality under us.
    pub update_affects_override: Option<usize>,
    /// Simulates a snapshot that failed to capture exactly one row.
    pub export_count_override: Option<usize>,
    /// Simulates a restore delete that does not hit exactly one row.
    pub delete_affects_override: Option<usize>,
    /// Simulates a snapshot import that does not land exactly one row.
    pub import_count_override: Option<usize>,
    savepoint: Option<HashMap<String, Vec<Row>>>,
}

impl MockStore {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            tables: HashMap::new(),
            columns: HashMap::new(),
            snapshots: HashMap::new(),
            executed: Vec::new(),
            metadata: HashMap::new(),
            update_affects_override: None,
            export_count_override: None,
            delete_affects_override: None,
            import_count_override: None,
            savepoint: None,
        }
    }

    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        if let Some(first) = rows.first() {
            self.columns
                .insert(table.to_string(), first.keys().cloned().collect());
        }
        self.tables.insert(table.to_string(), rows);
        self
    }

    pub fn with_columns(mut self, table: &str, columns: &[&str]) -> Self {
        self.columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_metadata(mut self, table: &str, column: &str, meta: ColumnMeta) -> Self {
        self.metadata
            .insert((table.to_string(), column.to_string()), meta);
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(|r| r.as_slice()).unwrap_or(&[])
    }

    fn table_mut(&mut self, table: &str) -> &mut Vec<Row> {
        self.tables.entry(table.to_string()).or_default()
    }

    fn matching_indices(&self, table: &str, key_column: &str, key_value: &Value) -> Vec<usize> {
        self.rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(key_column) == Some(key_value))
            .map(|(i, _)| i)
            .collect()
    }
}

fn token_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    Some(rest.split_whitespace().next().unwrap_or(rest))
}

impl DataStore for MockStore {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn fetch_one(&mut self, query: &str, params: &[Value]) -> Result<Option<Row>> {
        let table = token_after(query, "from ")
            .unwrap_or_default()
            .to_string();

        let matches: Vec<Row> = if query.contains(" where ") {
            let key_column = token_after(query, "where ").unwrap_or_default().to_string();
            let key_value = params
                .first()
                .cloned()
                .expect("filtered select needs a parameter");
            self.rows(&table)
                .iter()
                .filter(|row| row.get(&key_column) == Some(&key_value))
                .cloned()
                .collect()
        } else {
            // schema-only path: any single row
            self.rows(&table).iter().take(1).cloned().collect()
        };

        if matches.len() > 1 {
            return Err(CloneRowError::ambiguous_row(format!(
                "Only one row expected on {} for: {}",
                self.alias, query
            )));
        }
        Ok(matches.into_iter().next())
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<usize> {
        self.executed.push(statement.to_string());

        if statement.starts_with("insert into ") {
            let table = token_after(statement, "insert into ").unwrap().to_string();
            let column = token_after(statement, "(")
                .unwrap()
                .trim_matches(|c| c == '(' || c == ')')
                .to_string();
            // A real database fills the unnamed columns with nulls.
            let mut new_row = Row::new();
            for declared in self.columns.get(&table).cloned().unwrap_or_default() {
                new_row.insert(declared, Value::Null);
            }
            new_row.insert(column, params[0].clone());
            self.table_mut(&table).push(new_row);
            return Ok(1);
        }

        if statement.starts_with("update ") {
            if let Some(forced) = self.update_affects_override {
                return Ok(forced);
            }
            let table = token_after(statement, "update ").unwrap().to_string();
            let set_start = statement.find(" set ").unwrap() + 5;
            let where_start = statement.find(" where ").unwrap();
            let columns: Vec<String> = statement[set_start..where_start]
                .split(", ")
                .map(|assignment| assignment.trim_end_matches(" = ?").to_string())
                .collect();
            let key_column = token_after(statement, "where ").unwrap().to_string();
            let key_value = params.last().cloned().unwrap();

            let indices = self.matching_indices(&table, &key_column, &key_value);
            let rows = self.table_mut(&table);
            for &i in &indices {
                for (column, value) in columns.iter().zip(params.iter()) {
                    rows[i].insert(column.clone(), value.clone());
                }
            }
            return Ok(indices.len());
        }

        if statement.starts_with("delete from ") {
            let table = token_after(statement, "delete from ").unwrap().to_string();
            let key_column = token_after(statement, "where ").unwrap().to_string();
            let key_value = params[0].clone();
            let indices = self.matching_indices(&table, &key_column, &key_value);
            let rows = self.table_mut(&table);
            for &i in indices.iter().rev() {
                rows.remove(i);
            }
            // The delete happens either way; the override only lies about
            // the count, so a verification failure exercises a real
            // transaction rollback.
            return Ok(self.delete_affects_override.unwrap_or(indices.len()));
        }

        panic!("MockStore cannot interpret statement: {}", statement);
    }

    fn column_metadata(&mut self, table: &str, column: &str) -> Result<ColumnMeta> {
        Ok(self
            .metadata
            .get(&(table.to_string(), column.to_string()))
            .cloned()
            .unwrap_or(ColumnMeta {
                data_type: "varchar".to_string(),
                nullable: true,
                default: None,
            }))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.savepoint = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.savepoint = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(saved) = self.savepoint.take() {
            self.tables = saved;
        }
        Ok(())
    }

    fn export_row(&mut self, locator: &RowLocator, dest: &Path) -> Result<usize> {
        let matches: Vec<Row> = self
            .rows(&locator.table)
            .iter()
            .filter(|row| row.get(&locator.key_column) == Some(&locator.key_value))
            .cloned()
            .collect();
        let count = self.export_count_override.unwrap_or(matches.len());
        self.snapshots.insert(dest.to_path_buf(), matches);
        Ok(count)
    }

    fn import_row(&mut self, src: &Path, table: &str) -> Result<usize> {
        self.executed.push(format!("import {}", src.display()));
        let rows = self
            .snapshots
            .get(src)
            .cloned()
            .ok_or_else(|| CloneRowError::integrity(format!("no snapshot at {}", src.display())))?;
        let count = self.import_count_override.unwrap_or(rows.len());
        self.table_mut(table).extend(rows);
        Ok(count)
    }
}

/// A decision source with a fixed answer, counting how often it is asked.
pub struct Scripted {
    decision: Option<Decision>,
    pub asked: usize,
}

impl Scripted {
    pub fn keep() -> Self {
        Self {
            decision: Some(Decision::Keep),
            asked: 0,
        }
    }

    pub fn rollback() -> Self {
        Self {
            decision: Some(Decision::Rollback),
            asked: 0,
        }
    }

    /// For paths where the protocol must never reach the decision point.
    pub fn none() -> Self {
        Self {
            decision: None,
            asked: 0,
        }
    }
}

impl DecisionSource for Scripted {
    fn decide(&mut self) -> Result<Decision> {
        self.asked += 1;
        match self.decision {
            Some(decision) => Ok(decision),
            None => panic!("protocol asked for a decision on a path that must not mutate"),
        }
    }
}
