//! SQL statement generation and value quoting
//!
//! Every place a filter value is interpolated into generated SQL text — the
//! persisted update statement, DDL suggestions, the manual rollback script —
//! uses the same rule: text and datetime values are single-quoted, numeric
//! and boolean values are not.

use crate::store::{ColumnMeta, Row, RowLocator, Value};

/// Render a value as a SQL literal, quoting when the type requires it.
pub fn quote_value(value: &Value) -> String {
    if value.needs_quoting() {
        format!("'{}'", value.to_string().replace('\'', "''"))
    } else {
        value.to_string()
    }
}

/// Select the single row at `key_column = ?`.
pub fn select_row(table: &str, key_column: &str) -> String {
    format!("select * from {} where {} = ?", table, key_column)
}

/// Select any single row; used in schema-only mode where data is irrelevant.
pub fn select_any_row(table: &str) -> String {
    format!("select * from {} limit 1", table)
}

/// Insert as little as possible: just the key column. Lets the protocol
/// re-select and continue when the target row does not exist at all.
pub fn minimal_insert(table: &str, key_column: &str) -> String {
    format!("insert into {} ({}) values (?)", table, key_column)
}

/// Delete the single row at `key_column = ?`.
pub fn delete_row(table: &str, key_column: &str) -> String {
    format!("delete from {} where {} = ?", table, key_column)
}

/// Parameterized update over `columns`, keyed by `key_column`.
///
/// Column order follows the slice as given, so callers get stable ordering
/// for diagnostics. Parameters bind in the same order, key value last.
pub fn update_statement(table: &str, columns: &[String], key_column: &str) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "update {} set {} where {} = ?",
        table, assignments, key_column
    )
}

/// The literal text of the update that was issued, for operator inspection.
pub fn update_statement_text(locator: &RowLocator, columns: &[String], source_row: &Row) -> String {
    let assignments = columns
        .iter()
        .map(|c| {
            let value = source_row.get(c).unwrap_or(&Value::Null);
            format!("{} = {}", c, quote_value(value))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "update {} set {} where {} = {};",
        locator.table,
        assignments,
        locator.key_column,
        quote_value(&locator.key_value)
    )
}

/// Script for rolling back by hand after the process has exited.
pub fn manual_rollback_script(locator: &RowLocator, backup_path: &str) -> String {
    let mut script = String::from("  begin;\n");
    script.push_str(&format!(
        "  delete from {} where {} = {};\n",
        locator.table,
        locator.key_column,
        quote_value(&locator.key_value)
    ));
    script.push_str("  -- the above should have deleted one row; if not, run: rollback;\n");
    script.push_str(&format!(
        "  insert into {} select * from read_csv_auto('{}');\n",
        locator.table, backup_path
    ));
    script.push_str("  commit;\n");
    script
}

/// Delete-only rollback script for a row that did not exist before the run.
pub fn manual_delete_script(locator: &RowLocator) -> String {
    let mut script = String::from("  begin;\n");
    script.push_str(&format!(
        "  delete from {} where {} = {};\n",
        locator.table,
        locator.key_column,
        quote_value(&locator.key_value)
    ));
    script.push_str("  -- the above should have deleted one row; if not, run: rollback;\n");
    script.push_str("  commit;\n");
    script
}

/// DDL to add `column` to `table`, mirroring its definition on the side
/// where it exists. Advisory output only.
pub fn add_column_ddl(table: &str, column: &str, meta: &ColumnMeta) -> String {
    let default = match &meta.default {
        Some(d) => format!(" default {}", d),
        None => String::new(),
    };
    let not_null = if meta.nullable { "" } else { " not null" };
    format!(
        "alter table {} add column {} {}{}{};",
        table, column, meta.data_type, default, not_null
    )
}

/// DDL to drop `column` from `table`. Advisory output only.
pub fn drop_column_ddl(table: &str, column: &str) -> String {
    format!("alter table {} drop column {};", table, column)
}
