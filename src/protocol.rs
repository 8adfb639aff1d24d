//! The end-to-end row reconciliation protocol
//!
//! Sequencing is fetch, diff, back up, mutate, verify, then either finalize
//! or restore. Every mutating statement must report exactly one affected
//! row; any other count aborts the enclosing transaction. The affected-count
//! check is also the sole concurrent-modification detector: if another
//! writer raced and changed row cardinality, verification catches it.

use crate::backup::{Backup, BackupCoordinator};
use crate::diff::{self, Delta};
use crate::error::{CloneRowError, Result};
use crate::output::PrettyPrinter;
use crate::sql;
use crate::store::{DataStore, Row, RowLocator, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// How a run ended, for the operator's final status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Source and target data already identical.
    NoOpIdentical,
    /// Every differing column is in the ignore set.
    NoOpAllIgnored,
    /// Schema-only run: drift reported, data never considered.
    SchemaOnlyReported,
    /// Update applied and kept by the operator.
    Applied,
    /// Update applied, then rolled back from backup on the operator's call.
    AppliedThenRestored,
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReconciliationOutcome::NoOpIdentical => {
                "data is identical in target and source, nothing to do"
            }
            ReconciliationOutcome::NoOpAllIgnored => {
                "all deltas ignored by table config, nothing to do"
            }
            ReconciliationOutcome::SchemaOnlyReported => "schema diff reported",
            ReconciliationOutcome::Applied => "row cloned and kept",
            ReconciliationOutcome::AppliedThenRestored => "row cloned, then restored from backup",
        };
        write!(f, "{}", text)
    }
}

/// The operator's call after a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Rollback,
}

/// Supplies the keep-or-rollback decision. Injected so tests can script it;
/// the binary wires in a stdin prompt.
pub trait DecisionSource {
    fn decide(&mut self) -> Result<Decision>;
}

/// Immutable per-run inputs, assembled once before any connection work.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub table: String,
    pub key_column: Option<String>,
    pub key_value: Option<Value>,
    pub ignore_columns: BTreeSet<String>,
    pub schema_only: bool,
    /// Path prefix for this run's backup and update-sql artifacts.
    pub unload_prefix: PathBuf,
}

impl RunContext {
    pub fn backup_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.backup", self.unload_prefix.display()))
    }

    pub fn update_sql_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.sql", self.unload_prefix.display()))
    }

    fn locator(&self) -> Result<RowLocator> {
        match (&self.key_column, &self.key_value) {
            (Some(column), Some(value)) => {
                Ok(RowLocator::new(self.table.clone(), column.clone(), value.clone()))
            }
            _ => Err(CloneRowError::integrity(
                "key column and filter are required outside schema-only mode",
            )),
        }
    }
}

/// A column present on one side only, with advisory DDL for both fixes.
#[derive(Debug, Clone)]
pub struct ColumnDrift {
    pub column: String,
    /// Alias of the host that has the column.
    pub present_on: String,
    /// Alias of the host that lacks it.
    pub absent_on: String,
    /// DDL to add the column on the side missing it.
    pub add_sql: String,
    /// DDL to drop the column from the side that has it.
    pub drop_sql: String,
}

pub struct ReconciliationProtocol<'a> {
    source: &'a mut dyn DataStore,
    target: &'a mut dyn DataStore,
    context: &'a RunContext,
}

impl<'a> ReconciliationProtocol<'a> {
    pub fn new(
        source: &'a mut dyn DataStore,
        target: &'a mut dyn DataStore,
        context: &'a RunContext,
    ) -> Self {
        Self {
            source,
            target,
            context,
        }
    }

    /// Run the protocol to completion. Store connections are released by
    /// their owners regardless of how this returns.
    pub fn run(&mut self, decisions: &mut dyn DecisionSource) -> Result<ReconciliationOutcome> {
        if self.context.schema_only {
            return self.run_schema_only();
        }

        let locator = self.context.locator()?;

        log::info!("Getting source row..");
        let query = sql::select_row(&locator.table, &locator.key_column);
        let source_row = self
            .source
            .fetch_one(&query, &[locator.key_value.clone()])?
            .ok_or_else(|| {
                CloneRowError::source_missing(format!(
                    "Row does not exist on {} ({})",
                    self.source.alias(),
                    locator
                ))
            })?;

        log::info!("Getting target row..");
        let (target_row, fresh_insert) = match self.target.fetch_one(&query, &[locator.key_value.clone()])? {
            Some(row) => (row, false),
            None => {
                log::info!("Row does not exist at all in target, running a minimal insert..");
                (self.minimal_insert(&locator)?, true)
            }
        };

        let result = self.reconcile(&locator, &source_row, &target_row, fresh_insert, decisions);
        if result.is_err() && fresh_insert {
            self.remove_fresh_row(&locator);
        }
        result
    }

    /// Everything after both rows are resolved. Split out so a fatal path
    /// can still remove a row the minimal insert committed.
    fn reconcile(
        &mut self,
        locator: &RowLocator,
        source_row: &Row,
        target_row: &Row,
        fresh_insert: bool,
        decisions: &mut dyn DecisionSource,
    ) -> Result<ReconciliationOutcome> {
        log::info!("Finding deltas..");
        let delta = diff::diff(source_row, target_row);
        self.report_schema_drift(&delta)?;

        if delta.changed.is_empty() {
            return Ok(ReconciliationOutcome::NoOpIdentical);
        }
        let columns = delta.updatable_columns(&self.context.ignore_columns);
        if columns.is_empty() {
            log::info!(
                "All deltas ignored via tables.{}.ignore_columns",
                self.context.table
            );
            return Ok(ReconciliationOutcome::NoOpAllIgnored);
        }

        PrettyPrinter::print_delta_columns(self.target.alias(), &columns);

        let backup = if fresh_insert {
            // Nothing existed before this run, so there is nothing to
            // snapshot; rollback is delete-only.
            Backup::FreshRow {
                locator: locator.clone(),
            }
        } else {
            BackupCoordinator::backup(self.target, locator, &self.context.backup_path())?
        };

        self.apply_update(locator, &columns, source_row)?;

        match decisions.decide()? {
            Decision::Keep => {
                PrettyPrinter::print_manual_rollback(
                    self.target.alias(),
                    &backup.manual_rollback_script(),
                );
                Ok(ReconciliationOutcome::Applied)
            }
            Decision::Rollback => {
                log::info!("Restoring from backup..");
                BackupCoordinator::restore(self.target, &backup)?;
                Ok(ReconciliationOutcome::AppliedThenRestored)
            }
        }
    }

    /// The minimal insert committed a key-only placeholder; with the run
    /// failing, the target must not keep a row that did not exist before it.
    fn remove_fresh_row(&mut self, locator: &RowLocator) {
        log::warn!("Removing minimally inserted row after failure ({})", locator);
        let placeholder = Backup::FreshRow {
            locator: locator.clone(),
        };
        if let Err(e) = BackupCoordinator::restore(self.target, &placeholder) {
            log::warn!(
                "Could not remove minimally inserted row ({}): {}",
                locator,
                e
            );
        }
    }

    /// Schema-only variant: any single row per side, data never considered.
    fn run_schema_only(&mut self) -> Result<ReconciliationOutcome> {
        let query = sql::select_any_row(&self.context.table);

        let source_row = self.source.fetch_one(&query, &[])?.ok_or_else(|| {
            CloneRowError::source_missing(format!(
                "Table {} is empty on {}",
                self.context.table,
                self.source.alias()
            ))
        })?;
        let target_row = self.target.fetch_one(&query, &[])?.ok_or_else(|| {
            CloneRowError::integrity(format!(
                "Table {} is empty on {}",
                self.context.table,
                self.target.alias()
            ))
        })?;

        let delta = diff::diff(&source_row, &target_row);
        self.report_schema_drift(&delta)?;
        Ok(ReconciliationOutcome::SchemaOnlyReported)
    }

    /// Insert just the key column so the target row can be re-selected and
    /// reconciled as usual.
    fn minimal_insert(&mut self, locator: &RowLocator) -> Result<Row> {
        self.target.begin_transaction()?;
        let insert = sql::minimal_insert(&locator.table, &locator.key_column);
        let inserted = match self.target.execute(&insert, &[locator.key_value.clone()]) {
            Ok(count) => count,
            Err(e) => return Err(abort(self.target, e)),
        };
        if inserted != 1 {
            return Err(abort(
                self.target,
                CloneRowError::integrity(format!(
                    "Minimal insert affected {} rows for {}",
                    inserted, locator
                )),
            ));
        }
        self.target.commit()?;

        let query = sql::select_row(&locator.table, &locator.key_column);
        self.target
            .fetch_one(&query, &[locator.key_value.clone()])?
            .ok_or_else(|| {
                CloneRowError::integrity(format!(
                    "Minimal insert committed but row not found ({})",
                    locator
                ))
            })
    }

    /// One parameterized update covering every changed, non-ignored column,
    /// verified and committed in a transaction. The literal statement text
    /// is persisted for operator inspection.
    fn apply_update(
        &mut self,
        locator: &RowLocator,
        columns: &[String],
        source_row: &Row,
    ) -> Result<()> {
        let statement = sql::update_statement(&locator.table, columns, &locator.key_column);
        let mut params: Vec<Value> = columns
            .iter()
            .map(|c| source_row.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        params.push(locator.key_value.clone());

        self.target.begin_transaction()?;
        let affected = match self.target.execute(&statement, &params) {
            Ok(count) => count,
            Err(e) => return Err(abort(self.target, e)),
        };
        if affected != 1 {
            // The mutation never committed, so no restore is attempted.
            return Err(abort(
                self.target,
                CloneRowError::update_verification(format!(
                    "Expected to update exactly one row for {}, affected {}",
                    locator, affected
                )),
            ));
        }
        self.target.commit()?;

        let sql_path = self.context.update_sql_path();
        fs::write(&sql_path, sql::update_statement_text(locator, columns, source_row))?;
        log::info!(
            "Update sql is available for inspection at {}",
            sql_path.display()
        );
        Ok(())
    }

    /// Build and print the advisory add/drop DDL for every column present on
    /// one side only. Never executed by the protocol.
    fn report_schema_drift(&mut self, delta: &Delta) -> Result<()> {
        if !delta.has_schema_drift() {
            return Ok(());
        }
        let drift = schema_delta_report(self.source, self.target, &self.context.table, delta)?;
        PrettyPrinter::print_schema_drift(&drift);
        Ok(())
    }
}

/// Resolve each one-sided column's metadata on the side that has it and
/// pair it with add/drop DDL suggestions.
pub fn schema_delta_report(
    source: &mut dyn DataStore,
    target: &mut dyn DataStore,
    table: &str,
    delta: &Delta,
) -> Result<Vec<ColumnDrift>> {
    let mut report = Vec::new();

    for column in &delta.added {
        let meta = source.column_metadata(table, column)?;
        report.push(ColumnDrift {
            column: column.clone(),
            present_on: source.alias().to_string(),
            absent_on: target.alias().to_string(),
            add_sql: sql::add_column_ddl(table, column, &meta),
            drop_sql: sql::drop_column_ddl(table, column),
        });
    }
    for column in &delta.removed {
        let meta = target.column_metadata(table, column)?;
        report.push(ColumnDrift {
            column: column.clone(),
            present_on: target.alias().to_string(),
            absent_on: source.alias().to_string(),
            add_sql: sql::add_column_ddl(table, column, &meta),
            drop_sql: sql::drop_column_ddl(table, column),
        });
    }

    Ok(report)
}

/// Roll the target transaction back and surface the original error.
fn abort(store: &mut dyn DataStore, err: CloneRowError) -> CloneRowError {
    if let Err(rollback_err) = store.rollback() {
        log::warn!(
            "Rollback failed on {} while aborting: {}",
            store.alias(),
            rollback_err
        );
    }
    err
}
