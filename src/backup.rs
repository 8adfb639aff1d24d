//! Backup and restore of the target row around a mutation
//!
//! A mutation is only ever issued after a verified snapshot of the target
//! row exists, so a bad write is always undoable. The one exception is a
//! row the protocol itself created with a minimal insert: there is nothing
//! to snapshot, and rollback means deleting it again.

use crate::error::{CloneRowError, Result};
use crate::sql;
use crate::store::{DataStore, RowLocator};
use std::path::{Path, PathBuf};

/// The pre-mutation state of the target row, durable across process exit.
#[derive(Debug, Clone, PartialEq)]
pub enum Backup {
    /// A snapshot file holding exactly one exported row.
    Snapshot { path: PathBuf, locator: RowLocator },
    /// The row did not exist before this run; rollback is delete-only.
    FreshRow { locator: RowLocator },
}

impl Backup {
    pub fn locator(&self) -> &RowLocator {
        match self {
            Backup::Snapshot { locator, .. } => locator,
            Backup::FreshRow { locator } => locator,
        }
    }

    /// Snapshot file path, if one was taken.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Backup::Snapshot { path, .. } => Some(path),
            Backup::FreshRow { .. } => None,
        }
    }

    /// Script the operator can run by hand to undo a kept update. For a
    /// fresh row there is no snapshot to reimport, so the script is
    /// delete-only.
    pub fn manual_rollback_script(&self) -> String {
        match self {
            Backup::Snapshot { path, locator } => {
                sql::manual_rollback_script(locator, &path.display().to_string())
            }
            Backup::FreshRow { locator } => sql::manual_delete_script(locator),
        }
    }
}

pub struct BackupCoordinator;

impl BackupCoordinator {
    /// Export the single row at `locator` to `dest`.
    ///
    /// The export count must be exactly 1, anything else means the snapshot
    /// cannot be trusted as a restore source and the run aborts before any
    /// mutation is attempted.
    pub fn backup(
        store: &mut dyn DataStore,
        locator: &RowLocator,
        dest: &Path,
    ) -> Result<Backup> {
        log::info!("Backing up target row ({})", locator);
        let exported = store.export_row(locator, dest)?;
        if exported != 1 {
            return Err(CloneRowError::backup_verification(format!(
                "Expected to export exactly one row for {}, snapshot holds {}",
                locator, exported
            )));
        }
        log::info!(
            "Backup file can be found at {} on {}",
            dest.display(),
            store.alias()
        );
        Ok(Backup::Snapshot {
            path: dest.to_path_buf(),
            locator: locator.clone(),
        })
    }

    /// Put the target row back to its pre-mutation state.
    ///
    /// Runs as one transaction: delete the current row (must affect exactly
    /// 1), then re-import the snapshot (must insert exactly 1). Any
    /// verification failure rolls the whole transaction back, leaving the
    /// target as it was before the restore attempt. For a [`Backup::FreshRow`]
    /// the import step is skipped.
    pub fn restore(store: &mut dyn DataStore, backup: &Backup) -> Result<()> {
        let locator = backup.locator();
        store.begin_transaction()?;

        let delete = sql::delete_row(&locator.table, &locator.key_column);
        let deleted = match store.execute(&delete, &[locator.key_value.clone()]) {
            Ok(count) => count,
            Err(e) => return Err(abort(store, e)),
        };
        if deleted != 1 {
            return Err(abort(
                store,
                CloneRowError::restore_verification(format!(
                    "Expected to delete exactly one row for {}, deleted {}",
                    locator, deleted
                )),
            ));
        }

        match backup {
            Backup::FreshRow { .. } => {
                log::info!("Just deleting as target row was inserted from scratch");
            }
            Backup::Snapshot { path, .. } => {
                let imported = match store.import_row(path, &locator.table) {
                    Ok(count) => count,
                    Err(e) => return Err(abort(store, e)),
                };
                if imported != 1 {
                    return Err(abort(
                        store,
                        CloneRowError::restore_verification(format!(
                            "Expected to load exactly one row from {}, loaded {}",
                            path.display(),
                            imported
                        )),
                    ));
                }
            }
        }

        store.commit()?;
        log::info!("Target row restored from backup ({})", locator);
        Ok(())
    }
}

/// Roll the transaction back and surface the original error.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;
    use std::path::PathBuf;

    #[test]
    fn test_snapshot_manual_script_references_backup_file() {
        let backup = Backup::Snapshot {
            path: PathBuf::from("/tmp/unload/users-id-1-0.backup"),
            locator: RowLocator::new("users", "id", Value::Integer(1)),
        };
        let script = backup.manual_rollback_script();
        assert!(script.contains("delete from users where id = 1;"));
        assert!(script.contains("read_csv_auto('/tmp/unload/users-id-1-0.backup')"));
    }

    #[test]
    fn test_fresh_row_manual_script_is_delete_only() {
        let backup = Backup::FreshRow {
            locator: RowLocator::new("users", "id", Value::Integer(5)),
        };
        let script = backup.manual_rollback_script();
        assert!(script.contains("delete from users where id = 5;"));
        assert!(!script.contains("read_csv_auto"));
        assert!(script.ends_with("  commit;\n"));
    }
}
