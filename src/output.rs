//! Operator-facing output formatting

use crate::error::Result;
use crate::protocol::{ColumnDrift, Decision, DecisionSource, ReconciliationOutcome};
use std::io::{self, BufRead, Write};

/// Pretty printer for clonerow output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print advisory DDL for columns present on one side only.
    pub fn print_schema_drift(drift: &[ColumnDrift]) {
        for entry in drift {
            println!();
            println!("🔍 Column drift: {}", entry.column);
            println!(
                "├─ '{}' exists on {} but not on {}",
                entry.column, entry.present_on, entry.absent_on
            );
            println!("├─ ADD: to add it on {}, run:", entry.absent_on);
            println!("│    {}", entry.add_sql);
            println!("└─ DROP: to drop it from {}, run:", entry.present_on);
            println!("     {}", entry.drop_sql);
        }
    }

    /// Print the columns the pending update will touch.
    pub fn print_delta_columns(target_alias: &str, columns: &[String]) {
        println!();
        println!("✏️  The following columns will be updated on {}:", target_alias);
        for (i, column) in columns.iter().enumerate() {
            let prefix = if i == columns.len() - 1 { "└─" } else { "├─" };
            println!("{} {}", prefix, column);
        }
    }

    /// Print the manual rollback script for after the process has exited.
    pub fn print_manual_rollback(target_alias: &str, script: &str) {
        println!();
        println!("🛟 To rollback manually, run the following sql on {}:", target_alias);
        println!();
        print!("{}", script);
        println!();
    }

    /// Final status line for the run.
    pub fn print_outcome(outcome: ReconciliationOutcome) {
        println!();
        println!("✅ {}", outcome);
    }
}

/// Stdin-backed keep-or-rollback prompt. The protocol blocks here; there is
/// nothing cancellable left at this point since the update has committed and
/// the backup is on disk.
pub struct ConsolePrompt;

impl DecisionSource for ConsolePrompt {
    fn decide(&mut self) -> Result<Decision> {
        println!();
        println!("Row has been cloned successfully..");
        println!("Type 'r' to (r)estore from backup, anything else to keep the change");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        if line.trim() == "r" {
            Ok(Decision::Rollback)
        } else {
            Ok(Decision::Keep)
        }
    }
}
