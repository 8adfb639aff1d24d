//! Command-line interface for clonerow

use crate::config::DEFAULT_CONFIG_FILE;
use crate::error::{CloneRowError, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clonerow")]
#[command(about = "Clone a single row between two databases with a verified backup-and-restore path")]
#[command(version)]
pub struct Cli {
    /// Diff schema only, do not consider data (column and filter not required)
    #[arg(short = 's', long)]
    pub schema_only: bool,

    /// Path to the config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Source host alias (a key under "hosts" in the config)
    pub source_alias: String,

    /// Target host alias (a key under "hosts" in the config)
    pub target_alias: String,

    /// Table to consider: select from <table>
    pub table: String,

    /// Column to consider: select from table where <column>
    pub column: Option<String>,

    /// Value to filter column: select from table where column = <filter>
    pub filter: Option<String>,
}

impl Cli {
    /// Cross-argument checks clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.schema_only && (self.column.is_none() || self.filter.is_none()) {
            return Err(CloneRowError::config(
                "column and filter arguments must be supplied unless running with --schema-only/-s",
            ));
        }
        if self.source_alias == self.target_alias {
            return Err(CloneRowError::integrity(
                "source and target alias are identical",
            ));
        }
        Ok(())
    }
}
