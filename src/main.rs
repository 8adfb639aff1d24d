//! Main entry point for the clonerow CLI

use clap::Parser;
use clonerow::cli::Cli;
use clonerow::config::Config;
use clonerow::duckdb_store::DuckDbStore;
use clonerow::error::Result;
use clonerow::output::{ConsolePrompt, PrettyPrinter};
use clonerow::protocol::{ReconciliationProtocol, RunContext};
use clonerow::store::Value;
use std::fs;

fn main() {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Set up verbose logging if requested
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    cli.validate()?;
    let config = Config::load(&cli.config)?;
    fs::create_dir_all(&config.unload_dir)?;

    let column_label = cli.column.as_deref().unwrap_or("schema");
    let filter_label = cli.filter.as_deref().unwrap_or("only");
    let context = RunContext {
        table: cli.table.clone(),
        key_column: cli.column.clone(),
        key_value: cli.filter.as_deref().map(Value::parse_filter),
        ignore_columns: config.ignore_set(&cli.table),
        schema_only: cli.schema_only,
        unload_prefix: config.unload_prefix(&cli.table, column_label, filter_label),
    };

    // Both connections are owned here and released on every exit path.
    let mut source = DuckDbStore::connect(
        &cli.source_alias,
        &config.connection_string(&cli.source_alias)?,
    )?;
    let mut target = DuckDbStore::connect(
        &cli.target_alias,
        &config.connection_string(&cli.target_alias)?,
    )?;

    let outcome = ReconciliationProtocol::new(&mut source, &mut target, &context)
        .run(&mut ConsolePrompt)?;
    PrettyPrinter::print_outcome(outcome);
    Ok(())
}
