#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, BufWriter, Write};

use clap::Parser;
use config::{CliArgs, CliConfig};
use oidblock::{CategoryRegistry, RegistryBuilder, SqliteProvider};
use telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let provider =
        SqliteProvider::new(&config.database).with_busy_timeout(config.busy_timeout);
    let registry = RegistryBuilder::from_config(provider, config.registry.clone()).build()?;

    let mut out = BufWriter::new(io::stdout().lock());
    print_identifiers(&registry, &config, &mut out)?;
    out.flush()?;
    Ok(())
}

fn print_identifiers(
    registry: &CategoryRegistry,
    config: &CliConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for category in &config.categories {
        for _ in 0..config.count {
            if config.raw {
                let id = registry.next_identifier(category)?;
                writeln!(out, "{category}\t{id}")?;
            } else {
                let id = registry.new_identifier(category)?;
                writeln!(out, "{category}\t{id}")?;
            }
        }
    }
    Ok(())
}

fn log_startup_info(config: &CliConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Generating identifiers with full config: {:#?}", config);
    }
    tracing::info!(
        database = %config.database.display(),
        table = %config.registry.table.qualified_name(),
        categories = config.categories.len(),
        count = config.count,
        "Generating identifiers"
    );
}
