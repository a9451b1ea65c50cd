use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use miniaries::{recover_dir, write_outputs, RecoveryConfig};
use std::path::PathBuf;

/// Recover a crashed page store from its write-ahead log.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding wal.jsonl, disk_pages.json and master.json
    scenario_dir: PathBuf,

    /// TOML file overriding file names and options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report without writing the output artifacts
    #[arg(long)]
    no_write: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log every redo and undo decision
    #[arg(short, long)]
    verbose: bool,
}

fn initialize_logger(verbose: bool) {
    let crate_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = Builder::new();

    builder
        .filter_level(LevelFilter::Info)
        .filter_module("miniaries", crate_level)
        .format_timestamp_millis()
        .parse_default_env();

    // Logs go to stderr so the report on stdout stays diffable
    let _ = builder.try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    let config = RecoveryConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load recovery configuration")?;

    let (pages, report) = recover_dir(&cli.scenario_dir, &config)
        .with_context(|| format!("Recovery failed for scenario {}", cli.scenario_dir.display()))?;

    if cli.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{}", report.render());
    }

    if config.write_outputs && !cli.no_write {
        let written = write_outputs(&cli.scenario_dir, &report, &pages, &config)
            .with_context(|| format!("Failed to write outputs into {}", cli.scenario_dir.display()))?;
        for path in &written {
            info!("Wrote {}", path.display());
        }
    }

    Ok(())
}
