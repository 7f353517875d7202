mod bench;
mod config;
mod error;
mod matrix;
mod rebuild;
mod results;
mod runner;
#[cfg(all(test, unix))]
mod testutil;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Cli, Config};
use matrix::generate_operands;
use rebuild::rebuild;
use results::ResultLog;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());
    let config = Config::from(cli);

    let log = run(&config)?;
    if !log.is_empty() {
        print!("{log}");
    }

    Ok(())
}

fn init_tracing(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// rebuild, optionally generate, then benchmark every size in order
fn run(config: &Config) -> Result<ResultLog> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory '{}'", config.log_dir.display()))?;

    if config.skip_build {
        info!("Skipping rebuild");
    } else {
        rebuild(config).context("rebuilding executables")?;
    }

    if config.matrix_sizes.is_empty() {
        warn!("no --matrix_sizes given, nothing to generate or benchmark");
    }

    if config.generate {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for &size in &config.matrix_sizes {
            info!("Generating matrices of size {}...", size);
            generate_operands(size, config, &mut rng)
                .with_context(|| format!("generating matrices of size {size}"))?;
        }
    }

    let mut log = ResultLog::new();
    for &size in &config.matrix_sizes {
        bench::run_size(size, config, &mut log)
            .with_context(|| format!("benchmarking matrix size {size}"))?;
        let passed = log.for_size(size).filter(|r| r.status.is_passed()).count();
        info!(size, passed, "size complete");
    }

    let failed = log.failures().count();
    if failed > 0 {
        warn!(failed, total = log.len(), "some invocations did not pass");
    }

    Ok(log)
}
