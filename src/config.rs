//! Command-line options and the resolved run configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::level_filters::LevelFilter;

/// Build, generate and benchmark matrix-multiplication executables.
#[derive(Debug, Parser)]
#[command(name = "mmult-bench", version, about)]
pub struct Cli {
    /// Generate matrix files (a, b and the reference product c) beforehand
    #[arg(long)]
    pub generate: bool,

    /// Directory to store log files in
    #[arg(long = "log_dir", value_name = "DIR", default_value = "log")]
    pub log_dir: PathBuf,

    /// Matrix sizes to use/generate
    #[arg(long = "matrix_sizes", value_name = "N", num_args = 1.., value_parser = parse_size)]
    pub matrix_sizes: Vec<usize>,

    /// Directory where the matrix files are stored
    #[arg(long = "matrix_dir", value_name = "DIR", default_value = "matrix")]
    pub matrix_dir: PathBuf,

    /// Directory containing the test_mmult executables
    #[arg(long = "bin_dir", value_name = "DIR", default_value = ".")]
    pub bin_dir: PathBuf,

    /// Build tool used to rebuild the executables
    #[arg(long, value_name = "PROGRAM", default_value = "make")]
    pub make: String,

    /// Build target run after `clean`
    #[arg(long = "build_target", value_name = "TARGET", default_value = "all")]
    pub build_target: String,

    /// Use the executables as they are instead of rebuilding them
    #[arg(long = "skip_build")]
    pub skip_build: bool,

    /// Kill an invocation after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Stop at the first failed invocation
    #[arg(long = "fail_fast")]
    pub fail_fast: bool,

    /// Seed for matrix generation
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Default log level when `RUST_LOG` is not set.
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::WARN;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn parse_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("matrix size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid matrix size '{s}': {e}")),
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs = s
        .parse::<f64>()
        .map_err(|e| format!("invalid timeout '{s}': {e}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("timeout must be a positive number of seconds".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{s}': {e}"))
}

/// Resolved options, fixed for the whole run and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub generate: bool,
    pub log_dir: PathBuf,
    pub matrix_sizes: Vec<usize>,
    pub matrix_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub make: String,
    pub build_target: String,
    pub skip_build: bool,
    pub timeout: Option<Duration>,
    pub fail_fast: bool,
    pub seed: Option<u64>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            generate: cli.generate,
            log_dir: cli.log_dir,
            matrix_sizes: cli.matrix_sizes,
            matrix_dir: cli.matrix_dir,
            bin_dir: cli.bin_dir,
            make: cli.make,
            build_target: cli.build_target,
            skip_build: cli.skip_build,
            timeout: cli.timeout,
            fail_fast: cli.fail_fast,
            seed: cli.seed,
        }
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with the matrix directory pointed somewhere disposable.
    pub fn for_tests(matrix_dir: PathBuf) -> Self {
        let mut config = Config::from(Cli::parse_from(["mmult-bench"]));
        config.matrix_dir = matrix_dir;
        config.skip_build = true;
        config
    }
}
