use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::RunError;
use crate::matrix::{matrix_path, write_reference, Role};
use crate::results::{BenchmarkRecord, ResultLog, RunStatus};
use crate::runner::{Invocation, RunResult};

/// A compiled matrix-multiplication strategy under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Unoptimized,
    SimdNoO3,
    SimdO3,
}

impl Variant {
    /// Execution order for every matrix size.
    pub const ALL: [Variant; 3] = [Variant::Unoptimized, Variant::SimdNoO3, Variant::SimdO3];

    pub fn label(self) -> &'static str {
        match self {
            Variant::Unoptimized => "unoptimized",
            Variant::SimdNoO3 => "SIMD no O3",
            Variant::SimdO3 => "SIMD with O3",
        }
    }

    pub fn executable(self) -> &'static str {
        match self {
            Variant::Unoptimized | Variant::SimdNoO3 => "test_mmult",
            Variant::SimdO3 => "test_mmult_simd",
        }
    }

    /// Algorithm selector passed as the first argument.
    pub fn selector(self) -> u32 {
        match self {
            Variant::Unoptimized => 1,
            Variant::SimdNoO3 | Variant::SimdO3 => 2,
        }
    }

    // selector, size, operand a, operand b, expected product
    pub fn invocation(self, size: usize, config: &Config) -> Invocation {
        let dir = &config.matrix_dir;
        Invocation::new(config.bin_dir.join(self.executable()))
            .arg(self.selector().to_string())
            .arg(size.to_string())
            .arg(matrix_path(dir, Role::A, size))
            .arg(matrix_path(dir, Role::B, size))
            .arg(matrix_path(dir, Role::C, size))
    }
}

/// Checks both operands are on disk and builds the reference product from
/// them when `c_N.txt` is absent.
fn prepare_inputs(size: usize, config: &Config) -> Result<(), RunError> {
    let dir = &config.matrix_dir;
    for role in [Role::A, Role::B] {
        let path = matrix_path(dir, role, size);
        if !path.is_file() {
            return Err(RunError::MissingInput { path });
        }
    }
    if !matrix_path(dir, Role::C, size).is_file() {
        let path = write_reference(dir, size)?;
        info!(path = %path.display(), "built missing reference product");
    }
    Ok(())
}

fn status_of(outcome: &Result<RunResult, RunError>) -> RunStatus {
    match outcome {
        Ok(_) => RunStatus::Passed,
        Err(RunError::NonZeroExit { code, .. }) => RunStatus::Failed { exit_code: *code },
        Err(RunError::Timeout { .. }) => RunStatus::TimedOut,
        Err(RunError::MissingInput { .. } | RunError::Reference(_)) => RunStatus::MissingInput,
        Err(RunError::Spawn { .. }) => RunStatus::SpawnFailed,
        Err(_) => RunStatus::Failed { exit_code: None },
    }
}

/// Runs every variant once against the `size` matrices, in order, appending
/// one record per invocation.
///
/// Failed invocations are recorded with their status. With `fail_fast` the
/// first failure is returned after its record has been appended.
pub fn run_size(size: usize, config: &Config, log: &mut ResultLog) -> Result<(), RunError> {
    for variant in Variant::ALL {
        info!("Running {} on matrix size {}...", variant.label(), size);

        let invocation = variant.invocation(size, config);
        let (outcome, elapsed) = match prepare_inputs(size, config) {
            Ok(()) => {
                let start = Instant::now();
                let outcome = invocation.run_checked(config.timeout);
                (outcome, start.elapsed())
            }
            Err(e) => (Err(e), Duration::ZERO),
        };

        let status = status_of(&outcome);
        log.push(BenchmarkRecord {
            method: variant.label(),
            size,
            elapsed,
            status,
        });

        match outcome {
            Ok(result) => info!(
                method = variant.label(),
                size,
                seconds = elapsed.as_secs_f64(),
                child_seconds = result.duration.as_secs_f64(),
                "finished"
            ),
            Err(e) => {
                warn!(method = variant.label(), size, %status, error = %e, "invocation failed");
                if config.fail_fast {
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::testutil::{write_matrices, write_operands, write_script};
    use std::ffi::OsString;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    const RECORD_CALL: &str = r#"echo "$(basename "$0") $*" >> "$(dirname "$0")/calls""#;

    fn setup(dir: &Path, simd_body: &str) -> Config {
        let bin = dir.join("bin");
        fs::create_dir_all(&bin).unwrap();
        write_script(&bin, "test_mmult", RECORD_CALL);
        write_script(&bin, "test_mmult_simd", &format!("{RECORD_CALL}\n{simd_body}"));

        let mut config = Config::for_tests(dir.join("matrix"));
        config.bin_dir = bin;
        config
    }

    #[test]
    fn test_variant_table() {
        let labels: Vec<_> = Variant::ALL.iter().map(|v| v.label()).collect();
        assert_eq!(labels, ["unoptimized", "SIMD no O3", "SIMD with O3"]);
        assert_eq!(Variant::Unoptimized.selector(), 1);
        assert_eq!(Variant::SimdNoO3.selector(), 2);
        assert_eq!(Variant::SimdO3.selector(), 2);
        assert_eq!(Variant::SimdNoO3.executable(), "test_mmult");
        assert_eq!(Variant::SimdO3.executable(), "test_mmult_simd");
    }

    #[test]
    fn test_invocation_arguments() {
        let mut config = Config::for_tests(PathBuf::from("matrix"));
        config.bin_dir = PathBuf::from("build");

        let inv = Variant::SimdO3.invocation(16, &config);
        assert_eq!(inv.program(), Path::new("build/test_mmult_simd"));
        let args: Vec<OsString> = ["2", "16", "matrix/a_16.txt", "matrix/b_16.txt", "matrix/c_16.txt"]
            .iter()
            .map(|s| PathBuf::from(s).into_os_string())
            .collect();
        assert_eq!(inv.args(), args.as_slice());
    }

    #[test]
    fn test_three_records_in_order() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), "exit 0");
        write_operands(&config.matrix_dir, 4);
        let mut log = ResultLog::new();

        run_size(4, &config, &mut log).unwrap();

        let methods: Vec<_> = log.records().iter().map(|r| r.method).collect();
        assert_eq!(methods, ["unoptimized", "SIMD no O3", "SIMD with O3"]);
        assert!(log.records().iter().all(|r| r.size == 4 && r.status.is_passed()));

        let m = config.matrix_dir.display();
        let calls = fs::read_to_string(config.bin_dir.join("calls")).unwrap();
        let expected = format!(
            "test_mmult 1 4 {m}/a_4.txt {m}/b_4.txt {m}/c_4.txt\n\
             test_mmult 2 4 {m}/a_4.txt {m}/b_4.txt {m}/c_4.txt\n\
             test_mmult_simd 2 4 {m}/a_4.txt {m}/b_4.txt {m}/c_4.txt\n"
        );
        assert_eq!(calls, expected);
    }

    #[test]
    fn test_existing_operands_without_reference() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), "exit 0");
        write_matrices(&config.matrix_dir, 8, &[Role::A, Role::B]);
        let mut log = ResultLog::new();

        run_size(8, &config, &mut log).unwrap();

        let statuses: Vec<_> = log.records().iter().map(|r| r.status).collect();
        assert_eq!(statuses, [RunStatus::Passed; 3]);
        let calls = fs::read_to_string(config.bin_dir.join("calls")).unwrap();
        assert_eq!(calls.lines().count(), 3);

        let c = Matrix::from_file(&matrix_path(&config.matrix_dir, Role::C, 8)).unwrap();
        assert_eq!((c.rows(), c.cols()), (8, 8));
    }

    #[test]
    fn test_missing_operand_skips_launch() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), "exit 0");
        write_matrices(&config.matrix_dir, 8, &[Role::A]);
        let mut log = ResultLog::new();

        run_size(8, &config, &mut log).unwrap();

        assert!(log
            .records()
            .iter()
            .all(|r| r.status == RunStatus::MissingInput && r.elapsed == Duration::ZERO));
        assert!(!config.bin_dir.join("calls").exists());
        assert!(!matrix_path(&config.matrix_dir, Role::C, 8).exists());
    }

    #[test]
    fn test_failed_run_is_recorded_not_hidden() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), "exit 1");
        write_operands(&config.matrix_dir, 8);
        let mut log = ResultLog::new();

        run_size(8, &config, &mut log).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(
            log.records()[2].status,
            RunStatus::Failed { exit_code: Some(1) }
        );
        assert_eq!(log.failures().count(), 1);
    }

    #[test]
    fn test_fail_fast_stops() {
        let dir = tempdir().unwrap();
        let mut config = setup(dir.path(), "exit 0");
        write_script(&config.bin_dir, "test_mmult", "exit 3");
        config.fail_fast = true;
        write_operands(&config.matrix_dir, 2);
        let mut log = ResultLog::new();

        let err = run_size(2, &config, &mut log).unwrap_err();

        assert!(matches!(err, RunError::NonZeroExit { code: Some(3), .. }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempdir().unwrap();
        let mut config = Config::for_tests(dir.path().join("matrix"));
        config.bin_dir = dir.path().join("nowhere");
        write_operands(&config.matrix_dir, 2);
        let mut log = ResultLog::new();

        run_size(2, &config, &mut log).unwrap();

        assert_eq!(log.len(), 3);
        assert!(log
            .records()
            .iter()
            .all(|r| r.status == RunStatus::SpawnFailed));
    }

    #[test]
    fn test_missing_inputs_skip_launch() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), "exit 0");
        let mut log = ResultLog::new();

        run_size(8, &config, &mut log).unwrap();

        assert_eq!(log.len(), 3);
        assert!(log
            .records()
            .iter()
            .all(|r| r.status == RunStatus::MissingInput));
        assert!(!config.bin_dir.join("calls").exists());
    }

    #[test]
    fn test_timeout_status() {
        let dir = tempdir().unwrap();
        let mut config = setup(dir.path(), "exec sleep 10");
        config.timeout = Some(std::time::Duration::from_secs(1));
        write_operands(&config.matrix_dir, 2);
        let mut log = ResultLog::new();

        run_size(2, &config, &mut log).unwrap();

        assert!(log.records()[0].status.is_passed());
        assert_eq!(log.records()[2].status, RunStatus::TimedOut);
    }
}
