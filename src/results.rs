use std::fmt;
use std::time::Duration;

/// How a single benchmark invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exit code 0, the executable accepted its result.
    Passed,
    /// Non-zero exit, or `None` when killed by a signal.
    Failed { exit_code: Option<i32> },
    TimedOut,
    /// The executable could not be launched.
    SpawnFailed,
    /// Operands were absent or the reference product could not be built, nothing was launched.
    MissingInput,
}

impl RunStatus {
    pub fn is_passed(self) -> bool {
        self == RunStatus::Passed
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "ok"),
            RunStatus::Failed {
                exit_code: Some(code),
            } => write!(f, "exit {code}"),
            RunStatus::Failed { exit_code: None } => write!(f, "killed"),
            RunStatus::TimedOut => write!(f, "timeout"),
            RunStatus::SpawnFailed => write!(f, "launch failed"),
            RunStatus::MissingInput => write!(f, "missing input"),
        }
    }
}

/// One timed invocation of one variant on one matrix size.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub method: &'static str,
    pub size: usize,
    pub elapsed: Duration,
    pub status: RunStatus,
}

impl BenchmarkRecord {
    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Append-only, ordered table of benchmark records.
#[derive(Debug, Default)]
pub struct ResultLog {
    records: Vec<BenchmarkRecord>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: BenchmarkRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[BenchmarkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_size(&self, size: usize) -> impl Iterator<Item = &BenchmarkRecord> {
        self.records.iter().filter(move |r| r.size == size)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BenchmarkRecord> {
        self.records.iter().filter(|r| !r.status.is_passed())
    }
}

const HEADERS: [&str; 4] = ["method", "matrix size", "time (s)", "status"];

impl fmt::Display for ResultLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method_w = self
            .records()
            .iter()
            .map(|r| r.method.len())
            .chain([HEADERS[0].len()])
            .max()
            .unwrap_or_default();
        let size_w = HEADERS[1].len();
        let time_w = HEADERS[2].len().max(10);

        writeln!(
            f,
            "{:<method_w$}  {:>size_w$}  {:>time_w$}  {}",
            HEADERS[0], HEADERS[1], HEADERS[2], HEADERS[3]
        )?;
        for r in self.records() {
            writeln!(
                f,
                "{:<method_w$}  {:>size_w$}  {:>time_w$.6}  {}",
                r.method,
                r.size,
                r.seconds(),
                r.status
            )?;
        }
        Ok(())
    }
}
