//! Synchronous execution of external programs with captured output.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::RunError;

/// How often a child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A program plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
}

/// Outcome of a child that ran to completion.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall clock time from launch to exit.
    pub duration: Duration,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[cfg(test)]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    #[cfg(test)]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program name as shown in errors and logs.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Runs the program to completion, or until `timeout` elapses.
    ///
    /// A non-zero exit is still an `Ok`; use [`Invocation::run_checked`] to
    /// treat it as an error.
    pub fn run(&self, timeout: Option<Duration>) -> Result<RunResult, RunError> {
        debug!(program = %self.program.display(), args = ?self.args, "launching");

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program_name(),
                source,
            })?;

        // Drain both pipes off-thread so a chatty child never blocks on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match timeout {
            None => child.wait()?,
            Some(limit) => match wait_with_timeout(&mut child, start, limit)? {
                Some(status) => status,
                None => {
                    // Readers are left detached, grandchildren may still hold the pipes.
                    return Err(RunError::Timeout {
                        program: self.program_name(),
                        after: limit,
                    });
                }
            },
        };
        let duration = start.elapsed();

        let result = RunResult {
            exit_code: status.code(),
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
            duration,
        };
        trace!(stdout = %result.stdout, stderr = %result.stderr, "captured output");
        Ok(result)
    }

    /// Like [`Invocation::run`], but a non-zero exit becomes [`RunError::NonZeroExit`].
    pub fn run_checked(&self, timeout: Option<Duration>) -> Result<RunResult, RunError> {
        let result = self.run(timeout)?;
        if result.success() {
            Ok(result)
        } else {
            Err(RunError::NonZeroExit {
                program: self.program_name(),
                code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

// Returns None once the limit is hit, after killing the child
fn wait_with_timeout(
    child: &mut Child,
    start: Instant,
    limit: Duration,
) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let elapsed = start.elapsed();
        if elapsed >= limit {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
