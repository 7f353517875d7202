//! Error types for matrix files and external process runs.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading, writing or multiplying matrices.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Filesystem access failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file holds no header line.
    #[error("'{path}' is empty, expected a 'rows cols' header")]
    MissingHeader { path: PathBuf },

    /// The header line is not two positive integers.
    #[error("'{path}': malformed header '{line}'")]
    BadHeader { path: PathBuf, line: String },

    /// A value token could not be parsed as a number.
    #[error("'{path}' line {line}: invalid value '{token}'")]
    BadValue {
        path: PathBuf,
        line: usize,
        token: String,
    },

    /// The body does not match the dimensions announced by the header.
    #[error("'{path}': expected {expected}, found {found}")]
    ShapeMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Operands cannot be multiplied.
    #[error("cannot multiply {left:?} by {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// The element count does not fit in memory addressing.
    #[error("a {rows}x{cols} matrix is too large")]
    TooLarge { rows: usize, cols: usize },
}

impl MatrixError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MatrixError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while building or invoking the external executables.
#[derive(Debug, Error)]
pub enum RunError {
    /// The program could not be started at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program was killed after exceeding its time limit.
    #[error("'{program}' timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// The program ran but reported failure.
    #[error("'{program}' exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Rebuilding the executable suite failed.
    #[error("build step '{step}' failed: {source}")]
    Build {
        step: String,
        #[source]
        source: Box<RunError>,
    },

    /// An input file the executable needs is not on disk.
    #[error("missing input file '{path}'")]
    MissingInput { path: PathBuf },

    /// The reference product could not be built from the operands.
    #[error("cannot prepare reference product: {0}")]
    Reference(#[from] MatrixError),

    /// Waiting on or reading from the child failed.
    #[error("process I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
