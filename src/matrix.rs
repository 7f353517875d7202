use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::MatrixError;

/// Upper bound (exclusive) of generated values.
const VALUE_RANGE: f64 = 10.0;
/// Largest two-decimal value below `VALUE_RANGE`.
const MAX_VALUE: f64 = 9.99;
/// Cap on the up-front allocation when reading, the body may be shorter than the header claims.
const MAX_PREALLOC: usize = 1 << 20;

/// Role of a matrix file within one benchmark size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Left operand.
    A,
    /// Right operand.
    B,
    /// Reference product `a * b`.
    C,
}

impl Role {
    pub fn letter(self) -> char {
        match self {
            Role::A => 'a',
            Role::B => 'b',
            Role::C => 'c',
        }
    }
}

/// Path of the `role` matrix for `size` inside `dir`, e.g. `matrix/a_64.txt`.
pub fn matrix_path(dir: &Path, role: Role, size: usize) -> PathBuf {
    dir.join(format!("{}_{}.txt", role.letter(), size))
}

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize) -> Result<Self, MatrixError> {
        Ok(Matrix {
            rows,
            cols,
            data: vec![0.0; element_count(rows, cols)?],
        })
    }

    /// Square matrix of values uniform in [0, 10), rounded to two decimals.
    pub fn random<R: Rng>(n: usize, rng: &mut R) -> Result<Self, MatrixError> {
        let data = (0..element_count(n, n)?)
            .map(|_| round2(rng.gen_range(0.0..VALUE_RANGE)))
            .collect();
        Ok(Matrix {
            rows: n,
            cols: n,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Reads a matrix written by [`Matrix::to_file`].
    ///
    /// The first non-blank line is the `rows cols` header; a leading `#` is
    /// tolerated so files written by numpy's `savetxt` load as well.
    pub fn from_file(path: &Path) -> Result<Self, MatrixError> {
        let file = File::open(path).map_err(|e| MatrixError::io(path, e))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines().enumerate();

        let (rows, cols) = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line.map_err(|e| MatrixError::io(path, e))?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    break parse_header(path, &line)?;
                }
                None => {
                    return Err(MatrixError::MissingHeader {
                        path: path.to_path_buf(),
                    })
                }
            }
        };

        let count = element_count(rows, cols)?;
        let mut data = Vec::with_capacity(count.min(MAX_PREALLOC));
        let mut seen_rows = 0;
        for (idx, line) in lines {
            let line = line.map_err(|e| MatrixError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let before = data.len();
            for token in line.split_whitespace() {
                let val = token.parse::<f64>().map_err(|_| MatrixError::BadValue {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    token: token.to_string(),
                })?;
                data.push(val);
            }
            let width = data.len() - before;
            if width != cols {
                return Err(MatrixError::ShapeMismatch {
                    path: path.to_path_buf(),
                    expected: format!("{cols} columns"),
                    found: format!("{width} on line {}", idx + 1),
                });
            }
            seen_rows += 1;
        }

        if seen_rows != rows {
            return Err(MatrixError::ShapeMismatch {
                path: path.to_path_buf(),
                expected: format!("{rows} rows"),
                found: format!("{seen_rows}"),
            });
        }

        Ok(Matrix { rows, cols, data })
    }

    /// Writes the `rows cols` header followed by one line per row, two decimals per value.
    pub fn to_file(&self, path: &Path) -> Result<(), MatrixError> {
        let file = File::create(path).map_err(|e| MatrixError::io(path, e))?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out)
            .and_then(|_| out.flush())
            .map_err(|e| MatrixError::io(path, e))
    }

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{} {}", self.rows, self.cols)?;
        for row in self.data.chunks(self.cols.max(1)).take(self.rows) {
            let line = row
                .iter()
                .map(|val| format!("{val:.2}"))
                .collect::<Vec<String>>()
                .join(" ");
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// Product `self * other` computed with `matrixmultiply::dgemm`.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols != other.rows {
            return Err(MatrixError::DimensionMismatch {
                left: (self.rows, self.cols),
                right: (other.rows, other.cols),
            });
        }

        let (m, k, n) = (self.rows, self.cols, other.cols);
        let mut result = Matrix::new(m, n)?;
        if m == 0 || n == 0 || k == 0 {
            return Ok(result);
        }

        // SAFETY: all three buffers are row-major with exactly m*k, k*n and
        // m*n elements, matching the dimensions and strides passed in.
        unsafe {
            matrixmultiply::dgemm(
                m, k, n,
                1.0,
                self.data.as_ptr(), k as isize, 1,
                other.data.as_ptr(), n as isize, 1,
                0.0,
                result.data.as_mut_ptr(), n as isize, 1,
            )
        }

        Ok(result)
    }
}

fn parse_header(path: &Path, line: &str) -> Result<(usize, usize), MatrixError> {
    let bad = || MatrixError::BadHeader {
        path: path.to_path_buf(),
        line: line.to_string(),
    };
    let trimmed = line.trim().trim_start_matches('#');
    let mut parts = trimmed.split_whitespace().map(str::parse::<usize>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(rows)), Some(Ok(cols)), None) if rows > 0 && cols > 0 => Ok((rows, cols)),
        _ => Err(bad()),
    }
}

fn element_count(rows: usize, cols: usize) -> Result<usize, MatrixError> {
    rows.checked_mul(cols)
        .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<f64>())
        .ok_or(MatrixError::TooLarge { rows, cols })
}

// Round to two decimals, staying below the exclusive upper bound
fn round2(val: f64) -> f64 {
    let rounded = (val * 100.0).round() / 100.0;
    if rounded >= VALUE_RANGE {
        MAX_VALUE
    } else {
        rounded
    }
}

/// Writes `a_N.txt`, `b_N.txt` and the reference product `c_N.txt` into the
/// configured matrix directory.
///
/// The product is computed from the operands as re-read from disk, so it
/// reflects exactly what the executables will load.
pub fn generate_operands<R: Rng>(
    size: usize,
    config: &Config,
    rng: &mut R,
) -> Result<(), MatrixError> {
    let dir = &config.matrix_dir;
    fs::create_dir_all(dir).map_err(|e| MatrixError::io(dir, e))?;

    for role in [Role::A, Role::B] {
        let path = matrix_path(dir, role, size);
        Matrix::random(size, rng)?.to_file(&path)?;
        debug!(path = %path.display(), "wrote operand matrix");
    }
    write_reference(dir, size)?;

    info!(size, dir = %dir.display(), "generated matrices");
    Ok(())
}

/// Reads `a_N.txt` and `b_N.txt` from `dir` and writes their product to
/// `c_N.txt`, returning the path written.
pub fn write_reference(dir: &Path, size: usize) -> Result<PathBuf, MatrixError> {
    let a = Matrix::from_file(&matrix_path(dir, Role::A, size))?;
    let b = Matrix::from_file(&matrix_path(dir, Role::B, size))?;
    let c = a.multiply(&b)?;
    let c_path = matrix_path(dir, Role::C, size);
    c.to_file(&c_path)?;
    debug!(path = %c_path.display(), rows = c.rows(), cols = c.cols(), "wrote reference product");
    Ok(c_path)
}
