//! Helpers shared by unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::matrix::{matrix_path, Matrix, Role};

/// Writes an executable `/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Writes a, b and c files for `size` into `dir`.
pub fn write_operands(dir: &Path, size: usize) {
    write_matrices(dir, size, &[Role::A, Role::B, Role::C]);
}

/// Writes zero-filled `size` x `size` matrices for the given roles into `dir`.
pub fn write_matrices(dir: &Path, size: usize, roles: &[Role]) {
    fs::create_dir_all(dir).unwrap();
    let m = Matrix::new(size, size).unwrap();
    for &role in roles {
        m.to_file(&matrix_path(dir, role, size)).unwrap();
    }
}
