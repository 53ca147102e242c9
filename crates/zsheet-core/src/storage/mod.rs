//! Storage for `.zsff` binary files and CSV import/export.
//!
//! [`save`] always writes `.zsff`. [`load`] picks the decoder by extension:
//! `.zsff` (any case) is binary, everything else is read as CSV.

mod csv;
pub mod zsff;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zsheet_engine::engine::Matrix;

use crate::error::Result;

pub use csv::{CsvImport, parse_csv, parse_csv_content, write_csv};

/// What [`save`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the file as it sits on disk.
    pub digest: String,
}

impl SaveReport {
    /// First 16 hex characters of the digest, for log lines.
    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(16)]
    }
}

/// A loaded matrix with non-finite entries already replaced by 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub matrix: Matrix,
    /// Entries replaced by 0.0, from CSV coercion or non-finite floats.
    pub sanitized: usize,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn is_zsff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zsff"))
}

/// Sibling temp file used so a crash mid-write never truncates `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `matrix` as `.zsff`, replacing `path` atomically, and hash the result.
pub fn save(matrix: &Matrix, path: &Path) -> Result<SaveReport> {
    let bytes = zsff::encode(matrix)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let written = std::fs::write(&tmp, &bytes).and_then(|_| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }

    let on_disk = std::fs::read(path)?;
    let report = SaveReport {
        path: path.to_path_buf(),
        bytes: on_disk.len() as u64,
        digest: digest_hex(&on_disk),
    };
    tracing::debug!(path = %path.display(), bytes = report.bytes, digest = %report.short_digest(), "saved");
    Ok(report)
}

/// Read a matrix from `.zsff` or CSV, sanitizing non-finite values.
pub fn load_report(path: &Path) -> Result<LoadReport> {
    let (mut matrix, coerced) = if is_zsff(path) {
        let bytes = std::fs::read(path)?;
        (zsff::decode(&bytes, path)?, 0)
    } else {
        let import = parse_csv(path)?;
        (import.matrix, import.coerced)
    };
    let sanitized = coerced + matrix.sanitize();
    tracing::debug!(path = %path.display(), rows = matrix.rows(), cols = matrix.cols(), sanitized, "loaded");
    Ok(LoadReport { matrix, sanitized })
}

pub fn load(path: &Path) -> Result<Matrix> {
    load_report(path).map(|r| r.matrix)
}
