//! The `.zsff` binary matrix format.
//!
//! Layout, all integers little-endian:
//!
//! | offset | size | field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | magic `ZSFF`                   |
//! | 4      | 2    | version, currently 1           |
//! | 6      | 2    | reserved, written as 0         |
//! | 8      | 4    | rows                           |
//! | 12     | 4    | cols                           |
//! | 16     | 8·n  | rows·cols `f64`, row-major     |
//!
//! A file must be exactly `16 + 8·rows·cols` bytes long.

use std::path::Path;

use zsheet_engine::engine::Matrix;

use crate::error::{Result, ZsheetError};

pub const MAGIC: &[u8; 4] = b"ZSFF";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 16;
/// Largest matrix accepted on either side of the codec.
pub const MAX_CELLS: usize = 16_777_216;

fn too_large(message: String) -> ZsheetError {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, message).into()
}

pub fn encode(matrix: &Matrix) -> Result<Vec<u8>> {
    let (rows, cols) = matrix.dimensions();
    let (Ok(rows32), Ok(cols32)) = (u32::try_from(rows), u32::try_from(cols)) else {
        return Err(too_large(format!("{rows}x{cols} matrix does not fit the zsff header")));
    };
    if matrix.len() > MAX_CELLS {
        return Err(too_large(format!("{rows}x{cols} matrix exceeds {MAX_CELLS} cells")));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + matrix.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&rows32.to_le_bytes());
    out.extend_from_slice(&cols32.to_le_bytes());
    for v in matrix.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode a complete file image. `path` is used for error context only.
pub fn decode(bytes: &[u8], path: &Path) -> Result<Matrix> {
    if bytes.len() < HEADER_LEN {
        return Err(ZsheetError::format(
            path,
            format!("truncated header ({} bytes)", bytes.len()),
        ));
    }
    if &bytes[0..4] != MAGIC {
        return Err(ZsheetError::format(path, "bad magic, not a zsff file"));
    }
    let version = read_u16(bytes, 4);
    if version != VERSION {
        return Err(ZsheetError::format(
            path,
            format!("unsupported version {version}"),
        ));
    }

    let rows = read_u32(bytes, 8) as usize;
    let cols = read_u32(bytes, 12) as usize;
    let cells = match rows.checked_mul(cols) {
        Some(n) if n <= MAX_CELLS => n,
        _ => {
            return Err(ZsheetError::format(
                path,
                format!("{rows}x{cols} exceeds {MAX_CELLS} cells"),
            ));
        }
    };

    let expected = HEADER_LEN + cells * 8;
    if bytes.len() != expected {
        return Err(ZsheetError::format(
            path,
            format!(
                "payload length mismatch: expected {expected} bytes, found {}",
                bytes.len()
            ),
        ));
    }

    let data: Vec<f64> = bytes[HEADER_LEN..]
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect();

    Matrix::from_vec(rows, cols, data)
        .ok_or_else(|| ZsheetError::format(path, "inconsistent dimensions"))
}
