//! CSV import and export of numeric matrices.

use std::io::Write;
use std::path::Path;

use zsheet_engine::engine::Matrix;

use crate::error::{Result, ZsheetError};
use crate::storage::zsff::MAX_CELLS;

/// A parsed CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvImport {
    pub matrix: Matrix,
    /// Non-empty fields that were not finite numbers and became 0.0.
    pub coerced: usize,
}

/// Read a CSV file into a matrix.
pub fn parse_csv(path: &Path) -> Result<CsvImport> {
    let bytes = std::fs::read(path)?;
    let content =
        String::from_utf8(bytes).map_err(|_| ZsheetError::format(path, "not valid UTF-8 text"))?;
    parse_csv_content(&content, path)
}

/// Parse CSV text. Blank lines are skipped, short rows are padded with 0.0
/// and any field that is not a finite number becomes 0.0. The padded shape
/// may not exceed [`MAX_CELLS`]. `path` is only used for error context.
pub fn parse_csv_content(content: &str, path: &Path) -> Result<CsvImport> {
    let mut rows = Vec::new();
    let mut width = 0usize;
    let mut coerced = 0;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<f64> = parse_csv_line(line)
            .iter()
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    return 0.0;
                }
                match field.parse::<f64>() {
                    Ok(n) if n.is_finite() => n,
                    _ => {
                        coerced += 1;
                        0.0
                    }
                }
            })
            .collect();
        width = width.max(row.len());
        rows.push(row);
        match rows.len().checked_mul(width) {
            Some(cells) if cells <= MAX_CELLS => {}
            _ => {
                return Err(ZsheetError::format(
                    path,
                    format!("{}x{width} exceeds {MAX_CELLS} cells", rows.len()),
                ));
            }
        }
    }

    if rows.is_empty() {
        return Err(ZsheetError::format(path, "no data rows"));
    }

    Ok(CsvImport {
        matrix: Matrix::from_rows(rows),
        coerced,
    })
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (in_quotes, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            (true, '"') => in_quotes = false,
            (false, '"') => in_quotes = true,
            (false, ',') => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Write every row of `matrix` as comma-separated numbers.
pub fn write_csv(path: &Path, matrix: &Matrix) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for r in 0..matrix.rows() {
        let row = matrix.row(r).unwrap_or_default();
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", fields.join(","))?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<CsvImport> {
        parse_csv_content(content, Path::new("test.csv"))
    }

    #[test]
    fn test_parse_csv_line_simple() {
        assert_eq!(parse_csv_line("1,2,3"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_parse_csv_line_quoted() {
        assert_eq!(
            parse_csv_line(r#"1,"2,5",3"#),
            vec!["1", "2,5", "3"]
        );
        assert_eq!(parse_csv_line(r#""a""b",c"#), vec![r#"a"b"#, "c"]);
    }

    #[test]
    fn test_parse_csv_line_trailing_comma() {
        assert_eq!(parse_csv_line("1,2,"), vec!["1", "2", ""]);
    }

    #[test]
    fn test_import_shape_and_padding() {
        let import = parse("1,2,3\n4\n\n5,6\n").unwrap();
        assert_eq!(import.matrix.dimensions(), (3, 3));
        assert_eq!(
            import.matrix.as_slice(),
            &[1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 5.0, 6.0, 0.0]
        );
        assert_eq!(import.coerced, 0);
    }

    #[test]
    fn test_import_coerces_non_numeric() {
        let import = parse("1,x,3\n\"4\",NaN, 6 \n").unwrap();
        assert_eq!(import.matrix.as_slice(), &[1.0, 0.0, 3.0, 4.0, 0.0, 6.0]);
        assert_eq!(import.coerced, 2);
    }

    #[test]
    fn test_import_crlf() {
        let import = parse("1,2\r\n3,4\r\n").unwrap();
        assert_eq!(import.matrix.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_import_without_rows_is_format_error() {
        assert!(matches!(parse(""), Err(ZsheetError::Format { .. })));
        assert!(matches!(parse("\n  \n"), Err(ZsheetError::Format { .. })));
    }

    #[test]
    fn test_import_over_cell_cap_is_format_error() {
        let mut content = "0\n".repeat(2000);
        content.push_str(&",".repeat(9999));
        content.push('\n');
        let err = parse(&content).unwrap_err();
        assert!(matches!(err, ZsheetError::Format { .. }));
        assert!(err.to_string().contains("exceeds 16777216 cells"), "{err}");
    }

    #[test]
    fn test_non_utf8_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.csv");
        std::fs::write(&path, [0xff, 0xfe, b'1', b'\n']).unwrap();
        let err = parse_csv(&path).unwrap_err();
        assert!(matches!(err, ZsheetError::Format { .. }));
        assert!(err.to_string().contains("UTF-8"), "{err}");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let m = Matrix::from_rows(vec![vec![1.5, -2.0], vec![0.1, 1e20]]);
        write_csv(&path, &m).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("1.5,-2"));
        assert_eq!(parse_csv(&path).unwrap().matrix, m);
    }
}
