//! Sample ingestion (spec §4.12, ground: `original_source/include/csvloader.h`).
//! Rows are comma-separated decimals; the final column is the target `y`,
//! the preceding columns are `x0..x_{n-1}`. The first non-blank row fixes
//! `num_vars`; every later row must match its column count exactly.

use crate::Scalar;
use crate::error::CsvError;
use std::path::Path;

const ALLOWED_CHARS: &str = "0123456789.+-eE";

pub struct Samples {
    pub num_vars: usize,
    pub rows: Vec<(Vec<Scalar>, Scalar)>,
}

fn validate_field(row: usize, field: &str) -> Result<(), CsvError> {
    if field.is_empty() || !field.chars().all(|c| ALLOWED_CHARS.contains(c)) {
        return Err(CsvError::InvalidCharacter {
            row,
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Load and validate a CSV file of samples. A missing file, an empty file,
/// a ragged row, or a non-numeric field is a Data error and aborts the
/// load entirely (spec §7 item 2).
pub fn load_samples(path: &Path) -> Result<Samples, CsvError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| CsvError::Unreadable(path.to_path_buf(), e))?;

    let mut num_vars = None;
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let expected = *num_vars.get_or_insert(fields.len());
        if fields.len() != expected {
            return Err(CsvError::RaggedRow {
                row: line_no,
                found: fields.len(),
                expected,
            });
        }
        let mut values = Vec::with_capacity(fields.len());
        for field in &fields {
            validate_field(line_no, field)?;
            let v: Scalar = field.parse().map_err(|_| CsvError::NotANumber {
                row: line_no,
                field: field.to_string(),
            })?;
            values.push(v);
        }
        let target = values.pop().expect("row has at least one field");
        rows.push((values, target));
    }

    if rows.is_empty() {
        return Err(CsvError::Empty(path.to_path_buf()));
    }

    Ok(Samples {
        num_vars: num_vars.unwrap() - 1,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("symreg-csv-test-{}-{n}.csv", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_a_well_formed_csv() {
        let path = write_temp("1.0, 2.0\n3.0, 4.0\n");
        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.num_vars, 1);
        assert_eq!(samples.rows.len(), 2);
        assert_eq!(samples.rows[0], (vec![1.0], 2.0));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn skips_blank_lines() {
        let path = write_temp("1.0,2.0\n\n3.0,4.0\n");
        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.rows.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_a_ragged_row() {
        let path = write_temp("1.0,2.0,3.0\n4.0,5.0\n");
        assert!(matches!(load_samples(&path), Err(CsvError::RaggedRow { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_a_non_numeric_field() {
        let path = write_temp("1.0,abc\n");
        assert!(load_samples(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_an_empty_file() {
        let path = write_temp("");
        assert!(matches!(load_samples(&path), Err(CsvError::Empty(_))));
        std::fs::remove_file(&path).ok();
    }
}
