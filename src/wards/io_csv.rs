// Primitives for reading CSV files.

use std::io::Read;

use log::{debug, info};
use snafu::prelude::*;

use ward_scoring::builder::dataset_from_rows;
use ward_scoring::Dataset;

use crate::wards::*;

pub fn read_csv_dataset(path: &str, code_field: &str) -> WardsResult<Dataset> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let rows = collect_rows(rdr)?;
    info!("read_csv_dataset: {} rows in {:?}", rows.len(), path);
    dataset_from_rows(code_field, &rows).context(InvalidTableSnafu {})
}

/// Reads a table from any source. The first row is the header.
pub fn read_csv_table<R: Read>(input: R, code_field: &str) -> WardsResult<Dataset> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let rows = collect_rows(rdr)?;
    dataset_from_rows(code_field, &rows).context(InvalidTableSnafu {})
}

fn collect_rows<R: Read>(rdr: csv::Reader<R>) -> WardsResult<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        // Skip blank lines, typically at the end of the file.
        if line.iter().all(|c| c.trim().is_empty()) {
            debug!("collect_rows: skipping blank line {}", lineno);
            continue;
        }
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_table() {
        let text = "Ward Code,Ward Name,Population,Note\n\
                    E05000026,Abbey,12904,\n\
                    E05000027,\"Alibon, East\",10468,n/a\n";
        let ds = read_csv_table(text.as_bytes(), "Ward Code").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[1].text("Ward Name"), Some("Alibon, East"));
        assert_eq!(ds.records[0].number("Population"), 12904.0);
        assert_eq!(ds.records[1].text("Note"), Some("n/a"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = "Code,Pop\nA,1\n,\nB,2\n";
        let ds = read_csv_table(text.as_bytes(), "Code").unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn missing_code_column() {
        let text = "Name,Pop\nA,1\n";
        let err = read_csv_table(text.as_bytes(), "Ward Code").unwrap_err();
        assert!(matches!(err, WardsError::InvalidTable { .. }));
    }

    #[test]
    fn duplicate_codes() {
        let text = "Code,Pop\nA,1\nA,2\n";
        assert!(read_csv_table(text.as_bytes(), "Code").is_err());
    }
}
