pub use crate::config::*;

use std::collections::HashSet;

use log::{debug, warn};

/// A builder for assembling a dataset out of tabular rows.
///
/// This is the entry point for the table readers: the first row names the fields,
/// every following row describes one region.
///
/// ```
/// pub use ward_scoring::builder::DatasetBuilder;
/// # use ward_scoring::ScoringError;
///
/// let mut builder = DatasetBuilder::new("Ward Code", &["Ward Code".to_string(), "Pop".to_string()])?;
///
/// builder.add_row(&["E05000026".to_string(), "1250".to_string()])?;
/// builder.add_row(&["E05000027".to_string(), "n/a".to_string()])?;
///
/// let dataset = builder.build();
/// assert_eq!(dataset.len(), 2);
/// assert_eq!(dataset.records[0].number("Pop"), 1250.0);
/// assert_eq!(dataset.records[1].number("Pop"), 0.0);
///
/// # Ok::<(), ScoringError>(())
/// ```
pub struct DatasetBuilder {
    pub(crate) _code_field: String,
    pub(crate) _header: Vec<String>,
    pub(crate) _code_index: usize,
    pub(crate) _seen: HashSet<String>,
    pub(crate) _records: Vec<RegionRecord>,
}

impl DatasetBuilder {
    pub fn new(code_field: &str, header: &[String]) -> Result<DatasetBuilder, ScoringError> {
        let code_index = header
            .iter()
            .position(|h| h == code_field)
            .ok_or_else(|| ScoringError::MissingCodeColumn(code_field.to_string()))?;
        debug!(
            "DatasetBuilder::new: {} columns, code column {}",
            header.len(),
            code_index
        );
        Ok(DatasetBuilder {
            _code_field: code_field.to_string(),
            _header: header.to_vec(),
            _code_index: code_index,
            _seen: HashSet::new(),
            _records: Vec::new(),
        })
    }

    /// Adds a row of raw cells. Numeric-looking cells become numbers, except the
    /// region code which is kept as written.
    ///
    /// Short rows are padded with empty cells, extra cells are dropped.
    pub fn add_row(&mut self, cells: &[String]) -> Result<(), ScoringError> {
        let values: Vec<FieldValue> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == self._code_index {
                    FieldValue::Text(c.trim().to_string())
                } else {
                    parse_cell(c)
                }
            })
            .collect();
        self.add_values(values)
    }

    /// Adds a row of already typed cells.
    pub fn add_values(&mut self, mut values: Vec<FieldValue>) -> Result<(), ScoringError> {
        let row = self._records.len() + 1;
        if values.len() > self._header.len() {
            warn!(
                "add_values: row {}: dropping {} extra cells",
                row,
                values.len() - self._header.len()
            );
            values.truncate(self._header.len());
        }
        while values.len() < self._header.len() {
            values.push(FieldValue::Text(String::new()));
        }

        // Region codes are identifiers, even when they look like numbers.
        let code = match &values[self._code_index] {
            FieldValue::Text(s) if s.trim().is_empty() => {
                return Err(ScoringError::MissingRegionCode { row });
            }
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Number(x) => x.to_string(),
        };
        if !self._seen.insert(code.clone()) {
            return Err(ScoringError::DuplicateRegion(code));
        }
        values[self._code_index] = FieldValue::Text(code);

        let record: RegionRecord = self._header.iter().cloned().zip(values).collect();
        self._records.push(record);
        Ok(())
    }

    pub fn build(self) -> Dataset {
        Dataset {
            code_field: self._code_field,
            records: self._records,
        }
    }
}

/// Assembles a dataset from a table whose first row is the header.
pub fn dataset_from_rows(code_field: &str, rows: &[Vec<String>]) -> Result<Dataset, ScoringError> {
    let (header, body) = match rows.split_first() {
        Some(x) => x,
        None => return Ok(Dataset::new(code_field, Vec::new())),
    };
    let mut builder = DatasetBuilder::new(code_field, header)?;
    for row in body {
        builder.add_row(row)?;
    }
    Ok(builder.build())
}

fn parse_cell(cell: &str) -> FieldValue {
    let trimmed = cell.trim();
    match trimmed.parse::<f64>() {
        Ok(x) if !trimmed.is_empty() && x.is_finite() => FieldValue::Number(x),
        _ => FieldValue::Text(cell.to_string()),
    }
}
