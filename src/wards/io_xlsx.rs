use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, info};
use snafu::prelude::*;

use ward_scoring::builder::DatasetBuilder;
use ward_scoring::{Dataset, FieldValue};

use crate::wards::*;

pub fn read_excel_dataset(
    path: &str,
    worksheet_name: Option<&str>,
    code_field: &str,
) -> WardsResult<Dataset> {
    let wrange = get_range(path, worksheet_name)?;
    info!(
        "read_excel_dataset: {:?}: {} rows",
        path,
        wrange.height()
    );
    dataset_from_range(&wrange, code_field)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> WardsResult<Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    // A worksheet name was provided, use it. Otherwise take the first one.
    let wrange = match worksheet_name {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    wrange
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })
}

pub fn dataset_from_range(wrange: &Range<DataType>, code_field: &str) -> WardsResult<Dataset> {
    let mut rows = wrange.rows();
    let header: Vec<String> = match rows.next() {
        Some(h) => h.iter().map(cell_label).collect(),
        None => return Ok(Dataset::new(code_field, Vec::new())),
    };
    debug!("dataset_from_range: header: {:?}", header);
    let mut builder = DatasetBuilder::new(code_field, &header).context(InvalidTableSnafu {})?;
    for row in rows {
        if row.iter().all(|c| matches!(c, DataType::Empty)) {
            continue;
        }
        let values: Vec<FieldValue> = row.iter().map(cell_value).collect();
        builder.add_values(values).context(InvalidTableSnafu {})?;
    }
    Ok(builder.build())
}

fn cell_label(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => String::new(),
        x => x.to_string(),
    }
}

fn cell_value(cell: &DataType) -> FieldValue {
    match cell {
        DataType::Float(f) => FieldValue::Number(*f),
        DataType::Int(i) => FieldValue::Number(*i as f64),
        DataType::String(s) => FieldValue::Text(s.clone()),
        DataType::Empty => FieldValue::Text(String::new()),
        x => FieldValue::Text(x.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(cells: &[&[DataType]]) -> Range<DataType> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    #[test]
    fn typed_cells() {
        let range = sheet(&[
            &[s("Ward Code"), s("Population"), s("Median age")],
            &[s("E05000026"), DataType::Float(12904.0), DataType::Int(31)],
            &[s("E05000027"), s("unknown"), DataType::Empty],
        ]);
        let ds = dataset_from_range(&range, "Ward Code").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].number("Population"), 12904.0);
        assert_eq!(ds.records[0].number("Median age"), 31.0);
        assert_eq!(ds.records[1].number("Population"), 0.0);
        assert_eq!(ds.code_of(&ds.records[1]), Some("E05000027"));
    }

    #[test]
    fn empty_rows_are_skipped() {
        let range = sheet(&[
            &[s("Code"), s("Pop")],
            &[s("A"), DataType::Float(1.0)],
            &[DataType::Empty, DataType::Empty],
        ]);
        let ds = dataset_from_range(&range, "Code").unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn numeric_codes_are_identifiers() {
        let range = sheet(&[&[s("Code"), s("Pop")], &[DataType::Int(7), DataType::Float(2.0)]]);
        let ds = dataset_from_range(&range, "Code").unwrap();
        assert_eq!(ds.code_of(&ds.records[0]), Some("7"));
    }
}
