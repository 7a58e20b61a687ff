//! Outbound adapter reading recap rows from `.xlsx` workbooks with `calamine`.
//!
//! Only the first worksheet is read. Its first row supplies the column names;
//! every later row becomes one [`RawRecapRow`] keyed by those names. Rows in
//! which every cell is empty are skipped.

use std::io::{self, BufReader};
use std::path::Path;

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use cap_std::{ambient_authority, fs::Dir};
use serde_json::{Number, Value};
use tracing::debug;

use crate::domain::ports::{RawRecapRow, RecapRowSource, RecapRowSourceError};

/// Largest float magnitude converted to an integer without losing precision.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Workbook-backed row source.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineRecapRowSource;

#[async_trait]
impl RecapRowSource for CalamineRecapRowSource {
    async fn read_rows(&self, path: &Path) -> Result<Vec<RawRecapRow>, RecapRowSourceError> {
        let mut workbook = open_workbook(path)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| RecapRowSourceError::decode("workbook has no worksheets"))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|err| RecapRowSourceError::decode(format!("sheet '{sheet}': {err}")))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let header: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_owned())
            .collect();

        let records: Vec<RawRecapRow> = rows
            .filter_map(|cells| to_record(&header, cells))
            .collect();
        debug!(
            path = %path.display(),
            sheet = %sheet,
            rows = records.len(),
            "read recap workbook"
        );
        Ok(records)
    }
}

fn open_workbook(path: &Path) -> Result<Xlsx<BufReader<std::fs::File>>, RecapRowSourceError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| RecapRowSourceError::read(format!("{} is not a file", path.display())))?;
    let directory =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| open_error(path, err))?;
    let file = directory
        .open(Path::new(file_name))
        .map_err(|err| open_error(path, err))?
        .into_std();
    Xlsx::new(BufReader::new(file)).map_err(|err| RecapRowSourceError::decode(err.to_string()))
}

fn open_error(path: &Path, error: io::Error) -> RecapRowSourceError {
    if error.kind() == io::ErrorKind::NotFound {
        RecapRowSourceError::not_found(path.display().to_string())
    } else {
        RecapRowSourceError::read(format!("{}: {error}", path.display()))
    }
}

/// Pair cells with their header names; `None` for a fully empty row.
fn to_record(header: &[String], cells: &[Data]) -> Option<RawRecapRow> {
    let mut record = RawRecapRow::new();
    let mut populated = false;
    for (name, cell) in header.iter().zip(cells) {
        if name.is_empty() {
            continue;
        }
        let value = cell_to_value(cell);
        populated |= !is_blank(&value);
        record.insert(name.clone(), value);
    }
    populated.then_some(record)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Convert a cell to its loosely typed JSON value.
///
/// Spreadsheets store every number as a float, so whole floats become
/// integers. Error cells read as empty and dates keep their rendered text.
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(text) if text.is_empty() => Value::Null,
        Data::String(text) => Value::String(text.clone()),
        Data::Int(value) => Value::from(*value),
        Data::Float(value) => float_value(*value),
        Data::Bool(value) => Value::Bool(*value),
        _ => Value::String(cell.to_string()),
    }
}

fn float_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use calamine::CellErrorType;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(Data::Empty, Value::Null)]
    #[case(Data::String(String::new()), Value::Null)]
    #[case(Data::String("Dewi".to_owned()), json!("Dewi"))]
    #[case(Data::Int(42), json!(42))]
    #[case(Data::Float(42.0), json!(42))]
    #[case(Data::Float(1250.75), json!(1250.75))]
    #[case(Data::Float(f64::NAN), Value::Null)]
    #[case(Data::Bool(true), json!(true))]
    #[case(Data::Error(CellErrorType::Div0), Value::Null)]
    fn cells_convert_to_json(#[case] cell: Data, #[case] expected: Value) {
        assert_eq!(cell_to_value(&cell), expected);
    }

    #[rstest]
    fn huge_whole_floats_stay_floats() {
        assert_eq!(cell_to_value(&Data::Float(1e20)), json!(1e20));
    }

    #[rstest]
    fn record_pairs_cells_with_header_names() {
        let header = vec!["user_id".to_owned(), String::new(), "user_name".to_owned()];
        let cells = [
            Data::Float(7.0),
            Data::String("ignored".to_owned()),
            Data::String("Rina".to_owned()),
        ];

        let record = to_record(&header, &cells).expect("populated row");

        assert_eq!(Value::Object(record), json!({"user_id": 7, "user_name": "Rina"}));
    }

    #[rstest]
    fn blank_rows_are_skipped() {
        let header = vec!["user_id".to_owned(), "user_name".to_owned()];
        let cells = [Data::Empty, Data::String("   ".to_owned())];

        assert_eq!(to_record(&header, &cells), None);
    }
}
