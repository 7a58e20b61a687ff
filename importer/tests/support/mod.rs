//! Shared helpers for integration tests: real `.xlsx` workbooks on disk.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, XlsxError};

/// One cell of a test worksheet.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Header row used by recap exports.
pub const RECAP_HEADER: [&str; 16] = [
    "user_id",
    "user_name",
    "trx_count",
    "variant_count",
    "total_point",
    "total_point_description",
    "total_point_possible_redeem",
    "total_point_image",
    "delivery_count",
    "pickup_count",
    "cheaper_subs_desc",
    "cheaper_subs_amount",
    "top_ranking",
    "list_circular_images",
    "listProductFavorite",
    "listFavoriteStore",
];

/// Full recap row matching [`RECAP_HEADER`].
pub fn recap_cells(user_id: Cell, user_name: &str, products_json: &str) -> Vec<Cell> {
    vec![
        user_id,
        user_name.into(),
        12.0.into(),
        3.0.into(),
        Cell::Blank,
        "Gold member".into(),
        Cell::Blank,
        Cell::Blank,
        4.0.into(),
        8.0.into(),
        Cell::Blank,
        12_500.5.into(),
        7.0.into(),
        r#"["circle-1.png"]"#.into(),
        if products_json.is_empty() {
            Cell::Blank
        } else {
            products_json.into()
        },
        r#"[{"storeName": "Kemang", "transactionCount": 6}]"#.into(),
    ]
}

/// Write `rows` under `header` to `dir/name` and return the file path.
///
/// `None` rows are left empty in the sheet.
pub fn write_workbook(
    dir: &Path,
    name: &str,
    header: &[&str],
    rows: &[Option<Vec<Cell>>],
) -> Result<PathBuf, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in (0_u16..).zip(header) {
        sheet.write_string(0, col, *title)?;
    }
    for (row_index, row) in (1_u32..).zip(rows) {
        let Some(cells) = row else { continue };
        for (col, cell) in (0_u16..).zip(cells) {
            match cell {
                Cell::Text(text) => {
                    sheet.write_string(row_index, col, text.as_str())?;
                }
                Cell::Number(number) => {
                    sheet.write_number(row_index, col, *number)?;
                }
                Cell::Blank => {}
            }
        }
    }
    let path = dir.join(name);
    workbook.save(&path)?;
    Ok(path)
}
