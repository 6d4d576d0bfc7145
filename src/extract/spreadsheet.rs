// src/extract/spreadsheet.rs

use crate::error::Result;
use crate::table::UnifiedTable;
use calamine::{Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::{debug, info};

/// Read every sheet in declaration order. The first non-blank row of a sheet
/// is its header; sheets are joined by header name.
pub fn extract(bytes: &[u8]) -> Result<UnifiedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let mut table = UnifiedTable::new();

    let sheet_names = workbook.sheet_names();
    info!(sheets = sheet_names.len(), "Opened workbook");

    for sheet in &sheet_names {
        let range = workbook.worksheet_range(sheet)?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        let Some((header, data)) = split_header(rows) else {
            debug!(sheet = %sheet, "Sheet is empty, skipping");
            continue;
        };

        debug!(sheet = %sheet, rows = data.len(), "Parsed sheet");
        table.append_named(&header, data);
    }

    Ok(table)
}

/// Drop blank rows, then peel off the first remaining row as the header.
fn split_header(rows: Vec<Vec<String>>) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut rows = rows
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()));
    let header = rows.next()?;
    let header = header.into_iter().map(|h| h.trim().to_string()).collect();
    Some((header, rows.collect()))
}
