// src/extract/mod.rs

mod pdf;
mod spreadsheet;

use crate::document::{DocumentKind, RawDocument};
use crate::table::UnifiedTable;
use tracing::{error, info, warn};

/// Turn an uploaded document into one unified table.
///
/// Never fails: parse errors are logged and an empty table is returned, which
/// the caller reports as "could not extract tables".
pub fn extract_table(doc: &RawDocument) -> UnifiedTable {
    let span = tracing::info_span!("extract", file = %doc.name, kind = ?doc.kind);
    let _guard = span.enter();

    let result = match doc.kind {
        DocumentKind::Pdf => pdf::extract(&doc.bytes),
        DocumentKind::Spreadsheet => spreadsheet::extract(&doc.bytes),
    };

    match result {
        Ok(table) if table.is_empty() => {
            warn!("No tables found in document");
            table
        }
        Ok(table) => {
            info!(
                rows = table.len(),
                columns = table.columns().len(),
                "Extraction successful"
            );
            table
        }
        Err(e) => {
            error!(error = %e, "Extraction failed");
            UnifiedTable::new()
        }
    }
}
