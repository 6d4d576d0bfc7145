// src/extract/pdf.rs

use crate::error::{AppError, Result};
use crate::table::UnifiedTable;
use lopdf::Document;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info};

/// Glyphs whose baselines differ by less than this (in font sizes) share a line.
const LINE_TOLERANCE: f64 = 0.5;
/// A horizontal gap wider than this (in font sizes) starts a new cell...
const CELL_GAP: f64 = 1.0;
/// ...and one wider than this, but narrower than a cell gap, is a space.
const WORD_GAP: f64 = 0.1;
/// Rows further apart than this (in font sizes) belong to different tables.
const MAX_ROW_GAP: f64 = 3.0;

/// A grid needs at least this many cells per line...
const MIN_TABLE_COLUMNS: usize = 2;
/// ...and this many consecutive lines to count as a table.
const MIN_TABLE_ROWS: usize = 2;

type Grid = Vec<Vec<String>>;

/// Main entry point: takes raw PDF bytes and concatenates every table found.
pub fn extract(pdf_bytes: &[u8]) -> Result<UnifiedTable> {
    // --- Phase 1: structural load with lopdf ---
    let doc = Document::load_mem(pdf_bytes)?;

    if looks_like_scanned(&doc) {
        info!("PDF structural check: likely scanned / image-only, no tables to read");
        return Ok(UnifiedTable::new());
    }

    // --- Phase 2: glyph positions per page via pdf-extract ---
    let pages = collect_glyphs(&doc)?;

    // --- Phase 3: lines → grids → one table, page order ---
    let mut builder = TableBuilder::default();
    for (idx, glyphs) in pages.into_iter().enumerate() {
        let span = tracing::info_span!("page", page = idx + 1);
        let _guard = span.enter();

        let grids = detect_tables(&group_lines(glyphs));
        debug!(tables = grids.len(), "Detected tables on page");
        for grid in grids {
            builder.push(grid);
        }
    }

    if builder.tables_seen == 0 {
        info!("No grid-like tables found in PDF");
    }
    Ok(builder.finish())
}

/// Run the pdf-extract interpreter over every page, keeping glyph positions.
/// The interpreter panics on some malformed pages; that is reported as an error.
fn collect_glyphs(doc: &Document) -> Result<Vec<Vec<Glyph>>> {
    let mut collector = GlyphCollector::default();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc(doc, &mut collector)
    }));

    match outcome {
        Ok(Ok(())) => Ok(collector.pages),
        Ok(Err(e)) => Err(AppError::PdfText(e.to_string())),
        Err(_) => Err(AppError::PdfText("text interpreter panicked".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Glyph collection
// ---------------------------------------------------------------------------

/// One visible character in PDF user space (y grows upwards).
#[derive(Debug, Clone)]
struct Glyph {
    x: f64,
    y: f64,
    end: f64,
    size: f64,
    text: String,
}

#[derive(Debug, Default)]
struct GlyphCollector {
    pages: Vec<Vec<Glyph>>,
    current: Vec<Glyph>,
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.current.clear();
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.pages.push(std::mem::take(&mut self.current));
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        // Spaces only show up as gaps between the glyphs around them.
        if char.trim().is_empty() {
            return Ok(());
        }
        let scale = (trm.m11 * trm.m22 - trm.m12 * trm.m21).abs().sqrt();
        let size = (font_size * scale).max(1.0);
        self.current.push(Glyph {
            x: trm.m31,
            y: trm.m32,
            end: trm.m31 + width * size,
            size,
            text: char.to_string(),
        });
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// A visual line of text, split into cells at wide horizontal gaps.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    y: f64,
    size: f64,
    cells: Vec<String>,
}

/// Group glyphs into lines top to bottom, then into cells left to right.
fn group_lines(mut glyphs: Vec<Glyph>) -> Vec<Line> {
    glyphs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut bands: Vec<Vec<Glyph>> = Vec::new();
    for glyph in glyphs {
        let same_line = bands
            .last()
            .is_some_and(|band| (band[0].y - glyph.y).abs() <= LINE_TOLERANCE * band[0].size);
        match bands.last_mut() {
            Some(band) if same_line => band.push(glyph),
            _ => bands.push(vec![glyph]),
        }
    }

    bands.into_iter().map(split_band).collect()
}

fn split_band(mut band: Vec<Glyph>) -> Line {
    band.sort_by(|a, b| a.x.total_cmp(&b.x));
    let y = band[0].y;
    let size = band.iter().map(|g| g.size).fold(0.0, f64::max);

    let mut cells: Vec<String> = Vec::new();
    let mut prev_end: Option<f64> = None;
    for glyph in &band {
        let gap = prev_end.map_or(f64::INFINITY, |end| glyph.x - end);
        match cells.last_mut() {
            Some(cell) if gap <= CELL_GAP * size => {
                if gap > WORD_GAP * size {
                    cell.push(' ');
                }
                cell.push_str(&glyph.text);
            }
            _ => cells.push(glyph.text.clone()),
        }
        prev_end = Some(prev_end.map_or(glyph.end, |end| end.max(glyph.end)));
    }

    Line { y, size, cells }
}

/// Find grid-like blocks: maximal runs of vertically close lines that each
/// have at least two cells. Rows keep their own width; the table layer pads.
fn detect_tables(lines: &[Line]) -> Vec<Grid> {
    let mut tables = Vec::new();
    let mut current: Grid = Vec::new();
    let mut prev: Option<&Line> = None;

    for line in lines {
        let far_from_prev =
            prev.is_some_and(|p| p.y - line.y > MAX_ROW_GAP * p.size.max(line.size));
        if line.cells.len() < MIN_TABLE_COLUMNS || far_from_prev {
            flush_run(&mut current, &mut tables);
        }
        if line.cells.len() >= MIN_TABLE_COLUMNS {
            current.push(line.cells.clone());
            prev = Some(line);
        } else {
            prev = None;
        }
    }
    flush_run(&mut current, &mut tables);

    tables
}

fn flush_run(current: &mut Grid, tables: &mut Vec<Grid>) {
    if current.len() >= MIN_TABLE_ROWS {
        tables.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

// ---------------------------------------------------------------------------
// Concatenation
// ---------------------------------------------------------------------------

/// Concatenates page tables, reusing the previous header when a table starts
/// with it.
#[derive(Debug, Default)]
struct TableBuilder {
    table: UnifiedTable,
    last_header: Option<Vec<String>>,
    tables_seen: usize,
}

impl TableBuilder {
    fn push(&mut self, mut grid: Grid) {
        self.tables_seen += 1;
        let Some(first) = grid.first() else {
            return;
        };

        let starts_with_header = self.last_header.as_ref().is_none_or(|h| h == first);
        if starts_with_header {
            let header = grid.remove(0);
            self.table.append_positional(Some(header.as_slice()), grid);
            self.last_header = Some(header);
        } else {
            // Header text differs: the whole grid is data, aligned by position.
            debug!(rows = grid.len(), "Table header differs from previous, appending as data");
            self.table.append_positional(None, grid);
        }
    }

    fn finish(self) -> UnifiedTable {
        self.table
    }
}

/// Heuristic: inspect the PDF object tree for signs that every page
/// is just a single image with no text operators.
///
/// A page with XObject images but **no** Font resources is almost
/// certainly a scanned page.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only_pages = 0;

    for object_id in pages.values() {
        let Ok(page_dict) = doc.get_object(*object_id).and_then(|o| o.as_dict()) else {
            continue;
        };

        let resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_entries = |key: &[u8]| {
            resources
                .and_then(|res| res.get(key).ok())
                .and_then(|x| doc.dereference(x).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|d| !d.is_empty())
        };

        if has_entries(b"XObject") && !has_entries(b"Font") {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    ratio >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Object, Stream, dictionary};

    const COLUMN_X: [i64; 3] = [72, 250, 350];
    const FONT_SIZE: i64 = 12;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    /// Content stream drawing `rows` as a table, 20pt apart, in Courier 12.
    /// With `cell_per_block` every cell gets its own BT/ET, otherwise one per row.
    fn table_content(rows: &[Vec<&str>], cell_per_block: bool) -> Vec<u8> {
        let mut ops = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let y = 700 - 20 * i as i64;
            if cell_per_block {
                for (cell, x) in row.iter().zip(COLUMN_X) {
                    ops.push(Operation::new("BT", vec![]));
                    ops.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
                    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
                    ops.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
                    ops.push(Operation::new("ET", vec![]));
                }
            } else {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
                let mut last_x = 0;
                for (j, (cell, x)) in row.iter().zip(COLUMN_X).enumerate() {
                    let dy = if j == 0 { y } else { 0 };
                    ops.push(Operation::new("Td", vec![(x - last_x).into(), dy.into()]));
                    ops.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
                    last_x = x;
                }
                ops.push(Operation::new("ET", vec![]));
            }
        }
        Content { operations: ops }.encode().unwrap()
    }

    /// A PDF with one page per entry of `pages`.
    fn table_pdf(pages: &[Vec<Vec<&str>>], cell_per_block: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for rows in pages {
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), table_content(rows, cell_per_block)));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn statement() -> Vec<Vec<&'static str>> {
        vec![
            vec!["Item", "2023", "2022"],
            vec!["Revenue", "1,200", "1,000"],
            vec!["Profit", "300", "250"],
        ]
    }

    /// Glyphs for `text` in a 12pt monospace font starting at (x, y).
    fn glyphs(text: &str, x: f64, y: f64) -> Vec<Glyph> {
        let advance = 0.6 * 12.0;
        text.chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, c)| {
                let gx = x + advance * i as f64;
                Glyph {
                    x: gx,
                    y,
                    end: gx + advance,
                    size: 12.0,
                    text: c.to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(extract(b"this is not a pdf").is_err());
    }

    #[test]
    fn test_extract_table_one_block_per_row() {
        let t = extract(&table_pdf(&[statement()], false)).unwrap();
        assert_eq!(t.columns(), &s(&["Item", "2023", "2022"])[..]);
        assert_eq!(
            t.rows(),
            &[s(&["Revenue", "1,200", "1,000"]), s(&["Profit", "300", "250"])][..]
        );
    }

    #[test]
    fn test_extract_table_one_block_per_cell() {
        let t = extract(&table_pdf(&[statement()], true)).unwrap();
        assert_eq!(t.columns(), &s(&["Item", "2023", "2022"])[..]);
        assert_eq!(
            t.rows(),
            &[s(&["Revenue", "1,200", "1,000"]), s(&["Profit", "300", "250"])][..]
        );
    }

    #[test]
    fn test_extract_reuses_header_across_pages() {
        let page2 = vec![
            vec!["Item", "2023", "2022"],
            vec!["Cash Flow", "(50)", "20"],
            vec!["Equity", "400", "390"],
        ];
        let t = extract(&table_pdf(&[statement(), page2], true)).unwrap();

        assert_eq!(t.columns(), &s(&["Item", "2023", "2022"])[..]);
        assert_eq!(t.len(), 4);
        assert_eq!(t.rows()[2], s(&["Cash Flow", "(50)", "20"]));
        assert_eq!(t.rows()[3], s(&["Equity", "400", "390"]));
    }

    #[test]
    fn test_extract_page_without_table() {
        let prose = vec![vec!["Annual report"]];
        let t = extract(&table_pdf(&[prose], true)).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn test_group_lines_splits_cells_and_words() {
        let mut all = glyphs("Cash Flow", 72.0, 700.0);
        all.extend(glyphs("(50)", 250.0, 700.0));
        // Slightly lower baseline still belongs to the same line.
        all.extend(glyphs("20", 350.0, 699.0));
        all.extend(glyphs("Equity", 72.0, 680.0));

        let lines = group_lines(all);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].cells, s(&["Cash Flow", "(50)", "20"]));
        assert_eq!(lines[1].cells, s(&["Equity"]));
    }

    #[test]
    fn test_detect_tables_splits_on_prose_and_distance() {
        let mut all = Vec::new();
        all.extend(glyphs("Item", 72.0, 700.0));
        all.extend(glyphs("2023", 250.0, 700.0));
        all.extend(glyphs("Revenue", 72.0, 680.0));
        all.extend(glyphs("1,200", 250.0, 680.0));
        all.extend(glyphs("Management commentary follows.", 72.0, 660.0));
        all.extend(glyphs("Assets", 72.0, 640.0));
        all.extend(glyphs("900", 250.0, 640.0));
        all.extend(glyphs("Equity", 72.0, 620.0));
        all.extend(glyphs("400", 250.0, 620.0));
        // Far below: a separate block, too short to be a table.
        all.extend(glyphs("Liabilities", 72.0, 300.0));
        all.extend(glyphs("500", 250.0, 300.0));

        let tables = detect_tables(&group_lines(all));
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], vec![s(&["Item", "2023"]), s(&["Revenue", "1,200"])]);
        assert_eq!(tables[1], vec![s(&["Assets", "900"]), s(&["Equity", "400"])]);
    }

    #[test]
    fn test_builder_reuses_matching_header() {
        let mut b = TableBuilder::default();
        b.push(vec![s(&["Item", "2023"]), s(&["Revenue", "100"])]);
        b.push(vec![s(&["Item", "2023"]), s(&["Profit", "20"])]);
        let t = b.finish();

        assert_eq!(t.columns(), &s(&["Item", "2023"])[..]);
        assert_eq!(t.rows(), &[s(&["Revenue", "100"]), s(&["Profit", "20"])][..]);
    }

    #[test]
    fn test_builder_keeps_mismatched_header_as_data() {
        let mut b = TableBuilder::default();
        b.push(vec![s(&["Item", "2023"]), s(&["Revenue", "100"])]);
        b.push(vec![s(&["Line", "FY23"]), s(&["Profit", "20"])]);
        b.push(vec![s(&["Item", "2023"]), s(&["Assets", "7"])]);
        let t = b.finish();

        assert_eq!(t.columns(), &s(&["Item", "2023"])[..]);
        assert_eq!(
            t.rows(),
            &[
                s(&["Revenue", "100"]),
                s(&["Line", "FY23"]),
                s(&["Profit", "20"]),
                s(&["Assets", "7"]),
            ][..]
        );
    }

    #[test]
    fn test_builder_counts_tables() {
        let mut b = TableBuilder::default();
        assert_eq!(b.tables_seen, 0);
        b.push(vec![s(&["Item", "2023"]), s(&["Revenue", "100"])]);
        b.push(Vec::new());
        assert_eq!(b.tables_seen, 2);
        assert_eq!(b.finish().len(), 1);
    }
}
