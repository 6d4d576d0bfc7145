// src/table.rs

/// All tables/sheets of one document, concatenated into a single grid.
///
/// Every row holds exactly one cell per column; cells a sub-table did not
/// provide are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Name used for header cells that are blank.
pub fn unnamed_column(idx: usize) -> String {
    format!("Unnamed: {idx}")
}

impl UnifiedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a header and data rows in one go.
    #[cfg(test)]
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self::new();
        table.append_named(&header, rows);
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn add_column(&mut self, name: String) -> usize {
        self.columns.push(name);
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Append rows aligned by position. Columns are created for any index past
    /// the current width: from `header` when given, else named by index.
    pub fn append_positional(&mut self, header: Option<&[String]>, rows: Vec<Vec<String>>) {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(header.map(<[String]>::len))
            .max()
            .unwrap_or(0);

        while self.columns.len() < width {
            let idx = self.columns.len();
            let name = match header.and_then(|h| h.get(idx)) {
                Some(h) if !h.trim().is_empty() => h.clone(),
                Some(_) => unnamed_column(idx),
                None => idx.to_string(),
            };
            self.add_column(name);
        }

        for mut row in rows {
            row.resize(self.columns.len(), String::new());
            self.rows.push(row);
        }
    }

    /// Append rows aligned by header name. Unseen names extend the column set.
    pub fn append_named(&mut self, header: &[String], rows: Vec<Vec<String>>) {
        let mut slots = Vec::with_capacity(header.len());
        for (i, name) in header.iter().enumerate() {
            let name = if name.trim().is_empty() {
                unnamed_column(i)
            } else {
                name.clone()
            };
            // Duplicate header names within one sub-table get their own column.
            let existing = self
                .columns
                .iter()
                .enumerate()
                .position(|(c, n)| *n == name && !slots.contains(&c));
            let slot = match existing {
                Some(c) => c,
                None => self.add_column(name),
            };
            slots.push(slot);
        }

        for row in rows {
            let mut out = vec![String::new(); self.columns.len()];
            for (cell, &slot) in row.into_iter().zip(&slots) {
                out[slot] = cell;
            }
            self.rows.push(out);
        }
    }
}
