// src/document.rs

use crate::error::{AppError, Result};
use std::path::Path;

/// Which extraction path a document goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Spreadsheet,
}

impl DocumentKind {
    /// Classify by file extension. Only pdf, xls and xlsx are accepted.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "xls" | "xlsx" => Ok(Self::Spreadsheet),
            _ => Err(AppError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// An uploaded file, alive only for one extraction pass.
#[derive(Debug)]
pub struct RawDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let kind = DocumentKind::from_file_name(&name)?;
        let bytes = std::fs::read(path)?;
        Ok(Self::new(name, kind, bytes))
    }
}
