// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type '{0}' (expected pdf, xls or xlsx)")]
    UnsupportedFormat(String),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to parse PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to read PDF text: {0}")]
    PdfText(String),

    #[error("Failed to read workbook: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama API error {status}: {body}")]
    Ollama { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
