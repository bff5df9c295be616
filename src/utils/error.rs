// src/utils/error.rs
#![allow(dead_code)]
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 500 from the portal

    #[error("No code found for '{0}' in the portal's code list")]
    CodeNotFound(String),

    #[error("CAPTCHA not solved after {0} attempts")]
    CaptchaExhausted(u32),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Failed to parse portal response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Outer results table absent and no error banner either; an unknown,
    /// possibly transient condition.
    #[error("No results table found in the response")]
    NotFound,

    /// The portal answered with its own error banner; the message is surfaced
    /// verbatim. Usually invalid input codes, not a transient fault.
    #[error("Portal reported: {0}")]
    FormError(String),

    /// The results table exists but a required part of the record is missing.
    /// Records are all-or-nothing; partial records are never returned.
    #[error("Results table found but missing {0}")]
    MissingSection(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cache row for '{0}': {1}")]
    Corrupt(String, String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Portal interaction failed: {0}")]
    Portal(#[from] PortalError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
