//! Error types for the sheet_print crate.
//!
//! Failures come in two tiers. [`DriveError`] aborts the whole run;
//! [`ItemError`] describes a single file that could not be exported and is
//! collected into the run summary while the batch carries on.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("Credentials file has neither an \"installed\" nor a \"web\" section")]
    MissingClientSection,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Unable to look up folder {folder_id}: {reason}")]
    FolderLookupError { folder_id: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF error in {path}: {source}")]
    PdfError {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("PDF has no pages: {0}")]
    EmptyPdf(PathBuf),

    #[error("Failed to write PDF {path}: {reason}")]
    PdfWriteError { path: PathBuf, reason: String },

    #[error("Output directory {path} could not be created: {source}")]
    OutputDirError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Print failed: {0}")]
    PrintError(String),
}

/// Errors confined to a single exported file.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("export returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("no access token: {0}")]
    Token(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
