//! sheet_print - Export the spreadsheets of a Google Drive folder as A4 PDFs
//! and bind them into one printable document.
//!
//! A run:
//! - reads a folder ID (or folder URL) from stdin
//! - authenticates with OAuth2, reusing a saved token when possible
//! - lists the folder and exports every spreadsheet as A4, fit-to-width PDF
//! - concatenates the exports into a single A4 document
//! - optionally pipes that document to the local print spooler
//!
//! # Example
//!
//! ```no_run
//! use sheet_print::{run, Settings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::default();
//!     let stdin = std::io::stdin();
//!     let summary = run(&settings, &mut stdin.lock()).await.unwrap();
//!     println!("{} exported", summary.succeeded);
//! }
//! ```

pub mod aggregate;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod printer;
pub mod run;
pub mod url_parser;

// Re-exports for convenience
pub use aggregate::{concatenate, AggregateReport};
pub use auth::{Authenticator, TokenStore, Tokens};
pub use client::DriveClient;
pub use config::{Endpoints, Settings};
pub use error::{DriveError, ItemError, Result};
pub use export::{export_as_pdf, ExportOutcome, ExportResult};
pub use models::RemoteFile;
pub use printer::PrintDispatcher;
pub use run::{execute, run, RunContext, RunSummary};
pub use url_parser::extract_folder_id;
