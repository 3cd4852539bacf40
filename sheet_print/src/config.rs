//! Run settings and remote endpoints.

use std::path::PathBuf;

/// Default application credentials file.
pub const CREDENTIALS_FILE: &str = "client_id.json";

/// Default persisted token file.
pub const TOKEN_FILE: &str = "token.json";

/// Default root under which per-run output directories are created.
pub const OUTPUT_ROOT: &str = "dist";

/// Default print submission command.
pub const PRINT_COMMAND: &str = "lpr";

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Google Docs export endpoints.
pub const DOCS_BASE: &str = "https://docs.google.com";

/// Remote endpoint bases, overridable for tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub drive_api: String,
    pub docs: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            drive_api: DRIVE_API_BASE.to_string(),
            docs: DOCS_BASE.to_string(),
        }
    }
}

/// Everything a run needs besides the folder identifier.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub output_root: PathBuf,
    /// Print command to run after aggregation; `None` disables printing.
    pub print_command: Option<String>,
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(CREDENTIALS_FILE),
            token_path: PathBuf::from(TOKEN_FILE),
            output_root: PathBuf::from(OUTPUT_ROOT),
            print_command: None,
            endpoints: Endpoints::default(),
        }
    }
}
