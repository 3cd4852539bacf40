//! Per-file export policy.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::client::DriveClient;
use crate::error::ItemError;
use crate::models::{format_size, RemoteFile};
use crate::run::RunContext;

/// What happened to one listed file.
#[derive(Debug)]
pub enum ExportOutcome {
    Exported { path: PathBuf, bytes: u64 },
    /// Not a spreadsheet; nothing was requested or written.
    Skipped { mime_type: Option<String> },
    Failed(ItemError),
}

#[derive(Debug)]
pub struct ExportResult {
    pub file_id: String,
    pub name: String,
    pub outcome: ExportOutcome,
}

impl ExportResult {
    pub fn is_exported(&self) -> bool {
        matches!(self.outcome, ExportOutcome::Exported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ExportOutcome::Failed(_))
    }
}

/// Reduce a remote display name to a single file name component.
///
/// Path separators and NUL become `_`, and so do leading dots, so the
/// result can never name a parent, hidden or absolute path.
pub fn file_stem(name: &str) -> String {
    let mut stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    let dots = stem.len() - stem.trim_start_matches('.').len();
    stem.replace_range(..dots, &"_".repeat(dots));

    if stem.is_empty() {
        stem.push('_');
    }
    stem
}

/// Local path for an exported file, always directly inside `output_dir`.
///
/// Two remote files whose names reduce to the same stem map to the same
/// path; the later export overwrites the earlier one.
pub fn output_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{}.pdf", file_stem(name)))
}

/// Export one listed file into the run's output directory and record the
/// outcome on the run context.
pub async fn export_as_pdf<'c>(
    client: &DriveClient,
    file: &RemoteFile,
    ctx: &'c mut RunContext,
) -> &'c ExportResult {
    let outcome = if !file.is_spreadsheet() {
        debug!(
            file_id = %file.id,
            name = %file.name,
            mime_type = file.mime_type.as_deref().unwrap_or("-"),
            "Mimetype is not spreadsheet, skipping"
        );
        ExportOutcome::Skipped {
            mime_type: file.mime_type.clone(),
        }
    } else {
        let path = output_path(ctx.output_dir(), &file.name);
        match client.export_pdf(&file.id, &path).await {
            Ok(bytes) => {
                info!(
                    file_id = %file.id,
                    name = %file.name,
                    size = %format_size(bytes),
                    "Exported"
                );
                ExportOutcome::Exported { path, bytes }
            }
            Err(e) => {
                warn!(file_id = %file.id, name = %file.name, "Export failed: {}", e);
                ExportOutcome::Failed(e)
            }
        }
    };

    let result = ExportResult {
        file_id: file.id.clone(),
        name: file.name.clone(),
        outcome,
    };
    ctx.record(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_display_name() {
        let path = output_path(Path::new("dist/123"), "Quarterly Report");
        assert_eq!(path, PathBuf::from("dist/123/Quarterly Report.pdf"));
    }

    #[test]
    fn test_output_path_stays_inside_output_dir() {
        let dir = Path::new("dist/123");
        for name in [
            "../../escaped",
            "/etc/passwd",
            "a/b",
            "a\\b",
            "..",
            ".hidden",
            "nul\0byte",
            "",
        ] {
            let path = output_path(dir, name);
            assert_eq!(path.parent(), Some(dir), "{:?}", name);
            let file_name = path.file_name().unwrap().to_str().unwrap();
            assert!(!file_name.starts_with('.'), "{:?}", name);
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("../../escaped"), "__.._escaped");
        assert_eq!(file_stem("a/b"), "a_b");
        assert_eq!(file_stem("/etc/passwd"), "_etc_passwd");
        assert_eq!(file_stem(".."), "__");
        assert_eq!(file_stem(""), "_");
        assert_eq!(file_stem("Q3 v1.2"), "Q3 v1.2");
    }

    #[test]
    fn test_result_predicates() {
        let failed = ExportResult {
            file_id: "a".to_string(),
            name: "A".to_string(),
            outcome: ExportOutcome::Failed(ItemError::Status(500)),
        };
        assert!(failed.is_failed());
        assert!(!failed.is_exported());

        let skipped = ExportResult {
            file_id: "b".to_string(),
            name: "B".to_string(),
            outcome: ExportOutcome::Skipped { mime_type: None },
        };
        assert!(!skipped.is_failed());
        assert!(!skipped.is_exported());
    }
}
