//! One end-to-end run: folder input, export, aggregation and printing.

use std::fmt;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::TryStreamExt;
use tracing::{error, info, warn};

use crate::aggregate::{concatenate, AggregateReport};
use crate::auth::{load_client_secrets, Authenticator, TokenStore};
use crate::client::DriveClient;
use crate::config::Settings;
use crate::error::{DriveError, ItemError, Result};
use crate::export::{export_as_pdf, ExportOutcome, ExportResult};
use crate::printer::PrintDispatcher;
use crate::url_parser::extract_folder_id;

/// Stages a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingFolderInput,
    DirectoryPrepared,
    Authenticated,
    Listing,
    Exporting,
    Aggregating,
    Printing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingFolderInput => "awaiting-folder-input",
            Stage::DirectoryPrepared => "directory-prepared",
            Stage::Authenticated => "authenticated",
            Stage::Listing => "listing",
            Stage::Exporting => "exporting",
            Stage::Aggregating => "aggregating",
            Stage::Printing => "printing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    info!(stage = %stage, "Entering stage");
}

/// State of a single run, handed to each stage.
#[derive(Debug)]
pub struct RunContext {
    folder_id: String,
    output_dir: PathBuf,
    results: Vec<ExportResult>,
    exported: Vec<PathBuf>,
}

impl RunContext {
    /// Context whose output directory is `<output_root>/<nanoseconds since epoch>`.
    pub fn new<S: Into<String>>(folder_id: S, output_root: &Path) -> Self {
        let run_id = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::with_output_dir(folder_id, output_root.join(run_id.to_string()))
    }

    pub fn with_output_dir<S: Into<String>>(folder_id: S, output_dir: PathBuf) -> Self {
        Self {
            folder_id: folder_id.into(),
            output_dir,
            results: Vec::new(),
            exported: Vec::new(),
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Every export result, in listing order.
    pub fn results(&self) -> &[ExportResult] {
        &self.results
    }

    /// Display names of failed exports with their errors, in listing order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ItemError)> {
        self.results.iter().filter_map(|result| match &result.outcome {
            ExportOutcome::Failed(e) => Some((result.name.as_str(), e)),
            _ => None,
        })
    }

    /// Display names of files whose export failed, in listing order.
    pub fn failed(&self) -> Vec<String> {
        self.failures().map(|(name, _)| name.to_string()).collect()
    }

    /// Local paths of successful exports, in listing order.
    pub fn exported(&self) -> &[PathBuf] {
        &self.exported
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|result| matches!(result.outcome, ExportOutcome::Skipped { .. }))
            .count()
    }

    /// Path of the aggregated document, a sibling of the output directory.
    pub fn aggregate_path(&self) -> PathBuf {
        self.output_dir.with_extension("pdf")
    }

    /// Create the output directory. It must not exist yet.
    pub fn prepare(&self) -> Result<()> {
        let dir_error = |source: std::io::Error| DriveError::OutputDirError {
            path: self.output_dir.clone(),
            source,
        };
        if let Some(root) = self.output_dir.parent() {
            fs::create_dir_all(root).map_err(dir_error)?;
        }
        fs::create_dir(&self.output_dir).map_err(dir_error)?;
        Ok(())
    }

    pub(crate) fn record(&mut self, result: ExportResult) -> &ExportResult {
        if let ExportOutcome::Exported { path, .. } = &result.outcome {
            self.exported.push(path.clone());
        }
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub succeeded: usize,
    /// Display names of failed exports, in listing order.
    pub failed: Vec<String>,
    /// Failed exports as `(name, reason)`, in listing order.
    pub failures: Vec<(String, String)>,
    pub skipped: usize,
    pub aggregate_path: PathBuf,
    pub aggregate: AggregateReport,
    pub printed: bool,
}

/// Prompt for and read the target folder from `input`.
///
/// Accepts a raw folder ID or a Drive folder URL.
pub fn read_folder_id<R: BufRead>(input: &mut R) -> Result<String> {
    println!("Input google folder id.");
    let mut line = String::new();
    input.read_line(&mut line)?;
    extract_folder_id(&line)
}

/// Look up the folder, then export every child in listing order.
pub async fn export_folder(client: &DriveClient, ctx: &mut RunContext) -> Result<()> {
    let folder_id = ctx.folder_id().to_string();
    let folder = client
        .get_file(&folder_id)
        .await
        .map_err(|e| DriveError::FolderLookupError {
            folder_id: folder_id.clone(),
            reason: e.to_string(),
        })?;
    info!("Folder Name: {}", folder.name);

    enter(Stage::Listing);
    let listing = client.list_folder_children(&folder_id);
    futures::pin_mut!(listing);

    enter(Stage::Exporting);
    while let Some(file) = listing.try_next().await? {
        export_as_pdf(client, &file, ctx).await;
    }

    Ok(())
}

/// Print the export tally and the failed files with their reasons to stdout.
pub fn report_exports(ctx: &RunContext) {
    let failures: Vec<_> = ctx.failures().collect();
    println!(
        "Succeeded {} files, failed {} files.",
        ctx.exported().len(),
        failures.len()
    );
    if ctx.skipped() > 0 {
        println!("Skipped {} non-spreadsheet files.", ctx.skipped());
    }

    if !failures.is_empty() {
        println!("/**************** FILES THAT FAILED TO GET ****************/");
        for (name, reason) in failures {
            println!("{} ({})", name, reason);
        }
        println!("/**********************************************************/");
    }
}

/// Run every stage after authentication against an already prepared context.
pub async fn execute(
    client: &DriveClient,
    ctx: &mut RunContext,
    printer: Option<&PrintDispatcher>,
) -> Result<RunSummary> {
    export_folder(client, ctx).await?;
    report_exports(ctx);

    enter(Stage::Aggregating);
    let aggregate_path = ctx.aggregate_path();
    let aggregate = concatenate(ctx.exported(), &aggregate_path)?;
    if !aggregate.missing.is_empty() {
        warn!("These files do not exist: {:?}", aggregate.missing);
    }
    if aggregate.written {
        info!(
            path = %aggregate_path.display(),
            pages = aggregate.pages,
            "Wrote combined document"
        );
    }

    let mut printed = false;
    if let Some(printer) = printer {
        enter(Stage::Printing);
        if aggregate.written {
            printer.print_file(&aggregate_path).await?;
            printed = true;
        } else {
            warn!("Nothing was exported, skipping print");
        }
    }

    enter(Stage::Done);
    Ok(RunSummary {
        succeeded: ctx.exported().len(),
        failed: ctx.failed(),
        failures: ctx
            .failures()
            .map(|(name, e)| (name.to_string(), e.to_string()))
            .collect(),
        skipped: ctx.skipped(),
        aggregate_path,
        aggregate,
        printed,
    })
}

/// Full run: read the folder from `input`, prepare the output directory,
/// authenticate (reading the authorization code from `input` if needed)
/// and execute.
pub async fn run<R: BufRead>(settings: &Settings, input: &mut R) -> Result<RunSummary> {
    enter(Stage::AwaitingFolderInput);
    let folder_id = read_folder_id(input)?;

    let mut ctx = RunContext::new(folder_id, &settings.output_root);
    ctx.prepare()?;
    enter(Stage::DirectoryPrepared);
    info!(path = %ctx.output_dir().display(), "Created output directory");

    let secrets = load_client_secrets(&settings.credentials_path)?;
    let auth = Authenticator::obtain(&secrets, TokenStore::new(&settings.token_path), input)
        .await
        .inspect_err(|e| error!("Unable to authenticate: {}", e))?;
    enter(Stage::Authenticated);

    let client = DriveClient::with_endpoints(auth, settings.endpoints.clone());
    let printer = settings.print_command.as_deref().map(PrintDispatcher::new);

    execute(&client, &mut ctx, printer.as_ref()).await
}
