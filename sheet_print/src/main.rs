//! sheet_print CLI - Export and print the spreadsheets of a Drive folder.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sheet_print::config::{CREDENTIALS_FILE, OUTPUT_ROOT, PRINT_COMMAND, TOKEN_FILE};
use sheet_print::{run, Endpoints, Settings};

/// Export every spreadsheet in a Google Drive folder as A4 PDF, combine them
/// into one document and optionally print it. The folder ID is read from
/// stdin.
#[derive(Parser)]
#[command(name = "sheet_print")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printout spreadsheets.
    #[arg(short = 'p', long)]
    print: bool,

    /// Path to the OAuth2 client secrets JSON file.
    #[arg(long, env = "SHEET_PRINT_CREDENTIALS", default_value = CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// Path of the saved authorization token.
    #[arg(long, env = "SHEET_PRINT_TOKEN", default_value = TOKEN_FILE)]
    token: PathBuf,

    /// Directory under which each run creates its output directory.
    #[arg(long, env = "SHEET_PRINT_OUTPUT", default_value = OUTPUT_ROOT)]
    output_root: PathBuf,

    /// Print submission command; receives the document on stdin.
    #[arg(long, env = "SHEET_PRINT_COMMAND", default_value = PRINT_COMMAND)]
    print_command: String,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            credentials_path: self.credentials,
            token_path: self.token,
            output_root: self.output_root,
            print_command: self.print.then_some(self.print_command),
            endpoints: Endpoints::default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = cli.into_settings();
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    match run(&settings, &mut input).await {
        Ok(summary) => {
            if summary.aggregate.written {
                println!("Combined document: {}", summary.aggregate_path.display());
            }
            if summary.printed {
                info!("Sent {} pages to the printer", summary.aggregate.pages);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
