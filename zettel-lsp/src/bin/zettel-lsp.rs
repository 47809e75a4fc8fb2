use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{stdin, stdout};
use tower_lsp::{Client, LspService, Server};
use tracing_subscriber::EnvFilter;
use zettel_lsp::{ServerOptions, ZettelLanguageServer};
use zettel_notebook::FsNotebookStore;

/// Language server for notebooks of interlinked Markdown notes, speaking LSP
/// over stdio.
#[derive(Parser, Debug)]
#[command(name = "zettel-lsp", version, about)]
struct Args {
    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Delay before diagnostics are recomputed after an edit, in milliseconds
    #[arg(long, default_value_t = 1000)]
    debounce_ms: u64,
}

fn init_logging(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_env("ZETTEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        // stdout carries the protocol
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(args.log_file.as_ref()) {
        eprintln!("Error opening log file: {err}");
        return ExitCode::FAILURE;
    }

    let options = ServerOptions {
        debounce: Duration::from_millis(args.debounce_ms),
    };
    let (service, socket) = LspService::build(|client| {
        ZettelLanguageServer::with_options(client, Arc::new(FsNotebookStore::new()), options)
    })
    .custom_method(
        "$/setTrace",
        ZettelLanguageServer::<Client, FsNotebookStore>::set_trace,
    )
    .finish();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting zettel-lsp");
    Server::new(stdin(), stdout(), socket).serve(service).await;
    ExitCode::SUCCESS
}
