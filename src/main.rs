#![forbid(unsafe_code)]

use error_iter::ErrorIter as _;
use is_terminal::IsTerminal as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use solexport::client::helius::{HeliusClient, DEFAULT_API_URL};
use solexport::client::history::History;
use solexport::errors::ExportError;
use solexport::export::export;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::{env, process::ExitCode};
use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - HELIUS_API_KEY is the Helius API credential (required)."]
#[footer = "  - HELIUS_API_URL accepts a http: or https: URL"]
#[footer = "      default is \"https://api.helius.xyz\""]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Solana wallet address to export.
    #[short('a')]
    address: String,

    /// Output CSV file. Default is "transactions.csv".
    #[short('o')]
    output: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum Error {
    #[error("HELIUS_API_KEY not found in the environment")]
    CredentialMissing,

    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("Unable to create {0:?}")]
    Create(PathBuf, #[source] std::io::Error),

    #[error("Export failed")]
    Export(#[from] ExportError),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    // Resolve the credential before any network activity.
    let api_key = env::var("HELIUS_API_KEY").map_err(|_| Error::CredentialMissing)?;
    let api_url = env::var("HELIUS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

    let client = HeliusClient::new(&api_url, api_key);
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from("transactions.csv"));

    println!(
        "Exporting transactions for {address} to {output}...",
        address = args.address,
        output = output.display(),
    );

    let file =
        BufWriter::new(File::create(&output).map_err(|err| Error::Create(output.clone(), err))?);
    let rows = export(History::new(&client, &args.address), &args.address, file)?;

    println!("Export completed successfully! ({rows} rows)");

    Ok(())
}
