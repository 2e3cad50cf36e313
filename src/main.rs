// confdata/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{io::IsTerminal, path::PathBuf, process::ExitCode};
use tracing::info;

use confdata::{
    conference::load_index,
    fetch::{ALL_CONFERENCES, FetchOutcome, Fetcher},
    prompt::{self, PromptEvent},
    verify::{self, Verifier},
    ChatCompletionsModel, Config, ConfigManager, LanguageModel, TerminalApproval, VerifyError,
};

#[derive(Parser)]
#[command(name = "verify", version, about = "Verify conference data against the conferences' own websites")]
struct Cli {
    /// Directory holding the conference JSON files (default: current directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Extra TOML config layered over the system, user and workspace files
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Download a conference website into the source cache
    Download {
        /// Conference id (e.g. 'chi'), or '_all' for every id in index.json
        conference_id: String,
        /// Year of the installment
        year: i64,
    },
    /// Generate prompt files from the downloaded HTML
    Prompts,
    /// Check or update one year's data with the language model
    Llm {
        year: i64,
        /// Model name, overriding configuration
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    confdata::init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let workspace = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut runtime = Config::default();
    runtime.paths.data_dir = cli.data_dir.clone();
    let mut cfg = ConfigManager::load(&workspace, cli.config.as_deref(), runtime)?;

    match cli.cmd {
        Cmd::Download { conference_id, year } if conference_id == ALL_CONFERENCES => download_all(cfg.get(), year).await,
        Cmd::Download { conference_id, year } => download_one(cfg.get(), &conference_id, year).await,
        Cmd::Prompts => Ok(prompts(cfg.get())),
        Cmd::Llm { year, model } => {
            if model.is_some() {
                let mut patch = Config::default();
                patch.model.name = model;
                cfg.apply_runtime_overlay(patch)?;
            }
            llm(cfg.get(), year).await
        }
    }
}

fn exit_code(failed: bool) -> ExitCode {
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn report_fetch(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success { url, path } => println!("Successfully downloaded '{url}' to '{}'", path.display()),
        FetchOutcome::Skipped { reason } => eprintln!("Info: {reason}. Skipping download."),
        FetchOutcome::Failed { reason } => eprintln!("Error: {reason}"),
    }
}

async fn download_one(cfg: &Config, conference_id: &str, year: i64) -> Result<ExitCode> {
    let fetcher = Fetcher::new(cfg.paths(), &cfg.fetch).context("building HTTP client")?;
    let outcome = fetcher.fetch(conference_id, year).await;
    report_fetch(&outcome);
    Ok(exit_code(outcome.is_failure()))
}

async fn download_all(cfg: &Config, year: i64) -> Result<ExitCode> {
    let paths = cfg.paths();
    let ids = match load_index(&paths.index_file) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let fetcher = Fetcher::new(paths, &cfg.fetch).context("building HTTP client")?;

    println!("Attempting to download sources for {} conferences for year {year}...", ids.len());
    let summary = fetcher.fetch_all(&ids, year, |_, outcome| report_fetch(outcome)).await;

    println!("\nDownload Summary:");
    println!("  Successfully downloaded: {}", summary.succeeded);
    println!("  Skipped (no website found): {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    Ok(exit_code(summary.failed > 0))
}

fn prompts(cfg: &Config) -> ExitCode {
    let paths = cfg.paths();
    let pages = match prompt::source_pages(&paths) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if pages.is_empty() {
        eprintln!("Info: No HTML source files found in year subdirectories within '{}'.", paths.source_dir.display());
        return ExitCode::SUCCESS;
    }

    println!("Found {} HTML source files. Generating prompts...", pages.len());
    let summary = prompt::build_all(&paths, &pages, |_, event| match event {
        PromptEvent::Generated { path } => println!("Generated prompt: '{}'", path.display()),
        PromptEvent::Skipped { reason } => eprintln!("Info: {reason}"),
        PromptEvent::Failed { reason } => eprintln!("Error: {reason}"),
    });

    println!("\nPrompt Generation Summary:");
    println!("  Successfully generated: {}", summary.generated);
    println!("  Skipped (no installment): {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    exit_code(summary.failed > 0)
}

async fn llm(cfg: &Config, year: i64) -> Result<ExitCode> {
    let paths = cfg.paths();
    let files = match verify::prompt_files(&paths, year) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    if files.is_empty() {
        eprintln!("No prompt files (.txt) found in '{}'.", paths.prompts_year_dir(year).display());
        return Ok(ExitCode::SUCCESS);
    }
    println!("Found {} prompt files for year {year}.", files.len());

    let model = match ChatCompletionsModel::from_target(&cfg.model) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error initializing LLM model: {e}");
            eprintln!("Set [model] in config.toml (name, base_url, api_key_env) and export the API key.");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Using LLM model: {}", model.model_id());
    info!(base_url = cfg.model.base_url(), "model endpoint");

    let mut approval = TerminalApproval::stdio();
    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let mut verifier = Verifier::new(&paths, &model, &mut approval, stdout).with_color(color);

    let summary = match verifier.run(year, &files).await {
        Ok(s) => s,
        Err(VerifyError::Aborted) => return Ok(ExitCode::FAILURE),
        Err(e) => return Err(e.into()),
    };

    println!("\nLLM Processing Summary:");
    println!("  Prompts processed: {}", summary.processed);
    println!("  Verified ('{}'): {}", confdata::OK_RESPONSE, summary.verified);
    println!("  Updated: {}", summary.updated);
    println!("  Skipped/Discarded: {}", summary.skipped);
    println!("  Errors: {}", summary.errors);
    Ok(exit_code(summary.errors > 0))
}
