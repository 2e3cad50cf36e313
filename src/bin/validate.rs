// confdata/src/bin/validate.rs

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};

use confdata::{
    schema_check::{collect_candidates, exclusion_set},
    Config, ConfigManager, FileVerdict, SchemaChecker,
};

#[derive(Parser)]
#[command(name = "validate", version, about = "Validate conference data files against the schema")]
struct Cli {
    /// Directory holding the conference JSON files (default: current directory)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Schema file (default: <data-dir>/schema.json)
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Extra TOML config layered over the system, user and workspace files
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    confdata::init_tracing();
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let workspace = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut runtime = Config::default();
    runtime.paths.data_dir = cli.data_dir;
    runtime.paths.schema = cli.schema;
    let cfg = ConfigManager::load(&workspace, cli.config.as_deref(), runtime)?;
    let paths = cfg.get().paths();

    println!("Loading schema from {}...", paths.schema_file.display());
    let checker = match SchemaChecker::load(&paths.schema_file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("Scanning {} for conference JSON files...", paths.data_dir.display());
    let exclude = exclusion_set(&cfg.get().validate.exclude, &paths)?;
    let files = collect_candidates(&paths.data_dir, &exclude)?;
    if files.is_empty() {
        eprintln!("No conference JSON files found to validate.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Found {} files to validate.", files.len());

    let mut failed = 0usize;
    for path in &files {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        print!("Validating {name}... ");
        match checker.check_file(path) {
            FileVerdict::Valid => println!("OK"),
            FileVerdict::LoadError(message) => {
                failed += 1;
                println!("FAILED (Load Error)");
                eprintln!("  Error: {message}");
            }
            FileVerdict::Invalid(problems) => {
                failed += 1;
                println!("FAILED");
                for p in problems { eprintln!("  Error: {p}"); }
            }
        }
    }

    println!("\nValidation finished.");
    if failed == 0 {
        println!("All files are valid.");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{failed} of {} files failed validation.", files.len());
        Ok(ExitCode::FAILURE)
    }
}
