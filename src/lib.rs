pub mod config;
pub mod error;
pub mod conference;
pub mod schema_check;
pub mod fetch;
pub mod prompt;
pub mod model;
pub mod approval;
pub mod diff;
pub mod verify;

pub use config::{Config, ConfigManager, Paths, Scope};
pub use error::{LoadError, ModelError, PromptError, SchemaError, VerifyError};
pub use conference::Conference;
pub use schema_check::{FileVerdict, SchemaChecker};
pub use fetch::{FetchOutcome, FetchSummary, Fetcher};
pub use prompt::{PromptEvent, PromptSummary, OK_RESPONSE};
pub use model::{ChatCompletionsModel, LanguageModel};
pub use approval::{Approval, ApprovalProvider, ScriptedApproval, TerminalApproval};
pub use verify::{ItemOutcome, Reply, Verifier, VerifySummary};

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
}
