//! Error types for every module of the crate.

use std::path::PathBuf;

/// Failure to bring a JSON document off disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("error reading {}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("could not decode JSON from {}: {source}", path.display())]
    Json { path: PathBuf, #[source] source: serde_json::Error },

    #[error("unexpected shape in {}: {message}", path.display())]
    Shape { path: PathBuf, message: String },
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Schema loading and data-directory scanning.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid schema {}: {message}", path.display())]
    Compile { path: PathBuf, message: String },

    #[error("bad exclude pattern: {0}")]
    Exclude(#[from] globset::Error),

    #[error("cannot scan {}: {source}", path.display())]
    Scan { path: PathBuf, #[source] source: std::io::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("source directory '{}' not found; run the download command first", .0.display())]
    MissingSourceDir(PathBuf),
}

/// Errors from the language-model endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API key not set (expected in ${env_var})")]
    MissingApiKey { env_var: String },

    #[error("invalid model configuration: {message}")]
    InvalidConfig { message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider reply: {message}")]
    MalformedReply { message: String },
}

/// Conditions that end a verification batch early.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("aborted by operator")]
    Aborted,

    #[error("prompts directory '{}' not found; run the prompts command first", .0.display())]
    MissingPromptsDir(PathBuf),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
