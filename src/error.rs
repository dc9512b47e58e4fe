use thiserror::Error;

/// Failures that abort a tracing run.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to clone repository {repo}: {reason}")]
    Repository { repo: String, reason: String },

    #[error("failed to build call graph for {path}: {reason}")]
    Analysis { path: String, reason: String },

    #[error("failed to parse proto files in {path}: {reason}")]
    Catalog { path: String, reason: String },

    #[error("method map cache error: {0}")]
    Cache(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;
