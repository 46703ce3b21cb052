use std::fmt;
use std::path::PathBuf;

/// Repository operation that produced a [`OrchestratorError::Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Clone,
    Checkout,
    Push,
    PullRequest,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepositoryOperation::Clone => "clone",
            RepositoryOperation::Checkout => "checkout",
            RepositoryOperation::Push => "push",
            RepositoryOperation::PullRequest => "pull request",
        };
        f.write_str(name)
    }
}

/// Pipeline stage an aborted run stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Rewrite,
    Push,
    PullRequest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "preparation",
            Stage::Rewrite => "file rewrite",
            Stage::Push => "push",
            Stage::PullRequest => "pull request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("artifact resolution failed: {0}")]
    Resolution(String),

    #[error("repository {operation} failed: {message}")]
    Repository {
        operation: RepositoryOperation,
        message: String,
    },

    #[error("key '{key}' not found in {}", path.display())]
    KeyNotFound { key: String, path: PathBuf },

    #[error("{}", join_failures(.0))]
    Preparation(Vec<OrchestratorError>),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn repository(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        OrchestratorError::Repository {
            operation,
            message: message.into(),
        }
    }

    pub fn at(self, stage: Stage) -> Self {
        OrchestratorError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The stage this error was tagged with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            OrchestratorError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Strip stage tags down to the underlying error.
    pub fn cause(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::Stage { source, .. } => source.cause(),
            other => other,
        }
    }
}

fn join_failures(failures: &[OrchestratorError]) -> String {
    let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(
        "{} of 2 preparation tasks failed: {}",
        failures.len(),
        reasons.join("; ")
    )
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
