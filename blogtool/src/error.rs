//! Typed failures returned by the tool façades.
//!
//! Every contract point with an external process or the content tree reports
//! one of these variants. None of them is fatal to the caller: the shell decides
//! how to present them.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for façade operations.
pub type Result<T, E = BlogError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BlogError {
    /// The binary could not be spawned because it is not installed or not on `PATH`.
    #[error("{tool} not found (install it or set its path in the config)")]
    ToolNotFound { tool: String },

    #[error("{} is not a git repository", .path.display())]
    NotARepository { path: PathBuf },

    #[error("{} is not a Hugo site (expected a hugo/config file and a content/ directory)", .path.display())]
    NotAContentTree { path: PathBuf },

    /// The process ran but exited unsuccessfully. `stderr` is kept verbatim.
    #[error("`{command}` failed with exit code {code}: {}", .stderr.trim())]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("parse {subject}: {reason}")]
    ParseFailure { subject: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("render template")]
    Template(#[from] minijinja::Error),
}

impl BlogError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn parse(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

/// Step of `commit_and_push` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    Stage,
    Commit,
    Push,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitStep::Stage => "stage",
            CommitStep::Commit => "commit",
            CommitStep::Push => "push",
        };
        f.write_str(name)
    }
}

/// Failure of one step in the stage/commit/push sequence.
///
/// When `step` is [`CommitStep::Push`] the local commit exists and only the push
/// needs to be retried.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct CommitError {
    pub step: CommitStep,
    #[source]
    pub source: BlogError,
}

impl CommitError {
    pub fn new(step: CommitStep, source: BlogError) -> Self {
        Self { step, source }
    }

    /// True when the remote rejected the push for credential reasons.
    pub fn is_auth_failure(&self) -> bool {
        if self.step != CommitStep::Push {
            return false;
        }
        match &self.source {
            BlogError::CommandFailed { stderr, .. } => looks_like_auth_failure(stderr),
            _ => false,
        }
    }
}

pub(crate) fn looks_like_auth_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    ["permission denied", "authentication failed", "could not read username"]
        .iter()
        .any(|needle| lower.contains(needle))
}
