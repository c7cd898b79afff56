use std::path::PathBuf;

use thiserror::Error;

use crate::git::merge::operations::{Integration, Rollback};

/// Errors produced by git operations.
///
/// Every variant belongs to one [`ErrorKind`] so callers can decide between
/// retrying, reporting, and treating the failure as a bug.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository owns the given path.
    #[error("could not find a git repository in {path} or any of its parents")]
    NotARepo { path: PathBuf },

    /// The configured git program cannot be run.
    #[error("git executable {program} is not runnable: {message}")]
    NotAvailable { program: PathBuf, message: String },

    /// The child process could not be started at all.
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited non-zero.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("no ref for {name}")]
    RefNotFound { name: String },

    #[error("no remote named {name}")]
    RemoteNotFound { name: String },

    #[error("{branch} does not track a remote")]
    NotTracking { branch: String },

    #[error("{branch} has no remote branch at {remote}")]
    NoRemoteBranch { branch: String, remote: String },

    #[error("{path} is not present in {reference}")]
    PathNotFound { path: String, reference: String },

    #[error("{path} is not a branch, cannot {operation} it")]
    NotABranch { path: String, operation: &'static str },

    #[error("{path} is not a remote ref")]
    NotARemoteRef { path: String },

    #[error("cannot delete {path}: {reason}")]
    NotDeletable { path: String, reason: &'static str },

    #[error("invalid ref name: {name}")]
    InvalidRefName { name: String },

    #[error("{name} already exists")]
    RefExists { name: String },

    #[error("a remote named {name} already exists")]
    RemoteExists { name: String },

    #[error("{path} is not a file in {reference}")]
    NotAFile { path: String, reference: String },

    /// A merge or rebase failed; the repository was restored before returning.
    #[error("{operation} failed ({rollback}):\n{output}")]
    IntegrationFailed {
        operation: Integration,
        output: String,
        rollback: Rollback,
    },

    /// Broken invariant: malformed tool output or an impossible state.
    #[error("internal fault: {message}")]
    Internal { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse classification of [`GitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A ref, remote, path or key does not exist.
    NotFound,
    /// The request violates a precondition (deleting HEAD, duplicate names, ...).
    Precondition,
    /// The external tool or the operating system failed.
    External,
    /// A merge or rebase failed and state repair was performed.
    Integration,
    /// A logic or parsing bug.
    Internal,
    Cancelled,
}

impl GitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitError::NotARepo { .. }
            | GitError::RefNotFound { .. }
            | GitError::RemoteNotFound { .. }
            | GitError::NotTracking { .. }
            | GitError::NoRemoteBranch { .. }
            | GitError::PathNotFound { .. } => ErrorKind::NotFound,
            GitError::NotABranch { .. }
            | GitError::NotARemoteRef { .. }
            | GitError::NotDeletable { .. }
            | GitError::InvalidRefName { .. }
            | GitError::RefExists { .. }
            | GitError::RemoteExists { .. }
            | GitError::NotAFile { .. } => ErrorKind::Precondition,
            GitError::NotAvailable { .. }
            | GitError::Spawn { .. }
            | GitError::Io { .. }
            | GitError::CommandFailed { .. } => ErrorKind::External,
            GitError::IntegrationFailed { .. } => ErrorKind::Integration,
            GitError::Internal { .. } => ErrorKind::Internal,
            GitError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        GitError::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GitError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GitError>;
