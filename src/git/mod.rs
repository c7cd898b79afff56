//! Git operations module
//!
//! Every operation runs the git executable and parses what it prints:
//!
//! - `command`: Process invoker and invocation options
//! - `error`: Error type and error kinds
//! - `repository`: Repository handle (open, init, clone, status) and caches
//! - `config`: Config cache (get, set, unset with section pruning, find)
//! - `refs`: Ref model, ref cache and history queries
//! - `branches`: Branch and tag creation, deletion, checkout, tracking
//! - `merge`: Merge and rebase with rollback
//! - `remotes`: Remote management, probing, pruning and concurrent fetch

pub mod branches;
pub mod command;
pub mod config;
pub mod error;
pub mod merge;
pub mod refs;
pub mod remotes;
pub mod repository;

// Re-export the main types
pub use branches::operations::RefBase;
pub use command::{CommandOutput, GitCommand, GitOptions, GIT_PROGRAM_ENV};
pub use config::parse::ConfigMap;
pub use error::{ErrorKind, GitError, Result};
pub use merge::operations::{Integration, Rollback};
pub use refs::model::{Ref, RefKind};
pub use remotes::{
    operations::{ProbeResult, RemoteMap},
    sync::{CancelToken, FetchMap, FetchReport, FetchStatus},
};
pub use repository::{
    cache::CacheState,
    core::GitRepo,
    status::{FileState, StatusLine},
};
