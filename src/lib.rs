//! A typed facade over the git command line.
//!
//! [`GitRepo`] locates a repository and drives the `git` executable with
//! explicit argument lists, parsing config dumps, ref listings and status
//! output into plain values. Config and refs are cached lazily per handle and
//! invalidated by every operation that changes them.
//!
//! ```no_run
//! use gitcmd::GitRepo;
//!
//! # fn main() -> gitcmd::Result<()> {
//! let repo = GitRepo::open(".")?;
//! let mut feature = repo.find_ref("feature")?;
//! let main = repo.find_ref("main")?;
//! feature.rebase_onto(&main)?;
//! # Ok(())
//! # }
//! ```

pub mod git;

#[cfg(test)]
mod test_utils;

pub use git::*;
