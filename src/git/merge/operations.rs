use std::fmt;

use crate::git::{
    command::CommandOutput,
    error::{GitError, Result},
    refs::model::{Ref, HEADS_PREFIX},
    repository::core::GitRepo,
};

/// History-integrating operation run by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integration {
    Merge,
    Rebase,
}

impl Integration {
    fn command(&self) -> &'static str {
        match self {
            Integration::Merge => "merge",
            Integration::Rebase => "rebase",
        }
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// How the repository was put back after a failed integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    /// `git <op> --abort` succeeded.
    Aborted,
    /// The abort failed and the branch was reset to its previous commit.
    Forced,
    /// git refused to start, so only the branch pointer was put back and the
    /// working tree was left alone.
    NotStarted,
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Aborted => f.write_str("aborted"),
            Rollback::Forced => f.write_str("forced rollback"),
            Rollback::NotStarted => f.write_str("not started"),
        }
    }
}

/// Checks the original ref back out when dropped.
struct RestoreCheckout<'r> {
    original: Ref<'r>,
}

impl Drop for RestoreCheckout<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.original.checkout() {
            tracing::warn!(
                original = self.original.path(),
                error = %e,
                "could not restore the original checkout"
            );
        }
    }
}

impl<'r> Ref<'r> {
    /// Rebase this branch onto `target`.
    ///
    /// On failure the rebase is aborted (or, failing that, the branch is
    /// forced back to where it was) and the tool's output is returned in
    /// [`GitError::IntegrationFailed`].
    pub fn rebase_onto(&mut self, target: &Ref<'_>) -> Result<()> {
        integrate(self, target, Integration::Rebase)
    }

    /// Merge `target` into this branch, with the same rollback guarantees
    /// as [`Ref::rebase_onto`].
    pub fn merge_with(&mut self, target: &Ref<'_>) -> Result<()> {
        integrate(self, target, Integration::Merge)
    }
}

fn integrate(head: &mut Ref<'_>, target: &Ref<'_>, operation: Integration) -> Result<()> {
    head.reload()?;
    if head.contains(target)? {
        tracing::debug!(head = head.path(), target = target.sha(), "already contains target");
        return Ok(());
    }
    if !head.is_local() {
        return Err(GitError::NotABranch {
            path: head.path().to_string(),
            operation: operation.command(),
        });
    }

    let repo = head.repo();
    let branch = head.name().to_string();
    let pre_sha = head.sha().to_string();

    let current = repo.current_ref()?;
    let _restore = if current.path() != head.path() {
        head.checkout()?;
        Some(RestoreCheckout { original: current })
    } else {
        None
    };

    let out = match operation {
        Integration::Merge => repo.git(["merge", "-q", "--no-edit", target.sha()]),
        Integration::Rebase => repo.git(["rebase", "-q", target.sha(), branch.as_str()]),
    }
    .run();
    repo.reload_refs();
    let out = out?;

    if out.success() {
        head.reload()?;
        return Ok(());
    }

    let rollback = roll_back(repo, operation, &branch, &pre_sha);
    if let Err(e) = head.reload() {
        tracing::warn!(head = head.path(), error = %e, "could not reload after rollback");
    }
    Err(integration_error(operation, &out, rollback))
}

fn integration_error(operation: Integration, out: &CommandOutput, rollback: Rollback) -> GitError {
    GitError::IntegrationFailed {
        operation,
        output: out.combined(),
        rollback,
    }
}

/// Abort the failed operation. If the abort itself fails, put the branch
/// back and, when git left a merge or rebase half done, reset by force.
fn roll_back(repo: &GitRepo, operation: Integration, branch: &str, pre_sha: &str) -> Rollback {
    match repo.git([operation.command(), "--abort"]).run() {
        Ok(out) if out.success() => return Rollback::Aborted,
        Ok(out) => tracing::warn!(
            %operation,
            stderr = %out.stderr_str().trim(),
            "abort failed, forcing rollback"
        ),
        Err(e) => tracing::warn!(%operation, error = %e, "abort failed, forcing rollback"),
    }

    let branch_path = format!("{HEADS_PREFIX}{branch}");
    best_effort(repo, ["update-ref", branch_path.as_str(), pre_sha]);

    // Refused up front (dirty tree, untracked files in the way): the working
    // tree still holds the user's changes and must not be reset
    if !in_progress(repo) {
        repo.reload_refs();
        tracing::debug!(%operation, branch, "operation never started, working tree untouched");
        return Rollback::NotStarted;
    }

    if operation == Integration::Rebase {
        for dir in [".rebase-apply", "rebase-merge"] {
            let state = repo.git_dir().join(dir);
            match std::fs::remove_dir_all(&state) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %state.display(), error = %e, "could not remove rebase state"),
            }
        }
    }

    best_effort(repo, ["symbolic-ref", "HEAD", branch_path.as_str()]);
    if !repo.is_bare() {
        best_effort(repo, ["reset", "-q", "--hard", pre_sha]);
    }
    repo.reload_refs();

    tracing::info!(%operation, branch, sha = pre_sha, "forced rollback");
    Rollback::Forced
}

/// Whether a merge or rebase left its state behind in the control directory.
fn in_progress(repo: &GitRepo) -> bool {
    let git_dir = repo.git_dir();
    git_dir.join("MERGE_HEAD").exists()
        || git_dir.join("rebase-merge").exists()
        || git_dir.join(".rebase-apply").exists()
}

fn best_effort<const N: usize>(repo: &GitRepo, args: [&str; N]) {
    let result = repo.git(args).run().and_then(CommandOutput::into_result);
    if let Err(e) = result {
        tracing::warn!(error = %e, "rollback step failed");
    }
}
