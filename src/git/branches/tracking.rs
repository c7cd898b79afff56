use crate::git::{
    error::{GitError, Result},
    refs::model::{Ref, REMOTES_PREFIX},
};

impl<'r> Ref<'r> {
    fn require_branch(&self, operation: &'static str) -> Result<()> {
        if self.is_local() {
            Ok(())
        } else {
            Err(GitError::NotABranch {
                path: self.path().to_string(),
                operation,
            })
        }
    }

    /// The remote this branch is configured to track.
    ///
    /// Both `branch.<name>.remote` and `branch.<name>.merge` must be set.
    pub fn tracks(&self) -> Result<String> {
        self.require_branch("track")?;
        let section = format!("branch.{}", self.name());
        let repo = self.repo();

        match (
            repo.config_get(&format!("{section}.remote"))?,
            repo.config_get(&format!("{section}.merge"))?,
        ) {
            (Some(remote), Some(_)) => Ok(remote),
            _ => Err(GitError::NotTracking {
                branch: self.name().to_string(),
            }),
        }
    }

    /// The remote-tracking ref `refs/remotes/<remote>/<name>` for this branch.
    pub fn remote_branch(&self, remote: &str) -> Result<Ref<'r>> {
        self.require_branch("find the remote branch of")?;
        let path = format!("{REMOTES_PREFIX}{remote}/{}", self.name());
        let repo = self.repo();

        let mut cache = repo.lock_refs();
        match repo.load_refs(&mut cache)?.get(&path) {
            Some(entry) => Ok(Ref::new(repo, entry)),
            None => Err(GitError::NoRemoteBranch {
                branch: self.name().to_string(),
                remote: remote.to_string(),
            }),
        }
    }

    /// The remote-tracking ref this branch tracks.
    pub fn tracked_ref(&self) -> Result<Ref<'r>> {
        let remote = self.tracks()?;
        self.remote_branch(&remote)
    }

    /// Whether `remote` has a branch of the same name. Always false for
    /// anything but a branch.
    pub fn has_remote_ref(&self, remote: &str) -> Result<bool> {
        if !self.is_local() {
            return Ok(false);
        }
        self.repo()
            .has_ref(&format!("{REMOTES_PREFIX}{remote}/{}", self.name()))
    }

    /// Make this branch track the identically named branch on `remote`.
    pub fn track_remote(&self, remote: &str) -> Result<()> {
        self.require_branch("track")?;
        let section = format!("branch.{}", self.name());
        let remote_key = format!("{section}.remote");
        let merge_key = format!("{section}.merge");
        let repo = self.repo();

        let mut cache = repo.lock_config();
        let config = repo.load_config(&mut cache)?;
        let current_remote = config.get(&remote_key).map(str::to_string);
        let current_merge = config.get(&merge_key).map(str::to_string);

        if current_remote.as_deref() == Some(remote) && current_merge.as_deref() == Some(self.path()) {
            tracing::debug!(branch = self.name(), remote, "already tracking");
            return Ok(());
        }

        if current_remote.is_some() || current_merge.is_some() {
            repo.config_unset_locked(&mut cache, &remote_key, true)?;
            repo.config_unset_locked(&mut cache, &merge_key, true)?;
        }
        repo.config_set_locked(&mut cache, &remote_key, remote)?;
        repo.config_set_locked(&mut cache, &merge_key, self.path())?;
        Ok(())
    }
}
