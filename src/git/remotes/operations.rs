use std::collections::BTreeMap;

use serde::Serialize;

use crate::git::{
    config::parse::ConfigMap,
    error::{GitError, Result},
    repository::{cache::Cache, core::GitRepo},
};

/// Remote name to URL.
pub type RemoteMap = BTreeMap<String, String>;

/// What probing a remote URL found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeResult {
    Reachable,
    /// The URL answered, and there is no repository there.
    Absent,
    /// The URL could not be checked (network, authentication, ...).
    Unreachable(String),
}

/// Diagnostics that mean the remote end exists and has no repository.
const ABSENT_MARKERS: [&str; 3] = [
    "does not appear to be a git repository",
    "repository not found",
    "not a git repository",
];

fn remotes_from(config: &ConfigMap) -> RemoteMap {
    config
        .find("remote.")
        .into_iter()
        .filter_map(|(key, url)| {
            let name = key.strip_prefix("remote.")?.strip_suffix(".url")?;
            (!name.is_empty()).then(|| (name.to_string(), url))
        })
        .collect()
}

impl GitRepo {
    /// Every remote with a URL, from `remote.<name>.url` keys.
    pub fn remotes(&self) -> Result<RemoteMap> {
        let mut cache = self.lock_config();
        Ok(remotes_from(self.load_config(&mut cache)?))
    }

    pub fn remote_names(&self) -> Result<Vec<String>> {
        Ok(self.remotes()?.into_keys().collect())
    }

    pub fn has_remote(&self, name: &str) -> Result<bool> {
        Ok(self.config_get(&format!("remote.{name}.url"))?.is_some())
    }

    pub fn remote_url(&self, name: &str) -> Result<String> {
        self.config_get(&format!("remote.{name}.url"))?
            .ok_or_else(|| GitError::RemoteNotFound {
                name: name.to_string(),
            })
    }

    fn has_remote_locked(&self, cache: &mut Cache<ConfigMap>, name: &str) -> Result<bool> {
        let config = self.load_config(cache)?;
        Ok(config.get(&format!("remote.{name}.url")).is_some())
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut cache = self.lock_config();
        if self.has_remote_locked(&mut cache, name)? {
            return Err(GitError::RemoteExists {
                name: name.to_string(),
            });
        }

        let out = self.git(["remote", "add", "--", name, url]).run();
        cache.invalidate();
        out?.into_result()?;
        Ok(())
    }

    /// Rename a remote, carrying its tracking refs and branch config along.
    pub fn rename_remote(&self, old: &str, new: &str) -> Result<()> {
        let mut cache = self.lock_config();
        if !self.has_remote_locked(&mut cache, old)? {
            return Err(GitError::RemoteNotFound {
                name: old.to_string(),
            });
        }
        if self.has_remote_locked(&mut cache, new)? {
            return Err(GitError::RemoteExists {
                name: new.to_string(),
            });
        }

        let out = self.git(["remote", "rename", old, new]).run();
        cache.invalidate();
        self.reload_refs();
        out?.into_result()?;
        Ok(())
    }

    /// Delete a remote together with its remote-tracking refs.
    pub fn remove_remote(&self, name: &str) -> Result<()> {
        let mut cache = self.lock_config();
        self.remove_remote_locked(&mut cache, name)
    }

    fn remove_remote_locked(&self, cache: &mut Cache<ConfigMap>, name: &str) -> Result<()> {
        if !self.has_remote_locked(cache, name)? {
            return Err(GitError::RemoteNotFound {
                name: name.to_string(),
            });
        }

        let out = self.git(["remote", "remove", name]).run();
        cache.invalidate();
        self.reload_refs();
        out?.into_result()?;
        Ok(())
    }

    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        let mut cache = self.lock_config();
        if !self.has_remote_locked(&mut cache, name)? {
            return Err(GitError::RemoteNotFound {
                name: name.to_string(),
            });
        }

        let out = self.git(["remote", "set-url", "--", name, url]).run();
        cache.invalidate();
        out?.into_result()?;
        Ok(())
    }

    /// Check whether `url` hosts a repository by asking it for its HEAD.
    pub fn probe_url(&self, url: &str) -> Result<ProbeResult> {
        let out = self
            .git(["ls-remote", url, "HEAD"])
            .env("LC_ALL", "C")
            .run()?;
        if out.success() {
            return Ok(ProbeResult::Reachable);
        }

        let stderr = out.stderr_str();
        let lower = stderr.to_lowercase();
        if ABSENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return Ok(ProbeResult::Absent);
        }
        let reason = stderr
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("unknown failure")
            .trim()
            .to_string();
        Ok(ProbeResult::Unreachable(reason))
    }

    /// Remove every remote whose URL no longer hosts a repository.
    ///
    /// Remotes that cannot be checked right now are kept. The result maps
    /// each remote to whether it was removed.
    pub fn prune_remotes(&self) -> Result<BTreeMap<String, bool>> {
        let mut pruned = BTreeMap::new();

        for (name, url) in self.remotes()? {
            let removed = match self.probe_url(&url)? {
                ProbeResult::Reachable => false,
                ProbeResult::Unreachable(reason) => {
                    tracing::warn!(remote = %name, %url, %reason, "cannot probe remote, keeping it");
                    false
                }
                ProbeResult::Absent => {
                    let mut cache = self.lock_config();
                    match self.remove_remote_locked(&mut cache, &name) {
                        Ok(()) => {
                            tracing::info!(remote = %name, %url, "pruned remote");
                            true
                        }
                        Err(e) => {
                            tracing::warn!(remote = %name, error = %e, "could not prune remote");
                            false
                        }
                    }
                }
            };
            pruned.insert(name, removed);
        }

        Ok(pruned)
    }
}
