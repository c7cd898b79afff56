use std::collections::BTreeMap;

use crate::git::{
    config::parse::{canonical_key, section_of, ConfigMap},
    error::{GitError, Result},
    repository::{
        cache::{Cache, CacheState},
        core::GitRepo,
    },
};

/// `git config --unset-all` exit status when the key is not in the local file.
const UNSET_NOTHING: i32 = 5;

impl GitRepo {
    /// Look up one key, loading the config cache if needed.
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let mut cache = self.lock_config();
        let config = self.load_config(&mut cache)?;
        Ok(config.get(key).map(str::to_string))
    }

    /// All entries whose key starts with `prefix`, e.g. `"user."`.
    pub fn config_find(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let mut cache = self.lock_config();
        Ok(self.load_config(&mut cache)?.find(prefix))
    }

    /// Snapshot of the whole effective configuration.
    pub fn config(&self) -> Result<ConfigMap> {
        let mut cache = self.lock_config();
        Ok(self.load_config(&mut cache)?.clone())
    }

    /// Replace every assignment of `key` with the single `value`.
    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.lock_config();
        self.config_set_locked(&mut cache, key, value)
    }

    /// Remove every assignment of `key`, pruning its section once empty.
    ///
    /// Returns whether the key was set.
    pub fn config_unset(&self, key: &str) -> Result<bool> {
        let mut cache = self.lock_config();
        self.config_unset_locked(&mut cache, key, true)
    }

    /// Drop a whole section such as `remote.origin` from the local config.
    pub fn config_remove_section(&self, section: &str) -> Result<()> {
        let mut cache = self.lock_config();
        let out = self
            .git(["config", "--local", "--remove-section", section])
            .run()?;
        cache.invalidate();
        out.into_result().map(|_| ())
    }

    /// Forget the cached config; the next read re-parses it.
    pub fn reload_config(&self) {
        self.lock_config().invalidate();
        tracing::debug!("config cache invalidated");
    }

    pub fn config_cache_state(&self) -> CacheState {
        self.lock_config().state()
    }

    pub(crate) fn load_config<'c>(
        &self,
        cache: &'c mut Cache<ConfigMap>,
    ) -> Result<&'c mut ConfigMap> {
        cache.get_or_load(|| {
            let out = self.git(["config", "-l", "-z"]).run()?.into_result()?;
            let config = ConfigMap::parse(out.stdout());
            tracing::debug!(entries = config.len(), "loaded config");
            Ok(config)
        })
    }

    pub(crate) fn config_set_locked(
        &self,
        cache: &mut Cache<ConfigMap>,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.config_unset_locked(cache, key, false)?;

        let out = self.git(["config", "--add", "--", key, value]).run()?;
        cache.invalidate();
        if !out.success() {
            return Err(GitError::internal(format!(
                "could not set {key}: {}",
                out.stderr_str().trim()
            )));
        }
        Ok(())
    }

    pub(crate) fn config_unset_locked(
        &self,
        cache: &mut Cache<ConfigMap>,
        key: &str,
        prune: bool,
    ) -> Result<bool> {
        if self.load_config(cache)?.get(key).is_none() {
            return Ok(false);
        }

        let out = self.git(["config", "--unset-all", "--", key]).run()?;
        cache.invalidate();
        match out.code() {
            Some(0) => {}
            Some(UNSET_NOTHING) => {
                tracing::debug!(key, "key is set outside the repository config");
                return Ok(false);
            }
            _ => return Err(out.into_error()),
        }

        if prune {
            // --get-regexp matches against the lowercased names git prints
            let key = canonical_key(key);
            if let Some(section) = section_of(&key) {
                self.prune_section(section)?;
            }
        }
        Ok(true)
    }

    /// Remove `section` from the local config if it no longer holds any key.
    fn prune_section(&self, section: &str) -> Result<bool> {
        let pattern = format!("^{}\\.", escape_regex(section));
        let out = self
            .git(["config", "--local", "-z", "--get-regexp"])
            .arg(&pattern)
            .run()?;
        match out.code() {
            Some(0) => return Ok(false),
            // No key matched
            Some(1) => {}
            _ => return Err(out.into_error()),
        }

        let out = self
            .git(["config", "--local", "--remove-section", section])
            .run()?;
        if out.success() {
            tracing::debug!(section, "pruned empty config section");
        } else {
            tracing::debug!(section, stderr = %out.stderr_str().trim(), "section already gone");
        }
        Ok(out.success())
    }
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
