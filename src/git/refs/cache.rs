use std::collections::BTreeMap;

use crate::git::{
    error::{GitError, Result},
    refs::model::{Ref, RefEntry, RefKind, HEAD, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX},
    repository::{
        cache::{Cache, CacheState},
        core::GitRepo,
    },
};

/// Every known ref keyed by its full path.
pub(crate) type RefMap = BTreeMap<String, RefEntry>;

/// Lookup order for short names: branches shadow tags, which shadow
/// remote-tracking refs.
const LOOKUP_PREFIXES: [&str; 4] = ["", HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX];

/// Parse `git show-ref --head`: one `<sha> <path>` per line.
pub(crate) fn parse_show_ref(output: &str) -> Result<RefMap> {
    let mut refs = RefMap::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (sha, path) = line
            .split_once(' ')
            .ok_or_else(|| GitError::internal(format!("malformed show-ref line {line:?}")))?;
        refs.insert(
            path.to_string(),
            RefEntry {
                sha: sha.to_string(),
                path: path.to_string(),
            },
        );
    }
    Ok(refs)
}

impl GitRepo {
    pub(crate) fn load_refs<'c>(&self, cache: &'c mut Cache<RefMap>) -> Result<&'c mut RefMap> {
        cache.get_or_load(|| {
            let out = self.git(["show-ref", "--head"]).run()?;
            // Exit 1 with nothing printed: a repository without any refs yet
            if !out.success() && !(out.code() == Some(1) && out.stdout().is_empty()) {
                return Err(GitError::internal(format!(
                    "cannot enumerate refs: {}",
                    out.stderr_str().trim()
                )));
            }
            let refs = parse_show_ref(&out.stdout_str())?;
            tracing::debug!(refs = refs.len(), "loaded refs");
            Ok(refs)
        })
    }

    fn collect_refs(&self, keep: impl Fn(&RefEntry) -> bool) -> Result<Vec<Ref<'_>>> {
        let mut cache = self.lock_refs();
        let refs = self.load_refs(&mut cache)?;
        Ok(refs
            .values()
            .filter(|entry| keep(entry))
            .map(|entry| Ref::new(self, entry))
            .collect())
    }

    /// Every ref, re-enumerated from the repository.
    pub fn refs(&self) -> Result<Vec<Ref<'_>>> {
        self.reload_refs();
        self.collect_refs(|_| true)
    }

    pub fn branches(&self) -> Result<Vec<Ref<'_>>> {
        self.collect_refs(|entry| RefKind::of(&entry.path) == Some(RefKind::Branch))
    }

    pub fn tags(&self) -> Result<Vec<Ref<'_>>> {
        self.collect_refs(|entry| RefKind::of(&entry.path) == Some(RefKind::Tag))
    }

    pub fn remote_refs(&self) -> Result<Vec<Ref<'_>>> {
        self.collect_refs(|entry| RefKind::of(&entry.path) == Some(RefKind::Remote))
    }

    /// Check for a ref by its full path, e.g. `refs/heads/main`.
    pub fn has_ref(&self, path: &str) -> Result<bool> {
        let mut cache = self.lock_refs();
        Ok(self.load_refs(&mut cache)?.contains_key(path))
    }

    /// Resolve a ref by full path, branch, tag, remote-tracking name, or
    /// anything git can verify as a commit (hashes, `HEAD~2`, ...).
    pub fn find_ref(&self, name: &str) -> Result<Ref<'_>> {
        {
            let mut cache = self.lock_refs();
            let refs = self.load_refs(&mut cache)?;
            let found = LOOKUP_PREFIXES
                .iter()
                .find_map(|prefix| refs.get(&format!("{prefix}{name}")));
            if let Some(entry) = found {
                return Ok(Ref::new(self, entry));
            }
        }

        let out = self
            .git(["rev-parse", "-q", "--verify"])
            .arg(format!("{name}^{{commit}}"))
            .run()?;
        if out.success() {
            return Ok(Ref::raw(self, out.stdout_str().trim()));
        }

        Err(GitError::RefNotFound {
            name: name.to_string(),
        })
    }

    /// The ref HEAD points at: the checked-out branch, or a raw ref when
    /// HEAD is detached.
    pub fn current_ref(&self) -> Result<Ref<'_>> {
        let out = self.git(["symbolic-ref", "-q", HEAD]).run()?;
        if out.success() {
            let path = out.stdout_str().trim().to_string();
            let mut cache = self.lock_refs();
            if !self.load_refs(&mut cache)?.contains_key(&path) {
                // The branch may have been created behind our back
                cache.invalidate();
            }
            return match self.load_refs(&mut cache)?.get(&path) {
                Some(entry) => Ok(Ref::new(self, entry)),
                // Unborn branch
                None => Err(GitError::RefNotFound { name: path }),
            };
        }

        let out = self.git(["rev-parse", "-q", "--verify", HEAD]).run()?;
        if out.success() {
            return Ok(Ref::raw(self, out.stdout_str().trim()));
        }

        Err(GitError::RefNotFound {
            name: HEAD.to_string(),
        })
    }

    /// Forget the cached refs; the next read enumerates them again.
    pub fn reload_refs(&self) {
        self.lock_refs().invalidate();
        tracing::debug!("ref cache invalidated");
    }

    pub fn ref_cache_state(&self) -> CacheState {
        self.lock_refs().state()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::parse_show_ref;
    use crate::{
        git::repository::cache::CacheState,
        test_utils::{create_test_repo, RepoAssertions, RepoTestOperations},
        ErrorKind,
    };

    #[test]
    fn parse_show_ref_works() {
        let output = "\
1111111111111111111111111111111111111111 HEAD
1111111111111111111111111111111111111111 refs/heads/master
2222222222222222222222222222222222222222 refs/tags/v1
";
        let refs = parse_show_ref(output).unwrap();

        assert_eq!(refs.len(), 3);
        assert_eq!(refs["refs/tags/v1"].sha, "2222222222222222222222222222222222222222");
        assert_eq!(refs["HEAD"].path, "HEAD");
    }

    #[test]
    fn parse_show_ref_rejects_malformed_lines() {
        let err = parse_show_ref("no-separator-here\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn empty_repository_has_no_refs() {
        let (_temp_dir, repo) = create_test_repo();

        assert!(repo.refs().unwrap().is_empty());
        assert_eq!(repo.ref_cache_state(), CacheState::LoadedEmpty);
        assert!(!repo.has_ref("refs/heads/master").unwrap());
        assert_eq!(repo.current_ref().unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn listings_work() {
        let (_temp_dir, repo) = create_test_repo();
        repo.add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();
        repo.create_branch("feature", "master").unwrap();
        repo.create_tag("v1", "master").unwrap();

        let branches: Vec<_> = repo
            .branches()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(branches, vec!["feature", "master"]);
        assert_eq!(repo.tags().unwrap().len(), 1);
        assert!(repo.remote_refs().unwrap().is_empty());

        let all: Vec<_> = repo
            .refs()
            .unwrap()
            .iter()
            .map(|r| r.path().to_string())
            .collect();
        assert_eq!(
            all,
            vec!["HEAD", "refs/heads/feature", "refs/heads/master", "refs/tags/v1"]
        );
        assert_eq!(repo.ref_cache_state(), CacheState::Loaded);
    }

    #[test]
    fn find_ref_prefers_branches_over_tags() {
        let (_temp_dir, repo) = create_test_repo();
        repo.add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();
        repo.create_tag("same", "master").unwrap();
        repo.add_file_and_commit("second.txt", "again", "Second commit")
            .unwrap();
        repo.create_branch("same", "master").unwrap();

        let found = repo.find_ref("same").unwrap();
        assert_eq!(found.path(), "refs/heads/same");
        assert_eq!(repo.find_ref("refs/tags/same").unwrap().path(), "refs/tags/same");
        assert_ne!(found.sha(), repo.find_ref("refs/tags/same").unwrap().sha());
    }

    #[test]
    fn find_ref_resolves_expressions() {
        let (_temp_dir, repo) = create_test_repo();
        repo.add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();
        let first = repo.find_ref("master").unwrap().sha().to_string();
        repo.add_file_and_commit("second.txt", "again", "Second commit")
            .unwrap();

        let parent = repo.find_ref("master~1").unwrap();
        assert!(parent.is_raw());
        assert_eq!(parent.sha(), first);

        let err = repo.find_ref("no-such-thing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn current_ref_works() {
        let (_temp_dir, repo) = create_test_repo();
        repo.add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();

        let current = repo.current_ref().unwrap();
        assert_eq!(current.path(), "refs/heads/master");

        let sha = current.sha().to_string();
        repo.checkout(&sha).unwrap();
        let detached = repo.current_ref().unwrap();
        assert!(detached.is_raw());
        assert_eq!(detached.sha(), sha);

        repo.checkout("master").unwrap();
        repo.assert_current_branch("master");
    }

    #[test]
    fn current_ref_sees_branches_created_outside() {
        let (_temp_dir, repo) = create_test_repo();
        repo.add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();
        repo.branches().unwrap();

        repo.git(["checkout", "-q", "-b", "outside"])
            .run()
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(repo.current_ref().unwrap().name(), "outside");
    }
}
