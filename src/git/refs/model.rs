use std::{fmt, ptr};

use crate::git::{
    error::{GitError, Result},
    repository::core::GitRepo,
};

pub(crate) const HEADS_PREFIX: &str = "refs/heads/";
pub(crate) const TAGS_PREFIX: &str = "refs/tags/";
pub(crate) const REMOTES_PREFIX: &str = "refs/remotes/";
pub(crate) const HEAD: &str = "HEAD";

/// What a ref points at, as stored in the ref cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefEntry {
    pub(crate) sha: String,
    pub(crate) path: String,
}

/// Namespace a ref path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
    Remote,
    Head,
}

impl RefKind {
    /// Classify a full ref path; `None` for anything outside the four
    /// known namespaces (notes, stash, raw hashes).
    pub fn of(path: &str) -> Option<Self> {
        if path == HEAD {
            Some(RefKind::Head)
        } else if path.starts_with(HEADS_PREFIX) {
            Some(RefKind::Branch)
        } else if path.starts_with(TAGS_PREFIX) {
            Some(RefKind::Tag)
        } else if path.starts_with(REMOTES_PREFIX) {
            Some(RefKind::Remote)
        } else {
            None
        }
    }
}

/// A pointer to a single commit, owned by a repository.
///
/// A `Ref` is a snapshot: the SHA is what the ref cache (or a raw lookup)
/// reported when the value was produced. Use [`Ref::reload`] after the
/// branch may have moved.
#[derive(Clone)]
pub struct Ref<'r> {
    sha: String,
    path: String,
    repo: &'r GitRepo,
}

impl<'r> Ref<'r> {
    pub(crate) fn new(repo: &'r GitRepo, entry: &RefEntry) -> Self {
        Self {
            sha: entry.sha.clone(),
            path: entry.path.clone(),
            repo,
        }
    }

    /// A ref addressed directly by commit hash.
    pub(crate) fn raw(repo: &'r GitRepo, sha: impl Into<String>) -> Self {
        let sha = sha.into();
        Self {
            path: sha.clone(),
            sha,
            repo,
        }
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Fully qualified path such as `refs/heads/main`, `HEAD`, or the hash
    /// itself for a raw ref.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn repo(&self) -> &'r GitRepo {
        self.repo
    }

    pub fn kind(&self) -> Option<RefKind> {
        RefKind::of(&self.path)
    }

    /// A branch, i.e. something under `refs/heads/`.
    pub fn is_local(&self) -> bool {
        self.kind() == Some(RefKind::Branch)
    }

    pub fn is_branch(&self) -> bool {
        self.is_local()
    }

    pub fn is_remote(&self) -> bool {
        self.kind() == Some(RefKind::Remote)
    }

    pub fn is_tag(&self) -> bool {
        self.kind() == Some(RefKind::Tag)
    }

    pub fn is_head(&self) -> bool {
        self.kind() == Some(RefKind::Head)
    }

    pub fn is_raw(&self) -> bool {
        self.sha == self.path
    }

    /// Short name: the path without its first two segments.
    ///
    /// `refs/heads/feature/x` is `feature/x`, `refs/remotes/origin/main` is
    /// `origin/main`. `HEAD` and raw refs are their own name.
    pub fn name(&self) -> &str {
        short_name(&self.path)
    }

    /// Remote a remote-tracking ref belongs to.
    pub fn remote(&self) -> Result<&str> {
        if !self.is_remote() {
            return Err(GitError::NotARemoteRef {
                path: self.path.clone(),
            });
        }
        self.path
            .splitn(4, '/')
            .nth(2)
            .ok_or_else(|| GitError::internal(format!("remote ref {} has no remote", self.path)))
    }

    /// Re-read the SHA from the ref's pointer file.
    ///
    /// HEAD and raw refs are left as they are. Packed refs, which have no
    /// loose file, are resolved through git instead.
    pub fn reload(&mut self) -> Result<()> {
        if self.is_head() || self.is_raw() {
            return Ok(());
        }

        let file = self.repo.git_dir().join(&self.path);
        let sha = match std::fs::read_to_string(&file) {
            Ok(contents) if !contents.starts_with("ref:") => contents.trim().to_string(),
            Ok(_) => self.resolve()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.resolve()?,
            Err(e) => return Err(GitError::io(file, e)),
        };

        if let Some(refs) = self.repo.lock_refs().get_mut() {
            if let Some(entry) = refs.get_mut(&self.path) {
                entry.sha.clone_from(&sha);
            }
        }
        self.sha = sha;
        Ok(())
    }

    fn resolve(&self) -> Result<String> {
        let out = self
            .repo
            .git(["rev-parse", "-q", "--verify"])
            .arg(&self.path)
            .run()?;
        if !out.success() {
            return Err(GitError::RefNotFound {
                name: self.path.clone(),
            });
        }
        Ok(out.stdout_str().trim().to_string())
    }

    /// Contents of the file at `path` (relative to the tree root) in this ref.
    pub fn cat(&self, path: &str) -> Result<Vec<u8>> {
        let listing = self
            .repo
            .git(["ls-tree", "--full-tree", self.sha.as_str(), "--", path])
            .run()?
            .into_result()?;
        let listing = listing.stdout_str();

        // <mode> SP <type> SP <object> TAB <path>
        let Some(line) = listing.lines().next() else {
            return Err(GitError::PathNotFound {
                path: path.to_string(),
                reference: self.path.clone(),
            });
        };
        let (meta, _) = line
            .split_once('\t')
            .ok_or_else(|| GitError::internal(format!("malformed ls-tree line {line:?}")))?;
        let mut fields = meta.split(' ');
        let (Some(_mode), Some(kind), Some(object)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(GitError::internal(format!("malformed ls-tree line {line:?}")));
        };
        if kind != "blob" {
            return Err(GitError::NotAFile {
                path: path.to_string(),
                reference: self.path.clone(),
            });
        }

        let out = self
            .repo
            .git(["cat-file", "blob", object])
            .run()?
            .into_result()?;
        Ok(out.stdout().to_vec())
    }
}

pub(crate) fn short_name(path: &str) -> &str {
    path.splitn(3, '/').last().unwrap_or(path)
}

/// Same path, same commit, same repository handle.
impl PartialEq for Ref<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.sha == other.sha && ptr::eq(self.repo, other.repo)
    }
}

impl Eq for Ref<'_> {}

impl fmt::Debug for Ref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("sha", &self.sha)
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for Ref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
