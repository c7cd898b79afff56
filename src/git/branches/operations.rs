use crate::git::{
    error::{GitError, Result},
    refs::model::{Ref, RefKind, HEAD, HEADS_PREFIX, TAGS_PREFIX},
    repository::core::GitRepo,
};

/// Starting point for a new branch or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefBase<'a> {
    /// An existing ref, passed to git by its full path.
    Ref { path: &'a str },
    /// Any expression git accepts as a start point (`main`, `HEAD~3`, a hash).
    Expr(&'a str),
}

impl RefBase<'_> {
    fn as_arg(&self) -> &str {
        match *self {
            RefBase::Ref { path } => path,
            RefBase::Expr(expr) => expr,
        }
    }
}

impl<'a, 'r> From<&'a Ref<'r>> for RefBase<'a> {
    fn from(r: &'a Ref<'r>) -> Self {
        RefBase::Ref { path: r.path() }
    }
}

impl<'a> From<&'a str> for RefBase<'a> {
    fn from(expr: &'a str) -> Self {
        RefBase::Expr(expr)
    }
}

impl<'a> From<&'a String> for RefBase<'a> {
    fn from(expr: &'a String) -> Self {
        RefBase::Expr(expr)
    }
}

impl GitRepo {
    /// Create `refs/heads/<name>` at `base`.
    pub fn create_branch<'a>(&self, name: &str, base: impl Into<RefBase<'a>>) -> Result<Ref<'_>> {
        self.make_ref(RefKind::Branch, name, base.into())
    }

    /// Create a lightweight `refs/tags/<name>` at `base`.
    pub fn create_tag<'a>(&self, name: &str, base: impl Into<RefBase<'a>>) -> Result<Ref<'_>> {
        self.make_ref(RefKind::Tag, name, base.into())
    }

    fn make_ref(&self, kind: RefKind, name: &str, base: RefBase<'_>) -> Result<Ref<'_>> {
        if name == HEAD || name.is_empty() || name.starts_with('-') {
            return Err(GitError::InvalidRefName {
                name: name.to_string(),
            });
        }
        let (command, path) = match kind {
            RefKind::Branch => ("branch", format!("{HEADS_PREFIX}{name}")),
            RefKind::Tag => ("tag", format!("{TAGS_PREFIX}{name}")),
            RefKind::Remote | RefKind::Head => {
                return Err(GitError::internal(format!("cannot create a {kind:?} ref")))
            }
        };

        let mut cache = self.lock_refs();
        if self.load_refs(&mut cache)?.contains_key(&path) {
            return Err(GitError::RefExists { name: path });
        }

        self.git([command, name, base.as_arg()])
            .run()?
            .into_result()?;

        cache.invalidate();
        let entry = self
            .load_refs(&mut cache)?
            .get(&path)
            .ok_or_else(|| GitError::internal(format!("{path} missing right after creation")))?;
        Ok(Ref::new(self, entry))
    }

    /// Check out anything git understands: a branch name, tag, or commit.
    pub fn checkout(&self, name: &str) -> Result<()> {
        let mut cache = self.lock_refs();
        let result = self.git(["checkout", "-q", name]).run();
        // HEAD moves even when the checkout half fails
        cache.invalidate();
        result?.into_result().map(|_| ())
    }
}

impl<'r> Ref<'r> {
    /// Create a branch starting at this ref.
    pub fn branch(&self, name: &str) -> Result<Ref<'r>> {
        self.repo().create_branch(name, self)
    }

    /// Tag this ref.
    pub fn tag(&self, name: &str) -> Result<Ref<'r>> {
        self.repo().create_tag(name, self)
    }

    /// Check out this ref. Branches are switched to; tags, remote refs and
    /// raw refs leave HEAD detached.
    pub fn checkout(&self) -> Result<()> {
        let target = match self.kind() {
            Some(RefKind::Branch) => self.name(),
            Some(RefKind::Tag | RefKind::Remote) => self.path(),
            Some(RefKind::Head) | None => self.sha(),
        };
        self.repo().checkout(target)
    }

    /// Delete a branch or tag.
    ///
    /// Remote-tracking refs and HEAD are never deletable. Branches that are
    /// not merged are refused by git.
    pub fn delete(self) -> Result<()> {
        let command = match self.kind() {
            Some(RefKind::Branch) => "branch",
            Some(RefKind::Tag) => "tag",
            Some(RefKind::Remote) => {
                return Err(GitError::NotDeletable {
                    path: self.path().to_string(),
                    reason: "remote refs are not locally deletable",
                })
            }
            Some(RefKind::Head) => {
                return Err(GitError::NotDeletable {
                    path: self.path().to_string(),
                    reason: "HEAD is never deletable",
                })
            }
            None => {
                return Err(GitError::internal(format!(
                    "{} is neither a branch nor a tag",
                    self.path()
                )))
            }
        };

        let repo = self.repo();
        let mut cache = repo.lock_refs();
        repo.git([command, "-d", self.name()]).run()?.into_result()?;
        if let Some(refs) = cache.get_mut() {
            refs.remove(self.path());
        }
        Ok(())
    }
}
