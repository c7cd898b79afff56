use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::git::{
    command::{GitCommand, GitOptions},
    config::parse::ConfigMap,
    error::{GitError, Result},
    refs::cache::RefMap,
    repository::cache::Cache,
};

/// Handle on a repository driven through the git executable.
///
/// Holds the control directory, the optional working tree (absent for bare
/// repositories), the invocation options, and lazily loaded config and ref
/// caches. Each cache sits behind its own lock; mutators hold it for the
/// duration of the external call they make.
#[derive(Debug)]
pub struct GitRepo {
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
    options: GitOptions,
    pub(crate) config: Mutex<Cache<ConfigMap>>,
    pub(crate) refs: Mutex<Cache<RefMap>>,
}

impl GitRepo {
    /// Open the first git repository that owns `path` (searching upwards)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, GitOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: GitOptions) -> Result<Self> {
        options.verify()?;

        let start = if path.as_ref().as_os_str().is_empty() {
            Path::new(".")
        } else {
            path.as_ref()
        };
        let start = start.canonicalize().map_err(|e| GitError::io(start, e))?;

        for dir in start.ancestors() {
            if let Some((git_dir, work_dir)) = find_repo(dir)? {
                tracing::debug!(git_dir = %git_dir.display(), "opened repository");
                return Ok(Self::from_parts(git_dir, work_dir, options));
            }
        }

        Err(GitError::NotARepo { path: start })
    }

    /// Initialize a new repository at `path`
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init_with(path, &[] as &[&str], GitOptions::default())
    }

    /// Initialize with extra `git init` arguments (e.g. `--bare`).
    pub fn init_with<P, I, S>(path: P, args: I, options: GitOptions) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        options.verify()?;
        options
            .command(None, ["init", "-q"])
            .args(args)
            .arg(path.as_ref())
            .run()?
            .into_result()?;

        Self::open_with(path, options)
    }

    /// Clone `source` into `target`
    pub fn clone_repo<P: AsRef<Path>>(source: &str, target: P) -> Result<Self> {
        Self::clone_with(source, target, &[] as &[&str], GitOptions::default())
    }

    pub fn clone_with<P, I, S>(source: &str, target: P, args: I, options: GitOptions) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        options.verify()?;
        options
            .command(None, ["clone", "-q"])
            .args(args)
            .arg(source)
            .arg(target.as_ref())
            .run()?
            .into_result()?;

        Self::open_with(target, options)
    }

    fn from_parts(git_dir: PathBuf, work_dir: Option<PathBuf>, options: GitOptions) -> Self {
        Self {
            git_dir,
            work_dir,
            options,
            config: Mutex::new(Cache::default()),
            refs: Mutex::new(Cache::default()),
        }
    }

    /// Best idea of the repository location: the working tree, or the
    /// control directory of a bare repository.
    pub fn path(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.git_dir)
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// Check if this is a bare repository
    pub fn is_bare(&self) -> bool {
        self.work_dir.is_none()
    }

    pub fn options(&self) -> &GitOptions {
        &self.options
    }

    /// Build a git invocation scoped to this repository.
    pub fn git<I, S>(&self, args: I) -> GitCommand
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.options.command(Some(self.path()), args)
    }

    pub(crate) fn lock_config(&self) -> MutexGuard<'_, Cache<ConfigMap>> {
        // A poisoned cache is still a valid cache; at worst it is reloaded.
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_refs(&self) -> MutexGuard<'_, Cache<RefMap>> {
        self.refs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decide whether `dir` itself owns a repository.
fn find_repo(dir: &Path) -> Result<Option<(PathBuf, Option<PathBuf>)>> {
    let dot_git = dir.join(".git");

    if dot_git.join("config").is_file() {
        return Ok(Some((dot_git, Some(dir.to_path_buf()))));
    }

    // Linked worktrees and submodules use a `.git` file pointing elsewhere
    if dot_git.is_file() {
        let contents = std::fs::read_to_string(&dot_git).map_err(|e| GitError::io(&dot_git, e))?;
        if let Some(target) = contents.trim().strip_prefix("gitdir:") {
            let target = dir.join(target.trim());
            return Ok(Some((target, Some(dir.to_path_buf()))));
        }
    }

    if is_control_dir(dir) {
        return Ok(Some((dir.to_path_buf(), None)));
    }

    Ok(None)
}

fn is_control_dir(dir: &Path) -> bool {
    dir.join("HEAD").is_file() && dir.join("config").is_file() && dir.join("objects").is_dir()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        git::GitRepo,
        test_utils::{create_test_bare_repo, create_test_repo, test_options, RepoAssertions},
    };

    #[test]
    fn open_works() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let path = temp_dir.path();
        git2::Repository::init(path).unwrap();

        let repo = GitRepo::open_with(path, test_options(path)).unwrap();

        assert_eq!(repo.path(), path.canonicalize().unwrap().as_path());
        assert_eq!(repo.git_dir(), repo.path().join(".git").as_path());
        assert!(!repo.is_bare());
    }

    #[test]
    fn open_walks_up_to_owning_repository() {
        let (temp_dir, _repo) = create_test_repo();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let repo = GitRepo::open_with(&nested, test_options(temp_dir.path())).unwrap();

        assert_eq!(repo.work_dir(), Some(temp_dir.path().canonicalize().unwrap().as_path()));
    }

    #[test]
    fn open_fails_in_non_git_folder() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let path = temp_dir.path();
        let err = GitRepo::open_with(path, test_options(path)).unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn init_works() {
        let (temp_dir, repo) = create_test_repo();

        assert_eq!(repo.path(), temp_dir.path().canonicalize().unwrap().as_path());
        assert_eq!(repo.branches().unwrap().len(), 0);
        repo.assert_current_branch("master");
    }

    #[test]
    fn init_bare_works() {
        let (temp_dir, repo) = create_test_bare_repo();

        assert!(repo.is_bare());
        assert_eq!(repo.work_dir(), None);
        assert_eq!(repo.git_dir(), temp_dir.path().canonicalize().unwrap().as_path());
        assert_eq!(repo.path(), repo.git_dir());
    }

    #[test]
    fn clone_works() {
        use crate::test_utils::RepoTestOperations;

        let (_source_dir, source) = create_test_repo();
        source
            .add_file_and_commit("README.md", "hello", "Initial commit")
            .unwrap();
        let target_dir = assert_fs::TempDir::new().unwrap();
        let target = target_dir.path().join("clone");

        let clone = GitRepo::clone_with(
            source.path().to_str().unwrap(),
            &target,
            ["--origin", "upstream"],
            test_options(target_dir.path()),
        )
        .unwrap();

        assert!(clone.has_remote("upstream").unwrap());
        assert!(clone.has_ref("refs/remotes/upstream/master").unwrap());
        clone.assert_file_exists("README.md");
    }
}
