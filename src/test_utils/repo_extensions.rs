use std::path::{Path, PathBuf};

use anyhow::{Context, Error};

use crate::git::{GitOptions, GitRepo};

/// Options that keep git away from the user's and the system's config.
pub fn test_options(dir: &Path) -> GitOptions {
    test_options_for("git", dir)
}

/// Like [`test_options`] but running `program` instead of `git`.
pub fn test_options_for<P: Into<PathBuf>>(program: P, dir: &Path) -> GitOptions {
    GitOptions::new(program)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", dir.join(".test-global-gitconfig"))
}

/// Write an executable shell script that runs `prelude` and then hands its
/// arguments to the real git.
#[cfg(unix)]
pub fn fake_git(dir: &Path, prelude: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-git");
    std::fs::write(&script, format!("#!/bin/sh\n{prelude}\nexec git \"$@\"\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// Create a new temporary repository for testing with user config set up
pub fn create_test_repo() -> (assert_fs::TempDir, GitRepo) {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let path = temp_dir.path();
    let repo = GitRepo::init_with(path, ["--initial-branch=master"], test_options(path)).unwrap();
    repo.config_set("user.name", "Test User").unwrap();
    repo.config_set("user.email", "test@example.com").unwrap();
    (temp_dir, repo)
}

/// Create a new temporary bare repository for testing
pub fn create_test_bare_repo() -> (assert_fs::TempDir, GitRepo) {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let path = temp_dir.path();
    let repo = GitRepo::init_with(
        path,
        ["--bare", "--initial-branch=master"],
        test_options(path),
    )
    .unwrap();
    (temp_dir, repo)
}

/// Test-only trait that adds assertion methods to GitRepo
///
/// Assertions read the repository through git2 so they do not depend on the
/// code under test.
pub trait RepoAssertions {
    /// Assert that HEAD's symbolic target matches the expected value
    fn assert_head_symbolic_target(&self, expected_target: &str) -> &Self;

    /// Assert that the current branch matches the expected branch name
    fn assert_current_branch(&self, branch_name: &str) -> &Self;

    /// Assert that a file exists in the repository
    fn assert_file_exists(&self, filename: &str) -> &Self;

    /// Assert that commit messages match the expected order (newest first)
    fn assert_commit_messages(&self, expected_messages: &[&str]) -> &Self;
}

/// Test-only trait that adds test helper operations to GitRepo
pub trait RepoTestOperations {
    /// Add a file with content (fluent)
    fn add_file(&self, filename: &str, content: &str) -> Result<&Self, Error>;

    /// Append content to an existing file (fluent)
    fn append_to_file(&self, filename: &str, content: &str) -> Result<&Self, Error>;

    /// Stage everything and commit it
    fn commit_all(&self, message: &str) -> Result<&Self, Error>;

    /// Add a file and commit in one operation (fluent)
    fn add_file_and_commit(
        &self,
        filename: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<&Self, Error>;

    /// Add a remote pointing to another local GitRepo
    fn add_local_remote(&self, name: &str, other_repo: &GitRepo) -> Result<(), Error>;

    /// Push a branch to a remote
    fn push(&self, remote_name: &str, branch_name: &str) -> Result<(), Error>;
}

impl RepoAssertions for GitRepo {
    fn assert_head_symbolic_target(&self, expected_target: &str) -> &Self {
        let repo = git2::Repository::open(self.git_dir()).unwrap();
        let head = repo.find_reference("HEAD").unwrap();
        match head.symbolic_target() {
            Some(actual_target) => {
                if actual_target != expected_target {
                    panic!(
                        "HEAD symbolic target mismatch. Expected: '{expected_target}', Found: '{actual_target}'"
                    );
                }
            }
            None => panic!("HEAD is detached, expected it to point at '{expected_target}'"),
        }
        self
    }

    fn assert_current_branch(&self, branch_name: &str) -> &Self {
        let expected_target = format!("refs/heads/{branch_name}");
        self.assert_head_symbolic_target(&expected_target);
        self
    }

    fn assert_file_exists(&self, filename: &str) -> &Self {
        let file_path = self.path().join(filename);
        if !file_path.exists() {
            panic!("Expected file '{filename}' to exist at path: {file_path:?}");
        }
        self
    }

    fn assert_commit_messages(&self, expected_messages: &[&str]) -> &Self {
        let repo = git2::Repository::open(self.git_dir()).unwrap();
        let mut messages = Vec::new();
        if let Ok(head) = repo.head() {
            let mut walk = repo.revwalk().unwrap();
            walk.push(head.target().unwrap()).unwrap();
            for oid in walk {
                let commit = repo.find_commit(oid.unwrap()).unwrap();
                messages.push(commit.summary().unwrap_or_default().to_string());
            }
        }

        if messages != expected_messages {
            panic!("Commit messages mismatch. Expected: {expected_messages:?}, Found: {messages:?}");
        }
        self
    }
}

impl RepoTestOperations for GitRepo {
    fn add_file(&self, filename: &str, content: &str) -> Result<&Self, Error> {
        let file_path = self.path().join(filename);
        std::fs::write(file_path, content)
            .context(format!("Failed to write file '{filename}'"))?;
        Ok(self)
    }

    fn append_to_file(&self, filename: &str, content: &str) -> Result<&Self, Error> {
        let file_path = self.path().join(filename);

        let mut existing_content = std::fs::read_to_string(&file_path)
            .context(format!("Failed to read existing file '{filename}'"))?;

        // Add newline if file doesn't end with one
        if !existing_content.is_empty() && !existing_content.ends_with('\n') {
            existing_content.push('\n');
        }
        existing_content.push_str(content);

        std::fs::write(&file_path, existing_content)
            .context(format!("Failed to write to file '{filename}'"))?;

        Ok(self)
    }

    fn commit_all(&self, message: &str) -> Result<&Self, Error> {
        self.git(["add", "-A"]).run()?.into_result()?;
        self.git(["commit", "-q", "-m", message])
            .run()?
            .into_result()
            .context(format!("Failed to commit '{message}'"))?;
        self.reload_refs();
        Ok(self)
    }

    fn add_file_and_commit(
        &self,
        filename: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<&Self, Error> {
        self.add_file(filename, content)?;
        self.git(["add", "--", filename]).run()?.into_result()?;
        self.git(["commit", "-q", "-m", commit_message])
            .run()?
            .into_result()
            .context(format!("Failed to commit '{commit_message}'"))?;
        // Commits move HEAD and the branch behind the ref cache's back
        self.reload_refs();
        Ok(self)
    }

    fn add_local_remote(&self, name: &str, other_repo: &GitRepo) -> Result<(), Error> {
        let remote_path = other_repo
            .path()
            .to_str()
            .context("Failed to convert remote repository path to string")?;

        Ok(self.add_remote(name, remote_path)?)
    }

    fn push(&self, remote_name: &str, branch_name: &str) -> Result<(), Error> {
        self.git(["push", "-q", remote_name, branch_name])
            .run()?
            .into_result()
            .context(format!("Failed to push '{branch_name}' to '{remote_name}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{create_test_repo, RepoAssertions, RepoTestOperations};

    #[test]
    fn add_local_remote_works() {
        let (_local_dir, local_repo) = create_test_repo();
        let (remote_dir, remote_repo) = create_test_repo();

        assert_eq!(local_repo.remotes().unwrap().len(), 0);

        local_repo.add_local_remote("origin", &remote_repo).unwrap();

        let remotes = local_repo.remotes().unwrap();
        assert_eq!(remotes.len(), 1);
        assert_eq!(
            remotes["origin"],
            remote_dir.path().canonicalize().unwrap().to_str().unwrap()
        );
    }

    #[test]
    fn append_to_file_works() {
        let (_temp_dir, repo) = create_test_repo();

        repo.add_file("test.txt", "line1").unwrap();
        repo.append_to_file("test.txt", "line2").unwrap();

        let content = std::fs::read_to_string(repo.path().join("test.txt")).unwrap();
        assert_eq!(content, "line1\nline2");
        assert!(repo.append_to_file("missing.txt", "x").is_err());
    }

    #[test]
    fn assert_commit_messages_works() {
        let (_temp_dir, repo) = create_test_repo();
        repo.assert_commit_messages(&[]);

        repo.add_file_and_commit("one.txt", "1", "Test commit 1")
            .unwrap();
        repo.add_file("two.txt", "2").unwrap().commit_all("Test commit 2").unwrap();

        repo.assert_commit_messages(&["Test commit 2", "Test commit 1"]);
    }
}
