use std::fmt;

use serde::Serialize;

use crate::git::{
    error::{GitError, Result},
    repository::core::GitRepo,
};

/// State of a path in the index or the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Unmodified,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
    Untracked,
    Ignored,
}

impl FileState {
    /// Map one column of a porcelain status code.
    pub fn from_code(code: char) -> Option<Self> {
        let state = match code {
            ' ' => FileState::Unmodified,
            // Type changes are reported as plain modifications
            'M' | 'T' => FileState::Modified,
            'A' => FileState::Added,
            'D' => FileState::Deleted,
            'R' => FileState::Renamed,
            'C' => FileState::Copied,
            'U' => FileState::Unmerged,
            '?' => FileState::Untracked,
            '!' => FileState::Ignored,
            _ => return None,
        };
        Some(state)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Unmodified => "unmodified",
            FileState::Modified => "modified",
            FileState::Added => "added",
            FileState::Deleted => "deleted",
            FileState::Renamed => "renamed",
            FileState::Copied => "copied",
            FileState::Unmerged => "unmerged",
            FileState::Untracked => "untracked",
            FileState::Ignored => "ignored",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `git status --porcelain`.
///
/// Renames and copies carry distinct old and new paths; every other entry
/// has `old_path == new_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub index_state: FileState,
    pub work_state: FileState,
    pub old_path: String,
    pub new_path: String,
}

impl StatusLine {
    pub fn is_rename(&self) -> bool {
        self.old_path != self.new_path
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index_state == FileState::Renamed {
            writeln!(f, "{} was renamed to {}", self.old_path, self.new_path)?;
        }
        write!(
            f,
            "{} is {} in the index and {} in the working tree.",
            self.new_path, self.index_state, self.work_state
        )
    }
}

/// Parse the NUL-separated output of `git status --porcelain -z`.
///
/// Each record is `XY <path>`; when either column is a rename or copy the
/// following record holds the original path.
pub fn parse_status(output: &[u8]) -> Result<Vec<StatusLine>> {
    let mut lines = Vec::new();
    let mut records = output
        .split(|b| *b == 0)
        .filter(|record| !record.is_empty())
        .map(String::from_utf8_lossy);

    while let Some(record) = records.next() {
        let mut chars = record.chars();
        let (Some(x), Some(y), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
            return Err(GitError::internal(format!("malformed status record {record:?}")));
        };
        let path = chars.as_str().to_string();

        let (Some(index_state), Some(work_state)) = (FileState::from_code(x), FileState::from_code(y))
        else {
            return Err(GitError::internal(format!("unknown status code {x}{y}")));
        };

        let moved = |s: FileState| matches!(s, FileState::Renamed | FileState::Copied);
        let old_path = if moved(index_state) || moved(work_state) {
            records
                .next()
                .map(|old| old.into_owned())
                .ok_or_else(|| GitError::internal(format!("rename of {path} has no source path")))?
        } else {
            path.clone()
        };

        lines.push(StatusLine {
            index_state,
            work_state,
            old_path,
            new_path: path,
        });
    }

    Ok(lines)
}

impl GitRepo {
    /// Status of the working tree, untracked files included.
    pub fn status(&self) -> Result<Vec<StatusLine>> {
        let out = self
            .git(["status", "--porcelain", "-z"])
            .run()?
            .into_result()?;
        parse_status(out.stdout())
    }

    /// Check for uncommitted or untracked changes.
    pub fn is_clean(&self) -> Result<(bool, Vec<StatusLine>)> {
        let lines = self.status()?;
        Ok((lines.is_empty(), lines))
    }
}
