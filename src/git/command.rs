//! Process invoker for the git executable.
//!
//! Every repository operation is expressed as an argument vector run through
//! [`GitCommand`]. The invoker keeps no state between runs: each call is an
//! independent child process whose exit status and captured output streams
//! are handed back as a [`CommandOutput`].

use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::git::error::{GitError, Result};

/// Environment variable consulted by [`GitOptions::from_env`].
pub const GIT_PROGRAM_ENV: &str = "GITCMD_GIT";

/// How to run git: which executable, and extra environment for every call.
///
/// Resolved once and handed to the repository at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOptions {
    program: PathBuf,
    envs: Vec<(OsString, OsString)>,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitOptions {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
        }
    }

    /// Use `$GITCMD_GIT` as the program when set, else `git` from `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(GIT_PROGRAM_ENV) {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::default(),
        }
    }

    /// Add an environment variable passed to every invocation.
    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the program runs, returning its version banner.
    pub fn verify(&self) -> Result<String> {
        let out = self
            .command(None, ["--version"])
            .run()
            .map_err(|e| GitError::NotAvailable {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !out.success() {
            return Err(GitError::NotAvailable {
                program: self.program.clone(),
                message: out.stderr_str().trim().to_string(),
            });
        }

        Ok(out.stdout_str().trim().to_string())
    }

    /// Build a command running in `dir` (or the current directory).
    pub fn command<I, S>(&self, dir: Option<&Path>, args: I) -> GitCommand
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        GitCommand {
            program: self.program.clone(),
            args: args
                .into_iter()
                .map(|a| a.as_ref().to_os_string())
                .collect(),
            dir: dir.map(Path::to_path_buf),
            envs: self.envs.clone(),
        }
    }
}

/// A fully described invocation, cheap to clone and safe to move into a task.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl GitCommand {
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error; only a failure to start the process is an `Err`.
    pub fn run(&self) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        tracing::trace!(dir = ?self.dir, "running {}", self);

        let out = cmd.output().map_err(|source| GitError::Spawn {
            command: self.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            command: self.to_string(),
            code: out.status.code(),
            success: out.status.success(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    /// Async variant of [`GitCommand::run`]. The child is killed if the
    /// returned future is dropped before it completes.
    pub async fn run_async(&self) -> Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        tracing::trace!(dir = ?self.dir, "running {}", self);

        let out = cmd.output().await.map_err(|source| GitError::Spawn {
            command: self.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            command: self.to_string(),
            code: out.status.code(),
            success: out.status.success(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = self
            .program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy();
        write!(f, "{program}")?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Exit status and captured streams of one finished invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    command: String,
    code: Option<i32>,
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.success
    }

    /// Exit code, `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Both streams, stdout first, the way a failed merge or rebase is reported.
    pub fn combined(&self) -> String {
        format!("{}\n{}\n", self.stdout_str(), self.stderr_str())
    }

    /// Turn a non-zero exit into [`GitError::CommandFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    pub(crate) fn into_error(self) -> GitError {
        GitError::CommandFailed {
            stderr: self.stderr_str().trim().to_string(),
            command: self.command,
            code: self.code,
        }
    }
}
