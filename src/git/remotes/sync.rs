use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::git::{
    error::{GitError, Result},
    repository::core::GitRepo,
};

/// Remote name to whether its fetch succeeded.
pub type FetchMap = BTreeMap<String, bool>;

/// Outcome of fetching one remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchStatus {
    pub remote: String,
    pub ok: bool,
}

/// Aggregate outcome of [`GitRepo::fetch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// True only if every fetch succeeded.
    pub ok: bool,
    pub results: FetchMap,
}

/// Cooperative cancellation shared between a caller and a running fetch.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only ends on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl GitRepo {
    /// Fetch a single remote, tags included, blocking until done.
    pub fn fetch_remote(&self, remote: &str) -> Result<()> {
        let out = self.git(["fetch", "-q", "-t", remote]).run();
        self.reload_refs();
        out?.into_result()?;
        Ok(())
    }

    /// Fetch `remotes` concurrently, or every known remote when empty.
    ///
    /// One failed remote does not stop the others; see
    /// [`FetchReport::results`] for the per-remote outcome.
    pub async fn fetch(&self, remotes: &[&str]) -> Result<FetchReport> {
        self.fetch_with_cancel(remotes, &CancelToken::new()).await
    }

    /// [`GitRepo::fetch`] that gives up when `cancel` fires, killing the
    /// fetches still running.
    pub async fn fetch_with_cancel(
        &self,
        remotes: &[&str],
        cancel: &CancelToken,
    ) -> Result<FetchReport> {
        let remotes: Vec<String> = if remotes.is_empty() {
            self.remote_names()?
        } else {
            remotes.iter().map(|r| r.to_string()).collect()
        };
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let (tx, mut rx) = mpsc::channel(remotes.len().max(1));
        let handles: Vec<_> = remotes
            .iter()
            .map(|remote| {
                let cmd = self.git(["fetch", "-q", "-t", remote.as_str()]);
                let tx = tx.clone();
                let remote = remote.clone();
                tokio::spawn(async move {
                    let ok = match cmd.run_async().await {
                        Ok(out) => {
                            if !out.success() {
                                tracing::debug!(%remote, stderr = %out.stderr_str().trim(), "fetch failed");
                            }
                            out.success()
                        }
                        Err(e) => {
                            tracing::warn!(%remote, error = %e, "could not run fetch");
                            false
                        }
                    };
                    let _ = tx.send(FetchStatus { remote, ok }).await;
                })
            })
            .collect();
        drop(tx);

        let mut results = FetchMap::new();
        let mut all_ok = true;
        let mut received = 0;
        while received < remotes.len() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    for handle in &handles {
                        handle.abort();
                    }
                    self.reload_refs();
                    return Err(GitError::Cancelled);
                }
                status = rx.recv() => match status {
                    Some(FetchStatus { remote, ok }) => {
                        received += 1;
                        all_ok &= ok;
                        results.insert(remote, ok);
                    }
                    // Every worker is gone
                    None => break,
                },
            }
        }

        // A worker that died without reporting counts as a failure
        for remote in remotes {
            results.entry(remote).or_insert_with(|| {
                all_ok = false;
                false
            });
        }
        self.reload_refs();

        Ok(FetchReport {
            ok: all_ok,
            results,
        })
    }
}
