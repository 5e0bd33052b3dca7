//! Polling-based mapping file watcher.
//!
//! Checks the mapping file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (editors write in stages), then reloads the store and
//! sends the result via an mpsc channel. The receiver owns follow-up work such
//! as dropping cached results.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::defaults::{WATCHER_DEBOUNCE_MS, WATCHER_POLL_INTERVAL_MS};
use super::{ConfigStore, ReloadSummary};

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Mapping was successfully reloaded.
    Reloaded(ReloadSummary),
    /// Reload was attempted but failed (old snapshot remains active).
    Error(String),
}

/// Run the mapping file watcher loop.
///
/// Returns when the channel is closed or `cancel` fires.
pub async fn run_config_watcher(
    store: Arc<ConfigStore>,
    path: PathBuf,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
) {
    run_with_intervals(
        store,
        path,
        tx,
        cancel,
        Duration::from_millis(WATCHER_POLL_INTERVAL_MS),
        Duration::from_millis(WATCHER_DEBOUNCE_MS),
    )
    .await;
}

async fn run_with_intervals(
    store: Arc<ConfigStore>,
    path: PathBuf,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
    poll: Duration,
    debounce: Duration,
) {
    tracing::info!(path = %path.display(), "Mapping watcher started");

    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Mapping watcher cancelled");
                return;
            }
            () = tokio::time::sleep(poll) => {}
        }

        // File deleted or unreadable: keep the current snapshot and keep polling
        let Some(current) = get_mtime(&path) else {
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Mapping file not accessible, keeping current snapshot"
                );
                last_mtime = None;
            }
            continue;
        };

        if last_mtime == Some(current) {
            continue;
        }

        tokio::time::sleep(debounce).await;
        if get_mtime(&path) != Some(current) {
            // Still being written
            continue;
        }
        last_mtime = Some(current);

        let event = match store.reload_from(&path) {
            Ok(summary) => ConfigEvent::Reloaded(summary),
            Err(e) => {
                tracing::error!(error = %e, "Mapping hot-reload failed, keeping previous snapshot");
                ConfigEvent::Error(e.to_string())
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Mapping watcher channel closed, stopping");
            return;
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
