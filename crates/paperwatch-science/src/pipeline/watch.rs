use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use paperwatch_core::{Debouncer, NoteWatcher, WatchEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Watch the root and process each changed note until `shutdown` flips
    /// to `true` (or its sender is dropped).
    ///
    /// Every settled note runs as its own task, so a slow note never holds
    /// up another. A note that changes again while its pass is running is
    /// queued for one more pass afterwards. Our own rewrites are recognised
    /// by content and not processed again.
    pub async fn run_continuous(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let filter = self.note_filter();
        let (watcher, raw_rx) = NoteWatcher::start(filter)?;
        let mut events = bridge(raw_rx);

        let window = Duration::from_millis(self.config.watch.debounce_ms);
        let mut debouncer = Debouncer::new(window);
        let mut in_flight: HashSet<PathBuf> = HashSet::new();
        let mut requeue: HashSet<PathBuf> = HashSet::new();
        let mut tasks: JoinSet<PathBuf> = JoinSet::new();

        info!(root = %self.config.root.display(), "watching for note changes");

        loop {
            let deadline = debouncer.next_deadline().map(Instant::from_std);

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested");
                        break;
                    }
                }

                event = events.recv() => match event {
                    Some(WatchEvent::NoteChanged { path }) => {
                        if self.is_own_write(&path).await {
                            debug!(path = %path.display(), "ignoring our own rewrite");
                        } else {
                            debouncer.push(path, std::time::Instant::now());
                        }
                    }
                    Some(WatchEvent::NoteRemoved { path }) => {
                        debouncer.cancel(&path);
                        requeue.remove(&path);
                        self.forget(&path).await;
                    }
                    None => {
                        error!("file watcher stopped");
                        break;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    for path in debouncer.drain_ready(std::time::Instant::now()) {
                        if in_flight.contains(&path) {
                            debug!(path = %path.display(), "pass already running, queued");
                            requeue.insert(path);
                        } else {
                            in_flight.insert(path.clone());
                            spawn_pass(&mut tasks, self.clone(), path);
                        }
                    }
                }

                Some(joined) = tasks.join_next() => match joined {
                    Ok(path) => {
                        in_flight.remove(&path);
                        if requeue.remove(&path) {
                            in_flight.insert(path.clone());
                            spawn_pass(&mut tasks, self.clone(), path);
                        }
                    }
                    Err(e) => error!(error = %e, "note task failed"),
                },
            }
        }

        if !tasks.is_empty() {
            info!(running = tasks.len(), "abandoning in-flight passes");
        }
        tasks.shutdown().await;
        drop(watcher);
        Ok(())
    }
}

fn spawn_pass(tasks: &mut JoinSet<PathBuf>, pipeline: Arc<Pipeline>, path: PathBuf) {
    tasks.spawn(async move {
        match pipeline.process_file(&path).await {
            Ok(report) if !report.is_noop() => info!(
                path = %path.display(),
                rewritten = report.rewritten,
                deferred = report.deferred.len(),
                "note processed"
            ),
            Ok(_) => debug!(path = %path.display(), "nothing to do"),
            Err(e) => warn!(path = %path.display(), error = %e, "note skipped"),
        }
        path
    });
}

/// Forward the watcher's blocking channel into the runtime.
fn bridge(raw_rx: std::sync::mpsc::Receiver<WatchEvent>) -> mpsc::UnboundedReceiver<WatchEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = raw_rx.recv() {
            if tx.send(event).is_err() {
                break;
            }
        }
    });
    rx
}
