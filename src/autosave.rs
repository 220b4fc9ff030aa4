//! Debounced background saving.
//!
//! Each [`AutoSaver::schedule`] replaces the pending snapshot and restarts the
//! quiet window; the store is called once the window passes with no newer
//! snapshot. Only the latest grid is ever written.

use crate::error::StoreError;
use crate::grid::Grid;
use crate::saving::SheetStore;
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
    pub quiet_window: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        AutoSaveConfig {
            quiet_window: Duration::from_millis(2000),
        }
    }
}

enum Command {
    Schedule(Box<Grid>),
    Flush(oneshot::Sender<Result<(), StoreError>>),
    Shutdown(oneshot::Sender<Result<(), StoreError>>),
}

#[derive(Default)]
struct Stats {
    saves: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

pub struct AutoSaver {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<Stats>,
    task: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Start the save task. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn SheetStore>, sheet_id: impl Into<String>, config: AutoSaveConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Stats::default());
        let worker = Worker {
            store,
            sheet_id: sheet_id.into(),
            quiet_window: config.quiet_window,
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(worker.run(rx));
        AutoSaver {
            tx,
            stats,
            task: Some(task),
        }
    }

    /// Replace the pending snapshot and restart the quiet window.
    pub fn schedule(&self, grid: Grid) {
        if self.tx.send(Command::Schedule(Box::new(grid))).is_err() {
            warn!("autosave task is not running, snapshot dropped");
        }
    }

    /// Save the pending snapshot now, if any.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| StoreError::Task("autosave task stopped".to_string()))?;
        response
            .await
            .map_err(|_| StoreError::Task("autosave task stopped".to_string()))?
    }

    /// Stop the task without saving. A pending snapshot is discarded.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("autosave cancelled");
        }
    }

    /// Save anything pending and stop the task.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::Shutdown(reply)).is_err() {
            return Err(StoreError::Task("autosave task stopped".to_string()));
        }
        let result = response
            .await
            .map_err(|_| StoreError::Task("autosave task stopped".to_string()))?;
        task.await.map_err(|e| StoreError::Task(e.to_string()))?;
        result
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.stats.saves.load(Ordering::SeqCst)
    }

    /// Message of the most recent failed save, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.stats.last_error.lock().ok().and_then(|e| e.clone())
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Worker {
    store: Arc<dyn SheetStore>,
    sheet_id: String,
    quiet_window: Duration,
    stats: Arc<Stats>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<(Grid, Instant)> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            let command = match deadline {
                Some(at) => tokio::select! {
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(at) => {
                        if let Some((grid, _)) = pending.take() {
                            // failures are recorded in stats
                            let _ = self.save(grid).await;
                        }
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            match command {
                Some(Command::Schedule(grid)) => {
                    pending = Some((*grid, Instant::now() + self.quiet_window));
                }
                Some(Command::Flush(reply)) => {
                    let result = self.save_pending(&mut pending).await;
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown(reply)) => {
                    let result = self.save_pending(&mut pending).await;
                    let _ = reply.send(result);
                    break;
                }
                None => break,
            }
        }
        debug!("autosave task for {} stopped", self.sheet_id);
    }

    async fn save_pending(&self, pending: &mut Option<(Grid, Instant)>) -> Result<(), StoreError> {
        match pending.take() {
            Some((grid, _)) => self.save(grid).await,
            None => Ok(()),
        }
    }

    async fn save(&self, grid: Grid) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let sheet_id = self.sheet_id.clone();
        let result = tokio::task::spawn_blocking(move || store.save(&sheet_id, &grid, &grid.columns))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))
            .and_then(|saved| saved);

        let mut last_error = self.stats.last_error.lock().ok();
        match &result {
            Ok(()) => {
                self.stats.saves.fetch_add(1, Ordering::SeqCst);
                debug!("autosaved sheet {}", self.sheet_id);
                if let Some(slot) = last_error.as_mut() {
                    **slot = None;
                }
            }
            Err(err) => {
                warn!("autosave of sheet {} failed: {}", self.sheet_id, err);
                if let Some(slot) = last_error.as_mut() {
                    **slot = Some(err.to_string());
                }
            }
        }
        result
    }
}
