//! Event-driven maintenance of a [`ProjectIndex`].
//!
//! File events go through one dispatcher task that hands each of them to the worker
//! owning that file. A worker applies its events strictly in arrival order, so edits
//! to one file never race each other, while different files proceed independently.

use crate::index::ProjectIndex;
use crate::model::Diagnostic;
use crate::project::FileId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const UPDATE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum FileEvent {
    /// New content for `file`. Without `text` the content is read from the project.
    Changed {
        file: FileId,
        text: Option<Arc<str>>,
        version: Option<i32>,
    },
    Created {
        file: FileId,
    },
    Deleted {
        file: FileId,
    },
    Renamed {
        from: FileId,
        to: FileId,
    },
}

impl FileEvent {
    pub fn changed(file: FileId, text: impl Into<Arc<str>>, version: Option<i32>) -> Self {
        FileEvent::Changed {
            file,
            text: Some(text.into()),
            version,
        }
    }

    pub fn reload(file: FileId) -> Self {
        FileEvent::Changed {
            file,
            text: None,
            version: None,
        }
    }
}

/// The diagnostics of one file after an event touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    pub file: FileId,
    pub diagnostics: Vec<Diagnostic>,
}

struct Job {
    file: FileId,
    action: Action,
    ack: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
enum Action {
    Load {
        text: Option<Arc<str>>,
        version: Option<i32>,
    },
    Remove,
    /// Handled by the worker of the old path so that the removal always lands first.
    Rename { to: FileId },
}

pub struct Engine {
    index: Arc<ProjectIndex>,
    jobs: mpsc::UnboundedSender<Job>,
    updates: broadcast::Sender<IndexUpdate>,
    cancel: CancellationToken,
    workers: Arc<AtomicUsize>,
}

impl Engine {
    /// Creates the engine and spawns its dispatcher. Must be called inside a Tokio
    /// runtime.
    pub fn new(index: Arc<ProjectIndex>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let cancel = CancellationToken::new();
        let workers = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher {
            index: index.clone(),
            updates: updates.clone(),
            cancel: cancel.clone(),
            live: workers.clone(),
        };
        spawn_dispatcher(dispatcher, rx);
        Self {
            index,
            jobs,
            updates,
            cancel,
            workers,
        }
    }

    /// Number of per-file workers currently running.
    pub fn active_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    pub fn index(&self) -> &Arc<ProjectIndex> {
        &self.index
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexUpdate> {
        self.updates.subscribe()
    }

    /// Kicks off the initial project load. The index reports ready when it finishes,
    /// and the diagnostics of every file that has some are broadcast.
    pub fn start(&self) -> JoinHandle<()> {
        let index = self.index.clone();
        let updates = self.updates.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = index.load_project(&cancel).await {
                tracing::warn!("Project load failed: {}", err);
            }
            for (file, diagnostics) in index.files_with_diagnostics() {
                let _ = updates.send(IndexUpdate { file, diagnostics });
            }
        })
    }

    /// Queues `event` without waiting for it to be applied.
    pub fn submit(&self, event: FileEvent) {
        self.send(job_for(event));
    }

    /// Queues `event` and resolves once it has been applied.
    pub async fn apply(&self, event: FileEvent) {
        let (tx, rx) = oneshot::channel();
        let mut job = job_for(event);
        job.ack = Some(tx);
        self.send(job);
        let _ = rx.await;
    }

    fn send(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            tracing::warn!("Event dropped: engine is shut down");
        }
    }

    /// Stops every worker and empties the index.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.index.clear();
        tracing::info!("Engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn job_for(event: FileEvent) -> Job {
    let (file, action) = match event {
        FileEvent::Changed {
            file,
            text,
            version,
        } => (file, Action::Load { text, version }),
        FileEvent::Created { file } => (
            file,
            Action::Load {
                text: None,
                version: None,
            },
        ),
        FileEvent::Deleted { file } => (file, Action::Remove),
        FileEvent::Renamed { from, to } => (from, Action::Rename { to }),
    };
    Job {
        file,
        action,
        ack: None,
    }
}

#[derive(Clone)]
struct Dispatcher {
    index: Arc<ProjectIndex>,
    updates: broadcast::Sender<IndexUpdate>,
    cancel: CancellationToken,
    live: Arc<AtomicUsize>,
}

struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
}

fn spawn_dispatcher(dispatcher: Dispatcher, mut rx: mpsc::UnboundedReceiver<Job>) {
    tokio::spawn(async move {
        let mut workers: HashMap<FileId, Worker> = HashMap::new();
        // Workers of removed files finishing their queue. A new worker for the same
        // file waits for the old one so that events keep their order.
        let mut retiring: HashMap<FileId, JoinHandle<()>> = HashMap::new();
        loop {
            tokio::select! {
                _ = dispatcher.cancel.cancelled() => break,
                job = rx.recv() => {
                    let Some(job) = job else { break };
                    retiring.retain(|_, handle| !handle.is_finished());
                    let file = job.file.clone();
                    let retire = matches!(job.action, Action::Remove | Action::Rename { .. });
                    let worker = workers.entry(file.clone()).or_insert_with(|| {
                        let previous = retiring.remove(&file);
                        spawn_worker(dispatcher.clone(), previous)
                    });
                    if let Err(mpsc::error::SendError(job)) = worker.jobs.send(job) {
                        tracing::debug!("Worker for {} is gone", job.file);
                    }
                    if retire {
                        // Dropping the sender lets the worker exit once its queue is empty.
                        if let Some(worker) = workers.remove(&file) {
                            retiring.insert(file, worker.handle);
                        }
                    }
                }
            }
        }
        tracing::debug!("Event dispatcher stopped");
    });
}

fn spawn_worker(dispatcher: Dispatcher, previous: Option<JoinHandle<()>>) -> Worker {
    let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
    dispatcher.live.fetch_add(1, Ordering::SeqCst);
    let task = tokio::spawn(async move {
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        loop {
            tokio::select! {
                _ = dispatcher.cancel.cancelled() => break,
                job = rx.recv() => {
                    let Some(job) = job else { break };
                    handle(&dispatcher.index, &dispatcher.updates, job).await;
                }
            }
        }
        dispatcher.live.fetch_sub(1, Ordering::SeqCst);
    });
    Worker { jobs, handle: task }
}

async fn handle(index: &ProjectIndex, updates: &broadcast::Sender<IndexUpdate>, job: Job) {
    let Job { file, action, ack } = job;
    match action {
        Action::Load { text, version } => {
            load(index, &file, text, version).await;
            publish(index, updates, file);
        }
        Action::Remove => {
            index.remove_file(&file);
            publish(index, updates, file);
        }
        Action::Rename { to } => {
            index.remove_file(&file);
            publish(index, updates, file);
            load(index, &to, None, None).await;
            publish(index, updates, to);
        }
    }
    for other in index.drain_touched() {
        publish(index, updates, other);
    }
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

async fn load(index: &ProjectIndex, file: &FileId, text: Option<Arc<str>>, version: Option<i32>) {
    let loaded = match text {
        Some(text) => Some((text, version)),
        None => match index.source().open_live(file).await {
            Ok(live) => Some((live.text, live.version)),
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", file, err);
                None
            }
        },
    };
    match loaded {
        Some((text, version)) => {
            let _ = index.load_or_refresh(file, text, version);
        }
        None => index.register(file.clone()),
    }
}

fn publish(index: &ProjectIndex, updates: &broadcast::Sender<IndexUpdate>, file: FileId) {
    // No receivers is fine: hosts subscribe only when they publish diagnostics.
    let _ = updates.send(IndexUpdate {
        diagnostics: index.diagnostics(&file),
        file,
    });
}
