//! Worker pool and per-channel request routing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::ledger::{PendingLedger, RequestAction, Size};
use crate::mipmap::{ChannelKey, Mipmap, MipmapSource};

/// Errors raised by the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Failed to spawn mipmap worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Worker pool is not running")]
    NotRunning,
    #[error("Mipmap worker {0} disconnected")]
    WorkerDisconnected(usize),
}

/// Pool sizing and backlog limits.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub worker_count: usize,
    /// Ready results kept per channel while no surface is registered for it.
    pub max_backlog: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_backlog: 4,
        }
    }
}

/// Number of workers derived from the available hardware concurrency.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

/// Outcome of [`WorkerCoordinator::request_mipmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// A message went to the channel's worker.
    Sent,
    /// Stored as the channel's next request.
    Queued,
    /// Same size already in flight or queued.
    Duplicate,
    /// Same size already adopted; nothing to fetch.
    Cached,
}

/// Notifications produced by [`WorkerCoordinator::poll`].
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A mipmap of the currently desired size is ready for the channel.
    MipmapReady {
        key: ChannelKey,
        mipmap: Arc<Mipmap>,
    },
    /// The source could not produce the requested level.
    Unavailable {
        key: ChannelKey,
        width: u32,
        height: u32,
    },
}

impl CoordinatorEvent {
    pub fn key(&self) -> ChannelKey {
        match self {
            CoordinatorEvent::MipmapReady { key, .. } | CoordinatorEvent::Unavailable { key, .. } => {
                *key
            }
        }
    }
}

enum WorkerMessage {
    Produce {
        key: ChannelKey,
        generation: u64,
        width: u32,
        height: u32,
    },
    Shutdown,
}

struct WorkerResult {
    key: ChannelKey,
    generation: u64,
    size: Size,
    mipmap: Option<Arc<Mipmap>>,
}

struct WorkerHandle {
    tx: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

/// Routes mipmap requests to a fixed pool of worker threads.
pub struct WorkerCoordinator {
    config: CoordinatorConfig,
    source: Arc<dyn MipmapSource>,
    workers: Vec<WorkerHandle>,
    stop: Arc<AtomicBool>,
    results_rx: Receiver<WorkerResult>,
    ledger: PendingLedger<ChannelKey>,
    adopted: HashMap<ChannelKey, Size>,
    surfaces: HashSet<ChannelKey>,
    backlog: HashMap<ChannelKey, VecDeque<Arc<Mipmap>>>,
    /// Bumped whenever a channel's state is dropped; results carrying an
    /// older generation belong to requests that no longer exist.
    generations: HashMap<ChannelKey, u64>,
    messages_sent: u64,
}

impl WorkerCoordinator {
    /// Spawn the worker pool.
    pub fn init(
        config: CoordinatorConfig,
        source: Arc<dyn MipmapSource>,
    ) -> Result<Self, CoordinatorError> {
        let (_, results_rx) = channel::unbounded();
        let mut coordinator = Self {
            config,
            source,
            workers: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            results_rx,
            ledger: PendingLedger::new(),
            adopted: HashMap::new(),
            surfaces: HashSet::new(),
            backlog: HashMap::new(),
            generations: HashMap::new(),
            messages_sent: 0,
        };
        coordinator.spawn_workers()?;
        Ok(coordinator)
    }

    fn spawn_workers(&mut self) -> Result<(), CoordinatorError> {
        let count = self.config.worker_count.max(1);
        let (results_tx, results_rx) = channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(count);

        for index in 0..count {
            let (tx, rx) = channel::unbounded();
            let results_tx = results_tx.clone();
            let source = Arc::clone(&self.source);
            let worker_stop = Arc::clone(&stop);
            let spawned = thread::Builder::new()
                .name(format!("mipmap-worker-{}", index))
                .spawn(move || worker_thread(index, rx, results_tx, source, worker_stop));
            match spawned {
                Ok(handle) => workers.push(WorkerHandle {
                    tx,
                    handle: Some(handle),
                }),
                Err(err) => {
                    stop.store(true, Ordering::Release);
                    shutdown_workers(&mut workers);
                    return Err(err.into());
                }
            }
        }

        log::info!("Mipmap worker pool started with {} workers", count);
        self.workers = workers;
        self.stop = stop;
        self.results_rx = results_rx;
        Ok(())
    }

    /// Stop and join every worker. Outstanding requests are abandoned.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        shutdown_workers(&mut self.workers);
        self.ledger.clear();
        log::info!("Mipmap worker pool shut down");
    }

    /// Tear down and re-create the pool, forgetting all channel state.
    pub fn reset(&mut self) -> Result<(), CoordinatorError> {
        self.shutdown();
        self.ledger.clear();
        self.adopted.clear();
        self.surfaces.clear();
        self.backlog.clear();
        for generation in self.generations.values_mut() {
            *generation += 1;
        }
        self.spawn_workers()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Total produce messages sent to workers since init.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Ask for `key` at `width x height`.
    pub fn request_mipmap(
        &mut self,
        key: ChannelKey,
        width: u32,
        height: u32,
    ) -> Result<RequestStatus, CoordinatorError> {
        if self.workers.is_empty() {
            return Err(CoordinatorError::NotRunning);
        }
        let size = (width, height);
        if self.ledger.state(key).desired().is_none() && self.adopted.get(&key) == Some(&size) {
            return Ok(RequestStatus::Cached);
        }
        match self.ledger.request(key, size) {
            RequestAction::Send(size) => {
                self.send(key, size)?;
                Ok(RequestStatus::Sent)
            }
            RequestAction::Queued(_) => Ok(RequestStatus::Queued),
            RequestAction::Duplicate => Ok(RequestStatus::Duplicate),
        }
    }

    fn generation(&self, key: ChannelKey) -> u64 {
        self.generations.get(&key).copied().unwrap_or(0)
    }

    fn send(&mut self, key: ChannelKey, (width, height): Size) -> Result<(), CoordinatorError> {
        let generation = self.generation(key);
        let index = key.worker_index(self.workers.len());
        let worker = self
            .workers
            .get(index)
            .ok_or(CoordinatorError::NotRunning)?;
        if worker
            .tx
            .send(WorkerMessage::Produce {
                key,
                generation,
                width,
                height,
            })
            .is_err()
        {
            self.ledger.forget(key);
            return Err(CoordinatorError::WorkerDisconnected(index));
        }
        self.messages_sent += 1;
        log::trace!("Requested {}x{} for {} on worker {}", width, height, key, index);
        Ok(())
    }

    /// Drain finished results without blocking.
    pub fn poll(&mut self) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.results_rx.try_recv() {
            self.handle_result(result, &mut events);
        }
        events
    }

    /// Wait up to `timeout` for the first result, then drain the rest.
    ///
    /// Not meant for the frame callback; headless callers and tests only.
    pub fn poll_timeout(&mut self, timeout: Duration) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        match self.results_rx.recv_timeout(timeout) {
            Ok(result) => self.handle_result(result, &mut events),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return events
            }
        }
        events.extend(self.poll());
        events
    }

    fn handle_result(&mut self, result: WorkerResult, events: &mut Vec<CoordinatorEvent>) {
        let WorkerResult {
            key,
            generation,
            size,
            mipmap,
        } = result;
        if generation != self.generation(key) {
            log::trace!("Dropping {}x{} for {} from a forgotten request", size.0, size.1, key);
            return;
        }
        let Some(mipmap) = mipmap else {
            log::debug!("No mipmap {}x{} available for {}", size.0, size.1, key);
            let outstanding = self.ledger.state(key).desired().is_some();
            if let Some(next) = self.ledger.fail(key) {
                self.send_or_log(key, next);
            }
            if !outstanding {
                return;
            }
            events.push(CoordinatorEvent::Unavailable {
                key,
                width: size.0,
                height: size.1,
            });
            return;
        };

        let completion = self.ledger.complete(key, mipmap.size());
        if let Some(next) = completion.reissue {
            self.send_or_log(key, next);
        }
        if !completion.adopt {
            // Superseded by a newer request; expected during interaction.
            log::trace!("Discarding stale {}x{} for {}", size.0, size.1, key);
            return;
        }

        self.adopted.insert(key, mipmap.size());
        if self.surfaces.contains(&key) {
            events.push(CoordinatorEvent::MipmapReady { key, mipmap });
        } else {
            let queue = self.backlog.entry(key).or_default();
            queue.push_back(mipmap);
            while queue.len() > self.config.max_backlog.max(1) {
                queue.pop_front();
                log::debug!("Backlog for {} full, dropping oldest mipmap", key);
            }
        }
    }

    fn send_or_log(&mut self, key: ChannelKey, size: Size) {
        if let Err(err) = self.send(key, size) {
            log::error!("Failed to re-issue {}x{} for {}: {}", size.0, size.1, key, err);
        }
    }

    /// Mark `key` as drawable and replay results that arrived before it was.
    pub fn register_surface(&mut self, key: ChannelKey) -> Vec<CoordinatorEvent> {
        self.surfaces.insert(key);
        self.backlog
            .remove(&key)
            .map(|queue| {
                queue
                    .into_iter()
                    .map(|mipmap| CoordinatorEvent::MipmapReady { key, mipmap })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unregister_surface(&mut self, key: ChannelKey) {
        self.surfaces.remove(&key);
    }

    /// Drop all state for a removed channel; late results for it are discarded.
    pub fn forget(&mut self, key: ChannelKey) {
        *self.generations.entry(key).or_insert(0) += 1;
        self.ledger.forget(key);
        self.adopted.remove(&key);
        self.surfaces.remove(&key);
        self.backlog.remove(&key);
    }

    /// Size most recently adopted for `key`.
    pub fn adopted_size(&self, key: ChannelKey) -> Option<(u32, u32)> {
        self.adopted.get(&key).copied()
    }

    pub fn backlog_len(&self, key: ChannelKey) -> usize {
        self.backlog.get(&key).map_or(0, VecDeque::len)
    }
}

impl Drop for WorkerCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn shutdown_workers(workers: &mut Vec<WorkerHandle>) {
    for worker in workers.iter() {
        let _ = worker.tx.send(WorkerMessage::Shutdown);
    }
    for mut worker in workers.drain(..) {
        if let Some(handle) = worker.handle.take() {
            if handle.join().is_err() {
                log::error!("Mipmap worker panicked");
            }
        }
    }
}

fn worker_thread(
    index: usize,
    rx: Receiver<WorkerMessage>,
    tx: Sender<WorkerResult>,
    source: Arc<dyn MipmapSource>,
    stop: Arc<AtomicBool>,
) {
    log::debug!("Mipmap worker {} started", index);
    for message in rx.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match message {
            WorkerMessage::Produce {
                key,
                generation,
                width,
                height,
            } => {
                let mipmap = source.get_mipmap(key, width, height);
                let result = WorkerResult {
                    key,
                    generation,
                    size: (width, height),
                    mipmap,
                };
                if tx.send(result).is_err() {
                    break;
                }
            }
            WorkerMessage::Shutdown => break,
        }
    }
    log::debug!("Mipmap worker {} stopped", index);
}
