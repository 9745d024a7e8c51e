//! Query bridge backed by dedicated OS threads.
//!
//! Each worker owns a single-threaded tokio runtime and blocks on a bounded
//! crossbeam channel. Results land in a slot map keyed by [`QueryHandle`];
//! the frame thread only ever does a non-blocking `poll`.
//!
//! # Design Principles
//!
//! - **No polling on workers**: workers block on `recv`, blocking waits use a Condvar
//! - **Cancellation by slot removal**: a result stored into a missing slot is discarded
//! - **Clean shutdown**: dropping the sender unblocks workers naturally

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{QueryBridge, QueryExecutor, QueryHandle, QueryHit, QueryPoll, QueryRequest};
use crate::config::QueryConfig;
use crate::core::error::QueryError;

/// Snapshot of worker bridge activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Worker threads spawned.
    pub worker_count: usize,
    /// Queries accepted.
    pub submitted: u64,
    /// Queries waiting in the channel.
    pub queued: u64,
    /// Queries currently executing.
    pub active: u64,
    /// Queries whose executor returned.
    pub completed: u64,
    /// Handles cancelled before their result was consumed.
    pub cancelled: u64,
    /// Results that arrived after cancellation and were dropped.
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct QueryCounters {
    submitted: AtomicU64,
    queued: AtomicU64,
    active: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    discarded: AtomicU64,
}

impl QueryCounters {
    fn snapshot(&self, worker_count: usize) -> QueryStats {
        QueryStats {
            worker_count,
            submitted: self.submitted.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

struct QueryJob {
    handle: QueryHandle,
    request: QueryRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Ready,
    Closed,
}

struct Slot {
    hits: Option<Vec<QueryHit>>,
    state: SlotState,
}

type SlotPair = Arc<(Mutex<Slot>, Condvar)>;

/// Block on `pair` until it resolves, is closed, or `deadline` passes.
///
/// Spurious wakeups re-enter the wait; only the deadline yields `Timeout`.
fn wait_slot(pair: &SlotPair, deadline: Instant) -> Result<Vec<QueryHit>, QueryError> {
    let (slot, condvar) = pair.as_ref();
    let mut slot = slot.lock();
    while slot.state == SlotState::Pending {
        if condvar.wait_until(&mut slot, deadline).timed_out() {
            break;
        }
    }
    match slot.state {
        SlotState::Ready => slot.hits.take().ok_or(QueryError::UnknownHandle),
        SlotState::Closed => Err(QueryError::UnknownHandle),
        SlotState::Pending => Err(QueryError::Timeout),
    }
}

/// Result slots with Condvar notification for blocking waits.
struct ResultStorage {
    slots: RwLock<HashMap<QueryHandle, SlotPair>>,
}

impl ResultStorage {
    fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn create_slot(&self, handle: QueryHandle) {
        let slot = Slot {
            hits: None,
            state: SlotState::Pending,
        };
        self.slots
            .write()
            .insert(handle, Arc::new((Mutex::new(slot), Condvar::new())));
    }

    /// Store hits; returns `false` when the slot is gone (cancelled).
    fn store(&self, handle: QueryHandle, hits: Vec<QueryHit>) -> bool {
        let slots = self.slots.read();
        let Some(pair) = slots.get(&handle) else {
            return false;
        };
        let (slot, condvar) = pair.as_ref();
        let mut slot = slot.lock();
        slot.hits = Some(hits);
        slot.state = SlotState::Ready;
        condvar.notify_all();
        true
    }

    fn try_retrieve(&self, handle: QueryHandle) -> QueryPoll {
        let ready = {
            let slots = self.slots.read();
            let Some(pair) = slots.get(&handle) else {
                return QueryPoll::Unknown;
            };
            let is_ready = pair.0.lock().state == SlotState::Ready;
            is_ready
        };
        if !ready {
            return QueryPoll::Pending;
        }
        self.remove(handle).map_or(QueryPoll::Unknown, QueryPoll::Ready)
    }

    fn wait_for_result(
        &self,
        handle: QueryHandle,
        timeout: Duration,
    ) -> Result<Vec<QueryHit>, QueryError> {
        let pair = self
            .slots
            .read()
            .get(&handle)
            .cloned()
            .ok_or(QueryError::UnknownHandle)?;

        wait_slot(&pair, Instant::now() + timeout)
    }

    fn get_slot(&self, handle: QueryHandle) -> Option<SlotPair> {
        self.slots.read().get(&handle).cloned()
    }

    /// Drop the slot, waking any blocked waiter.
    fn remove(&self, handle: QueryHandle) -> Option<Vec<QueryHit>> {
        let pair = self.slots.write().remove(&handle)?;
        let (slot, condvar) = pair.as_ref();
        let mut slot = slot.lock();
        slot.state = SlotState::Closed;
        condvar.notify_all();
        slot.hits.take()
    }

    fn len(&self) -> usize {
        self.slots.read().len()
    }
}

/// Query bridge with dedicated worker threads.
///
/// Workers are named `aq-worker-{id}`. Dropping the bridge signals shutdown
/// without joining; call [`WorkerQueryBridge::shutdown`] for a graceful stop.
pub struct WorkerQueryBridge<E: QueryExecutor> {
    config: QueryConfig,
    job_tx: Mutex<Option<Sender<QueryJob>>>,
    results: Arc<ResultStorage>,
    counters: Arc<QueryCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    _executor: std::marker::PhantomData<E>,
}

impl<E: QueryExecutor> std::fmt::Debug for WorkerQueryBridge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerQueryBridge")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<E: QueryExecutor> WorkerQueryBridge<E> {
    /// Spawn `config.worker_count` workers running `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Internal`] if the configuration is invalid or a
    /// worker thread cannot be spawned.
    pub fn new(config: QueryConfig, executor: E) -> Result<Self, QueryError> {
        config.validate().map_err(QueryError::Internal)?;

        let (job_tx, job_rx) = bounded::<QueryJob>(config.max_queue_depth);
        let results = Arc::new(ResultStorage::new());
        let counters = Arc::new(QueryCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                job_rx.clone(),
                Arc::clone(&results),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                executor.clone(),
                config.thread_stack_size,
            );
            match worker {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shutdown.store(true, Ordering::Release);
                    return Err(QueryError::Internal(format!(
                        "failed to spawn query worker {worker_id}: {err}"
                    )));
                }
            }
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "Query bridge initialized with dedicated worker threads"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            results,
            counters,
            shutdown,
            workers: Mutex::new(workers),
            next_id: AtomicU64::new(0),
            _executor: std::marker::PhantomData,
        })
    }

    /// Block until `handle` resolves or `timeout` expires.
    ///
    /// The slot is removed on every outcome.
    ///
    /// # Errors
    ///
    /// [`QueryError::Timeout`] or [`QueryError::UnknownHandle`].
    pub fn wait(&self, handle: QueryHandle, timeout: Duration) -> Result<Vec<QueryHit>, QueryError> {
        let result = self.results.wait_for_result(handle, timeout);
        self.results.remove(handle);
        result
    }

    /// Await `handle` from async code without blocking the caller's runtime.
    ///
    /// # Errors
    ///
    /// [`QueryError::Timeout`] or [`QueryError::UnknownHandle`].
    pub async fn wait_async(
        &self,
        handle: QueryHandle,
        timeout: Duration,
    ) -> Result<Vec<QueryHit>, QueryError> {
        if let QueryPoll::Ready(hits) = self.results.try_retrieve(handle) {
            return Ok(hits);
        }
        let pair = self
            .results
            .get_slot(handle)
            .ok_or(QueryError::UnknownHandle)?;

        let deadline = Instant::now() + timeout;
        let waited = tokio::task::spawn_blocking(move || wait_slot(&pair, deadline))
            .await
            .map_err(|err| QueryError::Internal(format!("query waiter failed: {err}")));

        self.results.remove(handle);
        waited?
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Stop accepting queries and join workers (2 seconds each at most).
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down query bridge");
        *self.job_tx.lock() = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let joiner = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => debug!(worker_id = idx, "Query worker joined"),
                Ok(false) => warn!(worker_id = idx, "Query worker panicked"),
                Err(_) => warn!(worker_id = idx, "Query worker did not exit within timeout, detaching"),
            }
            let _ = joiner.join();
        }
        info!(worker_count, "Query bridge shut down");
    }
}

impl<E: QueryExecutor> QueryBridge for WorkerQueryBridge<E> {
    fn submit(&self, request: QueryRequest) -> Result<QueryHandle, QueryError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(QueryError::Shutdown);
        }

        let handle = QueryHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.results.create_slot(handle);

        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            self.results.remove(handle);
            return Err(QueryError::Shutdown);
        };

        match job_tx.try_send(QueryJob { handle, request }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                debug!(%handle, "Query submitted");
                Ok(handle)
            }
            Err(TrySendError::Full(_)) => {
                self.results.remove(handle);
                warn!("Query queue is full");
                Err(QueryError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.results.remove(handle);
                Err(QueryError::Shutdown)
            }
        }
    }

    fn poll(&self, handle: QueryHandle) -> QueryPoll {
        self.results.try_retrieve(handle)
    }

    fn cancel(&self, handle: QueryHandle) {
        if self.results.get_slot(handle).is_some() {
            self.results.remove(handle);
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(%handle, "Query cancelled");
        }
    }

    fn in_flight(&self) -> usize {
        self.results.len()
    }
}

impl<E: QueryExecutor> Drop for WorkerQueryBridge<E> {
    fn drop(&mut self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.job_tx.lock() = None;
            debug!("Query bridge dropped without explicit shutdown, workers detached");
        }
    }
}

fn spawn_worker<E: QueryExecutor>(
    worker_id: usize,
    job_rx: Receiver<QueryJob>,
    results: Arc<ResultStorage>,
    counters: Arc<QueryCounters>,
    shutdown: Arc<AtomicBool>,
    executor: E,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("aq-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "Query worker started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker_id, error = %e, "Failed to create query worker runtime");
                    return;
                }
            };

            while let Ok(job) = job_rx.recv() {
                if shutdown.load(Ordering::Acquire) {
                    debug!(worker_id, "Query worker saw shutdown, exiting");
                    break;
                }
                counters.queued.fetch_sub(1, Ordering::Relaxed);
                counters.active.fetch_add(1, Ordering::Relaxed);

                let QueryJob { handle, request } = job;
                let hits = rt.block_on(executor.execute(request));
                debug!(worker_id, %handle, hits = hits.len(), "Query executed");

                if !results.store(handle, hits) {
                    counters.discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(worker_id, %handle, "Discarding result of cancelled query");
                }

                counters.active.fetch_sub(1, Ordering::Relaxed);
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }

            debug!(worker_id, "Query worker exiting");
        })
}
