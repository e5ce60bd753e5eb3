//! Bounded worker pool for provider loads.
//!
//! Each provider owns one pool: a fixed set of named OS threads pulling
//! [`RequestState`]s from a bounded FIFO queue. A full queue rejects new work
//! instead of buffering it, so the dispatcher moves on to the next provider.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::dispatch::RequestState;

/// Thread count and queue bound of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker threads.
    pub threads: usize,
    /// Maximum queued (not yet running) requests.
    pub queue_capacity: usize,
}

impl PoolConfig {
    /// Create a pool configuration. Zero values are raised to one.
    pub fn new(threads: usize, queue_capacity: usize) -> Self {
        Self {
            threads: threads.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(2, 40)
    }
}

/// What a worker should do after handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// Keep pulling work.
    Continue,
    /// Fail every queued request, then keep going.
    Drain,
}

type Handler = dyn Fn(RequestState) -> WorkerSignal + Send + Sync;

struct Queue {
    items: VecDeque<RequestState>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    capacity: usize,
}

impl Shared {
    fn take_all(&self) -> Vec<RequestState> {
        self.queue.lock().items.drain(..).collect()
    }
}

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    name: String,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `config.threads` workers running `handler`.
    ///
    /// Threads are named `<name>-<index>`.
    pub fn new<F>(name: &str, config: PoolConfig, handler: F) -> io::Result<Self>
    where
        F: Fn(RequestState) -> WorkerSignal + Send + Sync + 'static,
    {
        let config = PoolConfig::new(config.threads, config.queue_capacity);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(config.queue_capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity: config.queue_capacity,
        });
        let handler: Arc<Handler> = Arc::new(handler);

        let pool = Self {
            name: name.to_string(),
            shared: Arc::clone(&shared),
            workers: Mutex::new(Vec::with_capacity(config.threads)),
        };

        for index in 0..config.threads {
            let shared = Arc::clone(&shared);
            let handler = Arc::clone(&handler);
            let pool_name = pool.name.clone();
            // On error the pool is dropped here, which stops threads
            // already spawned.
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(&pool_name, &shared, handler.as_ref()))?;
            pool.workers.lock().push(handle);
        }

        debug!(
            pool = name,
            threads = config.threads,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a request.
    ///
    /// Hands the state back if the queue is full or the pool is shut down;
    /// the caller must then report the failure.
    pub fn submit(&self, state: RequestState) -> Result<(), RequestState> {
        let mut queue = self.shared.queue.lock();
        if queue.closed || queue.items.len() >= self.shared.capacity {
            return Err(state);
        }
        queue.items.push_back(state);
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Number of queued requests.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().closed
    }

    /// Stop the workers and fail every queued request.
    ///
    /// Waits for running loads to finish, except when called from one of
    /// this pool's own workers.
    pub fn shutdown(&self) {
        let abandoned = {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return;
            }
            queue.closed = true;
            queue.items.drain(..).collect::<Vec<_>>()
        };
        self.shared.available.notify_all();

        let current = thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!(pool = %self.name, "Worker thread panicked");
            }
        }

        debug!(pool = %self.name, abandoned = abandoned.len(), "Worker pool stopped");
        for state in abandoned {
            state.report_failure();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(pool: &str, shared: &Shared, handler: &Handler) {
    loop {
        let state = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.closed {
                    return;
                }
                if let Some(state) = queue.items.pop_front() {
                    break state;
                }
                shared.available.wait(&mut queue);
            }
        };

        if handler(state) == WorkerSignal::Drain {
            let drained = shared.take_all();
            warn!(pool, drained = drained.len(), "Draining provider queue");
            for state in drained {
                state.report_failure();
            }
        }
    }
}
