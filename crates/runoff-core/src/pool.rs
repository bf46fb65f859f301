//! Fixed-size worker pool with a FIFO queue and a blocking completion barrier.
//!
//! `join` waits for the *pending* count to reach zero, which is decremented
//! only after a task has finished running, so a task that has been dequeued
//! but is still executing keeps the barrier closed.  Dropping the pool queues
//! one shutdown marker per worker behind any remaining work, so queued tasks
//! always run before the workers exit.
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::{ConfigError, SimError};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Message>,
    /// Submitted tasks that have not finished yet.
    pending: usize,
    /// Tasks that panicked since the last `join`.
    panicked: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    all_done: Condvar,
}

impl Shared {
    // Tasks run outside the lock, so a poisoned mutex still guards a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct TaskPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    pub fn new(threads: usize) -> Result<Self, SimError> {
        if threads == 0 {
            return Err(ConfigError::ZeroThreads.into());
        }
        log::debug!("creating {threads} worker threads");
        let shared = Arc::new(Shared::default());
        let mut pool = Self { shared, workers: Vec::with_capacity(threads) };
        for i in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("runoff-worker-{i}"))
                .spawn(move || worker_loop(&shared))
                .map_err(SimError::WorkerSpawn)?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a task and wake one idle worker.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.lock();
            state.queue.push_back(Message::Run(Box::new(task)));
            state.pending += 1;
        }
        self.shared.work_ready.notify_one();
    }

    /// Block until every submitted task has completed.  Reports tasks that
    /// panicked since the previous `join`.
    pub fn join(&self) -> Result<(), SimError> {
        let mut state = self.shared.lock();
        while state.pending > 0 {
            state = self.shared.all_done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        match std::mem::take(&mut state.panicked) {
            0 => Ok(()),
            count => Err(SimError::TaskPanicked { count }),
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            for _ in &self.workers {
                state.queue.push_back(Message::Shutdown);
            }
        }
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread exited abnormally");
            }
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let message = {
            let mut state = shared.lock();
            loop {
                if let Some(message) = state.queue.pop_front() {
                    break message;
                }
                state = shared.work_ready.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let job = match message {
            Message::Run(job) => job,
            Message::Shutdown => break,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(job));

        let mut state = shared.lock();
        if outcome.is_err() {
            log::error!("task panicked on {}", thread::current().name().unwrap_or("worker"));
            state.panicked += 1;
        }
        state.pending -= 1;
        if state.pending == 0 {
            shared.all_done.notify_all();
        }
    }
}
