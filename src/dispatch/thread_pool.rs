/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, trace, warn};

use crate::dispatch::{Job, MessageDispatcher};
use crate::message::DispatchError;

/// Fixed-size shared worker pool: N named threads draining one
/// multi-producer multi-consumer job queue.
///
/// Ordering of jobs across workers is unspecified; per-mailbox ordering is
/// the mailbox's business.
pub struct FixedThreadPool {
    thread_name_prefix: String,
    sender: RwLock<Option<Sender<Job>>>,
    closed: AtomicBool,
    alive: AtomicUsize,
    drained: Mutex<bool>,
    drained_cv: Condvar,
}

impl FixedThreadPool {
    /// Spawn `threads` workers named `<prefix>-<index>`.
    #[must_use]
    pub fn new(threads: usize, thread_name_prefix: &str) -> std::sync::Arc<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let pool = std::sync::Arc::new(Self {
            thread_name_prefix: thread_name_prefix.to_string(),
            sender: RwLock::new(Some(sender)),
            closed: AtomicBool::new(false),
            alive: AtomicUsize::new(threads),
            drained: Mutex::new(false),
            drained_cv: Condvar::new(),
        });
        for index in 0..threads {
            let pool = pool.clone();
            let pool_err = pool.clone();
            let receiver: Receiver<Job> = receiver.clone();
            let name = format!("{thread_name_prefix}-{index}");
            let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
                trace!(worker = %name, "worker started");
                while let Ok(job) = receiver.recv() {
                    // Activations contain their own panics; this guard only
                    // keeps a worker alive if a raw job slips one through.
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(worker = %name, "job panicked past the activation boundary");
                    }
                }
                trace!(worker = %name, "worker exiting");
                pool.worker_done();
            });
            if let Err(err) = spawned {
                error!(error = %err, "failed to spawn worker thread");
                pool_err.worker_done();
            }
        }
        pool
    }

    /// Whether `thread_name` names one of this pool's workers.
    #[must_use]
    pub fn owns_thread(&self, thread_name: &str) -> bool {
        thread_name.starts_with(&self.thread_name_prefix)
    }

    fn worker_done(&self) {
        if self.alive.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut drained = self
                .drained
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *drained = true;
            self.drained_cv.notify_all();
        }
    }
}

impl MessageDispatcher for FixedThreadPool {
    fn execute(&self, job: Job) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }
        let guard = self
            .sender
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| DispatchError::Shutdown),
            None => Err(DispatchError::Shutdown),
        }
    }

    fn shutdown(&self, drain: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the producer side disconnects the channel once queued
        // jobs drain, which is what lets workers exit.
        self.sender
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let mut drained = self
            .drained
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while !*drained {
            let (guard, timed_out) = self
                .drained_cv
                .wait_timeout(drained, drain)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            drained = guard;
            if timed_out.timed_out() {
                if !*drained {
                    warn!(
                        timeout_ms = drain.as_millis() as u64,
                        "dispatcher drain deadline exceeded; detaching workers"
                    );
                }
                break;
            }
        }
    }
}
