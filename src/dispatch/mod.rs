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

//! Dispatchers: executors of short, non-blocking jobs.
//!
//! A dispatcher only promises `execute`; it never serializes two jobs for
//! the same mailbox — that guarantee belongs to the mailbox scheduling CAS.
//! Decoupling the two lets tests pin actors to the calling thread and lets
//! I/O-bound actors share an external event loop without thread explosion.

mod calling_thread;
mod event_loop;
mod thread_pool;

use std::sync::Arc;
use std::time::Duration;

pub use calling_thread::CallingThread;
pub use event_loop::EventLoop;
pub use thread_pool::FixedThreadPool;

use crate::message::{DispatchError, SpawnError};

/// A unit of work handed to a dispatcher. Jobs must be short and must not
/// block; an activation runs to completion without awaiting.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executor abstraction consumed by mailboxes.
pub trait MessageDispatcher: Send + Sync {
    /// Submit a job for execution. Fails with [`DispatchError::Shutdown`]
    /// once the dispatcher has shut down. Must not block the caller beyond
    /// a bounded wait on the queue.
    fn execute(&self, job: Job) -> Result<(), DispatchError>;

    /// Stop accepting new jobs and wait up to `drain` for in-flight jobs
    /// to finish.
    fn shutdown(&self, drain: Duration);
}

/// Spawn-time choice of dispatcher, recorded in `Props`.
#[derive(Debug, Clone, Default)]
pub enum DispatcherSelector {
    /// The system's shared fixed-size worker pool.
    #[default]
    Default,
    /// Run activations synchronously on the enqueuing thread. Only sound
    /// where the caller itself provides the single-threaded guarantee.
    CallingThread,
    /// Submit activations to a caller-supplied event loop.
    External(tokio::runtime::Handle),
    /// Look up a configured dispatcher by name. Only `"default"` and
    /// `"calling-thread"` are configured; anything else fails the spawn
    /// with `DispatcherUnavailable`.
    Named(String),
}

/// The dispatchers a system constructs at bootstrap, resolved against a
/// [`DispatcherSelector`] at spawn time.
pub(crate) struct Dispatchers {
    pub(crate) pool: Arc<FixedThreadPool>,
    pub(crate) calling_thread: Arc<CallingThread>,
}

impl Dispatchers {
    pub(crate) fn select(
        &self,
        selector: &DispatcherSelector,
    ) -> Result<Arc<dyn MessageDispatcher>, SpawnError> {
        match selector {
            DispatcherSelector::Default => Ok(self.pool.clone()),
            DispatcherSelector::CallingThread => Ok(self.calling_thread.clone()),
            DispatcherSelector::External(handle) => Ok(Arc::new(EventLoop::new(handle.clone()))),
            DispatcherSelector::Named(name) => match name.as_str() {
                "default" => Ok(self.pool.clone()),
                "calling-thread" => Ok(self.calling_thread.clone()),
                other => Err(SpawnError::DispatcherUnavailable(other.to_string())),
            },
        }
    }
}
