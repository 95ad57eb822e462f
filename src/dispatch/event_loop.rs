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

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::dispatch::{Job, MessageDispatcher};
use crate::message::DispatchError;

/// Submits jobs to a preexisting event loop supplied by the caller.
///
/// Lets I/O-heavy actors share a loop that already exists instead of
/// multiplying threads. Jobs stay subject to the short/non-blocking
/// contract; the loop is not a place to park long work.
pub struct EventLoop {
    handle: tokio::runtime::Handle,
    closed: AtomicBool,
}

impl EventLoop {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            closed: AtomicBool::new(false),
        }
    }
}

impl MessageDispatcher for EventLoop {
    fn execute(&self, job: Job) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }
        self.handle.spawn(async move {
            job();
        });
        Ok(())
    }

    fn shutdown(&self, _drain: Duration) {
        // The loop belongs to the caller; closing here only stops new
        // submissions.
        self.closed.store(true, Ordering::Release);
    }
}
