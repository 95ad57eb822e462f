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

/// Runs each job synchronously inside `execute`, on the enqueuing thread.
///
/// Used by tests that want activations pinned to a known thread. The
/// at-most-one-activation guarantee still comes from the mailbox CAS, so a
/// second sender observing the mailbox already scheduled simply returns.
#[derive(Debug, Default)]
pub struct CallingThread {
    closed: AtomicBool,
}

impl CallingThread {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageDispatcher for CallingThread {
    fn execute(&self, job: Job) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }
        job();
        Ok(())
    }

    fn shutdown(&self, _drain: Duration) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn runs_jobs_inline() {
        thread_local! {
            static RAN: Cell<bool> = const { Cell::new(false) };
        }
        let dispatcher = CallingThread::new();
        dispatcher
            .execute(Box::new(|| RAN.with(|r| r.set(true))))
            .unwrap();
        // Inline execution means the effect is visible on this thread
        // immediately after execute returns.
        assert!(RAN.with(Cell::get));
    }

    #[test]
    fn rejects_jobs_after_shutdown() {
        let dispatcher = CallingThread::new();
        dispatcher.shutdown(Duration::ZERO);
        assert_eq!(
            dispatcher.execute(Box::new(|| {})).unwrap_err(),
            DispatchError::Shutdown
        );
    }
}
