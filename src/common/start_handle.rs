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

//! The deferred-start protocol's wake handle.
//!
//! A deferred spawn installs its ref first and schedules later: the
//! mailbox's schedule claim is held from birth, and `wake()` transfers it
//! to the dispatcher exactly once. Messages sent before the wake simply
//! queue; after the wake they are observed in send order, preceded by the
//! synthetic `Start`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::warn;

/// One-shot scheduling permission for a deferred-start actor.
pub struct StartHandle {
    woken: AtomicBool,
    wake: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl StartHandle {
    pub(crate) fn new(wake: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            woken: AtomicBool::new(false),
            wake: Mutex::new(Some(wake)),
        }
    }

    /// Schedule the actor's first activation. Effective exactly once; a
    /// second call is a detected misuse and a no-op.
    pub fn wake(&self) {
        if self.woken.swap(true, Ordering::AcqRel) {
            warn!("wake() called more than once on a start handle; ignoring");
            return;
        }
        let wake = self
            .wake
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(wake) = wake {
            wake();
        }
    }

    /// Whether `wake()` has already been called.
    #[must_use]
    pub fn is_woken(&self) -> bool {
        self.woken.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for StartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartHandle")
            .field("woken", &self.is_woken())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn wake_fires_exactly_once() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        let handle = StartHandle::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!handle.is_woken());
        handle.wake();
        handle.wake();
        assert!(handle.is_woken());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_wakes_have_one_winner() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        let handle = Arc::new(StartHandle::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.wake())
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
