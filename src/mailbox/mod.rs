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

//! Per-actor mailbox: two lock-free queues and one status word.
//!
//! The status word encodes `SCHEDULED`, `SUSPENDED`, `CLOSED`, and
//! `TERMINATED` bits plus an approximate user-message count. The
//! not-scheduled → scheduled transition is a single CAS; only the winner
//! hands an activation to the dispatcher, which is the whole of the
//! at-most-one-activation guarantee.
//!
//! Queue discipline: system messages drain strictly before user messages;
//! a closed mailbox keeps draining system traffic (stop cascades need it)
//! while user messages divert to dead letters.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

use crate::message::SystemMessage;

const SCHEDULED: usize = 0b0001;
const SUSPENDED: usize = 0b0010;
const CLOSED: usize = 0b0100;
const TERMINATED: usize = 0b1000;
const COUNT_UNIT: usize = 0b1_0000;
const COUNT_SHIFT: u32 = 4;

/// Outcome of a user-message enqueue attempt.
#[derive(Debug)]
pub(crate) enum EnqueueRejection<M> {
    /// Mailbox is closed; the message belongs to dead letters.
    Closed(M),
    /// Bounded mailbox at capacity; backpressure hint, message to dead
    /// letters.
    Full(M),
}

pub(crate) struct Mailbox<M> {
    user: SegQueue<M>,
    system: SegQueue<SystemMessage>,
    status: AtomicUsize,
    capacity: Option<usize>,
}

impl<M> Mailbox<M> {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            user: SegQueue::new(),
            system: SegQueue::new(),
            status: AtomicUsize::new(0),
            capacity,
        }
    }

    pub(crate) fn push_user(&self, message: M) -> Result<(), EnqueueRejection<M>> {
        let status = self.status.load(Ordering::Acquire);
        if status & (CLOSED | TERMINATED) != 0 {
            return Err(EnqueueRejection::Closed(message));
        }
        if let Some(capacity) = self.capacity {
            if (status >> COUNT_SHIFT) >= capacity {
                return Err(EnqueueRejection::Full(message));
            }
        }
        // Count before queueing: a concurrent pop may otherwise decrement
        // below zero and borrow into the flag bits.
        self.status.fetch_add(COUNT_UNIT, Ordering::AcqRel);
        self.user.push(message);
        Ok(())
    }

    pub(crate) fn push_system(&self, message: SystemMessage) {
        self.system.push(message);
    }

    pub(crate) fn pop_user(&self) -> Option<M> {
        let message = self.user.pop();
        if message.is_some() {
            self.status.fetch_sub(COUNT_UNIT, Ordering::AcqRel);
        }
        message
    }

    pub(crate) fn pop_system(&self) -> Option<SystemMessage> {
        self.system.pop()
    }

    pub(crate) fn has_system(&self) -> bool {
        !self.system.is_empty()
    }

    fn has_user(&self) -> bool {
        !self.user.is_empty()
    }

    /// Approximate number of queued user messages.
    #[allow(dead_code)]
    pub(crate) fn approx_len(&self) -> usize {
        self.status.load(Ordering::Acquire) >> COUNT_SHIFT
    }

    /// Attempt the not-scheduled → scheduled transition. Returns `true`
    /// for exactly one caller; the winner must hand an activation to the
    /// dispatcher.
    pub(crate) fn try_claim_schedule(&self) -> bool {
        let mut status = self.status.load(Ordering::Acquire);
        loop {
            if !Self::schedulable(status, self.has_system(), self.has_user()) {
                return false;
            }
            match self.status.compare_exchange_weak(
                status,
                status | SCHEDULED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => status = current,
            }
        }
    }

    fn schedulable(status: usize, has_system: bool, has_user: bool) -> bool {
        if status & (SCHEDULED | TERMINATED) != 0 {
            return false;
        }
        // System traffic schedules even while suspended or closed; user
        // traffic only on an open, unsuspended mailbox.
        has_system || (status & (SUSPENDED | CLOSED) == 0 && has_user)
    }

    /// Clear `SCHEDULED` at the end of an activation. The caller re-checks
    /// `try_claim_schedule` afterwards; that re-check closes the race with
    /// producers that enqueued between the last pop and this clear.
    pub(crate) fn release_schedule(&self) {
        self.status.fetch_and(!SCHEDULED, Ordering::AcqRel);
    }

    pub(crate) fn set_suspended(&self) {
        self.status.fetch_or(SUSPENDED, Ordering::AcqRel);
    }

    pub(crate) fn clear_suspended(&self) {
        self.status.fetch_and(!SUSPENDED, Ordering::AcqRel);
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.status.load(Ordering::Acquire) & SUSPENDED != 0
    }

    /// Close the mailbox to user messages. Returns `false` if it was
    /// already closed.
    pub(crate) fn close(&self) -> bool {
        self.status.fetch_or(CLOSED, Ordering::AcqRel) & CLOSED == 0
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.status.load(Ordering::Acquire) & CLOSED != 0
    }

    pub(crate) fn set_terminated(&self) {
        self.status.fetch_or(TERMINATED | CLOSED, Ordering::AcqRel);
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.status.load(Ordering::Acquire) & TERMINATED != 0
    }

    /// Drain the user queue, e.g. to forward to dead letters at
    /// termination.
    pub(crate) fn drain_user(&self) -> Vec<M> {
        let mut drained = Vec::new();
        while let Some(message) = self.pop_user() {
            drained.push(message);
        }
        drained
    }
}
