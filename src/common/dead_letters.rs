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

//! The dead-letter sink: accepts anything, delivers nothing, records
//! everything.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::address::ActorAddress;

/// Terminal sink for undeliverable messages. Never runs user code; each
/// arrival is counted and logged at debug level.
pub struct DeadLetters {
    address: ActorAddress,
    count: AtomicU64,
}

impl DeadLetters {
    pub(crate) fn new() -> Self {
        Self {
            address: ActorAddress::dead_letters(),
            count: AtomicU64::new(0),
        }
    }

    /// The `/dead` address.
    #[must_use]
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Number of dead letters recorded so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self, intended: &ActorAddress, message_type: &str, note: &str) {
        self.count.fetch_add(1, Ordering::AcqRel);
        debug!(
            target: "arbor::dead_letters",
            recipient = %intended,
            message_type,
            note,
            "dead letter"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_publication() {
        let dead_letters = DeadLetters::new();
        assert_eq!(dead_letters.count(), 0);
        dead_letters.publish(&ActorAddress::dead_letters(), "alloc::string::String", "test");
        dead_letters.publish(&ActorAddress::dead_letters(), "alloc::string::String", "test");
        assert_eq!(dead_letters.count(), 2);
    }
}
