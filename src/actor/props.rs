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

use crate::actor::SupervisorDirective;
use crate::dispatch::DispatcherSelector;

/// Mailbox capacity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    /// No backpressure; the queue grows as needed.
    #[default]
    Unbounded,
    /// Reject (dead-letter) user messages past this approximate depth.
    Bounded(usize),
}

impl Capacity {
    pub(crate) fn limit(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n.max(1)),
        }
    }
}

/// Configuration for one spawn call.
#[derive(Debug, Clone, Default)]
pub struct Props {
    /// Which dispatcher runs this actor's activations.
    pub dispatcher: DispatcherSelector,
    /// What happens when an activation fails.
    pub supervision: SupervisorDirective,
    /// Mailbox depth limit.
    pub mailbox_capacity: Capacity,
    /// Well-known actors get the perpetual incarnation and a fixed
    /// address.
    pub well_known: bool,
}

impl Props {
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: DispatcherSelector) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn with_supervision(mut self, directive: SupervisorDirective) -> Self {
        self.supervision = directive;
        self
    }

    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: Capacity) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    #[must_use]
    pub fn well_known(mut self) -> Self {
        self.well_known = true;
        self
    }
}
