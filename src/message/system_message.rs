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

use crate::address::ActorAddress;

/// Lifecycle and watch traffic carried on the priority queue of every
/// mailbox. System messages are drained strictly before user messages.
#[derive(Debug, Clone)]
pub(crate) enum SystemMessage {
    /// Synthetic first message enqueued at spawn; surfaces as
    /// `Signal::Started`.
    Start,
    /// Graceful termination request.
    Stop,
    /// Cancellation alias for `Stop`; kept distinct for vocabulary fidelity.
    PoisonPill,
    /// Ends a restart-backoff suspension window.
    Resume,
    /// Registers the given address for termination notification.
    Watch(ActorAddress),
    /// Removes a previously registered watcher.
    Unwatch(ActorAddress),
    /// Watch notification: the named actor has terminated.
    Terminated(ActorAddress),
    /// A directly supervised child has terminated.
    ChildTerminated(ActorAddress, TerminationReason),
    /// A child escalated its failure; handled as a failure of this
    /// actor's own activation.
    Failed(ActorAddress, String),
}

/// Why an actor's lifetime ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Graceful shutdown via `Stop` or `PoisonPill`, or a behavior
    /// returning `stopped`.
    Normal,
    /// The activation failed (panic or an explicit `failed` behavior) and
    /// the supervision directive resolved to stop.
    Failure(String),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal shutdown"),
            Self::Failure(msg) => write!(f, "failure: {msg}"),
        }
    }
}
