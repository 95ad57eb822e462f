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

//! Refs: cheap, shareable handles that enqueue into a target mailbox.
//!
//! A ref never dangles. Terminated actors stay addressable; their refs
//! simply route every send to dead letters, as does a ref that was a
//! dead-letter binding from the start (the result of a failed resolve).

use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::warn;

use crate::actor::cell::{ActorCell, AnyCell};
use crate::address::ActorAddress;
use crate::common::dead_letters::DeadLetters;
use crate::message::{Message, SystemMessage};

pub(crate) enum RefTarget<M: Message> {
    Cell(Arc<ActorCell<M>>),
    Dead(Arc<DeadLetters>),
}

/// A typed handle to one actor lifetime.
pub struct ActorRef<M: Message> {
    address: ActorAddress,
    target: RefTarget<M>,
}

impl<M: Message> ActorRef<M> {
    pub(crate) fn from_cell(cell: Arc<ActorCell<M>>) -> Self {
        Self {
            address: cell.address().clone(),
            target: RefTarget::Cell(cell),
        }
    }

    /// A dead-letter ref bound to `address`: sends succeed and are
    /// recorded as dead letters.
    pub(crate) fn dead(address: ActorAddress, dead_letters: Arc<DeadLetters>) -> Self {
        Self {
            address,
            target: RefTarget::Dead(dead_letters),
        }
    }

    /// The address this ref is bound to.
    #[must_use]
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Enqueue a message. Never fails: unreachable targets divert to dead
    /// letters.
    pub fn tell(&self, message: M) {
        match &self.target {
            RefTarget::Cell(cell) => cell.enqueue_user(message),
            RefTarget::Dead(dead_letters) => {
                dead_letters.publish(&self.address, type_name::<M>(), "dead-letter ref");
            }
        }
    }

    /// Establish an observation edge: this actor receives exactly one
    /// `Signal::Terminated` when `target` ends. Watching something already
    /// gone delivers the signal immediately.
    pub fn watch<N: Message>(&self, target: &ActorRef<N>) {
        let RefTarget::Cell(watcher) = &self.target else {
            return;
        };
        match &target.target {
            RefTarget::Cell(cell) => {
                cell.clone()
                    .enqueue_system_msg(SystemMessage::Watch(self.address.clone()));
            }
            RefTarget::Dead(_) => {
                watcher.enqueue_system(SystemMessage::Terminated(target.address.clone()));
            }
        }
    }

    /// Remove an observation edge established with [`ActorRef::watch`].
    pub fn unwatch<N: Message>(&self, target: &ActorRef<N>) {
        if let RefTarget::Cell(cell) = &target.target {
            cell.clone()
                .enqueue_system_msg(SystemMessage::Unwatch(self.address.clone()));
        }
    }

    /// Whether this ref is a dead-letter binding.
    #[must_use]
    pub fn is_dead_letters(&self) -> bool {
        matches!(self.target, RefTarget::Dead(_))
    }
}

impl<M: Message> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            target: match &self.target {
                RefTarget::Cell(cell) => RefTarget::Cell(cell.clone()),
                RefTarget::Dead(dead_letters) => RefTarget::Dead(dead_letters.clone()),
            },
        }
    }
}

impl<M: Message> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl<M: Message> Eq for ActorRef<M> {}

impl<M: Message> Hash for ActorRef<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl<M: Message> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("address", &self.address.to_string())
            .field("dead_letters", &self.is_dead_letters())
            .finish()
    }
}

impl<M: Message> fmt::Display for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// An untyped handle produced by `resolve_untyped`; message types are
/// checked at enqueue time instead of resolve time.
pub struct UntypedRef {
    address: ActorAddress,
    target: Option<Arc<dyn AnyCell>>,
    dead_letters: Arc<DeadLetters>,
}

impl UntypedRef {
    pub(crate) fn new(
        address: ActorAddress,
        target: Option<Arc<dyn AnyCell>>,
        dead_letters: Arc<DeadLetters>,
    ) -> Self {
        Self {
            address,
            target,
            dead_letters,
        }
    }

    #[must_use]
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Enqueue a boxed message. A type mismatch is logged and recorded as
    /// a dead letter; user code never runs for it.
    pub fn tell_any(&self, message: Box<dyn Any + Send>) {
        match &self.target {
            Some(cell) => {
                if cell.clone().enqueue_any(message).is_err() {
                    warn!(
                        actor = %self.address,
                        expected = cell.message_type_name(),
                        "untyped send with mismatched message type"
                    );
                    self.dead_letters.publish(
                        &self.address,
                        cell.message_type_name(),
                        "type mismatch",
                    );
                }
            }
            None => {
                self.dead_letters
                    .publish(&self.address, "unknown", "dead-letter ref");
            }
        }
    }

    /// Whether this ref is a dead-letter binding.
    #[must_use]
    pub fn is_dead_letters(&self) -> bool {
        self.target.is_none()
    }
}

impl fmt::Debug for UntypedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedRef")
            .field("address", &self.address.to_string())
            .field("dead_letters", &self.is_dead_letters())
            .finish()
    }
}
