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

//! Behaviors: value-typed handlers that return their own successor.
//!
//! An activation evaluates the current behavior against the next message
//! and replaces it with whatever the handler returns. "Become" is simply
//! returning a different [`Behavior::receive`]; there is no inheritance and
//! behavior values are cheap to swap.

use crate::actor::ActorContext;
use crate::address::ActorAddress;
use crate::message::{Message, TerminationReason};

/// Lifecycle events surfaced to a behavior's signal handler.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Signal {
    /// The cell has been scheduled for the first time.
    Started,
    /// Delivered to the failing behavior instance just before a restart
    /// discards it.
    PreRestart,
    /// Delivered to the fresh behavior instance installed by a restart.
    PostRestart,
    /// A watched actor has terminated.
    Terminated(ActorAddress),
    /// A directly supervised child has terminated.
    ChildTerminated(ActorAddress, TerminationReason),
}

type MessageFn<M> = Box<dyn FnMut(&mut ActorContext<'_, M>, M) -> Behavior<M> + Send>;
type SignalFn<M> = Box<dyn FnMut(&mut ActorContext<'_, M>, Signal) -> Behavior<M> + Send>;

/// An active message handler, optionally paired with a signal handler.
pub struct Receive<M: Message> {
    pub(crate) on_message: MessageFn<M>,
    pub(crate) on_signal: Option<SignalFn<M>>,
}

/// How an actor will handle its next message.
pub enum Behavior<M: Message> {
    /// Handle messages (and optionally signals) with the contained
    /// closures.
    Receive(Receive<M>),
    /// Keep the current behavior unchanged.
    Same,
    /// Terminate gracefully after the current activation step.
    Stopped,
    /// Declare the activation failed; supervision decides what happens.
    Failed(String),
}

impl<M: Message> Behavior<M> {
    /// A behavior handling messages only; signals are ignored.
    pub fn receive(
        on_message: impl FnMut(&mut ActorContext<'_, M>, M) -> Behavior<M> + Send + 'static,
    ) -> Self {
        Self::Receive(Receive {
            on_message: Box::new(on_message),
            on_signal: None,
        })
    }

    /// A behavior handling both messages and lifecycle signals.
    pub fn receive_with_signals(
        on_message: impl FnMut(&mut ActorContext<'_, M>, M) -> Behavior<M> + Send + 'static,
        on_signal: impl FnMut(&mut ActorContext<'_, M>, Signal) -> Behavior<M> + Send + 'static,
    ) -> Self {
        Self::Receive(Receive {
            on_message: Box::new(on_message),
            on_signal: Some(Box::new(on_signal)),
        })
    }

    /// Keep the current behavior.
    #[must_use]
    pub const fn same() -> Self {
        Self::Same
    }

    /// Terminate gracefully.
    #[must_use]
    pub const fn stopped() -> Self {
        Self::Stopped
    }

    /// Fail the activation with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Whether this value may start a cell. Only `receive` behaviors are
    /// legal initial states.
    #[must_use]
    pub(crate) const fn is_legal_initial(&self) -> bool {
        matches!(self, Self::Receive(_))
    }
}

impl<M: Message> std::fmt::Debug for Behavior<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Receive(_) => write!(f, "Behavior::Receive"),
            Self::Same => write!(f, "Behavior::Same"),
            Self::Stopped => write!(f, "Behavior::Stopped"),
            Self::Failed(reason) => write!(f, "Behavior::Failed({reason:?})"),
        }
    }
}

/// Produces a fresh behavior instance: invoked once at spawn and once per
/// restart, so restarted actors begin from clean state.
pub type BehaviorFactory<M> = std::sync::Arc<dyn Fn() -> Behavior<M> + Send + Sync>;
