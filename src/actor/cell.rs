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

//! The actor cell: private runtime state of one actor.
//!
//! A cell owns its behavior, children, watcher set, and mailbox, and runs
//! activations handed to it by its dispatcher. Parents strongly own
//! children; the child's back-edge to its parent is weak, and watcher
//! edges are addresses resolved through the provider at termination time,
//! so the tree stays acyclic for ownership purposes.

use std::any::{type_name, Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use dashmap::{DashMap, DashSet};
use tracing::{debug, error, trace, warn};

use crate::actor::behavior::{Behavior, BehaviorFactory, Receive, Signal};
use crate::actor::supervision::SupervisorDirective;
use crate::actor::{ActorRef, Props};
use crate::address::ActorAddress;
use crate::common::naming::Naming;
use crate::common::provider::LiveCount;
use crate::common::system::{KernelShared, SystemState};
use crate::dispatch::MessageDispatcher;
use crate::mailbox::{EnqueueRejection, Mailbox};
use crate::message::{Message, SpawnError, SystemMessage, TerminationReason};

/// Type-erased view of a cell, used by the tree (child maps, traversal,
/// resolution) where message types differ per node.
pub(crate) trait AnyCell: Send + Sync {
    fn address(&self) -> &ActorAddress;
    fn child(&self, name: &str) -> Option<Arc<dyn AnyCell>>;
    fn has_child(&self, name: &str) -> bool;
    fn child_count(&self) -> usize;
    /// Children in ascending name order, for deterministic traversal and
    /// stop cascades.
    fn children_sorted(&self) -> Vec<Arc<dyn AnyCell>>;
    fn add_child(&self, name: String, cell: Arc<dyn AnyCell>);
    fn enqueue_system_msg(self: Arc<Self>, message: SystemMessage);
    /// Enqueue a type-erased user message; hands the box back on type
    /// mismatch so the caller can dead-letter it.
    fn enqueue_any(self: Arc<Self>, message: Box<dyn Any + Send>)
        -> Result<(), Box<dyn Any + Send>>;
    fn message_type(&self) -> TypeId;
    fn message_type_name(&self) -> &'static str;
    fn is_closed(&self) -> bool;
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct CellState<M: Message> {
    behavior: Behavior<M>,
    factory: BehaviorFactory<M>,
    restarts: u32,
    cause: Option<TerminationReason>,
}

pub(crate) struct ActorCell<M: Message> {
    address: ActorAddress,
    parent: Option<Weak<dyn AnyCell>>,
    mailbox: Mailbox<M>,
    dispatcher: Arc<dyn MessageDispatcher>,
    children: DashMap<String, Arc<dyn AnyCell>>,
    watchers: DashSet<ActorAddress>,
    directive: SupervisorDirective,
    state: Mutex<CellState<M>>,
    shared: Arc<KernelShared>,
    live: Arc<LiveCount>,
    counted: bool,
    throughput: usize,
}

impl<M: Message> ActorCell<M> {
    /// Construct a cell with its mailbox pre-claimed for scheduling.
    ///
    /// Every cell starts through the deferred-start path: the `SCHEDULED`
    /// bit is held from birth so nothing can race the first activation,
    /// and `dispatch_claimed` (directly, or via a `StartHandle::wake`)
    /// transfers the claim to the dispatcher exactly once.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        shared: Arc<KernelShared>,
        address: ActorAddress,
        parent: Option<Weak<dyn AnyCell>>,
        dispatcher: Arc<dyn MessageDispatcher>,
        directive: SupervisorDirective,
        capacity: Option<usize>,
        factory: BehaviorFactory<M>,
        live: Arc<LiveCount>,
        counted: bool,
    ) -> Result<Arc<Self>, SpawnError> {
        let initial = catch_unwind(AssertUnwindSafe(|| factory()))
            .map_err(|_| SpawnError::InvalidInitialBehavior)?;
        if !initial.is_legal_initial() {
            return Err(SpawnError::InvalidInitialBehavior);
        }
        let throughput = shared.settings.limits.throughput;
        let cell = Arc::new(Self {
            address,
            parent,
            mailbox: Mailbox::new(capacity),
            dispatcher,
            children: DashMap::new(),
            watchers: DashSet::new(),
            directive,
            state: Mutex::new(CellState {
                behavior: initial,
                factory,
                restarts: 0,
                cause: None,
            }),
            shared,
            live,
            counted,
            throughput,
        });
        if counted {
            cell.live.increment();
        }
        cell.mailbox.push_system(SystemMessage::Start);
        // No ref to this cell exists yet, so the claim cannot be lost.
        let _claimed = cell.mailbox.try_claim_schedule();
        debug_assert!(_claimed, "a fresh mailbox must be claimable");
        Ok(cell)
    }

    pub(crate) fn address(&self) -> &ActorAddress {
        &self.address
    }

    pub(crate) fn shared(&self) -> &Arc<KernelShared> {
        &self.shared
    }

    fn lock_state(&self) -> MutexGuard<'_, CellState<M>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Enqueue a user message and schedule if this send won the CAS.
    pub(crate) fn enqueue_user(self: &Arc<Self>, message: M) {
        match self.mailbox.push_user(message) {
            Ok(()) => self.try_dispatch(),
            Err(EnqueueRejection::Closed(_)) => {
                self.shared
                    .dead_letters
                    .publish(&self.address, type_name::<M>(), "mailbox closed");
            }
            Err(EnqueueRejection::Full(_)) => {
                self.shared
                    .dead_letters
                    .publish(&self.address, type_name::<M>(), "mailbox full");
            }
        }
    }

    pub(crate) fn enqueue_system(self: &Arc<Self>, message: SystemMessage) {
        if self.mailbox.is_terminated() {
            self.absorb_post_termination(message);
            return;
        }
        self.mailbox.push_system(message);
        if self.mailbox.is_terminated() {
            // Finalization may already have drained the queue; sweep what
            // we find so a late Watch still gets its notification.
            while let Some(message) = self.mailbox.pop_system() {
                self.absorb_post_termination(message);
            }
            return;
        }
        self.try_dispatch();
    }

    fn absorb_post_termination(&self, message: SystemMessage) {
        match message {
            SystemMessage::Watch(watcher) => self.notify_watcher(&watcher),
            other => trace!(actor = %self.address, message = ?other, "system message after termination"),
        }
    }

    fn try_dispatch(self: &Arc<Self>) {
        if self.mailbox.try_claim_schedule() {
            self.dispatch_claimed();
        }
    }

    /// Hand the already-claimed activation to the dispatcher.
    pub(crate) fn dispatch_claimed(self: &Arc<Self>) {
        let cell = self.clone();
        if self
            .dispatcher
            .execute(Box::new(move || cell.run()))
            .is_err()
        {
            self.on_dispatcher_shutdown();
        }
    }

    /// Dispatcher refused the job: close and route queued user messages to
    /// dead letters. No further activation will run.
    fn on_dispatcher_shutdown(&self) {
        self.mailbox.close();
        let flushed = self.mailbox.drain_user().len();
        if flushed > 0 {
            for _ in 0..flushed {
                self.shared
                    .dead_letters
                    .publish(&self.address, type_name::<M>(), "dispatcher shut down");
            }
        }
        debug!(actor = %self.address, "dispatcher rejected activation; mailbox closed");
    }

    /// One activation: drain system messages, then up to `throughput`
    /// user messages, then release the schedule claim and re-claim if
    /// traffic remains.
    pub(crate) fn run(self: Arc<Self>) {
        self.drain_system();
        if self.mailbox.is_terminated() {
            return;
        }
        if !self.mailbox.is_closed() && !self.mailbox.is_suspended() {
            for _ in 0..self.throughput {
                if self.mailbox.has_system()
                    || self.mailbox.is_closed()
                    || self.mailbox.is_suspended()
                {
                    break;
                }
                let Some(message) = self.mailbox.pop_user() else {
                    break;
                };
                self.invoke_message(message);
            }
            self.drain_system();
            if self.mailbox.is_terminated() {
                return;
            }
        }
        self.mailbox.release_schedule();
        self.try_dispatch();
    }

    fn drain_system(self: &Arc<Self>) {
        while let Some(message) = self.mailbox.pop_system() {
            self.handle_system(message);
            if self.mailbox.is_terminated() {
                return;
            }
        }
    }

    fn handle_system(self: &Arc<Self>, message: SystemMessage) {
        match message {
            SystemMessage::Start => self.deliver_signal(Signal::Started),
            SystemMessage::Stop | SystemMessage::PoisonPill => {
                let mut state = self.lock_state();
                self.begin_stop_locked(&mut state, TerminationReason::Normal);
            }
            SystemMessage::Resume => self.mailbox.clear_suspended(),
            SystemMessage::Watch(watcher) => {
                self.watchers.insert(watcher);
            }
            SystemMessage::Unwatch(watcher) => {
                self.watchers.remove(&watcher);
            }
            SystemMessage::Terminated(address) => {
                self.deliver_signal(Signal::Terminated(address));
            }
            SystemMessage::ChildTerminated(address, reason) => {
                self.children.remove(address.name());
                self.deliver_signal(Signal::ChildTerminated(address, reason));
                let mut state = self.lock_state();
                self.maybe_finalize_locked(&mut state);
            }
            SystemMessage::Failed(child, reason) => {
                debug!(actor = %self.address, child = %child, %reason, "child escalated failure");
                let mut state = self.lock_state();
                self.on_failure_locked(&mut state, reason);
            }
        }
    }

    fn invoke_message(self: &Arc<Self>, message: M) {
        let mut state = self.lock_state();
        let state_ref = &mut *state;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            match &mut state_ref.behavior {
                Behavior::Receive(receive) => {
                    let mut ctx = ActorContext { cell: self };
                    (receive.on_message)(&mut ctx, message)
                }
                // Non-receive behaviors never reach here; user messages
                // stop flowing once a cell is stopping.
                _ => Behavior::Same,
            }
        }));
        match outcome {
            Ok(next) => {
                // A handled message ends a consecutive-restart streak.
                if matches!(next, Behavior::Same | Behavior::Receive(_)) {
                    state_ref.restarts = 0;
                }
                self.apply_next_locked(state_ref, next);
            }
            Err(payload) => self.on_failure_locked(state_ref, panic_message(payload)),
        }
    }

    fn deliver_signal(self: &Arc<Self>, signal: Signal) {
        let mut state = self.lock_state();
        let state_ref = &mut *state;
        match self.signal_locked(state_ref, signal) {
            Ok(next) => self.apply_next_locked(state_ref, next),
            Err(reason) => self.on_failure_locked(state_ref, reason),
        }
    }

    fn signal_locked(
        self: &Arc<Self>,
        state: &mut CellState<M>,
        signal: Signal,
    ) -> Result<Behavior<M>, String> {
        let outcome = catch_unwind(AssertUnwindSafe(|| match &mut state.behavior {
            Behavior::Receive(Receive {
                on_signal: Some(on_signal),
                ..
            }) => {
                let mut ctx = ActorContext { cell: self };
                on_signal(&mut ctx, signal)
            }
            _ => Behavior::Same,
        }));
        outcome.map_err(panic_message)
    }

    fn apply_next_locked(self: &Arc<Self>, state: &mut CellState<M>, next: Behavior<M>) {
        match next {
            Behavior::Same => {}
            receive @ Behavior::Receive(_) => state.behavior = receive,
            Behavior::Stopped => self.begin_stop_locked(state, TerminationReason::Normal),
            Behavior::Failed(reason) => self.on_failure_locked(state, reason),
        }
    }

    /// Supervision: the cell's own directive decides the disposition of a
    /// failed activation. Failures never unwind past this point.
    fn on_failure_locked(self: &Arc<Self>, state: &mut CellState<M>, reason: String) {
        if self.mailbox.is_closed() {
            // Already stopping; the failure cannot change the outcome.
            trace!(actor = %self.address, %reason, "failure while stopping ignored");
            return;
        }
        match &self.directive {
            SupervisorDirective::Stop => {
                warn!(actor = %self.address, %reason, "activation failed; stopping");
                self.begin_stop_locked(state, TerminationReason::Failure(reason));
            }
            SupervisorDirective::Escalate => {
                match self.parent.as_ref().and_then(Weak::upgrade) {
                    Some(parent) => {
                        warn!(actor = %self.address, %reason, "activation failed; escalating");
                        parent.enqueue_system_msg(SystemMessage::Failed(
                            self.address.clone(),
                            reason.clone(),
                        ));
                    }
                    None => {
                        error!(actor = %self.address, %reason, "guardian failure; shutting system down");
                        self.shared.initiate_shutdown();
                    }
                }
                self.begin_stop_locked(state, TerminationReason::Failure(reason));
            }
            SupervisorDirective::Restart(backoff) => {
                if self.shared.state() >= SystemState::ShuttingDown {
                    self.begin_stop_locked(state, TerminationReason::Failure(reason));
                    return;
                }
                state.restarts += 1;
                if backoff.exhausted(state.restarts) {
                    warn!(actor = %self.address, restarts = state.restarts, "restart limit exhausted; stopping");
                    self.begin_stop_locked(state, TerminationReason::Failure(reason));
                    return;
                }
                debug!(actor = %self.address, %reason, restart = state.restarts, "activation failed; restarting");
                // PreRestart goes to the failing instance; its outcome is
                // irrelevant, it is about to be discarded.
                let _ = self.signal_locked(state, Signal::PreRestart);
                let factory = state.factory.clone();
                let fresh = catch_unwind(AssertUnwindSafe(|| factory()));
                match fresh {
                    Ok(behavior) if behavior.is_legal_initial() => state.behavior = behavior,
                    _ => {
                        error!(actor = %self.address, "behavior factory failed during restart; stopping");
                        self.begin_stop_locked(
                            state,
                            TerminationReason::Failure("restart factory failure".to_string()),
                        );
                        return;
                    }
                }
                match self.signal_locked(state, Signal::PostRestart) {
                    Ok(next @ (Behavior::Same | Behavior::Receive(_))) => {
                        self.apply_next_locked(state, next);
                    }
                    // A failure inside PostRestart does not re-enter the
                    // restart loop; the cell stops.
                    Ok(Behavior::Stopped) => {
                        self.begin_stop_locked(state, TerminationReason::Normal);
                        return;
                    }
                    Ok(Behavior::Failed(post_reason)) | Err(post_reason) => {
                        self.begin_stop_locked(state, TerminationReason::Failure(post_reason));
                        return;
                    }
                }
                let delay = backoff.delay(state.restarts);
                if !delay.is_zero() {
                    self.mailbox.set_suspended();
                    let cell = Arc::downgrade(self);
                    self.shared.timer.spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(cell) = cell.upgrade() {
                            cell.enqueue_system(SystemMessage::Resume);
                        }
                    });
                }
            }
        }
    }

    /// Close the mailbox and cascade termination through the children.
    /// The cell finalizes once every child has reported `ChildTerminated`.
    fn begin_stop_locked(self: &Arc<Self>, state: &mut CellState<M>, cause: TerminationReason) {
        if !self.mailbox.close() {
            return;
        }
        state.cause = Some(cause);
        let children = self.children_snapshot();
        if children.is_empty() {
            self.finalize_locked(state);
        } else {
            trace!(actor = %self.address, children = children.len(), "stopping children");
            for child in children {
                child.enqueue_system_msg(SystemMessage::Stop);
            }
        }
    }

    fn maybe_finalize_locked(self: &Arc<Self>, state: &mut CellState<M>) {
        if self.mailbox.is_closed() && !self.mailbox.is_terminated() && self.children.is_empty() {
            self.finalize_locked(state);
        }
    }

    /// Last step of a lifetime: drain leftover system traffic, notify
    /// watchers exactly once, dead-letter the user queue, tell the parent.
    fn finalize_locked(self: &Arc<Self>, state: &mut CellState<M>) {
        self.mailbox.set_terminated();
        while let Some(message) = self.mailbox.pop_system() {
            match message {
                SystemMessage::Watch(watcher) => {
                    self.watchers.insert(watcher);
                }
                SystemMessage::Unwatch(watcher) => {
                    self.watchers.remove(&watcher);
                }
                other => {
                    trace!(actor = %self.address, message = ?other, "system message dropped at termination");
                }
            }
        }
        let watchers: Vec<ActorAddress> = self.watchers.iter().map(|w| w.key().clone()).collect();
        self.watchers.clear();
        for watcher in &watchers {
            self.notify_watcher(watcher);
        }
        let undelivered = self.mailbox.drain_user();
        for _ in &undelivered {
            self.shared
                .dead_letters
                .publish(&self.address, type_name::<M>(), "terminated");
        }
        let cause = state.cause.take().unwrap_or(TerminationReason::Normal);
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.enqueue_system_msg(SystemMessage::ChildTerminated(
                self.address.clone(),
                cause.clone(),
            ));
        }
        // Dropping the behavior here breaks ref cycles held in handler
        // closures.
        state.behavior = Behavior::Stopped;
        if self.counted {
            self.live.decrement();
        }
        trace!(actor = %self.address, %cause, "terminated");
    }

    fn notify_watcher(&self, watcher: &ActorAddress) {
        if watcher == &self.address {
            return;
        }
        // Watchers are addresses, not owning edges; absent ones are
        // silently skipped.
        if let Some(cell) = self.shared.resolve_any(watcher) {
            cell.enqueue_system_msg(SystemMessage::Terminated(self.address.clone()));
        }
    }

    fn children_snapshot(&self) -> Vec<Arc<dyn AnyCell>> {
        let mut children: Vec<(String, Arc<dyn AnyCell>)> = self
            .children
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children.into_iter().map(|(_, cell)| cell).collect()
    }
}

impl<M: Message> AnyCell for ActorCell<M> {
    fn address(&self) -> &ActorAddress {
        &self.address
    }

    fn child(&self, name: &str) -> Option<Arc<dyn AnyCell>> {
        self.children.get(name).map(|entry| entry.value().clone())
    }

    fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn children_sorted(&self) -> Vec<Arc<dyn AnyCell>> {
        self.children_snapshot()
    }

    fn add_child(&self, name: String, cell: Arc<dyn AnyCell>) {
        self.children.insert(name, cell);
    }

    fn enqueue_system_msg(self: Arc<Self>, message: SystemMessage) {
        ActorCell::enqueue_system(&self, message);
    }

    fn enqueue_any(
        self: Arc<Self>,
        message: Box<dyn Any + Send>,
    ) -> Result<(), Box<dyn Any + Send>> {
        match message.downcast::<M>() {
            Ok(message) => {
                self.enqueue_user(*message);
                Ok(())
            }
            Err(message) => Err(message),
        }
    }

    fn message_type(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn message_type_name(&self) -> &'static str {
        type_name::<M>()
    }

    fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The view of the cell handed to behavior closures during an activation.
pub struct ActorContext<'a, M: Message> {
    pub(crate) cell: &'a Arc<ActorCell<M>>,
}

impl<M: Message> ActorContext<'_, M> {
    /// This actor's address.
    #[must_use]
    pub fn address(&self) -> &ActorAddress {
        self.cell.address()
    }

    /// A ref to this actor, for reply addresses.
    #[must_use]
    pub fn self_ref(&self) -> ActorRef<M> {
        ActorRef::from_cell(self.cell.clone())
    }

    /// Spawn a supervised child under this actor.
    pub fn spawn_child<N: Message>(
        &self,
        naming: Naming,
        props: Props,
        factory: impl Fn() -> Behavior<N> + Send + Sync + 'static,
    ) -> Result<ActorRef<N>, SpawnError> {
        let shared = self.cell.shared();
        let provider = shared
            .provider_for(self.address().path().tree())
            .ok_or(SpawnError::Shutdown)?;
        let parent: Arc<dyn AnyCell> = self.cell.clone();
        provider.spawn_started(shared, &parent, &naming, &props, Arc::new(factory))
    }

    /// Register this actor for a `Terminated` signal when `target` ends.
    pub fn watch<N: Message>(&self, target: &ActorRef<N>) {
        self.self_ref().watch(target);
    }

    /// Remove a previously registered watch.
    pub fn unwatch<N: Message>(&self, target: &ActorRef<N>) {
        self.self_ref().unwatch(target);
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
