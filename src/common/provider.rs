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

//! Providers: each owns one actor tree rooted at a guardian.
//!
//! Two providers coexist per system — `/system` for kernel actors and
//! `/user` for application actors — so a user-side catastrophe can never
//! ride shared supervision into the kernel tree.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use tracing::{trace, warn};

use crate::actor::{
    ActorCell, ActorRef, AnyCell, Behavior, BehaviorFactory, Props, SupervisorDirective,
};
use crate::address::{ActorAddress, ActorPath, Incarnation, PathRoot};
use crate::common::naming::Naming;
use crate::common::start_handle::StartHandle;
use crate::common::system::KernelShared;
use crate::message::{Message, SpawnError, SystemMessage};

/// Tracks the number of live (non-guardian) cells in one tree so
/// `stop_all` can wait for the tree to drain.
pub(crate) struct LiveCount {
    count: AtomicUsize,
    gate: Mutex<()>,
    drained: Condvar,
}

impl LiveCount {
    fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            gate: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self
                .gate
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.drained.notify_all();
        }
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Wait until the count reaches zero or the deadline passes.
    fn wait_zero(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self
            .gate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while self.current() > 0 {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .drained
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard = next;
        }
        true
    }
}

/// Visitor verdict for one cell during a tree traversal.
#[derive(Debug)]
pub enum TraverseAction<T> {
    /// Descend into this cell's children.
    Continue,
    /// Do not descend below this cell.
    SkipSubtree,
    /// Abort the traversal.
    Stop,
    /// Record a value and descend.
    Accumulate(T),
}

/// What a traversal visitor sees of each live cell.
#[derive(Debug, Clone)]
pub struct CellInfo {
    /// The cell's address.
    pub address: ActorAddress,
    /// Type name of the cell's message type.
    pub message_type: &'static str,
    /// Number of direct children at visit time.
    pub children: usize,
}

/// Messages a guardian can receive. There are none: guardians exist to
/// anchor the tree and absorb escalations.
#[derive(Debug)]
pub(crate) enum GuardianCommand {}

fn guardian_behavior() -> Behavior<GuardianCommand> {
    Behavior::receive_with_signals(
        |_, command| match command {},
        |_, signal| {
            trace!(?signal, "guardian observed signal");
            Behavior::same()
        },
    )
}

/// The root of one actor tree, satisfying spawn, resolve, traverse, and
/// stop-all.
#[derive(Clone)]
pub(crate) struct Provider {
    tree: PathRoot,
    root: Arc<dyn AnyCell>,
    live: Arc<LiveCount>,
    stopping: Arc<AtomicBool>,
}

impl Provider {
    /// Create the tree's guardian and schedule its `Start`.
    pub(crate) fn new(tree: PathRoot, shared: &Arc<KernelShared>) -> Result<Self, SpawnError> {
        let live = Arc::new(LiveCount::new());
        let address = ActorAddress::new(ActorPath::root(tree), Incarnation::Perpetual);
        let factory: BehaviorFactory<GuardianCommand> = Arc::new(guardian_behavior);
        let guardian = ActorCell::create(
            shared.clone(),
            address,
            None,
            shared.dispatchers.pool.clone(),
            SupervisorDirective::Escalate,
            None,
            factory,
            live.clone(),
            false,
        )?;
        guardian.dispatch_claimed();
        Ok(Self {
            tree,
            root: guardian,
            live,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub(crate) fn root(&self) -> &Arc<dyn AnyCell> {
        &self.root
    }

    /// Spawn and immediately schedule.
    pub(crate) fn spawn_started<M: Message>(
        &self,
        shared: &Arc<KernelShared>,
        parent: &Arc<dyn AnyCell>,
        naming: &Naming,
        props: &Props,
        factory: BehaviorFactory<M>,
    ) -> Result<ActorRef<M>, SpawnError> {
        let (actor_ref, cell) = self.spawn_inner(shared, parent, naming, props, factory)?;
        cell.dispatch_claimed();
        Ok(actor_ref)
    }

    /// Spawn without scheduling; the returned handle's `wake()` performs
    /// the scheduling exactly once.
    pub(crate) fn spawn_deferred<M: Message>(
        &self,
        shared: &Arc<KernelShared>,
        parent: &Arc<dyn AnyCell>,
        naming: &Naming,
        props: &Props,
        factory: BehaviorFactory<M>,
    ) -> Result<(ActorRef<M>, StartHandle), SpawnError> {
        let (actor_ref, cell) = self.spawn_inner(shared, parent, naming, props, factory)?;
        let handle = StartHandle::new(Box::new(move || cell.dispatch_claimed()));
        Ok((actor_ref, handle))
    }

    /// Reserve the name, construct the cell, and link it under its parent.
    /// The reservation is released only after the parent's child map has
    /// become the authority for the name (and never for well-known
    /// actors, which keeps their names off-limits for the system's whole
    /// lifetime).
    fn spawn_inner<M: Message>(
        &self,
        shared: &Arc<KernelShared>,
        parent: &Arc<dyn AnyCell>,
        naming: &Naming,
        props: &Props,
        factory: BehaviorFactory<M>,
    ) -> Result<(ActorRef<M>, Arc<ActorCell<M>>), SpawnError> {
        if parent.is_closed() {
            return Err(SpawnError::Shutdown);
        }
        let dispatcher = shared.dispatchers.select(&props.dispatcher)?;
        let parent_path = parent.address().path().clone();
        let (name, reserved) = match naming {
            Naming::Explicit(name) => {
                crate::address::validate_segment(name, false)
                    .map_err(|_| SpawnError::InvalidName(name.clone()))?;
                shared
                    .naming
                    .reserve(&parent_path, name, |candidate| parent.has_child(candidate))?;
                (name.clone(), true)
            }
            Naming::Anonymous { prefix } => {
                crate::address::validate_segment(prefix, false)
                    .map_err(|_| SpawnError::InvalidName(prefix.clone()))?;
                (shared.naming.next_anonymous(&parent_path, prefix), false)
            }
        };
        let child_path = match parent_path.child_internal(&name, true) {
            Ok(path) => path,
            Err(err) => {
                if reserved {
                    shared.naming.release(&parent_path, &name);
                }
                return Err(err.into());
            }
        };
        let incarnation = if props.well_known {
            Incarnation::Perpetual
        } else {
            Incarnation::random()
        };
        let address = ActorAddress::new(child_path, incarnation);
        let parent_edge: Weak<dyn AnyCell> = Arc::downgrade(parent);
        let cell = match ActorCell::create(
            shared.clone(),
            address,
            Some(parent_edge),
            dispatcher,
            props.supervision.clone(),
            props.mailbox_capacity.limit(),
            factory,
            self.live.clone(),
            true,
        ) {
            Ok(cell) => cell,
            Err(err) => {
                if reserved {
                    shared.naming.release(&parent_path, &name);
                }
                return Err(err);
            }
        };
        parent.add_child(name.clone(), cell.clone());
        if reserved && !props.well_known {
            shared.naming.release(&parent_path, &name);
        }
        trace!(actor = %cell.address(), "spawned");
        Ok((ActorRef::from_cell(cell.clone()), cell))
    }

    /// Walk `segments` down from the guardian. `None` is a resolve miss;
    /// the caller turns it into a dead-letter ref.
    pub(crate) fn resolve_segments(&self, segments: &[String]) -> Option<Arc<dyn AnyCell>> {
        let mut current = self.root.clone();
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Depth-first visit over the live tree. Not a snapshot: cells may be
    /// created or destroyed while the walk is in progress.
    pub(crate) fn traverse<T>(
        &self,
        visit: &mut impl FnMut(&CellInfo) -> TraverseAction<T>,
        out: &mut Vec<T>,
    ) -> bool {
        let mut stack = vec![self.root.clone()];
        while let Some(cell) = stack.pop() {
            let info = CellInfo {
                address: cell.address().clone(),
                message_type: cell.message_type_name(),
                children: cell.child_count(),
            };
            match visit(&info) {
                TraverseAction::Continue => {}
                TraverseAction::Accumulate(value) => out.push(value),
                TraverseAction::SkipSubtree => continue,
                TraverseAction::Stop => return false,
            }
            let mut children = cell.children_sorted();
            children.reverse();
            stack.extend(children);
        }
        true
    }

    /// Post a terminal system message to every direct child of the
    /// guardian and wait (bounded) for the tree to drain. Idempotent: a
    /// second call returns immediately without blocking.
    pub(crate) fn stop_all(&self, timeout: Duration) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        for child in self.root.children_sorted() {
            child.enqueue_system_msg(SystemMessage::Stop);
        }
        if !self.live.wait_zero(timeout) {
            warn!(
                tree = %ActorPath::root(self.tree),
                remaining = self.live.current(),
                "stop_all deadline exceeded; proceeding"
            );
        }
    }
}
