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

#![forbid(unsafe_code)]

//! Arbor: a hierarchical actor-tree kernel.
//!
//! The kernel constructs and names actors in two side-by-side trees
//! (`/system` and `/user`), delivers messages through per-actor mailboxes
//! to value-typed behaviors, and multiplexes actor execution across a
//! fixed pool of worker threads via pluggable dispatchers. Within one
//! mailbox execution is strictly single-threaded — a CAS on the mailbox
//! status word admits at most one activation at a time — so actor code
//! needs no internal locking for state it owns.
//!
//! Asynchrony is messages, not suspended stacks: an activation runs to
//! completion without awaiting, and long work is decomposed into further
//! messages.
//!
//! ```no_run
//! use arbor::prelude::*;
//!
//! let system = ActorSystem::launch("demo", |_| {}).unwrap();
//! let counter = system
//!     .spawn(Naming::named("counter"), Props::default(), || {
//!         let mut total = 0u64;
//!         Behavior::receive(move |_, n: u64| {
//!             total += n;
//!             Behavior::same()
//!         })
//!     })
//!     .unwrap();
//! counter.tell(41);
//! counter.tell(1);
//! system.shutdown();
//! ```

pub mod address;
pub(crate) mod actor;
pub(crate) mod common;
pub mod dispatch;
pub(crate) mod mailbox;
pub mod message;

pub use actor::{
    ActorContext, ActorRef, Behavior, BehaviorFactory, Capacity, Props, Receive, RestartBackoff,
    Signal, SupervisorDirective, UntypedRef,
};
pub use common::{
    ActorSystem, BehaviorSettings, CellInfo, ConfigError, DeadLetters, LimitSettings, Naming,
    StartHandle, SystemServiceMsg, SystemSettings, SystemState, TimeoutSettings, TraverseAction,
    TreeView,
};

/// Convenient single-import surface.
pub mod prelude {
    pub use crate::actor::{
        ActorContext, ActorRef, Behavior, Capacity, Props, RestartBackoff, Signal,
        SupervisorDirective, UntypedRef,
    };
    pub use crate::address::{ActorAddress, ActorPath, Incarnation, PathRoot};
    pub use crate::common::{
        ActorSystem, ConfigError, Naming, StartHandle, SystemSettings, SystemState,
        TraverseAction,
    };
    pub use crate::dispatch::{DispatcherSelector, MessageDispatcher};
    pub use crate::message::{DispatchError, Message, SpawnError, TerminationReason};
}
