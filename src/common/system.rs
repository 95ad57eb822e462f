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

//! The actor system: the process-level container wiring dispatchers,
//! providers, naming, and dead letters together, with an invariant
//! startup and shutdown order.
//!
//! Startup prepares well-known actors through the deferred-start
//! protocol: each is spawned unscheduled, installed into its system slot,
//! and woken only after every system field is populated — scheduling and
//! field initialisation are decoupled, and the wake is a single explicit
//! edge.

use std::any::TypeId;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, error, info, trace, warn};

use crate::dispatch::MessageDispatcher;

use crate::actor::{
    ActorCell, ActorRef, AnyCell, Behavior, BehaviorFactory, Props, UntypedRef,
};
use crate::address::{ActorAddress, ActorPath, Incarnation, PathRoot};
use crate::common::config::{ConfigError, SystemSettings};
use crate::common::dead_letters::DeadLetters;
use crate::common::naming::{Naming, NamingContext};
use crate::common::provider::{CellInfo, Provider, TraverseAction};
use crate::common::start_handle::StartHandle;
use crate::dispatch::{CallingThread, Dispatchers, FixedThreadPool};
use crate::message::{Message, SpawnError};

/// One-way lifecycle of an actor system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SystemState {
    Created = 0,
    Running = 1,
    ShuttingDown = 2,
    Terminated = 3,
}

impl SystemState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::ShuttingDown,
            _ => Self::Terminated,
        }
    }
}

/// Protocol of the kernel's placeholder well-known services. The real
/// receptionist and replicator protocols belong to out-of-scope
/// collaborators; the kernel only guarantees their slots and start order.
#[derive(Debug, Clone)]
pub enum SystemServiceMsg {
    /// Liveness probe; logged and discarded.
    Ping,
}

#[derive(Default)]
pub(crate) struct WellKnownSlots {
    pub(crate) receptionist: Option<ActorRef<SystemServiceMsg>>,
    pub(crate) replicator: Option<ActorRef<SystemServiceMsg>>,
}

#[derive(Clone)]
pub(crate) struct Providers {
    pub(crate) system: Provider,
    pub(crate) user: Provider,
}

/// State shared between the system handle and every cell it owns.
pub(crate) struct KernelShared {
    pub(crate) settings: SystemSettings,
    pub(crate) naming: NamingContext,
    pub(crate) dead_letters: Arc<DeadLetters>,
    pub(crate) dispatchers: Dispatchers,
    /// Handle into the event-loop group; backs restart-backoff timers and
    /// external-event-loop dispatch.
    pub(crate) timer: tokio::runtime::Handle,
    state: AtomicU8,
    providers: RwLock<Option<Providers>>,
    slots: RwLock<WellKnownSlots>,
    shutdown_gate: Mutex<()>,
}

impl KernelShared {
    pub(crate) fn state(&self) -> SystemState {
        SystemState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transitions are one-way; attempts to move backwards are ignored.
    fn advance_state(&self, state: SystemState) {
        self.state.fetch_max(state as u8, Ordering::AcqRel);
    }

    pub(crate) fn provider_for(&self, tree: PathRoot) -> Option<Provider> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        providers.as_ref().map(|p| match tree {
            PathRoot::System => p.system.clone(),
            _ => p.user.clone(),
        })
    }

    /// Resolve an address to a live cell, walking the proper tree and
    /// checking the incarnation when the request carries one.
    pub(crate) fn resolve_any(&self, address: &ActorAddress) -> Option<Arc<dyn AnyCell>> {
        if address.path().tree() == PathRoot::Dead {
            return None;
        }
        let provider = self.provider_for(address.path().tree())?;
        let cell = provider.resolve_segments(address.path().segments())?;
        if let Incarnation::Tag(_) = address.incarnation() {
            if cell.address().incarnation() != address.incarnation() {
                return None;
            }
        }
        Some(cell)
    }

    /// Escalation at a tree root: shut the system down from a detached
    /// thread, never from the failing worker.
    pub(crate) fn initiate_shutdown(self: &Arc<Self>) {
        if self.state() >= SystemState::ShuttingDown {
            return;
        }
        let shared = self.clone();
        let spawned = std::thread::Builder::new()
            .name("arbor-shutdown".to_string())
            .spawn(move || shared.run_shutdown());
        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn shutdown thread");
        }
    }

    /// The ordered core of shutdown. Idempotent and serialized; a second
    /// caller blocks until the first finishes, then returns.
    pub(crate) fn run_shutdown(&self) {
        let _guard = self
            .shutdown_gate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.state() == SystemState::Terminated {
            return;
        }
        self.advance_state(SystemState::ShuttingDown);
        info!("actor system shutting down");
        // Clustering is out of scope: with no cluster shell bound the
        // unbind step is a no-op inside its configured deadline.
        debug!(
            deadline_ms = self.settings.timeouts.unbind_timeout_ms,
            "no cluster shell bound; skipping unbind"
        );
        let providers = {
            self.providers
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        };
        if let Some(providers) = providers {
            providers.user.stop_all(self.settings.stop_all_timeout());
            providers.system.stop_all(self.settings.stop_all_timeout());
        }
        self.dispatchers
            .pool
            .shutdown(self.settings.dispatcher_drain_timeout());
        self.dispatchers
            .calling_thread
            .shutdown(std::time::Duration::ZERO);
        *self
            .providers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        {
            let mut slots = self
                .slots
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.replicator = None;
            // Post-shutdown sends to the receptionist are absorbed safely.
            slots.receptionist = Some(ActorRef::dead(
                well_known_address("receptionist"),
                self.dead_letters.clone(),
            ));
        }
        self.advance_state(SystemState::Terminated);
        info!("actor system terminated");
    }
}

fn well_known_address(name: &str) -> ActorAddress {
    match ActorPath::root(PathRoot::System).child(name) {
        Ok(path) => ActorAddress::new(path, Incarnation::Perpetual),
        Err(_) => ActorAddress::dead_letters(),
    }
}

fn system_service_behavior(service: &'static str) -> Behavior<SystemServiceMsg> {
    Behavior::receive_with_signals(
        move |_, message| {
            trace!(service, ?message, "system service message");
            Behavior::same()
        },
        move |_, signal| {
            trace!(service, ?signal, "system service signal");
            Behavior::same()
        },
    )
}

/// A traversable view over both trees, the seam a serialization registry
/// would be parameterised with.
#[derive(Clone)]
pub struct TreeView {
    system: Provider,
    user: Provider,
}

impl TreeView {
    /// Visit every live cell, system tree first, depth-first within each
    /// tree.
    pub fn traverse_all<T>(
        &self,
        mut visit: impl FnMut(&CellInfo) -> TraverseAction<T>,
    ) -> Vec<T> {
        let mut out = Vec::new();
        if self.system.traverse(&mut visit, &mut out) {
            self.user.traverse(&mut visit, &mut out);
        }
        out
    }
}

/// The process-level actor-system container.
///
/// Created with [`ActorSystem::launch`]; offers spawn, resolve, and
/// shutdown at the boundary. Every ref carries (transitively) the system
/// it belongs to — there is no ambient global, and tests create and tear
/// down systems in isolation.
pub struct ActorSystem {
    name: String,
    shared: Arc<KernelShared>,
    event_loop: Mutex<Option<tokio::runtime::Runtime>>,
    system_provider: Provider,
    user_provider: Provider,
}

impl ActorSystem {
    /// Construct and start a system. The startup order is invariant:
    /// settings, event-loop group and dispatcher pool, dead letters, the
    /// two providers, then well-known actors via the deferred-start
    /// protocol, woken only after every slot is installed.
    pub fn launch(
        name: impl Into<String>,
        configure: impl FnOnce(&mut SystemSettings),
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut settings = SystemSettings::default();
        configure(&mut settings);
        settings.validate()?;
        if settings.behavior.install_backtrace_hook {
            install_backtrace_hook();
        }
        let event_loop = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.limits.event_loop_threads)
            .thread_name("arbor-loop")
            .enable_time()
            .build()
            .map_err(|err| ConfigError::EventLoop(err.to_string()))?;
        let pool = FixedThreadPool::new(settings.limits.effective_worker_threads(), "arbor-worker");
        let dead_letters = Arc::new(DeadLetters::new());
        let shared = Arc::new(KernelShared {
            settings,
            naming: NamingContext::new(),
            dead_letters,
            dispatchers: Dispatchers {
                pool,
                calling_thread: Arc::new(CallingThread::new()),
            },
            timer: event_loop.handle().clone(),
            state: AtomicU8::new(SystemState::Created as u8),
            providers: RwLock::new(None),
            slots: RwLock::new(WellKnownSlots::default()),
            shutdown_gate: Mutex::new(()),
        });
        let system_provider = Provider::new(PathRoot::System, &shared)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let user_provider = Provider::new(PathRoot::User, &shared)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        *shared
            .providers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Providers {
            system: system_provider.clone(),
            user: user_provider.clone(),
        });
        // Well-known actors reference system state during their Start, so
        // installation strictly precedes scheduling.
        let well_known = Props::default().well_known();
        let (receptionist, wake_receptionist) = system_provider
            .spawn_deferred(
                &shared,
                system_provider.root(),
                &Naming::named("receptionist"),
                &well_known,
                Arc::new(|| system_service_behavior("receptionist")),
            )
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let (replicator, wake_replicator) = system_provider
            .spawn_deferred(
                &shared,
                system_provider.root(),
                &Naming::named("replicator"),
                &well_known,
                Arc::new(|| system_service_behavior("replicator")),
            )
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        {
            let mut slots = shared
                .slots
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.receptionist = Some(receptionist);
            slots.replicator = Some(replicator);
        }
        shared.advance_state(SystemState::Running);
        // Every field is populated; now, and only now, the single wake
        // edge fires for each prepared actor, in preparation order.
        wake_receptionist.wake();
        wake_replicator.wake();
        info!(system = %name, "actor system running");
        Ok(Self {
            name,
            shared,
            event_loop: Mutex::new(Some(event_loop)),
            system_provider,
            user_provider,
        })
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The settings the system was launched with.
    #[must_use]
    pub fn settings(&self) -> &SystemSettings {
        &self.shared.settings
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SystemState {
        self.shared.state()
    }

    /// The dead-letter sink, for observability.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<DeadLetters> {
        &self.shared.dead_letters
    }

    /// The receptionist slot; rebound to dead letters after shutdown.
    #[must_use]
    pub fn receptionist(&self) -> Option<ActorRef<SystemServiceMsg>> {
        self.shared
            .slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .receptionist
            .clone()
    }

    /// Spawn a top-level actor under the user guardian and schedule it.
    pub fn spawn<M: Message>(
        &self,
        naming: Naming,
        props: Props,
        factory: impl Fn() -> Behavior<M> + Send + Sync + 'static,
    ) -> Result<ActorRef<M>, SpawnError> {
        self.check_spawnable()?;
        self.user_provider.spawn_started(
            &self.shared,
            self.user_provider.root(),
            &naming,
            &props,
            Arc::new(factory) as BehaviorFactory<M>,
        )
    }

    /// Spawn a top-level user actor without scheduling it; the returned
    /// handle's `wake()` schedules it exactly once.
    pub fn spawn_deferred<M: Message>(
        &self,
        naming: Naming,
        props: Props,
        factory: impl Fn() -> Behavior<M> + Send + Sync + 'static,
    ) -> Result<(ActorRef<M>, StartHandle), SpawnError> {
        self.check_spawnable()?;
        self.user_provider.spawn_deferred(
            &self.shared,
            self.user_provider.root(),
            &naming,
            &props,
            Arc::new(factory) as BehaviorFactory<M>,
        )
    }

    /// Spawn an actor in the system tree through the deferred-start
    /// protocol, as custom bootstraps do for their own well-known actors.
    pub fn spawn_system_deferred<M: Message>(
        &self,
        naming: Naming,
        props: Props,
        factory: impl Fn() -> Behavior<M> + Send + Sync + 'static,
    ) -> Result<(ActorRef<M>, StartHandle), SpawnError> {
        self.check_spawnable()?;
        self.system_provider.spawn_deferred(
            &self.shared,
            self.system_provider.root(),
            &naming,
            &props,
            Arc::new(factory) as BehaviorFactory<M>,
        )
    }

    fn check_spawnable(&self) -> Result<(), SpawnError> {
        if self.shared.state() >= SystemState::ShuttingDown {
            return Err(SpawnError::Shutdown);
        }
        Ok(())
    }

    /// Resolve a rendered path to a typed ref.
    ///
    /// Resolution never fails loudly: a miss, a stale incarnation, or a
    /// message-type mismatch yields a dead-letter ref bound to the
    /// requested address, so sends succeed and are recorded.
    pub fn resolve<M: Message>(&self, path: &str) -> ActorRef<M> {
        let address: ActorAddress = match path.parse() {
            Ok(address) => address,
            Err(err) => {
                warn!(%path, error = %err, "resolve failed: unparseable path");
                return ActorRef::dead(
                    self.shared.dead_letters.address().clone(),
                    self.shared.dead_letters.clone(),
                );
            }
        };
        if address.path().tree() == PathRoot::Dead {
            return ActorRef::dead(address, self.shared.dead_letters.clone());
        }
        match self.shared.resolve_any(&address) {
            Some(cell) => {
                if cell.message_type() == TypeId::of::<M>() {
                    match cell.as_any_arc().downcast::<ActorCell<M>>() {
                        Ok(cell) => ActorRef::from_cell(cell),
                        Err(_) => {
                            ActorRef::dead(address, self.shared.dead_letters.clone())
                        }
                    }
                } else {
                    warn!(
                        %address,
                        expected = cell.message_type_name(),
                        requested = std::any::type_name::<M>(),
                        "resolve failed: message type mismatch"
                    );
                    ActorRef::dead(address, self.shared.dead_letters.clone())
                }
            }
            None => {
                debug!(%address, "resolve miss; binding to dead letters");
                ActorRef::dead(address, self.shared.dead_letters.clone())
            }
        }
    }

    /// Resolve a rendered path without committing to a message type;
    /// type checks happen per send.
    pub fn resolve_untyped(&self, path: &str) -> UntypedRef {
        let address: ActorAddress = match path.parse() {
            Ok(address) => address,
            Err(err) => {
                warn!(%path, error = %err, "resolve failed: unparseable path");
                return UntypedRef::new(
                    self.shared.dead_letters.address().clone(),
                    None,
                    self.shared.dead_letters.clone(),
                );
            }
        };
        let target = self.shared.resolve_any(&address);
        UntypedRef::new(address, target, self.shared.dead_letters.clone())
    }

    /// A traversable view over both trees.
    #[must_use]
    pub fn tree_view(&self) -> TreeView {
        TreeView {
            system: self.system_provider.clone(),
            user: self.user_provider.clone(),
        }
    }

    /// Depth-first traversal of one tree.
    pub fn traverse_tree<T>(
        &self,
        tree: PathRoot,
        mut visit: impl FnMut(&CellInfo) -> TraverseAction<T>,
    ) -> Vec<T> {
        let provider = match tree {
            PathRoot::System => &self.system_provider,
            _ => &self.user_provider,
        };
        let mut out = Vec::new();
        provider.traverse(&mut visit, &mut out);
        out
    }

    /// Synchronous, ordered shutdown: unbind (no-op without a cluster
    /// shell), stop the user tree then the system tree, drain the
    /// dispatcher pool, shut down the event-loop group, null the service
    /// slots. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(thread_name) = std::thread::current().name() {
            if self.shared.dispatchers.pool.owns_thread(thread_name) {
                warn!(
                    thread = thread_name,
                    "shutdown called from a dispatcher worker thread; the drain step may deadlock"
                );
            }
        }
        self.shared.run_shutdown();
        let event_loop = self
            .event_loop
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(event_loop) = event_loop {
            event_loop.shutdown_timeout(self.shared.settings.event_loop_drain_timeout());
        }
    }

}

impl Drop for ActorSystem {
    fn drop(&mut self) {
        if self.shared.state() < SystemState::Terminated {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

fn install_backtrace_hook() {
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(
                target: "arbor::panic",
                backtrace = %std::backtrace::Backtrace::force_capture(),
                "panic: {info}"
            );
            previous(info);
        }));
    });
}
