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

//! Common system-level structures: naming, dead letters, providers, the
//! system container, configuration, and the deferred-start handle.

pub(crate) mod config;
pub(crate) mod dead_letters;
pub(crate) mod naming;
pub(crate) mod provider;
pub(crate) mod start_handle;
pub(crate) mod system;

pub use config::{BehaviorSettings, ConfigError, LimitSettings, SystemSettings, TimeoutSettings};
pub use dead_letters::DeadLetters;
pub use naming::Naming;
pub use provider::{CellInfo, TraverseAction};
pub use start_handle::StartHandle;
pub use system::{ActorSystem, SystemServiceMsg, SystemState, TreeView};
