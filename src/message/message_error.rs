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

use crate::address::AddressError;

/// Errors reported synchronously to a spawn caller.
#[derive(Debug)]
pub enum SpawnError {
    /// A path segment violates the naming grammar.
    InvalidName(String),
    /// The explicit name collides with a live sibling.
    NameAlreadyInUse(String),
    /// The initial behavior is not legal as a starting state
    /// (`same`, `stopped`, and `failed` cannot start a cell).
    InvalidInitialBehavior,
    /// The selected dispatcher is not configured on this system.
    DispatcherUnavailable(String),
    /// The system has begun shutdown.
    Shutdown,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnError::InvalidName(name) => write!(f, "Invalid actor name: {name:?}"),
            SpawnError::NameAlreadyInUse(name) => {
                write!(f, "Actor name already in use: {name:?}")
            }
            SpawnError::InvalidInitialBehavior => {
                write!(f, "Behavior is not legal as an initial behavior")
            }
            SpawnError::DispatcherUnavailable(kind) => {
                write!(f, "Dispatcher not configured: {kind:?}")
            }
            SpawnError::Shutdown => write!(f, "Actor system has begun shutdown"),
        }
    }
}

impl std::error::Error for SpawnError {}

impl From<AddressError> for SpawnError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::InvalidSegment(seg) => SpawnError::InvalidName(seg),
            AddressError::Malformed(text) => SpawnError::InvalidName(text),
        }
    }
}

/// Errors returned by a dispatcher's `execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher no longer accepts jobs.
    Shutdown,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Shutdown => write!(f, "Dispatcher has shut down"),
        }
    }
}

impl std::error::Error for DispatchError {}
