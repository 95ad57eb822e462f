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

//! The naming context: sequence counters for anonymous names and eager
//! collision detection for explicit ones.
//!
//! This is the only mutable datum the kernel touches from arbitrary
//! threads; it sits behind one mutex held strictly across O(1) operations
//! (a set probe, a counter bump), which is what keeps spawning and
//! traversal free of lock-ordering hazards.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::address::ActorPath;
use crate::message::SpawnError;

/// How a spawn call names the new actor.
#[derive(Debug, Clone)]
pub enum Naming {
    /// Use the given name verbatim; collides with live siblings.
    Explicit(String),
    /// Let the naming context append a monotonic suffix to the prefix,
    /// e.g. `worker-$7`.
    Anonymous {
        /// Prefix for the generated name.
        prefix: String,
    },
}

impl Naming {
    /// An explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Explicit(name.into())
    }

    /// An auto-generated name with the given prefix.
    pub fn anonymous(prefix: impl Into<String>) -> Self {
        Self::Anonymous {
            prefix: prefix.into(),
        }
    }
}

#[derive(Default)]
struct NamingInner {
    /// Per-parent monotonic counters for anonymous names.
    counters: HashMap<String, u64>,
    /// Names reserved before cell construction; well-known names stay
    /// reserved for the system's lifetime.
    reserved: HashSet<String>,
}

pub(crate) struct NamingContext {
    inner: Mutex<NamingInner>,
}

impl NamingContext {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(NamingInner::default()),
        }
    }

    /// Atomically reserve `name` under `parent`. The `live` probe runs
    /// inside the lock window so a reservation and a live child can never
    /// both admit the same name.
    pub(crate) fn reserve(
        &self,
        parent: &ActorPath,
        name: &str,
        live: impl FnOnce(&str) -> bool,
    ) -> Result<(), SpawnError> {
        let key = Self::key(parent, name);
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.reserved.contains(&key) || live(name) {
            return Err(SpawnError::NameAlreadyInUse(name.to_string()));
        }
        inner.reserved.insert(key);
        Ok(())
    }

    /// Release a reservation, either because the spawn failed or because
    /// the live child map has become the authority.
    pub(crate) fn release(&self, parent: &ActorPath, name: &str) {
        let key = Self::key(parent, name);
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .reserved
            .remove(&key);
    }

    /// Next auto-generated name under `parent`.
    pub(crate) fn next_anonymous(&self, parent: &ActorPath, prefix: &str) -> String {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let counter = inner.counters.entry(parent.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}-${counter}")
    }

    fn key(parent: &ActorPath, name: &str) -> String {
        format!("{parent}/{name}")
    }
}
