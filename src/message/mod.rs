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

//! Message-layer types: the system-message vocabulary and the error enums
//! surfaced at the kernel boundary.

mod message_error;
mod system_message;

pub use message_error::{DispatchError, SpawnError};
pub use system_message::TerminationReason;
pub(crate) use system_message::SystemMessage;

/// Marker for values that may travel through a mailbox.
///
/// Blanket-implemented; anything `Send + 'static` qualifies.
pub trait Message: Send + 'static {}

impl<T: Send + 'static> Message for T {}
