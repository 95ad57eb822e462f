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

//! Actor addresses: rooted paths plus per-lifetime incarnation tags.
//!
//! Every actor is identified by an [`ActorAddress`] — an [`ActorPath`] rooted
//! at `/system`, `/user`, or `/dead`, paired with an [`Incarnation`]. Two
//! addresses with the same path but different incarnations name distinct
//! actor lifetimes, which is what keeps a stale ref from resurrecting a
//! restarted name.
//!
//! The textual rendering is `/<root>/<seg>/<seg>…#<tag>`, with the `#<tag>`
//! suffix omitted for perpetual (well-known) actors and for the dead-letters
//! address. Rendering and parsing round-trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum length of a single path segment.
pub const SEGMENT_LEN_MAX: usize = 255;

/// Prefix character reserved for internally generated (anonymous) names.
pub const AUTO_NAME_PREFIX: char = '$';

/// The tree a path is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathRoot {
    /// Kernel-internal actors (`/system`).
    System,
    /// Application actors (`/user`).
    User,
    /// The dead-letters namespace (`/dead`).
    Dead,
}

impl PathRoot {
    /// The root's path segment, without slashes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Dead => "dead",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for PathRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

/// Error raised when a path segment or rendered address fails the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Segment is empty, too long, or contains a character outside
    /// `[A-Za-z0-9_-]`, or starts with the reserved `$` prefix.
    InvalidSegment(String),
    /// Rendered address text could not be parsed.
    Malformed(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSegment(seg) => write!(f, "invalid path segment: {seg:?}"),
            Self::Malformed(text) => write!(f, "malformed actor address: {text:?}"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Validate one path segment against the naming grammar.
///
/// `internal` permits the reserved `$` prefix used by auto-generated names.
pub(crate) fn validate_segment(segment: &str, internal: bool) -> Result<(), AddressError> {
    if segment.is_empty() || segment.len() > SEGMENT_LEN_MAX {
        return Err(AddressError::InvalidSegment(segment.to_string()));
    }
    let mut chars = segment.chars();
    // Anonymous names look like `prefix-$7`; the `$` may appear mid-segment
    // only for internal spawns.
    if !internal && segment.contains(AUTO_NAME_PREFIX) {
        return Err(AddressError::InvalidSegment(segment.to_string()));
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || (internal && c == AUTO_NAME_PREFIX)) {
        Ok(())
    } else {
        Err(AddressError::InvalidSegment(segment.to_string()))
    }
}

/// A rooted, ordered sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorPath {
    root: PathRoot,
    segments: Vec<String>,
}

impl ActorPath {
    /// The path of a tree root itself (`/system`, `/user`, `/dead`).
    #[must_use]
    pub const fn root(root: PathRoot) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    /// The tree this path belongs to.
    #[must_use]
    pub const fn tree(&self) -> PathRoot {
        self.root
    }

    /// The ordered segments below the root.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, or the root name for a root path.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map_or_else(|| self.root.as_str(), String::as_str)
    }

    /// Extend this path with a validated child segment.
    pub fn child(&self, segment: &str) -> Result<Self, AddressError> {
        self.child_internal(segment, false)
    }

    pub(crate) fn child_internal(&self, segment: &str, internal: bool) -> Result<Self, AddressError> {
        validate_segment(segment, internal)?;
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment.to_string());
        Ok(Self {
            root: self.root,
            segments,
        })
    }

    /// The parent path, or `None` for a tree root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            root: self.root,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Depth below the tree root; a guardian has depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Per-address lifetime tag.
///
/// Ordinary actors carry a random 32-bit tag drawn at spawn; well-known
/// actors carry the `Perpetual` sentinel and render without a `#tag` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Incarnation {
    /// Fixed-address, well-known actor; immune to accidental name reuse.
    Perpetual,
    /// Randomised tag distinguishing one spawn from the next under the
    /// same path.
    Tag(u32),
}

impl Incarnation {
    /// Draw a fresh random tag.
    #[must_use]
    pub fn random() -> Self {
        Self::Tag(rand::random::<u32>())
    }
}

/// A process-unique actor identity: path plus incarnation.
///
/// Addresses are immutable, cheap to clone, and totally ordered. Equality
/// includes the incarnation, so a restarted well-known name still compares
/// equal while an ordinary respawn under the same path does not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorAddress {
    path: ActorPath,
    incarnation: Incarnation,
}

impl ActorAddress {
    #[must_use]
    pub const fn new(path: ActorPath, incarnation: Incarnation) -> Self {
        Self { path, incarnation }
    }

    /// The dead-letters address: `/dead`, perpetual.
    #[must_use]
    pub const fn dead_letters() -> Self {
        Self {
            path: ActorPath::root(PathRoot::Dead),
            incarnation: Incarnation::Perpetual,
        }
    }

    #[must_use]
    pub const fn path(&self) -> &ActorPath {
        &self.path
    }

    #[must_use]
    pub const fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    /// The final path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        match self.incarnation {
            Incarnation::Perpetual => Ok(()),
            Incarnation::Tag(tag) => write!(f, "#{tag}"),
        }
    }
}

impl FromStr for ActorAddress {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| AddressError::Malformed(text.to_string()))?;
        let (path_text, incarnation) = match rest.rsplit_once('#') {
            Some((path_text, tag_text)) => {
                let tag = tag_text
                    .parse::<u32>()
                    .map_err(|_| AddressError::Malformed(text.to_string()))?;
                (path_text, Incarnation::Tag(tag))
            }
            None => (rest, Incarnation::Perpetual),
        };
        let mut parts = path_text.split('/');
        let root_text = parts
            .next()
            .ok_or_else(|| AddressError::Malformed(text.to_string()))?;
        let root = PathRoot::from_segment(root_text)
            .ok_or_else(|| AddressError::Malformed(text.to_string()))?;
        let mut path = ActorPath::root(root);
        for segment in parts {
            path = path.child_internal(segment, true)?;
        }
        Ok(Self { path, incarnation })
    }
}
