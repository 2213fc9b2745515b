//! Object identity and key resolution.
//!
//! Every scene object that can send, receive, or be named by a message has an
//! `ObjectKey`. Keys are opaque to this crate: the resource manager that owns
//! the scene graph assigns them and resolves them back to objects. The only
//! thing the runtime does with a key is compare it, store it, and hand it to a
//! [`KeyContext`] when a stream crosses the process boundary.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::wire::{read_bool, read_u32, write_bool, write_u32, WireResult};

/// Opaque identity of a keyed scene object.
///
/// Avatars, detectors, responders, and logic modifiers all have keys. The
/// resource manager assigns them; the runtime never interprets the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey(pub u32);

impl ObjectKey {
    /// Create a key from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw key value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for ObjectKey {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

/// Key persistence contract supplied by the resource manager.
///
/// Streams never contain keys directly; they contain whatever the resource
/// manager chooses to write. The runtime calls through this trait wherever the
/// wire format says "key reference", so the same codec serves both plain
/// resource files and replicated network traffic.
pub trait KeyContext {
    /// Write a (possibly absent) key reference to the stream.
    fn write_key(&mut self, w: &mut dyn Write, key: Option<ObjectKey>) -> WireResult<()>;

    /// Read a key reference from the stream. `None` means the reference was
    /// written as absent.
    fn read_key(&mut self, r: &mut dyn Read) -> WireResult<Option<ObjectKey>>;
}

/// Pass-through key context: a presence flag followed by the raw key value.
///
/// Sufficient for loopback serialization and tests; a real resource manager
/// substitutes its own location/name encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawKeys;

impl KeyContext for RawKeys {
    fn write_key(&mut self, w: &mut dyn Write, key: Option<ObjectKey>) -> WireResult<()> {
        write_bool(w, key.is_some())?;
        if let Some(key) = key {
            write_u32(w, key.raw())?;
        }
        Ok(())
    }

    fn read_key(&mut self, r: &mut dyn Read) -> WireResult<Option<ObjectKey>> {
        if read_bool(r)? {
            Ok(Some(ObjectKey::new(read_u32(r)?)))
        } else {
            Ok(None)
        }
    }
}
