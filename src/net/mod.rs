//! Server-arbitrated shared state.
//!
//! Trigger arbitration rides on a tiny test-and-set protocol: the client asks
//! the game server to lock a named [`SharedState`] blob, the server answers
//! with a [`ServerReplyMsg`](crate::messages::ServerReplyMsg) (deny or
//! affirm), and the winner immediately releases the lock once its local
//! decision is committed. The lock exists only to serialize the decision
//! across replicas; no data is held under it.
//!
//! Logic modifiers always arbitrate over a state named `"TrigState"` holding a
//! single boolean variable `"Triggered"`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::{KeyContext, ObjectKey};
use crate::wire::{
    read_bool, read_f32, read_i32, read_string, read_u32, write_bool, write_f32, write_i32,
    write_string, write_u32, WireResult,
};

/// Shared-state name used for trigger arbitration.
pub const TRIGGER_STATE_NAME: &str = "TrigState";

/// Variable name inside [`TRIGGER_STATE_NAME`].
pub const TRIGGER_VAR_NAME: &str = "Triggered";

/// One typed variable in a shared-state blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericVar {
    /// Variable name, unique within its blob.
    pub name: String,
    /// Current value.
    pub value: GenericValue,
}

impl GenericVar {
    /// Boolean variable.
    #[must_use]
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: GenericValue::Bool(value),
        }
    }

    fn write(&self, w: &mut dyn Write) -> WireResult<()> {
        write_string(w, &self.name)?;
        match &self.value {
            GenericValue::Bool(b) => {
                write_i32(w, 0)?;
                write_bool(w, *b)
            }
            GenericValue::Int(i) => {
                write_i32(w, 1)?;
                write_i32(w, *i)
            }
            GenericValue::Float(f) => {
                write_i32(w, 2)?;
                write_f32(w, *f)
            }
            GenericValue::Str(s) => {
                write_i32(w, 3)?;
                write_string(w, s)
            }
        }
    }

    fn read(r: &mut dyn Read) -> WireResult<Self> {
        let name = read_string(r)?;
        let tag = read_i32(r)?;
        let value = match tag {
            0 => GenericValue::Bool(read_bool(r)?),
            1 => GenericValue::Int(read_i32(r)?),
            2 => GenericValue::Float(read_f32(r)?),
            3 => GenericValue::Str(read_string(r)?),
            _ => {
                return Err(crate::wire::WireError::BadTag {
                    kind: "generic variable",
                    tag: tag.into(),
                })
            }
        };
        Ok(Self { name, value })
    }
}

/// Value of a [`GenericVar`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GenericValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
}

/// Named blob of variables owned by the server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    /// Blob name ("TrigState" for trigger arbitration).
    pub name: String,

    /// Server may discard the blob when it reaches this state again.
    pub server_may_delete: bool,

    /// Variables, in declaration order.
    pub vars: Vec<GenericVar>,
}

impl SharedState {
    /// Empty blob with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_may_delete: false,
            vars: Vec::new(),
        }
    }

    /// The trigger-arbitration blob: `"TrigState"` → `"Triggered"` = `value`.
    #[must_use]
    pub fn trigger_state(value: bool) -> Self {
        let mut state = Self::named(TRIGGER_STATE_NAME);
        state.vars.push(GenericVar::boolean(TRIGGER_VAR_NAME, value));
        state
    }

    /// Write the blob: name, delete flag, count-prefixed variables.
    pub fn write(&self, w: &mut dyn Write) -> WireResult<()> {
        write_string(w, &self.name)?;
        write_bool(w, self.server_may_delete)?;
        write_u32(w, self.vars.len() as u32)?;
        for var in &self.vars {
            var.write(w)?;
        }
        Ok(())
    }

    /// Read the blob.
    pub fn read(r: &mut dyn Read) -> WireResult<Self> {
        let name = read_string(r)?;
        let server_may_delete = read_bool(r)?;
        let count = crate::wire::check_len("shared-state vars", read_u32(r)?)?;
        let mut vars = Vec::with_capacity(count);
        for _ in 0..count {
            vars.push(GenericVar::read(r)?);
        }
        Ok(Self {
            name,
            server_may_delete,
            vars,
        })
    }
}

/// Client → server: atomically test-and-set a shared state, optionally taking
/// or releasing its lock. Lock attempts always generate a reply confirming or
/// denying the action; plain sets do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestAndSetMsg {
    /// The object arbitrating (replies correlate by this identity).
    pub object: Option<ObjectKey>,

    /// True to take the lock, false to release it.
    pub lock_request: bool,

    /// The state being written.
    pub state: SharedState,
}

impl TestAndSetMsg {
    /// Lock request for a modifier's trigger state.
    #[must_use]
    pub fn lock_trigger(object: ObjectKey) -> Self {
        Self {
            object: Some(object),
            lock_request: true,
            state: SharedState::trigger_state(true),
        }
    }

    /// Release after the local trigger is committed.
    #[must_use]
    pub fn unlock_trigger(object: ObjectKey) -> Self {
        Self {
            object: Some(object),
            lock_request: false,
            state: SharedState::trigger_state(false),
        }
    }

    /// Write: object key, lock flag, state blob.
    pub fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        keys.write_key(w, self.object)?;
        write_bool(w, self.lock_request)?;
        self.state.write(w)
    }

    /// Read the flat form.
    pub fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        Ok(Self {
            object: keys.read_key(r)?,
            lock_request: read_bool(r)?,
            state: SharedState::read(r)?,
        })
    }
}
