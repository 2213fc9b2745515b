//! # scene-logic
//!
//! Trigger, condition, and notification runtime for networked world scenes.
//!
//! ## What this crate is
//!
//! The in-world interaction layer of a multiplayer 3D engine: doors, levers,
//! click-draggables, volume sensors. Physics detectors report raw events;
//! this crate decides whether they constitute a trigger, coordinates that
//! decision with the game server so only one replica wins, and fans the
//! outcome out to whatever was authored to react.
//!
//! ## Design Principles
//!
//! 1. **Single-threaded, message-driven**: every operation runs to completion
//!    on the dispatch thread. "Concurrency" is logical only — interleaving of
//!    local events, server replies, and remote replicas' traffic.
//!
//! 2. **No panics, no fatal paths**: malformed messages fall through
//!    unhandled, denied arbitration recovers silently, corrupt streams return
//!    errors.
//!
//! 3. **Collaborators behind traits**: key resolution ([`KeyContext`]),
//!    dispatch ([`MessageBus`]), and scene geometry ([`SceneQuery`]) are
//!    contracts, not dependencies.
//!
//! ## Architecture
//!
//! - A [`LogicModifier`] owns an ordered list of [`Conditional`]s and one
//!   pending [`NotifyMsg`].
//! - Detector traffic arrives as [`Message`]s; conditionals consume what they
//!   recognize and request trigger/untrigger transitions.
//! - Trigger requests are arbitrated through a server-side test-and-set lock
//!   on a named [`SharedState`] unless the session or modifier is local-only.
//! - On a committed transition the pending notification (with its accumulated
//!   [`EventData`] records) is dispatched and replaced.
//!
//! ## Modules
//!
//! - `core`: object keys, key-resolution contract, session environment
//! - `wire`: stream primitives and the versioned-format bit vectors
//! - `events`: event records and the notification envelope
//! - `messages`: the message union and dispatch-bus contract
//! - `conditions`: the conditional-object family
//! - `logic`: the trigger state machine
//! - `net`: shared-state arbitration types

pub mod conditions;
pub mod core;
pub mod events;
pub mod logic;
pub mod messages;
pub mod net;
pub mod wire;

// Re-export commonly used types
pub use crate::core::{KeyContext, NetEnv, ObjectKey, RawKeys, SceneQuery, VolumeSensorPolicy};

pub use crate::wire::{BitVector, WireError, WireResult};

pub use crate::events::{bcast, EventData, EventType, NotifyMsg, NotifyType, VariableValue};

pub use crate::messages::{
    ActivatorKind, ActivatorMsg, AttachConditionMsg, ControlEventMsg, EnableMsg, FakeOutMsg,
    Message, MessageBus, PickedMsg, PlayerPageMsg, RecordingBus, ServerReplyKind, ServerReplyMsg,
    SetTimerMsg, TimerCallbackMsg,
};

pub use crate::conditions::{
    ActivatorActivatorConditional, ActivatorConditional, ConditionCore, ConditionResponse,
    Conditional, ControlKeyConditional, FacingConditional, ObjectInBoxConditional, OrConditional,
    PickedConditional, TriggerRequest, VolActivatorConditional, VolumeSensorConditional,
    VolumeSensorType,
};

pub use crate::logic::{
    CursorHint, LogicCtx, LogicFlags, LogicModBase, LogicModifier, ReplyOutcome, RequestOutcome,
};

pub use crate::net::{
    GenericValue, GenericVar, SharedState, TestAndSetMsg, TRIGGER_STATE_NAME, TRIGGER_VAR_NAME,
};
