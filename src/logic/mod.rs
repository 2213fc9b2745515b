//! The logic-modifier state machine.
//!
//! A [`LogicModifier`] sits between the detector layer and everything that
//! reacts to a trigger. Detector messages flow in, get filtered through the
//! modifier's conditional list, and — once every condition is satisfied and
//! the server (when one is involved) grants the trigger lock — a notification
//! fans out to the registered receivers.

mod base;
mod modifier;

pub use base::{LogicFlags, LogicModBase, ReplyOutcome, RequestOutcome};
pub use modifier::{CursorHint, LogicModifier};

use crate::core::{NetEnv, SceneQuery};
use crate::messages::MessageBus;

/// Everything an evaluation entry point needs from the rest of the engine:
/// the dispatch bus, the session environment, and (optionally) scene
/// geometry.
pub struct LogicCtx<'a> {
    /// Asynchronous outbound delivery.
    pub bus: &'a mut dyn MessageBus,

    /// Session-level knowledge (local player, arbitration mode, policies).
    pub env: &'a NetEnv,

    /// Scene geometry, when the caller has it. Facing checks fail closed
    /// without it.
    pub scene: Option<&'a dyn SceneQuery>,
}

impl<'a> LogicCtx<'a> {
    /// Context without scene geometry.
    pub fn new(bus: &'a mut dyn MessageBus, env: &'a NetEnv) -> Self {
        Self {
            bus,
            env,
            scene: None,
        }
    }

    /// Context with scene geometry for facing checks.
    pub fn with_scene(
        bus: &'a mut dyn MessageBus,
        env: &'a NetEnv,
        scene: &'a dyn SceneQuery,
    ) -> Self {
        Self {
            bus,
            env,
            scene: Some(scene),
        }
    }
}
