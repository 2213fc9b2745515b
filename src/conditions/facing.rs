//! Facing-angle conditional.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::ObjectKey;
use crate::logic::{LogicCtx, LogicModBase};
use crate::messages::Message;
use crate::wire::{read_bool, read_f32, write_bool, write_f32, WireResult};

use super::ConditionCore;

/// Passes when the triggering avatar is looking the right way.
///
/// Stateless geometric predicate: the avatar's forward view vector is compared
/// against either the target's forward vector (`directional`) or the
/// normalized avatar→target direction, and the dot product must reach the
/// stored cosine `tolerance`.
///
/// Evaluated during `verify`, never from `msg_receive` — facing gates other
/// conditionals' trigger attempts rather than initiating its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacingConditional {
    /// Shared conditional state. Starts satisfied so a facing check alone
    /// never blocks the AND gate after a successful verify.
    pub core: ConditionCore,

    /// Minimum acceptable dot product (cosine of the half-angle).
    pub tolerance: f32,

    /// Compare against the target's forward vector instead of the
    /// avatar→target direction.
    pub directional: bool,
}

impl Default for FacingConditional {
    fn default() -> Self {
        Self::new(0.0, false)
    }
}

impl FacingConditional {
    /// Facing check with the given cosine tolerance.
    #[must_use]
    pub fn new(tolerance: f32, directional: bool) -> Self {
        Self {
            core: ConditionCore::with_satisfied(true),
            tolerance,
            directional,
        }
    }

    pub(super) fn verify(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        ctx: &mut LogicCtx,
    ) -> bool {
        match msg {
            Message::Activator(activator) => {
                let Some(facer) = activator.hitter else {
                    return false;
                };
                let facee = owner.key();
                match self.check(facer, facee, ctx) {
                    Some(dot) => {
                        owner
                            .notify_mut()
                            .add_facing_event(Some(facer), Some(facee), dot, true);
                        true
                    }
                    None => false,
                }
            }
            Message::FakeOut(_) => {
                // Probe path: recompute with the local player instead of the
                // message's hitter.
                let Some(facer) = ctx.env.local_player else {
                    return false;
                };
                let facee = owner.key();
                match self.check(facer, facee, ctx) {
                    Some(dot) => {
                        owner
                            .notify_mut()
                            .add_facing_event(Some(facer), Some(facee), dot, true);
                        true
                    }
                    None => {
                        if !self.core.toggle {
                            owner.untrigger(ctx);
                        }
                        false
                    }
                }
            }
            _ => true,
        }
    }

    /// Achieved dot product when the check passes, `None` when it fails or
    /// geometry is unavailable.
    fn check(&self, facer: ObjectKey, facee: ObjectKey, ctx: &LogicCtx) -> Option<f32> {
        let scene = ctx.scene?;
        let view = scene.forward(facer)?;
        let reference = if self.directional {
            scene.forward(facee)?
        } else {
            let from = scene.position(facer)?;
            let to = scene.position(facee)?;
            normalize([to[0] - from[0], to[1] - from[1], to[2] - from[2]])?
        };
        let dot = view[0] * reference[0] + view[1] * reference[1] + view[2] * reference[2];
        (dot >= self.tolerance).then_some(dot)
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write) -> WireResult<()> {
        write_f32(w, self.tolerance)?;
        write_bool(w, self.directional)
    }

    pub(super) fn read_fields(core: ConditionCore, r: &mut dyn Read) -> WireResult<Self> {
        Ok(Self {
            core,
            tolerance: read_f32(r)?,
            directional: read_bool(r)?,
        })
    }
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}
