//! The conditional-object family.
//!
//! A [`Conditional`] is a predicate attached to a logic modifier. The modifier
//! forwards incoming messages to its conditionals in order; the first one that
//! recognizes a message consumes it and may ask the owner to trigger or
//! untrigger. A trigger only fires when *every* conditional on the modifier
//! reports satisfied.
//!
//! Conditionals never own their modifier; they hold its key (set once at
//! attach time) and receive the owner's state by reference during dispatch.
//! Trigger/untrigger wishes travel back as [`TriggerRequest`]s in the
//! [`ConditionResponse`], which the owning modifier applies after the
//! conditional returns — the borrow-friendly rendering of "the condition calls
//! back into its owner".

mod activator;
mod facing;
mod misc;
mod volume;

pub use activator::{ActivatorActivatorConditional, ActivatorConditional, VolActivatorConditional};
pub use facing::FacingConditional;
pub use misc::{ControlKeyConditional, OrConditional, PickedConditional};
pub use volume::{ObjectInBoxConditional, VolumeSensorConditional, VolumeSensorType};

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{KeyContext, ObjectKey};
use crate::logic::{LogicCtx, LogicModBase};
use crate::messages::Message;
use crate::wire::{read_bool, read_u16, write_bool, write_u16, WireError, WireResult};

/// State common to every conditional variant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionCore {
    /// Current satisfaction, before NOT inversion.
    pub satisfied: bool,

    /// Invert the reported satisfaction.
    pub negate: bool,

    /// Second activation untriggers instead of re-triggering.
    pub toggle: bool,

    /// Depends only on client-local input; marks the owning modifier exempt
    /// from server arbitration.
    pub local_element: bool,

    /// The owning modifier's key. Set once at attach; never used to manage
    /// lifetime.
    pub owner: Option<ObjectKey>,
}

impl ConditionCore {
    fn with_satisfied(satisfied: bool) -> Self {
        Self {
            satisfied,
            ..Self::default()
        }
    }

    /// Satisfaction with the NOT flag applied.
    #[must_use]
    pub fn report(&self) -> bool {
        if self.negate {
            !self.satisfied
        } else {
            self.satisfied
        }
    }

    fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_bool(w, self.satisfied)?;
        write_bool(w, self.negate)?;
        write_bool(w, self.toggle)?;
        write_bool(w, self.local_element)?;
        keys.write_key(w, self.owner)
    }

    fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        Ok(Self {
            satisfied: read_bool(r)?,
            negate: read_bool(r)?,
            toggle: read_bool(r)?,
            local_element: read_bool(r)?,
            owner: keys.read_key(r)?,
        })
    }
}

/// A wish sent back to the owning modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerRequest {
    /// Request a trigger through the normal gate (condition AND, counter,
    /// timer, arbitration). `net_request` marks a request replayed from the
    /// network.
    Trigger { net_request: bool },

    /// Fire through the local gates but skip server arbitration. Used by the
    /// no-arbitration volume sensor.
    TriggerDirect,

    /// Request an untrigger (never arbitrated).
    UnTrigger,
}

/// Outcome of offering a message to a conditional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionResponse {
    /// The conditional recognized and consumed the message.
    pub handled: bool,

    /// Requests for the owner to apply, in order.
    pub requests: SmallVec<[TriggerRequest; 2]>,
}

impl ConditionResponse {
    /// The message was not for this conditional.
    #[must_use]
    pub fn unhandled() -> Self {
        Self::default()
    }

    /// Consumed, nothing to do.
    #[must_use]
    pub fn handled() -> Self {
        Self {
            handled: true,
            requests: SmallVec::new(),
        }
    }

    /// Consumed, with a single request.
    #[must_use]
    pub fn request(request: TriggerRequest) -> Self {
        let mut resp = Self::handled();
        resp.requests.push(request);
        resp
    }

    /// Append a request.
    pub fn push(&mut self, request: TriggerRequest) {
        self.requests.push(request);
    }
}

/// A predicate bound to a logic modifier.
///
/// Closed set: persistence is an exhaustive match on the class tag, not an
/// open factory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Conditional {
    /// Fires from activator messages sent by tracked detectors.
    Activator(ActivatorConditional),
    /// Fires from notify messages sent by other activators.
    ActivatorActivator(ActivatorActivatorConditional),
    /// Activator variant that fires once per configured activator regardless
    /// of the message's source.
    VolActivator(VolActivatorConditional),
    /// Facing-angle predicate.
    Facing(FacingConditional),
    /// Occupancy predicate over a detector region.
    ObjectInBox(ObjectInBoxConditional),
    /// Occupancy counter with enter/exit trigger semantics.
    VolumeSensor(VolumeSensorConditional),
    /// Pick-state predicate.
    Picked(PickedConditional),
    /// Bound-control predicate.
    ControlKey(ControlKeyConditional),
    /// Satisfied when any child is.
    Or(OrConditional),
}

impl Conditional {
    /// Offer a message. Returns whether it was consumed and what the owner
    /// should do about it. `peers_verified` is the owner's `verify_conditions`
    /// result for this message, computed before dispatch.
    pub fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        ctx: &mut LogicCtx,
        peers_verified: bool,
    ) -> ConditionResponse {
        match self {
            Self::Activator(c) => c.msg_receive(msg, owner, peers_verified),
            Self::ActivatorActivator(c) => c.msg_receive(msg, owner, peers_verified),
            Self::VolActivator(c) => c.msg_receive(msg, owner, peers_verified),
            Self::Facing(_) => ConditionResponse::unhandled(),
            Self::ObjectInBox(c) => c.msg_receive(msg, owner),
            Self::VolumeSensor(c) => c.msg_receive(msg, owner, ctx),
            Self::Picked(c) => c.msg_receive(msg, owner),
            Self::ControlKey(c) => c.msg_receive(msg, owner),
            Self::Or(c) => c.msg_receive(msg, owner, ctx, peers_verified),
        }
    }

    /// Non-committing "would this pass right now" check, used both inside
    /// trigger evaluation and by the cursor-probe path.
    pub fn verify(&mut self, msg: &Message, owner: &mut LogicModBase, ctx: &mut LogicCtx) -> bool {
        match self {
            Self::Facing(c) => c.verify(msg, owner, ctx),
            Self::ObjectInBox(c) => c.verify(msg, ctx),
            Self::Or(c) => c.verify(msg, owner, ctx),
            // The remaining variants accept anything at verify time; their
            // state lives in `satisfied`.
            _ => true,
        }
    }

    /// Current satisfaction, NOT flag applied.
    ///
    /// Takes `&mut self` because the volume sensor's satisfaction check
    /// advances its latch state.
    pub fn satisfied(&mut self) -> bool {
        match self {
            Self::Activator(c) => c.core.report(),
            Self::ActivatorActivator(c) => c.core.report(),
            Self::VolActivator(c) => c.core.report(),
            Self::Facing(c) => c.core.report(),
            Self::ObjectInBox(c) => c.core.report(),
            Self::VolumeSensor(c) => c.satisfied(),
            Self::Picked(c) => c.core.report(),
            Self::ControlKey(c) => c.core.report(),
            Self::Or(c) => c.satisfied(),
        }
    }

    /// Return satisfaction to the variant's initial value.
    pub fn reset(&mut self) {
        match self {
            Self::Activator(c) => c.core.satisfied = false,
            Self::ActivatorActivator(c) => c.core.satisfied = false,
            Self::VolActivator(c) => c.core.satisfied = false,
            // Passive predicates re-arm satisfied; their real state is
            // tracked elsewhere (geometry, occupancy).
            Self::Facing(c) => c.core.satisfied = true,
            Self::ObjectInBox(c) => c.core.satisfied = true,
            Self::VolumeSensor(_) => {}
            Self::Picked(c) => c.core.satisfied = false,
            Self::ControlKey(c) => c.core.satisfied = false,
            Self::Or(c) => c.reset(),
        }
    }

    /// Periodic evaluation hook. Reserved for timer-based variants; no
    /// current variant uses it.
    pub fn evaluate(&mut self) {}

    /// Record the owning modifier. Called once at attach; the OR combinator
    /// propagates to its children.
    pub fn set_logic_mod(&mut self, owner: ObjectKey) {
        match self {
            Self::Or(c) => c.set_logic_mod(owner),
            other => other.core_mut().owner = Some(owner),
        }
    }

    /// Does this conditional depend on purely client-local input?
    #[must_use]
    pub fn is_local_element(&self) -> bool {
        self.core().local_element
    }

    /// Shared core, read-only.
    #[must_use]
    pub fn core(&self) -> &ConditionCore {
        match self {
            Self::Activator(c) => &c.core,
            Self::ActivatorActivator(c) => &c.core,
            Self::VolActivator(c) => &c.core,
            Self::Facing(c) => &c.core,
            Self::ObjectInBox(c) => &c.core,
            Self::VolumeSensor(c) => &c.core,
            Self::Picked(c) => &c.core,
            Self::ControlKey(c) => &c.core,
            Self::Or(c) => &c.core,
        }
    }

    /// Shared core, mutable.
    pub fn core_mut(&mut self) -> &mut ConditionCore {
        match self {
            Self::Activator(c) => &mut c.core,
            Self::ActivatorActivator(c) => &mut c.core,
            Self::VolActivator(c) => &mut c.core,
            Self::Facing(c) => &mut c.core,
            Self::ObjectInBox(c) => &mut c.core,
            Self::VolumeSensor(c) => &mut c.core,
            Self::Picked(c) => &mut c.core,
            Self::ControlKey(c) => &mut c.core,
            Self::Or(c) => &mut c.core,
        }
    }

    /// Diagnostic name for probe logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Activator(_) => "activator",
            Self::ActivatorActivator(_) => "activator-activator",
            Self::VolActivator(_) => "vol-activator",
            Self::Facing(_) => "facing",
            Self::ObjectInBox(_) => "object-in-box",
            Self::VolumeSensor(_) => "volume-sensor",
            Self::Picked(_) => "picked",
            Self::ControlKey(_) => "control-key",
            Self::Or(_) => "or",
        }
    }

    /// Wire class tag.
    #[must_use]
    pub fn class_tag(&self) -> u16 {
        match self {
            Self::Activator(_) => 1,
            Self::ActivatorActivator(_) => 2,
            Self::VolActivator(_) => 3,
            Self::Facing(_) => 4,
            Self::ObjectInBox(_) => 5,
            Self::VolumeSensor(_) => 6,
            Self::Picked(_) => 7,
            Self::ControlKey(_) => 8,
            Self::Or(_) => 9,
        }
    }

    /// Polymorphic write: class tag, shared core, variant fields.
    pub fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_u16(w, self.class_tag())?;
        self.core().write(w, keys)?;
        match self {
            Self::Activator(c) => c.write_fields(w, keys),
            Self::ActivatorActivator(c) => c.write_fields(w, keys),
            Self::VolActivator(c) => c.write_fields(w, keys),
            Self::Facing(c) => c.write_fields(w),
            Self::ObjectInBox(c) => c.write_fields(w, keys),
            Self::VolumeSensor(c) => c.write_fields(w, keys),
            Self::Picked(_) => Ok(()),
            Self::ControlKey(c) => c.write_fields(w),
            Self::Or(c) => c.write_fields(w, keys),
        }
    }

    /// Polymorphic read.
    pub fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        let tag = read_u16(r)?;
        let core = ConditionCore::read(r, keys)?;
        Ok(match tag {
            1 => Self::Activator(ActivatorConditional::read_fields(core, r, keys)?),
            2 => Self::ActivatorActivator(ActivatorActivatorConditional::read_fields(core, r, keys)?),
            3 => Self::VolActivator(VolActivatorConditional::read_fields(core, r, keys)?),
            4 => Self::Facing(FacingConditional::read_fields(core, r)?),
            5 => Self::ObjectInBox(ObjectInBoxConditional::read_fields(core, r, keys)?),
            6 => Self::VolumeSensor(VolumeSensorConditional::read_fields(core, r, keys)?),
            7 => Self::Picked(PickedConditional { core }),
            8 => Self::ControlKey(ControlKeyConditional::read_fields(core, r)?),
            9 => Self::Or(OrConditional::read_fields(core, r, keys)?),
            _ => {
                return Err(WireError::BadTag {
                    kind: "conditional class",
                    tag: tag.into(),
                })
            }
        })
    }
}
