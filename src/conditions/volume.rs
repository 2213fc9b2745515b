//! Occupancy conditionals: object-in-box and the volume sensor.
//!
//! Both track which objects are currently inside a detector region, fed by
//! volume enter/exit activator messages. The physics layer is imprecise:
//! duplicate enters and exits for the same occupant happen, and the sensor
//! absorbs them rather than corrupting its occupant set.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::{KeyContext, ObjectKey};
use crate::logic::{LogicCtx, LogicModBase};
use crate::messages::{ActivatorKind, Message};
use crate::wire::{read_bool, read_i32, read_u32, write_bool, write_i32, write_u32, WireResult};

use super::{ConditionCore, ConditionResponse, TriggerRequest};

fn write_occupants(
    w: &mut dyn Write,
    keys: &mut dyn KeyContext,
    list: &[ObjectKey],
) -> WireResult<()> {
    write_u32(w, list.len() as u32)?;
    for key in list {
        keys.write_key(w, Some(*key))?;
    }
    Ok(())
}

fn read_occupants(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Vec<ObjectKey>> {
    let count = crate::wire::check_len("occupant list", read_u32(r)?)?;
    let mut list = Vec::with_capacity(count);
    for _ in 0..count {
        if let Some(key) = keys.read_key(r)? {
            list.push(key);
        }
    }
    Ok(list)
}

/// Passes while the probing object is inside the region.
///
/// Exit of the occupant that armed the trigger untriggers the owner (unless
/// toggled) with a Contained(exiting) event attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInBoxConditional {
    /// Shared conditional state. Starts satisfied; the occupancy check lives
    /// in `verify`.
    pub core: ConditionCore,

    /// Objects currently inside, in arrival order.
    pub occupants: Vec<ObjectKey>,

    /// The occupant whose successful verify armed the current trigger.
    pub current_trigger: Option<ObjectKey>,
}

impl Default for ObjectInBoxConditional {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectInBoxConditional {
    /// Empty region.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ConditionCore::with_satisfied(true),
            occupants: Vec::new(),
            current_trigger: None,
        }
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
    ) -> ConditionResponse {
        let Message::Activator(activator) = msg else {
            return ConditionResponse::unhandled();
        };
        match activator.kind {
            ActivatorKind::VolumeEnter => {
                if let Some(hitter) = activator.hitter {
                    self.occupants.push(hitter);
                }
                ConditionResponse::handled()
            }
            ActivatorKind::VolumeExit => {
                let mut resp = ConditionResponse::handled();
                if let Some(hitter) = activator.hitter {
                    if let Some(pos) = self.occupants.iter().position(|k| *k == hitter) {
                        self.occupants.remove(pos);
                    }
                    if self.current_trigger == Some(hitter)
                        && owner.triggered()
                        && !self.core.toggle
                    {
                        self.current_trigger = None;
                        let container = owner.key();
                        owner
                            .notify_mut()
                            .add_container_event(Some(container), Some(hitter), false);
                        resp.push(TriggerRequest::UnTrigger);
                    }
                }
                resp
            }
            _ => ConditionResponse::unhandled(),
        }
    }

    pub(super) fn verify(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        match msg {
            Message::Activator(activator) => match activator.hitter {
                Some(hitter) if self.occupants.contains(&hitter) => {
                    // Remember who armed the trigger; their exit untriggers.
                    self.current_trigger = Some(hitter);
                    true
                }
                _ => false,
            },
            Message::FakeOut(_) => ctx
                .env
                .local_player
                .is_some_and(|player| self.occupants.contains(&player)),
            _ => true,
        }
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_occupants(w, keys, &self.occupants)?;
        keys.write_key(w, self.current_trigger)
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        Ok(Self {
            core,
            occupants: read_occupants(r, keys)?,
            current_trigger: keys.read_key(r)?,
        })
    }
}

/// Whether a volume sensor fires on entry or on exit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSensorType {
    /// Entering occupants request triggers; exits request untriggers.
    #[default]
    Enter,
    /// Exiting occupants request triggers; enters request untriggers.
    Exit,
}

impl VolumeSensorType {
    const fn tag(self) -> i32 {
        match self {
            Self::Enter => 1,
            Self::Exit => 2,
        }
    }

    const fn from_tag(tag: i32) -> Self {
        match tag {
            2 => Self::Exit,
            _ => Self::Enter,
        }
    }
}

/// Occupancy counter with enter/exit trigger semantics.
///
/// The satisfaction check runs one of three modes:
///
/// 1. Exit-type with `first` set: satisfied once, immediately, then not again
///    until the region empties (re-arming the latch).
/// 2. After any latched fire: unsatisfied until the region empties.
/// 3. Otherwise a plain count check: satisfied when the occupant count equals
///    `trigger_count`, or always when `trigger_count` is -1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSensorConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// Fire on entry or on exit.
    pub sensor_type: VolumeSensorType,

    /// Occupant count that satisfies the sensor; -1 means any.
    pub trigger_count: i32,

    /// Latch after the first satisfaction until the region empties.
    pub first: bool,

    /// Drop duplicate enter events for an occupant already inside.
    pub ignore_extra_enters: bool,

    /// Skip server arbitration: fire the owner directly and track player
    /// unloads to force clean exits.
    pub no_arbitration: bool,

    /// Latch state for the first/occupied modes.
    fired: bool,

    /// Objects currently inside, in arrival order.
    occupants: Vec<ObjectKey>,
}

impl VolumeSensorConditional {
    /// Sensor firing on `sensor_type` with the given occupant threshold.
    #[must_use]
    pub fn new(sensor_type: VolumeSensorType, trigger_count: i32) -> Self {
        Self {
            sensor_type,
            trigger_count,
            ignore_extra_enters: true,
            ..Self::default()
        }
    }

    /// Current occupants, in arrival order.
    #[must_use]
    pub fn occupants(&self) -> &[ObjectKey] {
        &self.occupants
    }

    /// Three-mode satisfaction check; see the type docs. Advances the latch.
    pub fn satisfied(&mut self) -> bool {
        if self.sensor_type == VolumeSensorType::Exit && self.first && !self.fired {
            self.fired = true;
            return !self.core.negate;
        }
        if self.fired {
            if self.occupants.is_empty() {
                self.fired = false;
            }
            return self.core.negate;
        }

        let raw = self.trigger_count == -1 || self.occupants.len() as i32 == self.trigger_count;
        if self.core.negate {
            !raw
        } else {
            raw
        }
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        ctx: &mut LogicCtx,
    ) -> ConditionResponse {
        match msg {
            Message::Activator(activator) => match activator.kind {
                ActivatorKind::VolumeEnter => {
                    let Some(hitter) = activator.hitter else {
                        return ConditionResponse::handled();
                    };
                    let already_inside = self.occupants.contains(&hitter);
                    if already_inside && self.ignore_extra_enters {
                        return ConditionResponse::handled();
                    }
                    if !ctx.env.passes_avatar_check(hitter) {
                        return ConditionResponse::handled();
                    }
                    if !already_inside {
                        self.occupants.push(hitter);
                    }
                    self.issue(true, hitter, owner)
                }
                ActivatorKind::VolumeExit => {
                    let Some(hitter) = activator.hitter else {
                        return ConditionResponse::handled();
                    };
                    let Some(pos) = self.occupants.iter().position(|k| *k == hitter) else {
                        // Exit with no matching enter; physics noise.
                        return ConditionResponse::handled();
                    };
                    self.occupants.remove(pos);
                    self.issue(false, hitter, owner)
                }
                _ => ConditionResponse::unhandled(),
            },
            Message::PlayerPage(page) if self.no_arbitration && page.unload => {
                // A player disconnecting while inside never sends its exit;
                // synthesize one.
                match self.occupants.iter().position(|k| *k == page.player) {
                    Some(pos) => {
                        self.occupants.remove(pos);
                        self.issue(false, page.player, owner)
                    }
                    None => ConditionResponse::handled(),
                }
            }
            _ => ConditionResponse::unhandled(),
        }
    }

    /// Turn an enter/exit into the owner-facing request for this sensor type.
    fn issue(
        &mut self,
        entering: bool,
        hitter: ObjectKey,
        owner: &mut LogicModBase,
    ) -> ConditionResponse {
        let mut resp = ConditionResponse::handled();
        let fires = match self.sensor_type {
            VolumeSensorType::Enter => entering,
            VolumeSensorType::Exit => !entering,
        };
        let hittee = owner.key();
        if fires {
            if self.no_arbitration {
                if self.satisfied() {
                    owner
                        .notify_mut()
                        .add_collision_event(entering, Some(hitter), Some(hittee), true);
                    resp.push(TriggerRequest::TriggerDirect);
                }
            } else {
                owner
                    .notify_mut()
                    .add_collision_event(entering, Some(hitter), Some(hittee), true);
                resp.push(TriggerRequest::Trigger { net_request: false });
            }
        } else {
            resp.push(TriggerRequest::UnTrigger);
        }
        resp
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_i32(w, self.sensor_type.tag())?;
        write_i32(w, self.trigger_count)?;
        write_bool(w, self.first)?;
        write_bool(w, self.ignore_extra_enters)?;
        write_bool(w, self.no_arbitration)?;
        write_bool(w, self.fired)?;
        write_occupants(w, keys, &self.occupants)
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        Ok(Self {
            core,
            sensor_type: VolumeSensorType::from_tag(read_i32(r)?),
            trigger_count: read_i32(r)?,
            first: read_bool(r)?,
            ignore_extra_enters: read_bool(r)?,
            no_arbitration: read_bool(r)?,
            fired: read_bool(r)?,
            occupants: read_occupants(r, keys)?,
        })
    }
}
