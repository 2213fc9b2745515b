//! Typed event records.
//!
//! An [`EventData`] is one "something happened" fact: a collision, a pick, a
//! facing check, a responder state change. Records are aggregated into a
//! [`NotifyMsg`](super::NotifyMsg) and fanned out to receivers; scripting on
//! the far side pattern-matches on the record kind.
//!
//! ## Wire tags
//!
//! Every kind has a fixed discriminant (1..=16) that is part of the replicated
//! protocol and must never be renumbered. [`EventType::NONE`] is the exclusive
//! upper bound used for defensive tag checks.
//!
//! ## Single-slot vs repeatable
//!
//! Most kinds are *single-slot*: within one notify message only the latest
//! record of that kind matters, so inserting a second one replaces the first.
//! Variable, MultiStage, Spawned, and Coop records are *repeatable* and
//! accumulate in insertion order.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::{KeyContext, ObjectKey};
use crate::wire::{
    read_bool, read_f32, read_i32, read_string, read_u16, read_u32, write_bool, write_f32,
    write_i32, write_string, write_u16, write_u32, BitVector, WireResult,
};

/// Discriminant of an event record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Collision,
    Picked,
    ControlKey,
    Variable,
    Facing,
    Contained,
    Activate,
    Callback,
    ResponderState,
    MultiStage,
    Spawned,
    ClickDrag,
    Coop,
    OfferLinkingBook,
    Book,
    ClimbingBlockerHit,
}

impl EventType {
    /// Exclusive upper bound of the valid tag range.
    pub const NONE: i32 = 17;

    /// Wire discriminant for this kind.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::Collision => 1,
            Self::Picked => 2,
            Self::ControlKey => 3,
            Self::Variable => 4,
            Self::Facing => 5,
            Self::Contained => 6,
            Self::Activate => 7,
            Self::Callback => 8,
            Self::ResponderState => 9,
            Self::MultiStage => 10,
            Self::Spawned => 11,
            Self::ClickDrag => 12,
            Self::Coop => 13,
            Self::OfferLinkingBook => 14,
            Self::Book => 15,
            Self::ClimbingBlockerHit => 16,
        }
    }

    /// Decode a wire discriminant. Out-of-range tags yield `None`.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::Collision),
            2 => Some(Self::Picked),
            3 => Some(Self::ControlKey),
            4 => Some(Self::Variable),
            5 => Some(Self::Facing),
            6 => Some(Self::Contained),
            7 => Some(Self::Activate),
            8 => Some(Self::Callback),
            9 => Some(Self::ResponderState),
            10 => Some(Self::MultiStage),
            11 => Some(Self::Spawned),
            12 => Some(Self::ClickDrag),
            13 => Some(Self::Coop),
            14 => Some(Self::OfferLinkingBook),
            15 => Some(Self::Book),
            16 => Some(Self::ClimbingBlockerHit),
            _ => None,
        }
    }

    /// Does a new record of this kind replace an existing one?
    #[must_use]
    pub const fn is_single_slot(self) -> bool {
        !matches!(
            self,
            Self::Variable | Self::MultiStage | Self::Spawned | Self::Coop
        )
    }
}

/// Payload of a Variable record.
///
/// The wire form always carries a number slot and a key slot; the data-type
/// tag says which one is meaningful. `Null` variables are name-only markers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VariableValue {
    Float(f32),
    Key,
    Int(i32),
    Null,
}

impl VariableValue {
    /// Wire discriminant for the data type.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::Float(_) => 1,
            Self::Key => 2,
            Self::Int(_) => 3,
            Self::Null => 4,
        }
    }
}

/// One typed event record.
///
/// Key fields are optional because a record can legitimately reference an
/// object the local client has not loaded; the wire format writes absent keys
/// as such.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventData {
    /// Physical overlap started or ended. `hitter` is the moving object.
    Collision {
        enter: bool,
        hitter: Option<ObjectKey>,
        hittee: Option<ObjectKey>,
    },

    /// Object picked (clicked) or unpicked.
    Picked {
        picker: Option<ObjectKey>,
        picked: Option<ObjectKey>,
        enabled: bool,
        hit_point: [f32; 3],
    },

    /// Bound control key went down or up.
    ControlKey { control_key: i32, down: bool },

    /// Named variable for script consumers.
    Variable {
        name: String,
        value: VariableValue,
        key: Option<ObjectKey>,
    },

    /// Facing-angle check result. `dot` is the achieved dot product.
    Facing {
        facer: Option<ObjectKey>,
        facee: Option<ObjectKey>,
        dot: f32,
        enabled: bool,
    },

    /// Object entered or left a containment volume.
    Contained {
        contained: Option<ObjectKey>,
        container: Option<ObjectKey>,
        entering: bool,
    },

    /// Bare trigger/untrigger state. `active` is always written true by the
    /// runtime; only `activate` carries information.
    Activate { active: bool, activate: bool },

    /// Animation/sound callback fired, by callback event code.
    Callback { event: i32 },

    /// State a responder should switch to before running.
    ResponderState { state: i32 },

    /// Multistage behavior progressed.
    MultiStage {
        stage: i32,
        event: i32,
        avatar: Option<ObjectKey>,
    },

    /// An avatar was spawned.
    Spawned {
        spawner: Option<ObjectKey>,
        spawnee: Option<ObjectKey>,
    },

    /// Click-draggable moved; `anim_pos` is 0.0..=1.0 through the animation.
    ClickDrag {
        picker: Option<ObjectKey>,
        picked: Option<ObjectKey>,
        anim_pos: f32,
    },

    /// Cooperative multi-avatar behavior bookkeeping.
    Coop { id: u32, serial: u16 },

    /// Linking book offered to another player. Networked only.
    OfferLinkingBook {
        offerer: Option<ObjectKey>,
        target_age: i32,
        offeree: i32,
    },

    /// In-book UI event (page flip, image link).
    Book { event: u32, link_id: u32 },

    /// Climbing avatar hit a blocker.
    ClimbingBlockerHit { blocker: Option<ObjectKey> },
}

impl EventData {
    /// The kind discriminant of this record.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Collision { .. } => EventType::Collision,
            Self::Picked { .. } => EventType::Picked,
            Self::ControlKey { .. } => EventType::ControlKey,
            Self::Variable { .. } => EventType::Variable,
            Self::Facing { .. } => EventType::Facing,
            Self::Contained { .. } => EventType::Contained,
            Self::Activate { .. } => EventType::Activate,
            Self::Callback { .. } => EventType::Callback,
            Self::ResponderState { .. } => EventType::ResponderState,
            Self::MultiStage { .. } => EventType::MultiStage,
            Self::Spawned { .. } => EventType::Spawned,
            Self::ClickDrag { .. } => EventType::ClickDrag,
            Self::Coop { .. } => EventType::Coop,
            Self::OfferLinkingBook { .. } => EventType::OfferLinkingBook,
            Self::Book { .. } => EventType::Book,
            Self::ClimbingBlockerHit { .. } => EventType::ClimbingBlockerHit,
        }
    }

    /// Default-valued record of the given kind; versioned reads start here.
    #[must_use]
    fn default_for(ty: EventType) -> Self {
        match ty {
            EventType::Collision => Self::Collision {
                enter: false,
                hitter: None,
                hittee: None,
            },
            EventType::Picked => Self::Picked {
                picker: None,
                picked: None,
                enabled: false,
                hit_point: [0.0; 3],
            },
            EventType::ControlKey => Self::ControlKey {
                control_key: 0,
                down: false,
            },
            EventType::Variable => Self::Variable {
                name: String::new(),
                value: VariableValue::Null,
                key: None,
            },
            EventType::Facing => Self::Facing {
                facer: None,
                facee: None,
                dot: 0.0,
                enabled: false,
            },
            EventType::Contained => Self::Contained {
                contained: None,
                container: None,
                entering: false,
            },
            EventType::Activate => Self::Activate {
                active: false,
                activate: false,
            },
            EventType::Callback => Self::Callback { event: 0 },
            EventType::ResponderState => Self::ResponderState { state: 0 },
            EventType::MultiStage => Self::MultiStage {
                stage: 0,
                event: 0,
                avatar: None,
            },
            EventType::Spawned => Self::Spawned {
                spawner: None,
                spawnee: None,
            },
            EventType::ClickDrag => Self::ClickDrag {
                picker: None,
                picked: None,
                anim_pos: 0.0,
            },
            EventType::Coop => Self::Coop { id: 0, serial: 0 },
            EventType::OfferLinkingBook => Self::OfferLinkingBook {
                offerer: None,
                target_age: 0,
                offeree: 0,
            },
            EventType::Book => Self::Book { event: 0, link_id: 0 },
            EventType::ClimbingBlockerHit => Self::ClimbingBlockerHit { blocker: None },
        }
    }

    // === Flat format ===

    /// Write the flat form: tag, then fields in declaration order.
    pub fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_i32(w, self.event_type().tag())?;
        self.write_fields(w, keys)
    }

    /// Read the flat form. An out-of-range tag yields `Ok(None)` ("no
    /// record"); the caller decides how to treat the short list.
    pub fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Option<Self>> {
        let tag = read_i32(r)?;
        let Some(ty) = EventType::from_tag(tag) else {
            return Ok(None);
        };
        Ok(Some(Self::read_fields(ty, r, keys)?))
    }

    fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        match self {
            Self::Collision {
                enter,
                hitter,
                hittee,
            } => {
                write_bool(w, *enter)?;
                keys.write_key(w, *hitter)?;
                keys.write_key(w, *hittee)
            }
            Self::Picked {
                picker,
                picked,
                enabled,
                hit_point,
            } => {
                keys.write_key(w, *picker)?;
                keys.write_key(w, *picked)?;
                write_bool(w, *enabled)?;
                write_point(w, *hit_point)
            }
            Self::ControlKey { control_key, down } => {
                write_i32(w, *control_key)?;
                write_bool(w, *down)
            }
            Self::Variable { name, value, key } => {
                write_string(w, name)?;
                write_i32(w, value.tag())?;
                write_variable_number(w, *value)?;
                keys.write_key(w, *key)
            }
            Self::Facing {
                facer,
                facee,
                dot,
                enabled,
            } => {
                keys.write_key(w, *facer)?;
                keys.write_key(w, *facee)?;
                write_f32(w, *dot)?;
                write_bool(w, *enabled)
            }
            Self::Contained {
                contained,
                container,
                entering,
            } => {
                keys.write_key(w, *contained)?;
                keys.write_key(w, *container)?;
                write_bool(w, *entering)
            }
            Self::Activate { active, activate } => {
                write_bool(w, *active)?;
                write_bool(w, *activate)
            }
            Self::Callback { event } => write_i32(w, *event),
            Self::ResponderState { state } => write_i32(w, *state),
            Self::MultiStage {
                stage,
                event,
                avatar,
            } => {
                write_i32(w, *stage)?;
                write_i32(w, *event)?;
                keys.write_key(w, *avatar)
            }
            Self::Spawned { spawner, spawnee } => {
                keys.write_key(w, *spawner)?;
                keys.write_key(w, *spawnee)
            }
            Self::ClickDrag {
                picker,
                picked,
                anim_pos,
            } => {
                keys.write_key(w, *picker)?;
                keys.write_key(w, *picked)?;
                write_f32(w, *anim_pos)
            }
            Self::Coop { id, serial } => {
                write_u32(w, *id)?;
                write_u16(w, *serial)
            }
            Self::OfferLinkingBook {
                offerer,
                target_age,
                offeree,
            } => {
                keys.write_key(w, *offerer)?;
                write_i32(w, *target_age)?;
                write_i32(w, *offeree)
            }
            Self::Book { event, link_id } => {
                write_u32(w, *event)?;
                write_u32(w, *link_id)
            }
            Self::ClimbingBlockerHit { blocker } => keys.write_key(w, *blocker),
        }
    }

    fn read_fields(ty: EventType, r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        Ok(match ty {
            EventType::Collision => Self::Collision {
                enter: read_bool(r)?,
                hitter: keys.read_key(r)?,
                hittee: keys.read_key(r)?,
            },
            EventType::Picked => Self::Picked {
                picker: keys.read_key(r)?,
                picked: keys.read_key(r)?,
                enabled: read_bool(r)?,
                hit_point: read_point(r)?,
            },
            EventType::ControlKey => Self::ControlKey {
                control_key: read_i32(r)?,
                down: read_bool(r)?,
            },
            EventType::Variable => {
                let name = read_string(r)?;
                let tag = read_i32(r)?;
                let value = read_variable_number(r, tag)?;
                let key = keys.read_key(r)?;
                Self::Variable { name, value, key }
            }
            EventType::Facing => Self::Facing {
                facer: keys.read_key(r)?,
                facee: keys.read_key(r)?,
                dot: read_f32(r)?,
                enabled: read_bool(r)?,
            },
            EventType::Contained => Self::Contained {
                contained: keys.read_key(r)?,
                container: keys.read_key(r)?,
                entering: read_bool(r)?,
            },
            EventType::Activate => Self::Activate {
                active: read_bool(r)?,
                activate: read_bool(r)?,
            },
            EventType::Callback => Self::Callback { event: read_i32(r)? },
            EventType::ResponderState => Self::ResponderState { state: read_i32(r)? },
            EventType::MultiStage => Self::MultiStage {
                stage: read_i32(r)?,
                event: read_i32(r)?,
                avatar: keys.read_key(r)?,
            },
            EventType::Spawned => Self::Spawned {
                spawner: keys.read_key(r)?,
                spawnee: keys.read_key(r)?,
            },
            EventType::ClickDrag => Self::ClickDrag {
                picker: keys.read_key(r)?,
                picked: keys.read_key(r)?,
                anim_pos: read_f32(r)?,
            },
            EventType::Coop => Self::Coop {
                id: read_u32(r)?,
                serial: read_u16(r)?,
            },
            EventType::OfferLinkingBook => Self::OfferLinkingBook {
                offerer: keys.read_key(r)?,
                target_age: read_i32(r)?,
                offeree: read_i32(r)?,
            },
            EventType::Book => Self::Book {
                event: read_u32(r)?,
                link_id: read_u32(r)?,
            },
            EventType::ClimbingBlockerHit => Self::ClimbingBlockerHit {
                blocker: keys.read_key(r)?,
            },
        })
    }

    // === Versioned format ===
    //
    // Content-flag bit order mirrors each record's field declaration order
    // exactly; the bit assignments are frozen protocol.

    /// Write the versioned form: record-level flags (bit 0 = type present),
    /// the tag, then the per-kind flags and every field.
    pub fn write_version(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        let mut flags = BitVector::new();
        flags.set_bit(0); // type tag present
        flags.write(w)?;

        write_i32(w, self.event_type().tag())?;
        self.write_fields_version(w, keys)
    }

    /// Read the versioned form. Unknown tags and a clear type bit both yield
    /// `Ok(None)`.
    pub fn read_version(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Option<Self>> {
        let flags = BitVector::read(r)?;
        if !flags.is_bit_set(0) {
            return Ok(None);
        }
        let tag = read_i32(r)?;
        let Some(ty) = EventType::from_tag(tag) else {
            return Ok(None);
        };
        Ok(Some(Self::read_fields_version(ty, r, keys)?))
    }

    fn write_fields_version(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        let field_count = match self {
            Self::Callback { .. } | Self::ResponderState { .. } | Self::ClimbingBlockerHit { .. } => 1,
            Self::ControlKey { .. }
            | Self::Activate { .. }
            | Self::Spawned { .. }
            | Self::Coop { .. }
            | Self::Book { .. } => 2,
            Self::Collision { .. }
            | Self::Contained { .. }
            | Self::MultiStage { .. }
            | Self::ClickDrag { .. }
            | Self::OfferLinkingBook { .. } => 3,
            Self::Picked { .. } | Self::Variable { .. } | Self::Facing { .. } => 4,
        };
        BitVector::with_first_bits(field_count).write(w)?;
        self.write_fields(w, keys)
    }

    fn read_fields_version(
        ty: EventType,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        let flags = BitVector::read(r)?;
        let mut out = Self::default_for(ty);
        let set = |bit: usize| flags.is_bit_set(bit);

        match &mut out {
            Self::Collision {
                enter,
                hitter,
                hittee,
            } => {
                if set(0) {
                    *enter = read_bool(r)?;
                }
                if set(1) {
                    *hitter = keys.read_key(r)?;
                }
                if set(2) {
                    *hittee = keys.read_key(r)?;
                }
            }
            Self::Picked {
                picker,
                picked,
                enabled,
                hit_point,
            } => {
                if set(0) {
                    *picker = keys.read_key(r)?;
                }
                if set(1) {
                    *picked = keys.read_key(r)?;
                }
                if set(2) {
                    *enabled = read_bool(r)?;
                }
                if set(3) {
                    *hit_point = read_point(r)?;
                }
            }
            Self::ControlKey { control_key, down } => {
                if set(0) {
                    *control_key = read_i32(r)?;
                }
                if set(1) {
                    *down = read_bool(r)?;
                }
            }
            Self::Variable { name, value, key } => {
                if set(0) {
                    *name = read_string(r)?;
                }
                let tag = if set(1) { read_i32(r)? } else { value.tag() };
                if set(2) {
                    *value = read_variable_number(r, tag)?;
                }
                if set(3) {
                    *key = keys.read_key(r)?;
                }
            }
            Self::Facing {
                facer,
                facee,
                dot,
                enabled,
            } => {
                if set(0) {
                    *facer = keys.read_key(r)?;
                }
                if set(1) {
                    *facee = keys.read_key(r)?;
                }
                if set(2) {
                    *dot = read_f32(r)?;
                }
                if set(3) {
                    *enabled = read_bool(r)?;
                }
            }
            Self::Contained {
                contained,
                container,
                entering,
            } => {
                if set(0) {
                    *contained = keys.read_key(r)?;
                }
                if set(1) {
                    *container = keys.read_key(r)?;
                }
                if set(2) {
                    *entering = read_bool(r)?;
                }
            }
            Self::Activate { active, activate } => {
                if set(0) {
                    *active = read_bool(r)?;
                }
                if set(1) {
                    *activate = read_bool(r)?;
                }
            }
            Self::Callback { event } => {
                if set(0) {
                    *event = read_i32(r)?;
                }
            }
            Self::ResponderState { state } => {
                if set(0) {
                    *state = read_i32(r)?;
                }
            }
            Self::MultiStage {
                stage,
                event,
                avatar,
            } => {
                if set(0) {
                    *stage = read_i32(r)?;
                }
                if set(1) {
                    *event = read_i32(r)?;
                }
                if set(2) {
                    *avatar = keys.read_key(r)?;
                }
            }
            Self::Spawned { spawner, spawnee } => {
                if set(0) {
                    *spawner = keys.read_key(r)?;
                }
                if set(1) {
                    *spawnee = keys.read_key(r)?;
                }
            }
            Self::ClickDrag {
                picker,
                picked,
                anim_pos,
            } => {
                if set(0) {
                    *picker = keys.read_key(r)?;
                }
                if set(1) {
                    *picked = keys.read_key(r)?;
                }
                if set(2) {
                    *anim_pos = read_f32(r)?;
                }
            }
            Self::Coop { id, serial } => {
                if set(0) {
                    *id = read_u32(r)?;
                }
                if set(1) {
                    *serial = read_u16(r)?;
                }
            }
            Self::OfferLinkingBook {
                offerer,
                target_age,
                offeree,
            } => {
                if set(0) {
                    *offerer = keys.read_key(r)?;
                }
                if set(1) {
                    *target_age = read_i32(r)?;
                }
                if set(2) {
                    *offeree = read_i32(r)?;
                }
            }
            Self::Book { event, link_id } => {
                if set(0) {
                    *event = read_u32(r)?;
                }
                if set(1) {
                    *link_id = read_u32(r)?;
                }
            }
            Self::ClimbingBlockerHit { blocker } => {
                if set(0) {
                    *blocker = keys.read_key(r)?;
                }
            }
        }

        Ok(out)
    }
}

fn write_point(w: &mut dyn Write, point: [f32; 3]) -> WireResult<()> {
    for component in point {
        write_f32(w, component)?;
    }
    Ok(())
}

fn read_point(r: &mut dyn Read) -> WireResult<[f32; 3]> {
    Ok([read_f32(r)?, read_f32(r)?, read_f32(r)?])
}

// The number slot is always exactly four bytes, whatever the data type; null
// and key variables write a zero placeholder and ignore it on read.
fn write_variable_number(w: &mut dyn Write, value: VariableValue) -> WireResult<()> {
    match value {
        VariableValue::Float(f) => write_f32(w, f),
        VariableValue::Int(i) => write_i32(w, i),
        VariableValue::Key | VariableValue::Null => write_u32(w, 0),
    }
}

fn read_variable_number(r: &mut dyn Read, tag: i32) -> WireResult<VariableValue> {
    Ok(match tag {
        1 => VariableValue::Float(read_f32(r)?),
        3 => VariableValue::Int(read_i32(r)?),
        2 => {
            let _ = read_u32(r)?;
            VariableValue::Key
        }
        _ => {
            let _ = read_u32(r)?;
            VariableValue::Null
        }
    })
}
