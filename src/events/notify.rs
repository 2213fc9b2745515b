//! The notification envelope.
//!
//! A [`NotifyMsg`] tells a set of receivers (responders, activators, script
//! objects) that some event or transition of state happened. It carries a
//! scalar `state` (0.0 = untrigger, 1.0 = trigger; scalar because some
//! consumers interpolate), a correlation `id` for responder state changes, and
//! an ordered list of [`EventData`] records describing what happened.
//!
//! A logic modifier owns exactly one *pending* notify message at a time.
//! Events accumulate on it until the next Trigger/UnTrigger, at which point it
//! is handed to the dispatch bus and replaced with a fresh one carrying the
//! same receiver set.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{KeyContext, ObjectKey};
use crate::wire::{
    read_f32, read_f64, read_i32, read_u32, write_f32, write_f64, write_i32, write_u32, BitVector,
    WireResult,
};

use super::data::{EventData, EventType, VariableValue};

/// Broadcast-flag bits carried in the message header.
pub mod bcast {
    /// Replicate the message to remote clients.
    pub const NET_PROPAGATE: u32 = 1 << 0;
    /// Deliver the message locally.
    pub const LOCAL_PROPAGATE: u32 = 1 << 1;
}

/// What kind of notification this is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyType {
    /// Ordinary activator trigger/untrigger.
    #[default]
    Activator,
    /// Variable-only notification for script consumers.
    VarNotification,
    /// Self-addressed callback.
    NotifySelf,
    /// Responder: fast-forward to the given state without side effects.
    ResponderFastForward,
    /// Responder: switch state, then run.
    ResponderChangeState,
}

impl NotifyType {
    /// Wire discriminant.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::Activator => 0,
            Self::VarNotification => 1,
            Self::NotifySelf => 2,
            Self::ResponderFastForward => 3,
            Self::ResponderChangeState => 4,
        }
    }

    /// Decode a wire discriminant; unknown values fall back to `Activator`,
    /// matching the forgiving read path of the original format.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Self {
        match tag {
            1 => Self::VarNotification,
            2 => Self::NotifySelf,
            3 => Self::ResponderFastForward,
            4 => Self::ResponderChangeState,
            _ => Self::Activator,
        }
    }
}

// Versioned-format content flags, in frozen declaration order.
const NOTIFY_TYPE_BIT: usize = 0;
const NOTIFY_STATE_BIT: usize = 1;
const NOTIFY_ID_BIT: usize = 2;
const NOTIFY_EVENTS_BIT: usize = 3;

const HEADER_SENDER_BIT: usize = 0;
const HEADER_RECEIVERS_BIT: usize = 1;
const HEADER_TIMESTAMP_BIT: usize = 2;
const HEADER_BCAST_BIT: usize = 3;

/// Notification envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotifyMsg {
    /// Who sent this (the logic modifier, stamped at trigger time).
    pub sender: Option<ObjectKey>,

    /// Receivers, notified independently; order carries no meaning.
    pub receivers: SmallVec<[ObjectKey; 4]>,

    /// Delivery timestamp, seconds. Stamped by the dispatch layer.
    pub timestamp: f64,

    /// Broadcast-flag bits ([`bcast`]).
    pub bcast_flags: u32,

    /// Notification kind.
    pub notify_type: NotifyType,

    /// 0.0 = untrigger, 1.0 = trigger; consumers may interpolate.
    pub state: f32,

    /// Correlation id for responder state transitions.
    pub id: i32,

    /// Accumulated event records, in insertion order.
    pub events: Vec<EventData>,
}

impl Default for NotifyMsg {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyMsg {
    /// Empty notification: activator type, state fully false, net-propagated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: None,
            receivers: SmallVec::new(),
            timestamp: 0.0,
            bcast_flags: bcast::NET_PROPAGATE | bcast::LOCAL_PROPAGATE,
            notify_type: NotifyType::Activator,
            state: 0.0,
            id: 0,
            events: Vec::new(),
        }
    }

    /// Notification from `sender` to a single receiver.
    #[must_use]
    pub fn from_to(sender: ObjectKey, receiver: ObjectKey) -> Self {
        let mut msg = Self::new();
        msg.sender = Some(sender);
        msg.receivers.push(receiver);
        msg
    }

    /// Add a receiver.
    pub fn add_receiver(&mut self, receiver: ObjectKey) {
        self.receivers.push(receiver);
    }

    // === Event accumulation ===

    /// Add an event record.
    ///
    /// Single-slot kinds replace any existing record of the same kind — only
    /// the latest matters. Repeatable kinds always append.
    pub fn add_event(&mut self, event: EventData) {
        let ty = event.event_type();
        if ty.is_single_slot() {
            if let Some(pos) = self.events.iter().position(|e| e.event_type() == ty) {
                self.events.remove(pos);
            }
        }
        self.events.push(event);
    }

    /// Collision record. `only_one` keeps at most one collision record in the
    /// message (the normal case for a single physical detector).
    pub fn add_collision_event(
        &mut self,
        enter: bool,
        other: Option<ObjectKey>,
        self_key: Option<ObjectKey>,
        only_one: bool,
    ) {
        let event = EventData::Collision {
            enter,
            hitter: other,
            hittee: self_key,
        };
        if only_one {
            self.add_event(event);
        } else {
            self.events.push(event);
        }
    }

    /// Pick record: `other` picked `self_key` at `hit_point`.
    pub fn add_pick_event(
        &mut self,
        other: Option<ObjectKey>,
        self_key: Option<ObjectKey>,
        enabled: bool,
        hit_point: [f32; 3],
    ) {
        self.add_event(EventData::Picked {
            picker: other,
            picked: self_key,
            enabled,
            hit_point,
        });
    }

    /// Facing record with the achieved dot product.
    pub fn add_facing_event(
        &mut self,
        other: Option<ObjectKey>,
        self_key: Option<ObjectKey>,
        dot: f32,
        enabled: bool,
    ) {
        self.add_event(EventData::Facing {
            facer: other,
            facee: self_key,
            dot,
            enabled,
        });
    }

    /// Containment record: `contained` entered or left `container`.
    pub fn add_container_event(
        &mut self,
        container: Option<ObjectKey>,
        contained: Option<ObjectKey>,
        entering: bool,
    ) {
        self.add_event(EventData::Contained {
            contained,
            container,
            entering,
        });
    }

    /// Bare yes/no activation record.
    pub fn add_activate_event(&mut self, activate: bool) {
        self.add_event(EventData::Activate {
            active: true,
            activate,
        });
    }

    /// Callback record by callback event code.
    pub fn add_callback_event(&mut self, event: i32) {
        self.add_event(EventData::Callback { event });
    }

    /// State for the receiving responder to switch to before triggering.
    pub fn add_responder_state_event(&mut self, state: i32) {
        self.add_event(EventData::ResponderState { state });
    }

    /// Multistage progress record. Repeatable.
    pub fn add_multi_stage_event(&mut self, stage: i32, event: i32, avatar: Option<ObjectKey>) {
        self.events.push(EventData::MultiStage {
            stage,
            event,
            avatar,
        });
    }

    /// Coop bookkeeping record. Repeatable.
    pub fn add_coop_event(&mut self, id: u32, serial: u16) {
        self.events.push(EventData::Coop { id, serial });
    }

    /// Spawn record. Repeatable.
    pub fn add_spawned_event(&mut self, spawner: Option<ObjectKey>, spawnee: Option<ObjectKey>) {
        self.events.push(EventData::Spawned { spawner, spawnee });
    }

    /// Control-key record.
    pub fn add_control_key_event(&mut self, key: i32, down: bool) {
        self.add_event(EventData::ControlKey {
            control_key: key,
            down,
        });
    }

    /// Float variable record. Repeatable.
    pub fn add_variable_float(&mut self, name: impl Into<String>, number: f32) {
        self.events.push(EventData::Variable {
            name: name.into(),
            value: VariableValue::Float(number),
            key: None,
        });
    }

    /// Integer variable record. Repeatable.
    pub fn add_variable_int(&mut self, name: impl Into<String>, number: i32) {
        self.events.push(EventData::Variable {
            name: name.into(),
            value: VariableValue::Int(number),
            key: None,
        });
    }

    /// Name-only variable record. Repeatable.
    pub fn add_variable_null(&mut self, name: impl Into<String>) {
        self.events.push(EventData::Variable {
            name: name.into(),
            value: VariableValue::Null,
            key: None,
        });
    }

    /// Key-valued variable record. Repeatable.
    pub fn add_variable_key(&mut self, name: impl Into<String>, key: Option<ObjectKey>) {
        self.events.push(EventData::Variable {
            name: name.into(),
            value: VariableValue::Key,
            key,
        });
    }

    /// Click-drag record: `dragger` is always the local player.
    pub fn add_click_drag_event(
        &mut self,
        dragger: Option<ObjectKey>,
        dragee: Option<ObjectKey>,
        anim_pos: f32,
    ) {
        self.add_event(EventData::ClickDrag {
            picker: dragger,
            picked: dragee,
            anim_pos,
        });
    }

    /// Linking-book offer record. Networked only, never delivered locally.
    pub fn add_offer_book_event(
        &mut self,
        offerer: Option<ObjectKey>,
        target_age: i32,
        offeree: i32,
    ) {
        self.add_event(EventData::OfferLinkingBook {
            offerer,
            target_age,
            offeree,
        });
    }

    /// In-book UI record.
    pub fn add_book_event(&mut self, event: u32, link_id: u32) {
        self.add_event(EventData::Book { event, link_id });
    }

    /// Climbing-blocker record.
    pub fn add_hit_climbing_blocker_event(&mut self, blocker: Option<ObjectKey>) {
        self.add_event(EventData::ClimbingBlockerHit { blocker });
    }

    // === Queries ===

    /// First record with the given wire tag.
    ///
    /// Tags outside the valid range return `None` immediately.
    #[must_use]
    pub fn find_event(&self, tag: i32) -> Option<&EventData> {
        if !(0..EventType::NONE).contains(&tag) {
            return None;
        }
        self.events.iter().find(|e| e.event_type().tag() == tag)
    }

    /// "Who caused this" heuristic for script consumers.
    ///
    /// Checks record kinds in fixed priority order — Collision hitter, Picked
    /// picker, Spawned spawnee, MultiStage avatar — regardless of insertion
    /// order, and returns the first key found.
    #[must_use]
    pub fn avatar_key(&self) -> Option<ObjectKey> {
        for ty in [
            EventType::Collision,
            EventType::Picked,
            EventType::Spawned,
            EventType::MultiStage,
        ] {
            for event in &self.events {
                match (ty, event) {
                    (EventType::Collision, EventData::Collision { hitter, .. }) => return *hitter,
                    (EventType::Picked, EventData::Picked { picker, .. }) => return *picker,
                    (EventType::Spawned, EventData::Spawned { spawnee, .. }) => return *spawnee,
                    (EventType::MultiStage, EventData::MultiStage { avatar, .. }) => {
                        return *avatar;
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Drop all accumulated event records. Must run before a message object
    /// is reused, or stale records get delivered twice.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // === Flat format ===

    /// Write the flat form: header, then type/state/id, then the records.
    pub fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        self.write_header(w, keys)?;
        write_i32(w, self.notify_type.tag())?;
        write_f32(w, self.state)?;
        write_i32(w, self.id)?;
        write_u32(w, self.events.len() as u32)?;
        for event in &self.events {
            event.write(w, keys)?;
        }
        Ok(())
    }

    /// Read the flat form. A record with an unknown tag ends the event list
    /// early (short list; the stream beyond it is unrecoverable).
    pub fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        let mut msg = Self::new();
        msg.read_header(r, keys)?;
        msg.notify_type = NotifyType::from_tag(read_i32(r)?);
        msg.state = read_f32(r)?;
        msg.id = read_i32(r)?;
        let count = crate::wire::check_len("event list", read_u32(r)?)?;
        for _ in 0..count {
            match EventData::read(r, keys)? {
                Some(event) => msg.events.push(event),
                None => break,
            }
        }
        Ok(msg)
    }

    fn write_header(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        keys.write_key(w, self.sender)?;
        write_u32(w, self.receivers.len() as u32)?;
        for receiver in &self.receivers {
            keys.write_key(w, Some(*receiver))?;
        }
        write_f64(w, self.timestamp)?;
        write_u32(w, self.bcast_flags)?;
        Ok(())
    }

    fn read_header(&mut self, r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<()> {
        self.sender = keys.read_key(r)?;
        let count = crate::wire::check_len("receiver list", read_u32(r)?)?;
        self.receivers.clear();
        for _ in 0..count {
            if let Some(receiver) = keys.read_key(r)? {
                self.receivers.push(receiver);
            }
        }
        self.timestamp = read_f64(r)?;
        self.bcast_flags = read_u32(r)?;
        Ok(())
    }

    // === Versioned format ===

    /// Write the versioned form.
    pub fn write_version(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        BitVector::with_first_bits(4).write(w)?;
        self.write_header(w, keys)?;

        let mut flags = BitVector::new();
        flags.set_bit(NOTIFY_TYPE_BIT);
        flags.set_bit(NOTIFY_STATE_BIT);
        flags.set_bit(NOTIFY_ID_BIT);
        flags.set_bit(NOTIFY_EVENTS_BIT);
        flags.write(w)?;

        write_i32(w, self.notify_type.tag())?;
        write_f32(w, self.state)?;
        write_i32(w, self.id)?;
        write_u32(w, self.events.len() as u32)?;
        for event in &self.events {
            event.write_version(w, keys)?;
        }
        Ok(())
    }

    /// Read the versioned form. Fields whose content bit is clear keep their
    /// defaults.
    pub fn read_version(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        let mut msg = Self::new();
        msg.read_header_version(r, keys)?;

        let flags = BitVector::read(r)?;
        if flags.is_bit_set(NOTIFY_TYPE_BIT) {
            msg.notify_type = NotifyType::from_tag(read_i32(r)?);
        }
        if flags.is_bit_set(NOTIFY_STATE_BIT) {
            msg.state = read_f32(r)?;
        }
        if flags.is_bit_set(NOTIFY_ID_BIT) {
            msg.id = read_i32(r)?;
        }
        if flags.is_bit_set(NOTIFY_EVENTS_BIT) {
            let count = crate::wire::check_len("event list", read_u32(r)?)?;
            for _ in 0..count {
                match EventData::read_version(r, keys)? {
                    Some(event) => msg.events.push(event),
                    None => break,
                }
            }
        }
        Ok(msg)
    }

    fn read_header_version(&mut self, r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<()> {
        let flags = BitVector::read(r)?;
        if flags.is_bit_set(HEADER_SENDER_BIT) {
            self.sender = keys.read_key(r)?;
        }
        if flags.is_bit_set(HEADER_RECEIVERS_BIT) {
            let count = crate::wire::check_len("receiver list", read_u32(r)?)?;
            self.receivers.clear();
            for _ in 0..count {
                if let Some(receiver) = keys.read_key(r)? {
                    self.receivers.push(receiver);
                }
            }
        }
        if flags.is_bit_set(HEADER_TIMESTAMP_BIT) {
            self.timestamp = read_f64(r)?;
        }
        if flags.is_bit_set(HEADER_BCAST_BIT) {
            self.bcast_flags = read_u32(r)?;
        }
        Ok(())
    }
}
