//! The message envelope and dispatch contract.
//!
//! Everything that moves between keyed objects is a [`Message`]: one closed
//! tagged union over the kinds this subsystem sends or receives. Handlers
//! `match` on it; the first handler that recognizes a message consumes it and
//! anything unrecognized falls through to the next handler in the chain.
//!
//! Delivery is the [`MessageBus`]'s problem. The bus is asynchronous and never
//! blocks the sender; a message sent during handling of another message is
//! processed after the current one completes.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::conditions::Conditional;
use crate::core::{KeyContext, ObjectKey};
use crate::events::NotifyMsg;
use crate::net::TestAndSetMsg;
use crate::wire::{
    read_bool, read_f32, read_i32, read_u16, read_u32, write_bool, write_f32, write_i32,
    write_u16, write_u32, WireError, WireResult,
};

/// Physical trigger-candidate subtypes carried by an [`ActivatorMsg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivatorKind {
    /// Object was picked (clicked).
    PickedTrigger,
    /// Pick released.
    UnPickedTrigger,
    /// Collision began.
    CollideEnter,
    /// Collision ended.
    CollideExit,
    /// Continuous contact report.
    CollideContact,
    /// Collision-based untrigger.
    CollideUnTrigger,
    /// Region entry that untriggers.
    EnterUnTrigger,
    /// Region exit that untriggers.
    ExitUnTrigger,
    /// Detector volume entered.
    VolumeEnter,
    /// Detector volume exited.
    VolumeExit,
    /// Avatar entered the room/age.
    RoomEntry,
}

impl ActivatorKind {
    /// Wire discriminant.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::PickedTrigger => 0,
            Self::UnPickedTrigger => 1,
            Self::CollideEnter => 2,
            Self::CollideExit => 3,
            Self::CollideContact => 4,
            Self::CollideUnTrigger => 5,
            Self::EnterUnTrigger => 6,
            Self::ExitUnTrigger => 7,
            Self::VolumeEnter => 8,
            Self::VolumeExit => 9,
            Self::RoomEntry => 10,
        }
    }

    /// Decode a wire discriminant.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::PickedTrigger),
            1 => Some(Self::UnPickedTrigger),
            2 => Some(Self::CollideEnter),
            3 => Some(Self::CollideExit),
            4 => Some(Self::CollideContact),
            5 => Some(Self::CollideUnTrigger),
            6 => Some(Self::EnterUnTrigger),
            7 => Some(Self::ExitUnTrigger),
            8 => Some(Self::VolumeEnter),
            9 => Some(Self::VolumeExit),
            10 => Some(Self::RoomEntry),
            _ => None,
        }
    }

    /// Subtypes that ask the owner to untrigger rather than trigger.
    #[must_use]
    pub const fn is_untrigger(self) -> bool {
        matches!(
            self,
            Self::UnPickedTrigger | Self::EnterUnTrigger | Self::ExitUnTrigger | Self::CollideUnTrigger
        )
    }

    /// Subtypes sourced from the collision system.
    #[must_use]
    pub const fn is_collision(self) -> bool {
        matches!(
            self,
            Self::CollideEnter | Self::CollideExit | Self::CollideContact | Self::CollideUnTrigger
        )
    }
}

/// Detector layer → logic: a physical trigger candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivatorMsg {
    /// What physically happened.
    pub kind: ActivatorKind,

    /// The moving object (usually an avatar).
    pub hitter: Option<ObjectKey>,

    /// The detector/clickable that observed it.
    pub hittee: Option<ObjectKey>,

    /// Contact point, where the subtype has one.
    pub hit_point: [f32; 3],
}

impl ActivatorMsg {
    /// Activator event with no contact point.
    #[must_use]
    pub fn new(kind: ActivatorKind, hitter: Option<ObjectKey>, hittee: Option<ObjectKey>) -> Self {
        Self {
            kind,
            hitter,
            hittee,
            hit_point: [0.0; 3],
        }
    }
}

/// Server → client: verdict on a lock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerReplyKind {
    /// Another replica holds the lock; stand down.
    Deny,
    /// Lock granted; commit and release.
    Affirm,
}

/// Reply to a [`TestAndSetMsg`] lock request, correlated by the identity of
/// the object it is delivered to — there is no request token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReplyMsg {
    /// The verdict.
    pub kind: ServerReplyKind,
}

/// Enable or disable a logic modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableMsg {
    /// True re-arms (and clears any in-flight trigger state); false disables.
    pub enable: bool,
}

/// Logic → timer service: fire a [`TimerCallbackMsg`] back at `receiver`
/// after `seconds`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetTimerMsg {
    /// Correlation id echoed in the callback.
    pub id: i32,
    /// Delay in seconds.
    pub seconds: f32,
    /// Who to call back.
    pub receiver: ObjectKey,
}

/// Timer service → logic: a previously requested delay elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerCallbackMsg {
    /// Correlation id from the [`SetTimerMsg`].
    pub id: i32,
    /// Game time at expiry, seconds.
    pub time: f32,
}

/// Input layer → logic: non-committing probe used to preview cursor state
/// over an interactable without triggering anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeOutMsg;

/// A player's avatar paged in or out of the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPageMsg {
    /// The avatar in question.
    pub player: ObjectKey,
    /// True when the avatar is being unloaded (disconnect, link-out).
    pub unload: bool,
}

/// Input layer → logic: pick state on a clickable changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickedMsg {
    /// Who picked.
    pub picker: Option<ObjectKey>,
    /// What was picked.
    pub picked: Option<ObjectKey>,
    /// True on pick, false on release.
    pub is_picked: bool,
    /// Pick ray intersection.
    pub hit_point: [f32; 3],
}

/// Input layer → logic: a bound control changed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEventMsg {
    /// Game control code.
    pub control_code: i32,
    /// True while the control is active.
    pub down: bool,
}

/// Loader → logic modifier: install a conditional at a slot index.
///
/// The condition list auto-grows to fit the index; sending the same index
/// twice replaces the earlier conditional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachConditionMsg {
    /// Slot in the owner's condition list.
    pub index: usize,
    /// The conditional to install.
    pub conditional: Conditional,
}

/// Every message kind this subsystem sends or receives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Notify(NotifyMsg),
    Activator(ActivatorMsg),
    Picked(PickedMsg),
    ControlEvent(ControlEventMsg),
    Enable(EnableMsg),
    ServerReply(ServerReplyMsg),
    TestAndSet(TestAndSetMsg),
    SetTimer(SetTimerMsg),
    TimerCallback(TimerCallbackMsg),
    FakeOut(FakeOutMsg),
    PlayerPage(PlayerPageMsg),
    AttachCondition(AttachConditionMsg),
}

impl Message {
    /// Wire class tag.
    #[must_use]
    pub fn class_tag(&self) -> u16 {
        match self {
            Self::Notify(_) => 1,
            Self::Activator(_) => 2,
            Self::Picked(_) => 3,
            Self::ControlEvent(_) => 4,
            Self::Enable(_) => 5,
            Self::ServerReply(_) => 6,
            Self::TestAndSet(_) => 7,
            Self::SetTimer(_) => 8,
            Self::TimerCallback(_) => 9,
            Self::FakeOut(_) => 10,
            Self::PlayerPage(_) => 11,
            Self::AttachCondition(_) => 12,
        }
    }

    /// Polymorphic write: class tag then body. The counterpart of the
    /// resource manager's "write creatable".
    pub fn write_creatable(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_u16(w, self.class_tag())?;
        match self {
            Self::Notify(msg) => msg.write(w, keys),
            Self::Activator(msg) => {
                write_i32(w, msg.kind.tag())?;
                keys.write_key(w, msg.hitter)?;
                keys.write_key(w, msg.hittee)?;
                for component in msg.hit_point {
                    write_f32(w, component)?;
                }
                Ok(())
            }
            Self::Picked(msg) => {
                keys.write_key(w, msg.picker)?;
                keys.write_key(w, msg.picked)?;
                write_bool(w, msg.is_picked)?;
                for component in msg.hit_point {
                    write_f32(w, component)?;
                }
                Ok(())
            }
            Self::ControlEvent(msg) => {
                write_i32(w, msg.control_code)?;
                write_bool(w, msg.down)
            }
            Self::Enable(msg) => write_bool(w, msg.enable),
            Self::ServerReply(msg) => write_i32(
                w,
                match msg.kind {
                    ServerReplyKind::Deny => 0,
                    ServerReplyKind::Affirm => 1,
                },
            ),
            Self::TestAndSet(msg) => msg.write(w, keys),
            Self::SetTimer(msg) => {
                write_i32(w, msg.id)?;
                write_f32(w, msg.seconds)?;
                keys.write_key(w, Some(msg.receiver))
            }
            Self::TimerCallback(msg) => {
                write_i32(w, msg.id)?;
                write_f32(w, msg.time)
            }
            Self::FakeOut(_) => Ok(()),
            Self::PlayerPage(msg) => {
                keys.write_key(w, Some(msg.player))?;
                write_bool(w, msg.unload)
            }
            Self::AttachCondition(msg) => {
                write_u32(w, msg.index as u32)?;
                msg.conditional.write(w, keys)
            }
        }
    }

    /// Polymorphic read: class tag then body. Unknown tags are an error; the
    /// message protocol is a closed set.
    pub fn read_creatable(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        let tag = read_u16(r)?;
        Ok(match tag {
            1 => Self::Notify(NotifyMsg::read(r, keys)?),
            2 => {
                let kind_tag = read_i32(r)?;
                let kind = ActivatorKind::from_tag(kind_tag).ok_or(WireError::BadTag {
                    kind: "activator subtype",
                    tag: kind_tag.into(),
                })?;
                Self::Activator(ActivatorMsg {
                    kind,
                    hitter: keys.read_key(r)?,
                    hittee: keys.read_key(r)?,
                    hit_point: [read_f32(r)?, read_f32(r)?, read_f32(r)?],
                })
            }
            3 => Self::Picked(PickedMsg {
                picker: keys.read_key(r)?,
                picked: keys.read_key(r)?,
                is_picked: read_bool(r)?,
                hit_point: [read_f32(r)?, read_f32(r)?, read_f32(r)?],
            }),
            4 => Self::ControlEvent(ControlEventMsg {
                control_code: read_i32(r)?,
                down: read_bool(r)?,
            }),
            5 => Self::Enable(EnableMsg {
                enable: read_bool(r)?,
            }),
            6 => {
                let kind = match read_i32(r)? {
                    0 => ServerReplyKind::Deny,
                    _ => ServerReplyKind::Affirm,
                };
                Self::ServerReply(ServerReplyMsg { kind })
            }
            7 => Self::TestAndSet(TestAndSetMsg::read(r, keys)?),
            8 => {
                let id = read_i32(r)?;
                let seconds = read_f32(r)?;
                let receiver = keys.read_key(r)?.ok_or(WireError::BadTag {
                    kind: "timer receiver",
                    tag: 0,
                })?;
                Self::SetTimer(SetTimerMsg {
                    id,
                    seconds,
                    receiver,
                })
            }
            9 => Self::TimerCallback(TimerCallbackMsg {
                id: read_i32(r)?,
                time: read_f32(r)?,
            }),
            10 => Self::FakeOut(FakeOutMsg),
            11 => {
                let player = keys.read_key(r)?.ok_or(WireError::BadTag {
                    kind: "page player",
                    tag: 0,
                })?;
                Self::PlayerPage(PlayerPageMsg {
                    player,
                    unload: read_bool(r)?,
                })
            }
            12 => {
                let index = read_u32(r)? as usize;
                Self::AttachCondition(AttachConditionMsg {
                    index,
                    conditional: Conditional::read(r, keys)?,
                })
            }
            _ => {
                return Err(WireError::BadTag {
                    kind: "message class",
                    tag: tag.into(),
                })
            }
        })
    }
}

/// Asynchronous delivery seam supplied by the engine's dispatcher.
///
/// `send` enqueues; it must not deliver re-entrantly into the caller.
pub trait MessageBus {
    /// Queue a message for delivery to its declared receivers.
    fn send(&mut self, msg: Message);
}

/// Bus double that records everything sent through it.
///
/// Used by this crate's tests and useful to embedders writing their own.
#[derive(Debug, Default)]
pub struct RecordingBus {
    /// Messages in send order.
    pub sent: Vec<Message>,
}

impl RecordingBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every recorded message, leaving the bus empty.
    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.sent)
    }

    /// Count of sent [`Message::TestAndSet`] lock requests.
    #[must_use]
    pub fn lock_requests(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, Message::TestAndSet(t) if t.lock_request))
            .count()
    }

    /// The notify messages sent so far.
    #[must_use]
    pub fn notifies(&self) -> Vec<&NotifyMsg> {
        self.sent
            .iter()
            .filter_map(|m| match m {
                Message::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl MessageBus for RecordingBus {
    fn send(&mut self, msg: Message) {
        self.sent.push(msg);
    }
}
