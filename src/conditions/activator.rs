//! Activator-driven conditionals.
//!
//! These fire from detector traffic. Each tracks the set of activator objects
//! it answers to; messages from anything else fall through to the next
//! conditional on the modifier.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{KeyContext, ObjectKey};
use crate::logic::LogicModBase;
use crate::messages::Message;
use crate::wire::{read_u32, write_u32, WireResult};

use super::{ConditionCore, ConditionResponse, TriggerRequest};

fn write_key_list(
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

fn read_key_list(
    r: &mut dyn Read,
    keys: &mut dyn KeyContext,
) -> WireResult<SmallVec<[ObjectKey; 2]>> {
    let count = crate::wire::check_len("activator list", read_u32(r)?)?;
    let mut list = SmallVec::new();
    for _ in 0..count {
        if let Some(key) = keys.read_key(r)? {
            list.push(key);
        }
    }
    Ok(list)
}

/// Fires when a tracked detector reports a trigger-candidate event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivatorConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// Detector objects this conditional answers to.
    pub activators: SmallVec<[ObjectKey; 2]>,
}

impl ActivatorConditional {
    /// Conditional answering to the given detectors.
    #[must_use]
    pub fn new(activators: impl IntoIterator<Item = ObjectKey>) -> Self {
        Self {
            core: ConditionCore::default(),
            activators: activators.into_iter().collect(),
        }
    }

    /// Track another detector.
    pub fn add_activator(&mut self, key: ObjectKey) {
        self.activators.push(key);
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        peers_verified: bool,
    ) -> ConditionResponse {
        let Message::Activator(activator) = msg else {
            return ConditionResponse::unhandled();
        };
        let matches_source = activator
            .hittee
            .is_some_and(|hittee| self.activators.contains(&hittee));
        if !matches_source {
            return ConditionResponse::unhandled();
        }

        let mut resp = ConditionResponse::handled();
        if activator.kind.is_untrigger() {
            // Toggle activators absorb the untrigger half of the pair.
            if owner.triggered() && !self.core.toggle {
                resp.push(TriggerRequest::UnTrigger);
            }
        } else if peers_verified {
            self.core.satisfied = true;
            if self.core.toggle && owner.triggered() {
                // Second activation of a toggle: symmetric untrigger.
                resp.push(TriggerRequest::UnTrigger);
            } else {
                resp.push(TriggerRequest::Trigger { net_request: false });
            }
        }
        resp
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_key_list(w, keys, &self.activators)
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        Ok(Self {
            core,
            activators: read_key_list(r, keys)?,
        })
    }
}

/// Fires from the boolean `state` of notify messages sent by other
/// activators, chaining logic modifiers together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivatorActivatorConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// Upstream activators whose notifications we watch.
    pub activators: SmallVec<[ObjectKey; 2]>,
}

impl ActivatorActivatorConditional {
    /// Conditional watching the given upstream activators.
    #[must_use]
    pub fn new(activators: impl IntoIterator<Item = ObjectKey>) -> Self {
        Self {
            core: ConditionCore::default(),
            activators: activators.into_iter().collect(),
        }
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        peers_verified: bool,
    ) -> ConditionResponse {
        let Message::Notify(notify) = msg else {
            return ConditionResponse::unhandled();
        };
        let matches_source = notify
            .sender
            .is_some_and(|sender| self.activators.contains(&sender));
        if !matches_source {
            return ConditionResponse::unhandled();
        }

        let mut resp = ConditionResponse::handled();
        if notify.state != 0.0 {
            if peers_verified {
                self.core.satisfied = true;
                if self.core.toggle && owner.triggered() {
                    resp.push(TriggerRequest::UnTrigger);
                } else {
                    resp.push(TriggerRequest::Trigger { net_request: false });
                }
            }
        } else if owner.triggered() && !self.core.toggle {
            resp.push(TriggerRequest::UnTrigger);
        }
        resp
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_key_list(w, keys, &self.activators)
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        Ok(Self {
            core,
            activators: read_key_list(r, keys)?,
        })
    }
}

/// Volume-style activator conditional.
///
/// Unlike [`ActivatorConditional`], the handler loop never checks the
/// message's source: the body runs once per *configured* activator, whatever
/// sent the message. With no activators configured it handles nothing. This
/// mirrors the shipped behavior exactly; see the test suite before changing
/// it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolActivatorConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// Configured activators; only the count matters to dispatch.
    pub activators: SmallVec<[ObjectKey; 2]>,
}

impl VolActivatorConditional {
    /// Conditional with the given configured activators.
    #[must_use]
    pub fn new(activators: impl IntoIterator<Item = ObjectKey>) -> Self {
        Self {
            core: ConditionCore::default(),
            activators: activators.into_iter().collect(),
        }
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        peers_verified: bool,
    ) -> ConditionResponse {
        let Message::Activator(activator) = msg else {
            return ConditionResponse::unhandled();
        };
        if self.activators.is_empty() {
            return ConditionResponse::unhandled();
        }

        let mut resp = ConditionResponse::handled();
        for _ in 0..self.activators.len() {
            if activator.kind.is_untrigger() {
                if owner.triggered() && !self.core.toggle {
                    resp.push(TriggerRequest::UnTrigger);
                }
            } else if peers_verified {
                self.core.satisfied = true;
                resp.push(TriggerRequest::Trigger { net_request: false });
            }
        }
        resp
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_key_list(w, keys, &self.activators)
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        Ok(Self {
            core,
            activators: read_key_list(r, keys)?,
        })
    }
}
