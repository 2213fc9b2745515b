//! Pick, control-key, and combinator conditionals.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::{KeyContext, ObjectKey};
use crate::logic::{LogicCtx, LogicModBase};
use crate::messages::Message;
use crate::wire::{read_i32, read_u32, write_i32, write_u32, WireResult};

use super::{ConditionCore, ConditionResponse, Conditional, TriggerRequest};

/// Satisfied while the interactable is picked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PickedConditional {
    /// Shared conditional state.
    pub core: ConditionCore,
}

impl PickedConditional {
    /// Unpicked conditional.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
    ) -> ConditionResponse {
        let Message::Picked(picked) = msg else {
            return ConditionResponse::unhandled();
        };
        if picked.is_picked {
            self.core.satisfied = true;
            ConditionResponse::handled()
        } else {
            self.core.satisfied = false;
            if owner.triggered() && !self.core.toggle {
                ConditionResponse::request(TriggerRequest::UnTrigger)
            } else {
                ConditionResponse::handled()
            }
        }
    }
}

/// Satisfied when its bound game control goes down.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlKeyConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// The control code this conditional listens for.
    pub control_code: i32,
}

impl ControlKeyConditional {
    /// Conditional bound to a control code.
    #[must_use]
    pub fn new(control_code: i32) -> Self {
        Self {
            core: ConditionCore::default(),
            control_code,
        }
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
    ) -> ConditionResponse {
        let Message::ControlEvent(control) = msg else {
            return ConditionResponse::unhandled();
        };
        if control.control_code != self.control_code {
            return ConditionResponse::unhandled();
        }

        if control.down {
            self.core.satisfied = true;
            owner
                .notify_mut()
                .add_control_key_event(control.control_code, true);
            ConditionResponse::request(TriggerRequest::Trigger { net_request: false })
        } else {
            self.core.satisfied = false;
            if owner.triggered() && !self.core.toggle {
                ConditionResponse::request(TriggerRequest::UnTrigger)
            } else {
                ConditionResponse::handled()
            }
        }
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write) -> WireResult<()> {
        write_i32(w, self.control_code)
    }

    pub(super) fn read_fields(core: ConditionCore, r: &mut dyn Read) -> WireResult<Self> {
        Ok(Self {
            core,
            control_code: read_i32(r)?,
        })
    }
}

/// Satisfied when any child conditional is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrConditional {
    /// Shared conditional state.
    pub core: ConditionCore,

    /// Child conditionals, checked in order.
    pub children: Vec<Conditional>,
}

impl OrConditional {
    /// Combinator over the given children.
    #[must_use]
    pub fn new(children: impl IntoIterator<Item = Conditional>) -> Self {
        Self {
            core: ConditionCore::default(),
            children: children.into_iter().collect(),
        }
    }

    /// Add a child.
    pub fn add_child(&mut self, child: Conditional) {
        self.children.push(child);
    }

    pub(super) fn msg_receive(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        ctx: &mut LogicCtx,
        peers_verified: bool,
    ) -> ConditionResponse {
        for child in &mut self.children {
            let resp = child.msg_receive(msg, owner, ctx, peers_verified);
            if resp.handled {
                return resp;
            }
        }
        ConditionResponse::unhandled()
    }

    pub(super) fn verify(
        &mut self,
        msg: &Message,
        owner: &mut LogicModBase,
        ctx: &mut LogicCtx,
    ) -> bool {
        self.children
            .iter_mut()
            .any(|child| child.verify(msg, owner, ctx))
    }

    /// Any child satisfied, NOT flag applied.
    pub fn satisfied(&mut self) -> bool {
        let any = self.children.iter_mut().any(Conditional::satisfied);
        if self.core.negate {
            !any
        } else {
            any
        }
    }

    /// Reset self and every child.
    pub fn reset(&mut self) {
        self.core.satisfied = false;
        for child in &mut self.children {
            child.reset();
        }
    }

    /// Propagate the owner to every child.
    pub fn set_logic_mod(&mut self, owner: ObjectKey) {
        self.core.owner = Some(owner);
        for child in &mut self.children {
            child.set_logic_mod(owner);
        }
    }

    pub(super) fn write_fields(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        write_u32(w, self.children.len() as u32)?;
        for child in &self.children {
            child.write(w, keys)?;
        }
        Ok(())
    }

    pub(super) fn read_fields(
        core: ConditionCore,
        r: &mut dyn Read,
        keys: &mut dyn KeyContext,
    ) -> WireResult<Self> {
        let count = crate::wire::check_len("or children", read_u32(r)?)?;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(Conditional::read(r, keys)?);
        }
        Ok(Self { core, children })
    }
}
