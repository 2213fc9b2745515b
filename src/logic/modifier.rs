//! The concrete scene-content logic modifier.

use std::io::{Read, Write};

use log::debug;
use smallvec::SmallVec;

use crate::conditions::{Conditional, TriggerRequest};
use crate::core::{KeyContext, ObjectKey};
use crate::messages::Message;
use crate::wire::{
    read_bool, read_f32, read_i32, read_u32, write_bool, write_f32, write_i32, write_u32,
    WireResult,
};

use super::base::{LogicModBase, ReplyOutcome, RequestOutcome};
use super::LogicCtx;

/// Mouse-cursor hint computed by the probe path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorHint {
    /// Nothing would fire here right now.
    #[default]
    Inactive,
    /// All conditions verify; the cursor should show the interactable as hot.
    Open,
}

/// A logic modifier: the trigger state machine plus an ordered conditional
/// list.
///
/// Message dispatch order, first match wins:
///
/// 1. Condition-attach messages populate the condition list by index.
/// 2. Timer callbacks fire the (delayed) trigger directly.
/// 3. Activator, notify, pick, control, and page messages are offered to the
///    conditionals in order until one consumes them. Collision-type activator
///    events from avatars this client has no authority over are dropped
///    first.
/// 4. Probe (fake-out) messages refresh the cursor hint and are always
///    consumed.
/// 5. Everything else falls through to the base handler (enable/disable,
///    server replies).
#[derive(Clone, Debug)]
pub struct LogicModifier {
    /// The underlying trigger state machine.
    pub base: LogicModBase,

    /// Slot-indexed conditional list; gaps come from sparse attach indices.
    conditions: Vec<Option<Conditional>>,

    /// Cursor hint from the most recent probe.
    cursor: CursorHint,
}

impl LogicModifier {
    /// Modifier identified by `key`, with no conditions.
    #[must_use]
    pub fn new(key: ObjectKey) -> Self {
        Self {
            base: LogicModBase::new(key),
            conditions: Vec::new(),
            cursor: CursorHint::Inactive,
        }
    }

    /// This modifier's identity.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        self.base.key()
    }

    /// Cursor hint from the most recent probe.
    #[must_use]
    pub fn cursor(&self) -> CursorHint {
        self.cursor
    }

    /// Install a conditional at a slot index. The list auto-grows; attaching
    /// to an occupied slot replaces the previous conditional.
    pub fn attach_condition(&mut self, index: usize, mut conditional: Conditional) {
        if index >= self.conditions.len() {
            self.conditions.resize_with(index + 1, || None);
        }
        conditional.set_logic_mod(self.base.key());
        if conditional.is_local_element() {
            self.base.set_flag(super::LogicFlags::LOCAL_ELEMENT);
        }
        self.conditions[index] = Some(conditional);
    }

    /// Append a conditional after the last occupied slot.
    pub fn add_condition(&mut self, conditional: Conditional) {
        self.attach_condition(self.conditions.len(), conditional);
    }

    /// Attached conditionals, skipping empty slots.
    pub fn conditions(&self) -> impl Iterator<Item = &Conditional> {
        self.conditions.iter().flatten()
    }

    /// Number of occupied condition slots.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.iter().flatten().count()
    }

    /// Logical AND of `verify` across the conditionals, in order,
    /// short-circuiting on the first failure.
    pub fn verify_conditions(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        let base = &mut self.base;
        self.conditions
            .iter_mut()
            .flatten()
            .all(|cond| cond.verify(msg, base, ctx))
    }

    /// Request a trigger: every conditional must report satisfied, then the
    /// base decides whether arbitration is needed.
    pub fn request_trigger(&mut self, net_request: bool, ctx: &mut LogicCtx) {
        if !self.conditions_satisfied() {
            return;
        }
        if self.base.begin_trigger_request(ctx) == RequestOutcome::Local {
            self.pre_trigger(net_request, ctx);
        }
    }

    /// Request an untrigger. Never arbitrated; resets the conditionals when
    /// the modifier actually untriggers.
    pub fn request_untrigger(&mut self, ctx: &mut LogicCtx) {
        let was_triggered = self.base.triggered();
        self.base.untrigger(ctx);
        if was_triggered {
            self.reset_conditions();
        }
    }

    /// Gate a confirmed/local trigger through the disabled flag, the repeat
    /// counter, and the delay timer, then fire.
    pub fn pre_trigger(&mut self, net_request: bool, ctx: &mut LogicCtx) {
        if self.base.disabled() {
            return;
        }
        if !self.base.eval_counter() {
            // Not this time; the counter reset also re-arms the conditions.
            self.reset_conditions();
            return;
        }
        if self.base.timer_seconds() > 0.0 {
            self.base.schedule_timer(ctx);
            return;
        }
        self.base.trigger(net_request, ctx);
    }

    /// Clear triggered state and re-arm every conditional.
    pub fn reset(&mut self, counter_reset: bool) {
        self.base.reset(counter_reset);
        self.reset_conditions();
    }

    /// Full dispatch; returns whether the message was consumed.
    pub fn msg_receive(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        match msg {
            Message::AttachCondition(attach) => {
                self.attach_condition(attach.index, attach.conditional.clone());
                true
            }
            Message::TimerCallback(_) => {
                // The delay already ran its gates; fire directly.
                self.base.trigger(false, ctx);
                true
            }
            Message::Activator(activator) => {
                if activator.kind.is_collision() {
                    if let Some(hitter) = activator.hitter {
                        if ctx.env.is_remote_avatar(hitter) {
                            return true;
                        }
                    }
                }
                self.offer_to_conditions(msg, ctx)
            }
            Message::Notify(_)
            | Message::Picked(_)
            | Message::ControlEvent(_)
            | Message::PlayerPage(_) => self.offer_to_conditions(msg, ctx),
            Message::FakeOut(_) => {
                self.cursor = if self.probe_conditions(msg, ctx) {
                    CursorHint::Open
                } else {
                    CursorHint::Inactive
                };
                true
            }
            // Confirmed arbitration replies must re-enter through the
            // modifier-level gates, so they are intercepted before the base
            // handler sees them.
            Message::ServerReply(reply) => {
                if self.base.resolve_reply(reply.kind) == ReplyOutcome::Confirmed {
                    self.pre_trigger(false, ctx);
                    self.base.send_unlock(ctx);
                }
                true
            }
            _ => self.base.msg_receive(msg, ctx),
        }
    }

    fn offer_to_conditions(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        let peers_verified = self.verify_conditions(msg, ctx);

        let mut requests: SmallVec<[TriggerRequest; 2]> = SmallVec::new();
        let mut handled = false;
        {
            let base = &mut self.base;
            for cond in self.conditions.iter_mut().flatten() {
                let resp = cond.msg_receive(msg, base, ctx, peers_verified);
                if resp.handled {
                    requests = resp.requests;
                    handled = true;
                    break;
                }
            }
        }
        for request in requests {
            self.apply_request(request, ctx);
        }
        handled
    }

    fn apply_request(&mut self, request: TriggerRequest, ctx: &mut LogicCtx) {
        match request {
            TriggerRequest::Trigger { net_request } => self.request_trigger(net_request, ctx),
            TriggerRequest::TriggerDirect => {
                // No arbitration: straight through the local gates.
                self.pre_trigger(false, ctx);
            }
            TriggerRequest::UnTrigger => self.request_untrigger(ctx),
        }
    }

    /// Probe variant of [`verify_conditions`] that reports which conditional
    /// blocked, for cursor diagnostics.
    ///
    /// [`verify_conditions`]: Self::verify_conditions
    fn probe_conditions(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        let base = &mut self.base;
        for cond in self.conditions.iter_mut().flatten() {
            if !cond.verify(msg, base, ctx) {
                debug!(
                    "logic {}: cursor probe blocked by {} conditional",
                    base.key(),
                    cond.kind_name()
                );
                return false;
            }
        }
        true
    }

    fn conditions_satisfied(&mut self) -> bool {
        self.conditions
            .iter_mut()
            .flatten()
            .all(Conditional::satisfied)
    }

    fn reset_conditions(&mut self) {
        for cond in self.conditions.iter_mut().flatten() {
            cond.reset();
        }
    }

    // === Persistence (flat format) ===

    /// Write the authored state: base configuration, command list, pending
    /// notify, then the conditionals and cursor hint.
    pub fn write(&self, w: &mut dyn Write, keys: &mut dyn KeyContext) -> WireResult<()> {
        keys.write_key(w, Some(self.base.key()))?;
        write_u32(w, self.base.flags().bits())?;
        write_bool(w, self.base.disabled())?;
        write_i32(w, self.base.counter_limit())?;
        write_f32(w, self.base.timer_seconds())?;

        write_u32(w, self.base.commands().len() as u32)?;
        for command in self.base.commands() {
            command.write_creatable(w, keys)?;
        }
        self.base.notify().write(w, keys)?;

        write_u32(w, self.base.receivers().len() as u32)?;
        for receiver in self.base.receivers() {
            keys.write_key(w, Some(*receiver))?;
        }

        let attached: Vec<&Conditional> = self.conditions.iter().flatten().collect();
        write_u32(w, attached.len() as u32)?;
        for cond in attached {
            cond.write(w, keys)?;
        }

        write_u32(w, self.cursor as u32)?;
        Ok(())
    }

    /// Read the authored state back. Conditionals re-attach in order, which
    /// re-derives the local-element flag.
    pub fn read(r: &mut dyn Read, keys: &mut dyn KeyContext) -> WireResult<Self> {
        let key = keys.read_key(r)?.unwrap_or(ObjectKey::new(0));
        let mut modifier = Self::new(key);

        let bits = read_u32(r)?;
        let flags = super::LogicFlags::from_bits_truncate(bits);
        for flag in flags.iter() {
            modifier.base.set_flag(flag);
        }
        modifier.base.set_disabled(read_bool(r)?);
        modifier.base.set_counter_limit(read_i32(r)?);
        modifier.base.set_timer_seconds(read_f32(r)?);

        let command_count = crate::wire::check_len("command list", read_u32(r)?)?;
        for _ in 0..command_count {
            let command = Message::read_creatable(r, keys)?;
            modifier.base.add_command(command);
        }
        let notify = crate::events::NotifyMsg::read(r, keys)?;

        let receiver_count = crate::wire::check_len("receiver list", read_u32(r)?)?;
        for _ in 0..receiver_count {
            if let Some(receiver) = keys.read_key(r)? {
                modifier.base.add_receiver(receiver);
            }
        }
        // Installed after the receiver loop; add_receiver would double the
        // receivers into a pending message that already carries them.
        *modifier.base.notify_mut() = notify;

        let condition_count = crate::wire::check_len("condition list", read_u32(r)?)?;
        for index in 0..condition_count {
            let conditional = Conditional::read(r, keys)?;
            modifier.attach_condition(index, conditional);
        }

        modifier.cursor = match read_u32(r)? {
            1 => CursorHint::Open,
            _ => CursorHint::Inactive,
        };
        Ok(modifier)
    }
}
