//! The generic trigger state machine.
//!
//! A [`LogicModBase`] moves between three states: idle, requesting (an
//! arbitration round-trip is in flight), and triggered. The requesting state
//! exists because every replica of a scene sees the same physics events; the
//! server's test-and-set lock decides which replica's trigger request wins,
//! and everyone else stands down on a deny.
//!
//! The base owns the pending [`NotifyMsg`] and the command list; condition
//! gating lives in [`LogicModifier`](super::LogicModifier).

use bitflags::bitflags;
use log::{debug, warn};
use smallvec::SmallVec;

use crate::events::{bcast, NotifyMsg};
use crate::messages::{Message, ServerReplyKind, SetTimerMsg};
use crate::net::TestAndSetMsg;
use crate::core::ObjectKey;

use super::LogicCtx;

bitflags! {
    /// State and behavior bits of a logic modifier.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LogicFlags: u32 {
        /// Depends only on client-local input; exempt from arbitration and
        /// from net propagation of its notifications.
        const LOCAL_ELEMENT = 1 << 0;
        /// Reset requested (authoring hint).
        const RESET = 1 << 1;
        /// Currently triggered.
        const TRIGGERED = 1 << 2;
        /// Permanently disables itself after its first successful trigger.
        const ONE_SHOT = 1 << 3;
        /// An arbitration request is in flight.
        const REQUESTING_TRIGGER = 1 << 4;
        /// Authored as an activator-style trigger.
        const TYPE_ACTIVATOR = 1 << 5;
        /// May fire repeatedly without the triggered flag blocking it.
        const MULTI_TRIGGER = 1 << 6;
    }
}

/// What `begin_trigger_request` decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Already triggered or already requesting; nothing happened.
    Ignored,
    /// A lock request went to the server; awaiting the reply.
    Requested,
    /// No arbitration needed; the caller should proceed to `pre_trigger`.
    Local,
}

/// What a server reply resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Denied (or stray); pending-request state cleared, nothing to do.
    Ignored,
    /// Lock granted; the caller must commit the trigger and release the lock.
    Confirmed,
}

/// Shared trigger state machine under every logic modifier.
#[derive(Clone, Debug)]
pub struct LogicModBase {
    key: ObjectKey,
    flags: LogicFlags,
    disabled: bool,

    /// Follow-on messages fired at trigger time. Opaque to the machine.
    commands: Vec<Message>,

    receivers: SmallVec<[ObjectKey; 4]>,

    /// The pending notification. Events accumulate here between triggers.
    notify: NotifyMsg,

    /// N-of-M triggering: fire only every `counter_limit`-th attempt.
    /// Zero or negative disables counting.
    counter: i32,
    counter_limit: i32,

    /// Deferred-fire delay in seconds. Zero disables the timer.
    timer_seconds: f32,
}

impl LogicModBase {
    /// New machine identified by `key`, idle and enabled.
    #[must_use]
    pub fn new(key: ObjectKey) -> Self {
        Self {
            key,
            flags: LogicFlags::empty(),
            disabled: false,
            commands: Vec::new(),
            receivers: SmallVec::new(),
            notify: NotifyMsg::new(),
            counter: 0,
            counter_limit: 0,
            timer_seconds: 0.0,
        }
    }

    /// This modifier's identity.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    /// Test a flag.
    #[must_use]
    pub fn has_flag(&self, flag: LogicFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Set a flag.
    pub fn set_flag(&mut self, flag: LogicFlags) {
        self.flags.insert(flag);
    }

    /// Clear a flag.
    pub fn clear_flag(&mut self, flag: LogicFlags) {
        self.flags.remove(flag);
    }

    /// All flag bits.
    #[must_use]
    pub fn flags(&self) -> LogicFlags {
        self.flags
    }

    /// Currently triggered?
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.has_flag(LogicFlags::TRIGGERED)
    }

    /// Arbitration round-trip in flight?
    #[must_use]
    pub fn requesting(&self) -> bool {
        self.has_flag(LogicFlags::REQUESTING_TRIGGER)
    }

    /// Disabled modifiers ignore every trigger attempt.
    #[must_use]
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Enable or disable directly (authoring/load path).
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Configure N-of-M triggering. Zero or negative disables it.
    pub fn set_counter_limit(&mut self, limit: i32) {
        self.counter_limit = limit;
    }

    /// Current repeat-counter value.
    #[must_use]
    pub fn counter(&self) -> i32 {
        self.counter
    }

    /// Configured repeat limit.
    #[must_use]
    pub fn counter_limit(&self) -> i32 {
        self.counter_limit
    }

    /// Configure the deferred-fire delay. Zero disables it.
    pub fn set_timer_seconds(&mut self, seconds: f32) {
        self.timer_seconds = seconds;
    }

    /// Configured deferred-fire delay.
    #[must_use]
    pub fn timer_seconds(&self) -> f32 {
        self.timer_seconds
    }

    /// Register a receiver for every notification this modifier sends.
    pub fn add_receiver(&mut self, receiver: ObjectKey) {
        self.receivers.push(receiver);
        self.notify.add_receiver(receiver);
    }

    /// Registered receivers.
    #[must_use]
    pub fn receivers(&self) -> &[ObjectKey] {
        &self.receivers
    }

    /// Append a command message fired at every trigger.
    pub fn add_command(&mut self, command: Message) {
        self.commands.push(command);
    }

    /// The command list.
    #[must_use]
    pub fn commands(&self) -> &[Message] {
        &self.commands
    }

    /// The pending notification, for event accumulation.
    pub fn notify_mut(&mut self) -> &mut NotifyMsg {
        &mut self.notify
    }

    /// Read access to the pending notification.
    #[must_use]
    pub fn notify(&self) -> &NotifyMsg {
        &self.notify
    }

    // === Arbitration ===

    /// Start a trigger attempt.
    ///
    /// Idempotent: while triggered or requesting, further attempts do nothing
    /// and send nothing. In a local-triggers session, or when this modifier is
    /// a local element, no arbitration is needed and the caller proceeds
    /// directly; otherwise a test-and-set lock request goes to the server and
    /// the machine waits for the reply.
    pub fn begin_trigger_request(&mut self, ctx: &mut LogicCtx) -> RequestOutcome {
        if self.triggered() || self.requesting() {
            return RequestOutcome::Ignored;
        }
        if ctx.env.local_triggers || self.has_flag(LogicFlags::LOCAL_ELEMENT) {
            return RequestOutcome::Local;
        }
        ctx.bus
            .send(Message::TestAndSet(TestAndSetMsg::lock_trigger(self.key)));
        self.set_flag(LogicFlags::REQUESTING_TRIGGER);
        RequestOutcome::Requested
    }

    /// Process a server verdict.
    ///
    /// Deny clears the pending-request flag (a deny with no request in flight
    /// is logged; it indicates a protocol bug elsewhere). Affirm tells the
    /// caller to commit and then release the lock via [`send_unlock`].
    ///
    /// [`send_unlock`]: Self::send_unlock
    pub fn resolve_reply(&mut self, kind: ServerReplyKind) -> ReplyOutcome {
        match kind {
            ServerReplyKind::Deny => {
                if self.requesting() {
                    debug!("logic {}: trigger denied by server", self.key);
                    self.clear_flag(LogicFlags::REQUESTING_TRIGGER);
                } else {
                    warn!("logic {}: deny reply while not requesting", self.key);
                }
                ReplyOutcome::Ignored
            }
            ServerReplyKind::Affirm => ReplyOutcome::Confirmed,
        }
    }

    /// Release the arbitration lock after a confirmed trigger is committed.
    pub fn send_unlock(&mut self, ctx: &mut LogicCtx) {
        ctx.bus
            .send(Message::TestAndSet(TestAndSetMsg::unlock_trigger(self.key)));
    }

    // === Firing ===

    /// Disabled gate, then fire.
    pub fn pre_trigger(&mut self, net_request: bool, ctx: &mut LogicCtx) {
        if self.disabled {
            return;
        }
        self.trigger(net_request, ctx);
    }

    /// Commit a trigger: flip state, stamp and dispatch the pending
    /// notification plus the command list, and arm a fresh pending message.
    ///
    /// `net_request` marks a trigger replayed from the network; its
    /// notification is not propagated back out.
    pub fn trigger(&mut self, net_request: bool, ctx: &mut LogicCtx) {
        // Whatever the case, we're not requesting anymore.
        self.clear_flag(LogicFlags::REQUESTING_TRIGGER);
        if !self.has_flag(LogicFlags::MULTI_TRIGGER) {
            self.set_flag(LogicFlags::TRIGGERED);
        }

        self.notify.sender = Some(self.key);
        self.notify.state = 1.0;
        self.notify.add_activate_event(true);
        self.stamp_bcast(net_request);

        for command in self.commands.clone() {
            ctx.bus.send(command);
        }
        let outgoing = self.take_pending();
        ctx.bus.send(Message::Notify(outgoing));

        if self.has_flag(LogicFlags::ONE_SHOT) {
            self.disabled = true;
        }
    }

    /// Commit an untrigger. No-op while not triggered.
    pub fn untrigger(&mut self, ctx: &mut LogicCtx) {
        if !self.triggered() {
            return;
        }
        self.notify.sender = Some(self.key);
        self.notify.state = 0.0;
        self.notify.add_activate_event(false);
        self.stamp_bcast(false);

        let outgoing = self.take_pending();
        ctx.bus.send(Message::Notify(outgoing));

        self.reset(false);
    }

    /// Clear triggered state; optionally zero the repeat counter.
    pub fn reset(&mut self, counter_reset: bool) {
        self.clear_flag(LogicFlags::TRIGGERED);
        if counter_reset {
            self.counter = 0;
        }
    }

    /// N-of-M gate: bump the counter and report whether this attempt fires.
    ///
    /// Returns false (and resets triggered state) until the limit is reached;
    /// the counter wraps to zero on a fire. A limit of zero or less means
    /// every attempt fires.
    pub fn eval_counter(&mut self) -> bool {
        if self.counter_limit > 0 {
            self.counter += 1;
            if self.counter >= self.counter_limit {
                self.counter = 0;
            } else {
                self.reset(false);
                return false;
            }
        }
        true
    }

    /// Ask the timer service to call back after the configured delay.
    pub fn schedule_timer(&mut self, ctx: &mut LogicCtx) {
        ctx.bus.send(Message::SetTimer(SetTimerMsg {
            id: 0,
            seconds: self.timer_seconds,
            receiver: self.key,
        }));
    }

    /// Base message handling: enable/disable and server replies.
    ///
    /// Enabling also forcibly clears triggered and requesting state, so a
    /// modifier disabled mid-arbitration comes back clean.
    pub fn msg_receive(&mut self, msg: &Message, ctx: &mut LogicCtx) -> bool {
        match msg {
            Message::Enable(enable) => {
                if enable.enable {
                    self.disabled = false;
                    self.clear_flag(LogicFlags::TRIGGERED);
                    self.clear_flag(LogicFlags::REQUESTING_TRIGGER);
                } else {
                    self.disabled = true;
                }
                true
            }
            Message::ServerReply(reply) => {
                if self.resolve_reply(reply.kind) == ReplyOutcome::Confirmed {
                    self.pre_trigger(false, ctx);
                    self.send_unlock(ctx);
                }
                true
            }
            _ => false,
        }
    }

    fn stamp_bcast(&mut self, net_request: bool) {
        if self.has_flag(LogicFlags::LOCAL_ELEMENT) || net_request {
            self.notify.bcast_flags &= !bcast::NET_PROPAGATE;
        }
    }

    /// Hand the pending message off and arm a replacement carrying the same
    /// receiver set.
    fn take_pending(&mut self) -> NotifyMsg {
        let mut fresh = NotifyMsg::new();
        for receiver in &self.receivers {
            fresh.add_receiver(*receiver);
        }
        std::mem::replace(&mut self.notify, fresh)
    }
}
