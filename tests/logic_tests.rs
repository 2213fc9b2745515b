//! Logic-modifier state machine integration tests.
//!
//! These drive a modifier end-to-end through the public message interface:
//! detector events in, arbitration traffic and notifications out.

use scene_logic::{
    ActivatorConditional, ActivatorKind, ActivatorMsg, Conditional, EnableMsg, EventData, LogicCtx,
    LogicFlags, LogicModifier, Message, NetEnv, ObjectInBoxConditional, ObjectKey, RecordingBus,
    ServerReplyKind, ServerReplyMsg, TimerCallbackMsg, VolActivatorConditional,
};

const MODIFIER: ObjectKey = ObjectKey(10);
const DETECTOR: ObjectKey = ObjectKey(20);
const RESPONDER: ObjectKey = ObjectKey(30);
const AVATAR: ObjectKey = ObjectKey(40);

fn clickable_modifier() -> LogicModifier {
    let mut modifier = LogicModifier::new(MODIFIER);
    modifier.base.add_receiver(RESPONDER);
    modifier.add_condition(Conditional::Activator(ActivatorConditional::new([
        DETECTOR,
    ])));
    modifier
}

fn pick(kind: ActivatorKind) -> Message {
    Message::Activator(ActivatorMsg::new(kind, Some(AVATAR), Some(DETECTOR)))
}

fn affirm() -> Message {
    Message::ServerReply(ServerReplyMsg {
        kind: ServerReplyKind::Affirm,
    })
}

fn deny() -> Message {
    Message::ServerReply(ServerReplyMsg {
        kind: ServerReplyKind::Deny,
    })
}

/// The full arbitrated path: pick → lock request → affirm → notify + unlock.
#[test]
fn test_arbitrated_trigger_round_trip() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        assert!(modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx));
    }
    assert!(modifier.base.requesting());
    assert!(!modifier.base.triggered());
    assert_eq!(bus.lock_requests(), 1);
    assert!(bus.notifies().is_empty());

    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        assert!(modifier.msg_receive(&affirm(), &mut ctx));
    }
    assert!(modifier.base.triggered());
    assert!(!modifier.base.requesting());

    let notifies = bus.notifies();
    assert_eq!(notifies.len(), 1);
    let notify = notifies[0];
    assert_eq!(notify.sender, Some(MODIFIER));
    assert_eq!(notify.receivers.as_slice(), &[RESPONDER]);
    assert_eq!(notify.state, 1.0);
    assert!(matches!(
        notify.events.as_slice(),
        [EventData::Activate { activate: true, .. }]
    ));

    // Lock taken, then released after the commit.
    let locks: Vec<bool> = bus
        .sent
        .iter()
        .filter_map(|m| match m {
            Message::TestAndSet(t) => Some(t.lock_request),
            _ => None,
        })
        .collect();
    assert_eq!(locks, [true, false]);
}

/// A deny stands the modifier down without touching condition state.
#[test]
fn test_deny_recovers_quietly() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
        modifier.msg_receive(&deny(), &mut ctx);
    }

    assert!(!modifier.base.requesting());
    assert!(!modifier.base.triggered());
    assert!(bus.notifies().is_empty());
    // The conditional's satisfied state survives for the next attempt.
    let cond = modifier.conditions().next().unwrap();
    assert!(cond.core().satisfied);
}

/// While a request is in flight, further picks send nothing.
#[test]
fn test_request_trigger_idempotent() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);

    drop(ctx);
    assert_eq!(bus.lock_requests(), 1);
}

/// Trigger then untrigger restores the idle state and resets conditions.
#[test]
fn test_trigger_untrigger_symmetry() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    assert!(modifier.base.triggered());

    // Untrigger while triggered fires a state-0 notification.
    modifier.msg_receive(&pick(ActivatorKind::UnPickedTrigger), &mut ctx);
    assert!(!modifier.base.triggered());

    drop(ctx);
    let notifies = bus.notifies();
    assert_eq!(notifies.len(), 2);
    assert_eq!(notifies[1].state, 0.0);
    assert!(matches!(
        notifies[1].events.as_slice(),
        [EventData::Activate {
            activate: false,
            ..
        }]
    ));
    let cond = modifier.conditions().next().unwrap();
    assert!(!cond.core().satisfied);
}

/// Untrigger when idle is a complete no-op.
#[test]
fn test_untrigger_noop_when_idle() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::UnPickedTrigger), &mut ctx);

    drop(ctx);
    assert!(bus.sent.is_empty());
}

/// Local-triggers sessions skip arbitration entirely.
#[test]
fn test_local_session_skips_arbitration() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);

    drop(ctx);
    assert!(modifier.base.triggered());
    assert_eq!(bus.lock_requests(), 0);
    assert_eq!(bus.notifies().len(), 1);
}

/// OneShot permanently disables after the first successful fire.
#[test]
fn test_one_shot_fires_once() {
    let mut modifier = clickable_modifier();
    modifier.base.set_flag(LogicFlags::ONE_SHOT);
    modifier.base.set_flag(LogicFlags::MULTI_TRIGGER);
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    assert!(modifier.base.disabled());

    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);

    drop(ctx);
    assert_eq!(bus.notifies().len(), 1);
}

/// MultiTrigger fires repeatedly without an intervening untrigger.
#[test]
fn test_multi_trigger_repeats() {
    let mut modifier = clickable_modifier();
    modifier.base.set_flag(LogicFlags::MULTI_TRIGGER);
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    for _ in 0..3 {
        modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    }

    drop(ctx);
    assert!(!modifier.base.triggered());
    assert_eq!(bus.notifies().len(), 3);
}

/// N-of-M: with a counter limit of 3, only every third attempt fires.
#[test]
fn test_counter_gates_firing() {
    let mut modifier = clickable_modifier();
    modifier.base.set_flag(LogicFlags::MULTI_TRIGGER);
    modifier.base.set_counter_limit(3);
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    for _ in 0..6 {
        modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    }

    drop(ctx);
    assert_eq!(bus.notifies().len(), 2);
}

/// A configured delay defers the fire to a timer callback.
#[test]
fn test_timer_defers_firing() {
    let mut modifier = clickable_modifier();
    modifier.base.set_timer_seconds(2.5);
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    }
    assert!(!modifier.base.triggered());
    assert!(bus.notifies().is_empty());
    let timers = bus
        .sent
        .iter()
        .filter(|m| matches!(m, Message::SetTimer(t) if t.seconds == 2.5))
        .count();
    assert_eq!(timers, 1);

    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        modifier.msg_receive(
            &Message::TimerCallback(TimerCallbackMsg { id: 0, time: 2.5 }),
            &mut ctx,
        );
    }
    assert!(modifier.base.triggered());
    assert_eq!(bus.notifies().len(), 1);
}

/// Enable clears in-flight state; disable blocks triggering.
#[test]
fn test_enable_disable() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);
    assert!(modifier.base.requesting());

    modifier.msg_receive(&Message::Enable(EnableMsg { enable: true }), &mut ctx);
    assert!(!modifier.base.requesting());
    assert!(!modifier.base.triggered());

    modifier.msg_receive(&Message::Enable(EnableMsg { enable: false }), &mut ctx);
    assert!(modifier.base.disabled());
}

/// Collision-type activator events from remote avatars are dropped.
#[test]
fn test_remote_collision_filtered() {
    let mut modifier = clickable_modifier();
    let mut bus = RecordingBus::new();
    let mut env = NetEnv::default();
    env.avatars.insert(AVATAR); // remote: not local player, not owned

    let mut ctx = LogicCtx::new(&mut bus, &env);
    let handled = modifier.msg_receive(&pick(ActivatorKind::CollideEnter), &mut ctx);

    drop(ctx);
    assert!(handled);
    assert_eq!(bus.lock_requests(), 0);
    let cond = modifier.conditions().next().unwrap();
    assert!(!cond.core().satisfied);
}

/// verify_conditions is a short-circuiting AND over the condition list.
///
/// The second conditional records who verified against it; after a failure in
/// the first, it must never have been consulted.
#[test]
fn test_verify_conditions_short_circuits() {
    let mut modifier = LogicModifier::new(MODIFIER);

    // First region is empty (verify fails); second contains the avatar.
    let failing = ObjectInBoxConditional::new();
    let mut passing = ObjectInBoxConditional::new();
    passing.occupants.push(AVATAR);

    modifier.add_condition(Conditional::ObjectInBox(failing));
    modifier.add_condition(Conditional::ObjectInBox(passing));

    let mut bus = RecordingBus::new();
    let env = NetEnv::default();
    let mut ctx = LogicCtx::new(&mut bus, &env);

    let msg = Message::Activator(ActivatorMsg::new(
        ActivatorKind::VolumeEnter,
        Some(AVATAR),
        Some(DETECTOR),
    ));
    assert!(!modifier.verify_conditions(&msg, &mut ctx));

    // Short-circuit: the passing region was never consulted, so it never
    // recorded a current-trigger occupant.
    let conditionals: Vec<_> = modifier.conditions().collect();
    match conditionals[1] {
        Conditional::ObjectInBox(c) => assert_eq!(c.current_trigger, None),
        other => panic!("unexpected conditional {:?}", other),
    }

    // And with both passing, the AND holds.
    let mut all_pass = LogicModifier::new(MODIFIER);
    let mut first = ObjectInBoxConditional::new();
    first.occupants.push(AVATAR);
    let mut second = ObjectInBoxConditional::new();
    second.occupants.push(AVATAR);
    all_pass.add_condition(Conditional::ObjectInBox(first));
    all_pass.add_condition(Conditional::ObjectInBox(second));
    assert!(all_pass.verify_conditions(&msg, &mut ctx));
}

/// The vol-activator conditional runs its loop once per configured activator
/// with no source check: with none configured nothing happens, and with three
/// configured a single event still produces exactly one lock request (the
/// requesting guard absorbs the duplicates).
#[test]
fn test_vol_activator_loop_is_per_configured_activator() {
    let env = NetEnv::default();

    // Zero activators: the message is not even handled.
    let mut empty = LogicModifier::new(MODIFIER);
    empty.add_condition(Conditional::VolActivator(VolActivatorConditional::new([])));
    let mut bus = RecordingBus::new();
    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        let handled = empty.msg_receive(
            &Message::Activator(ActivatorMsg::new(
                ActivatorKind::VolumeEnter,
                Some(AVATAR),
                Some(DETECTOR),
            )),
            &mut ctx,
        );
        assert!(!handled);
    }
    assert!(bus.sent.is_empty());

    // Three activators, none matching the sender: three trigger requests,
    // one lock on the wire.
    let mut configured = LogicModifier::new(MODIFIER);
    configured.add_condition(Conditional::VolActivator(VolActivatorConditional::new([
        ObjectKey(1),
        ObjectKey(2),
        ObjectKey(3),
    ])));
    let mut bus = RecordingBus::new();
    {
        let mut ctx = LogicCtx::new(&mut bus, &env);
        let handled = configured.msg_receive(
            &Message::Activator(ActivatorMsg::new(
                ActivatorKind::VolumeEnter,
                Some(AVATAR),
                Some(ObjectKey(999)),
            )),
            &mut ctx,
        );
        assert!(handled);
    }
    assert_eq!(bus.lock_requests(), 1);
    assert!(configured.base.requesting());
}

/// Sparse attach indices grow the list; duplicate indices replace.
#[test]
fn test_condition_attach_by_index() {
    use scene_logic::AttachConditionMsg;

    let mut modifier = LogicModifier::new(MODIFIER);
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();
    let mut ctx = LogicCtx::new(&mut bus, &env);

    let attach = |index: usize, detector: u32| {
        Message::AttachCondition(AttachConditionMsg {
            index,
            conditional: Conditional::Activator(ActivatorConditional::new([ObjectKey(detector)])),
        })
    };

    modifier.msg_receive(&attach(2, 100), &mut ctx);
    assert_eq!(modifier.condition_count(), 1);

    modifier.msg_receive(&attach(0, 200), &mut ctx);
    assert_eq!(modifier.condition_count(), 2);

    // Replacing slot 2.
    modifier.msg_receive(&attach(2, 300), &mut ctx);
    assert_eq!(modifier.condition_count(), 2);

    let conditionals: Vec<_> = modifier.conditions().collect();
    match conditionals[1] {
        Conditional::Activator(c) => assert_eq!(c.activators.as_slice(), &[ObjectKey(300)]),
        other => panic!("unexpected conditional {:?}", other),
    }
    // Every attached conditional knows its owner.
    for cond in modifier.conditions() {
        assert_eq!(cond.core().owner, Some(MODIFIER));
    }
}

/// The probe path flips the cursor hint and consumes the message.
#[test]
fn test_fakeout_probe_sets_cursor() {
    use scene_logic::{CursorHint, FakeOutMsg};

    let mut modifier = LogicModifier::new(MODIFIER);
    let mut region = ObjectInBoxConditional::new();
    region.occupants.push(AVATAR);
    modifier.add_condition(Conditional::ObjectInBox(region));

    let mut bus = RecordingBus::new();
    let mut env = NetEnv::default();
    env.local_player = Some(AVATAR);

    let mut ctx = LogicCtx::new(&mut bus, &env);
    assert!(modifier.msg_receive(&Message::FakeOut(FakeOutMsg), &mut ctx));
    assert_eq!(modifier.cursor(), CursorHint::Open);

    // Empty the region; the probe goes cold.
    let mut cold = LogicModifier::new(MODIFIER);
    cold.add_condition(Conditional::ObjectInBox(ObjectInBoxConditional::new()));
    assert!(cold.msg_receive(&Message::FakeOut(FakeOutMsg), &mut ctx));
    assert_eq!(cold.cursor(), CursorHint::Inactive);
}

/// Command-list messages ride out with every trigger.
#[test]
fn test_commands_fire_with_trigger() {
    let mut modifier = clickable_modifier();
    modifier
        .base
        .add_command(Message::Enable(EnableMsg { enable: false }));

    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&pick(ActivatorKind::PickedTrigger), &mut ctx);

    drop(ctx);
    assert!(bus
        .sent
        .iter()
        .any(|m| matches!(m, Message::Enable(e) if !e.enable)));
    assert_eq!(bus.notifies().len(), 1);
}
