//! Wire-format integration tests: arbitration blobs, polymorphic message
//! persistence, and full modifier round trips.

use scene_logic::{
    ActivatorConditional, ActivatorKind, ActivatorMsg, Conditional, ControlKeyConditional,
    EnableMsg, FacingConditional, GenericValue, LogicFlags, LogicModifier, Message, ObjectKey,
    OrConditional, PickedConditional, RawKeys, SharedState, TestAndSetMsg, VolumeSensorConditional,
    VolumeSensorType, WireError, TRIGGER_STATE_NAME, TRIGGER_VAR_NAME,
};

/// The arbitration blob is exactly "TrigState"/"Triggered" with the lock
/// phase deciding the boolean.
#[test]
fn test_trigger_lock_blob_shape() {
    let lock = TestAndSetMsg::lock_trigger(ObjectKey(5));
    assert!(lock.lock_request);
    assert_eq!(lock.state.name, TRIGGER_STATE_NAME);
    assert_eq!(lock.state.vars.len(), 1);
    assert_eq!(lock.state.vars[0].name, TRIGGER_VAR_NAME);
    assert_eq!(lock.state.vars[0].value, GenericValue::Bool(true));

    let unlock = TestAndSetMsg::unlock_trigger(ObjectKey(5));
    assert!(!unlock.lock_request);
    assert_eq!(unlock.state.vars[0].value, GenericValue::Bool(false));
}

/// Shared-state blobs round trip with mixed variable types.
#[test]
fn test_shared_state_round_trip() {
    let mut state = SharedState::named("GateState");
    state.server_may_delete = true;
    state.vars.push(scene_logic::GenericVar::boolean("Open", true));
    state.vars.push(scene_logic::GenericVar {
        name: "Count".into(),
        value: GenericValue::Int(3),
    });
    state.vars.push(scene_logic::GenericVar {
        name: "Owner".into(),
        value: GenericValue::Str("kadish".into()),
    });

    let mut buf = Vec::new();
    state.write(&mut buf).unwrap();
    assert_eq!(SharedState::read(&mut buf.as_slice()).unwrap(), state);
}

/// Every message class survives the polymorphic creatable path.
#[test]
fn test_message_creatable_round_trips() {
    use scene_logic::{
        AttachConditionMsg, ControlEventMsg, FakeOutMsg, NotifyMsg, PickedMsg, PlayerPageMsg,
        ServerReplyKind, ServerReplyMsg, SetTimerMsg, TimerCallbackMsg,
    };

    let mut notify = NotifyMsg::from_to(ObjectKey(1), ObjectKey(2));
    notify.add_activate_event(true);

    let messages = vec![
        Message::Notify(notify),
        Message::Activator(ActivatorMsg::new(
            ActivatorKind::CollideEnter,
            Some(ObjectKey(3)),
            Some(ObjectKey(4)),
        )),
        Message::Picked(PickedMsg {
            picker: Some(ObjectKey(5)),
            picked: Some(ObjectKey(6)),
            is_picked: true,
            hit_point: [1.0, 0.0, -1.0],
        }),
        Message::ControlEvent(ControlEventMsg {
            control_code: 9,
            down: true,
        }),
        Message::Enable(EnableMsg { enable: false }),
        Message::ServerReply(ServerReplyMsg {
            kind: ServerReplyKind::Affirm,
        }),
        Message::TestAndSet(TestAndSetMsg::lock_trigger(ObjectKey(7))),
        Message::SetTimer(SetTimerMsg {
            id: 1,
            seconds: 0.5,
            receiver: ObjectKey(8),
        }),
        Message::TimerCallback(TimerCallbackMsg { id: 1, time: 12.0 }),
        Message::FakeOut(FakeOutMsg),
        Message::PlayerPage(PlayerPageMsg {
            player: ObjectKey(9),
            unload: true,
        }),
        Message::AttachCondition(AttachConditionMsg {
            index: 2,
            conditional: Conditional::Picked(PickedConditional::new()),
        }),
    ];

    for msg in messages {
        let mut buf = Vec::new();
        msg.write_creatable(&mut buf, &mut RawKeys).unwrap();
        let decoded = Message::read_creatable(&mut buf.as_slice(), &mut RawKeys).unwrap();
        assert_eq!(decoded, msg);
    }
}

/// Every conditional class survives the polymorphic path, including a nested
/// OR combinator.
#[test]
fn test_conditional_round_trips() {
    let mut sensor = VolumeSensorConditional::new(VolumeSensorType::Exit, 2);
    sensor.first = true;
    sensor.no_arbitration = true;

    let conditionals = vec![
        Conditional::Activator(ActivatorConditional::new([ObjectKey(1), ObjectKey(2)])),
        Conditional::Facing(FacingConditional::new(0.98, true)),
        Conditional::VolumeSensor(sensor),
        Conditional::ControlKey(ControlKeyConditional::new(42)),
        Conditional::Or(OrConditional::new([
            Conditional::Picked(PickedConditional::new()),
            Conditional::ControlKey(ControlKeyConditional::new(7)),
        ])),
    ];

    for cond in conditionals {
        let mut buf = Vec::new();
        cond.write(&mut buf, &mut RawKeys).unwrap();
        let decoded = Conditional::read(&mut buf.as_slice(), &mut RawKeys).unwrap();
        assert_eq!(decoded, cond);

        // Authoring path too.
        let json = serde_json::to_string(&cond).unwrap();
        let from_json: Conditional = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json, cond);
    }
}

/// A configured modifier round trips: flags, commands, receivers, and
/// conditions all survive, and conditions re-attach to the owner.
#[test]
fn test_modifier_persistence() {
    let mut modifier = LogicModifier::new(ObjectKey(10));
    modifier.base.set_flag(LogicFlags::ONE_SHOT);
    modifier.base.set_counter_limit(2);
    modifier.base.set_timer_seconds(1.5);
    modifier.base.add_receiver(ObjectKey(30));
    modifier.base.add_receiver(ObjectKey(31));
    modifier
        .base
        .add_command(Message::Enable(EnableMsg { enable: false }));
    modifier.add_condition(Conditional::Activator(ActivatorConditional::new([
        ObjectKey(20),
    ])));
    modifier.add_condition(Conditional::Facing(FacingConditional::new(0.9, false)));

    let mut buf = Vec::new();
    modifier.write(&mut buf, &mut RawKeys).unwrap();
    let decoded = LogicModifier::read(&mut buf.as_slice(), &mut RawKeys).unwrap();

    assert_eq!(decoded.key(), ObjectKey(10));
    assert!(decoded.base.has_flag(LogicFlags::ONE_SHOT));
    assert_eq!(decoded.base.counter_limit(), 2);
    assert_eq!(decoded.base.timer_seconds(), 1.5);
    assert_eq!(decoded.base.receivers(), &[ObjectKey(30), ObjectKey(31)]);
    // The pending notify keeps its own receiver set, not a doubled one.
    assert_eq!(
        decoded.base.notify().receivers.as_slice(),
        &[ObjectKey(30), ObjectKey(31)]
    );
    assert_eq!(decoded.base.commands().len(), 1);
    assert_eq!(decoded.condition_count(), 2);
    for cond in decoded.conditions() {
        assert_eq!(cond.core().owner, Some(ObjectKey(10)));
    }
}

/// Corrupt class tags surface as typed errors, not panics.
#[test]
fn test_bad_class_tags_error() {
    let buf = [0xFFu8, 0xFF];
    assert!(matches!(
        Message::read_creatable(&mut buf.as_slice(), &mut RawKeys),
        Err(WireError::BadTag { .. })
    ));
    assert!(matches!(
        Conditional::read(&mut buf.as_slice(), &mut RawKeys),
        Err(WireError::Io(_) | WireError::BadTag { .. })
    ));
}

/// Truncated streams surface as I/O errors.
#[test]
fn test_truncated_stream_errors() {
    let mut modifier = LogicModifier::new(ObjectKey(1));
    modifier.add_condition(Conditional::Picked(PickedConditional::new()));

    let mut buf = Vec::new();
    modifier.write(&mut buf, &mut RawKeys).unwrap();
    buf.truncate(buf.len() / 2);

    assert!(LogicModifier::read(&mut buf.as_slice(), &mut RawKeys).is_err());
}

/// Hostile length prefixes are rejected before allocation.
#[test]
fn test_hostile_length_rejected() {
    use scene_logic::wire::{write_u32, MAX_WIRE_LEN};
    use scene_logic::NotifyMsg;

    let mut buf = Vec::new();
    // Header: no sender, huge receiver count.
    scene_logic::wire::write_bool(&mut buf, false).unwrap();
    write_u32(&mut buf, MAX_WIRE_LEN + 1).unwrap();

    assert!(matches!(
        NotifyMsg::read(&mut buf.as_slice(), &mut RawKeys),
        Err(WireError::BadLength { .. })
    ));
}
