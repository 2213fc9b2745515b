//! Volume-sensor and occupancy integration tests.
//!
//! The occupant-set invariants get a property-based workout here: the physics
//! layer is allowed to deliver duplicate enters and unmatched exits, and the
//! sensor must never corrupt its bookkeeping.

use proptest::prelude::*;

use scene_logic::{
    ActivatorKind, ActivatorMsg, Conditional, LogicCtx, LogicModifier, Message, NetEnv, ObjectKey,
    PlayerPageMsg, RecordingBus, VolumeSensorConditional, VolumeSensorType,
};

const SENSOR_OBJ: ObjectKey = ObjectKey(200);
const MODIFIER: ObjectKey = ObjectKey(10);

fn enter(who: u32) -> Message {
    Message::Activator(ActivatorMsg::new(
        ActivatorKind::VolumeEnter,
        Some(ObjectKey(who)),
        Some(SENSOR_OBJ),
    ))
}

fn exit(who: u32) -> Message {
    Message::Activator(ActivatorMsg::new(
        ActivatorKind::VolumeExit,
        Some(ObjectKey(who)),
        Some(SENSOR_OBJ),
    ))
}

fn sensor_modifier(sensor: VolumeSensorConditional) -> LogicModifier {
    let mut modifier = LogicModifier::new(MODIFIER);
    modifier.add_condition(Conditional::VolumeSensor(sensor));
    modifier
}

fn sensor_of(modifier: &LogicModifier) -> &VolumeSensorConditional {
    match modifier.conditions().next().unwrap() {
        Conditional::VolumeSensor(s) => s,
        other => panic!("unexpected conditional {:?}", other),
    }
}

/// An enter-type sensor triggers on entry and untriggers on exit, end to end.
#[test]
fn test_enter_sensor_drives_modifier() {
    let mut modifier = sensor_modifier(VolumeSensorConditional::new(VolumeSensorType::Enter, -1));
    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&enter(1), &mut ctx);
    assert!(modifier.base.triggered());

    modifier.msg_receive(&exit(1), &mut ctx);
    assert!(!modifier.base.triggered());

    drop(ctx);
    let notifies = bus.notifies();
    assert_eq!(notifies.len(), 2);
    assert_eq!(notifies[0].state, 1.0);
    assert_eq!(notifies[1].state, 0.0);
    // The trigger notification carries the collision record of who entered.
    assert!(notifies[0]
        .events
        .iter()
        .any(|e| matches!(e, scene_logic::EventData::Collision { enter: true, .. })));
}

/// The no-arbitration sensor fires the modifier without any lock traffic.
#[test]
fn test_no_arbitration_sensor_bypasses_server() {
    let mut sensor = VolumeSensorConditional::new(VolumeSensorType::Enter, -1);
    sensor.no_arbitration = true;
    let mut modifier = sensor_modifier(sensor);

    let mut bus = RecordingBus::new();
    let env = NetEnv::default(); // networked session

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&enter(1), &mut ctx);

    drop(ctx);
    assert!(modifier.base.triggered());
    assert_eq!(bus.lock_requests(), 0);
    assert_eq!(bus.notifies().len(), 1);
}

/// The arbitrated sensor goes through the lock like everything else.
#[test]
fn test_arbitrated_sensor_requests_lock() {
    let mut modifier = sensor_modifier(VolumeSensorConditional::new(VolumeSensorType::Enter, -1));
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&enter(1), &mut ctx);

    drop(ctx);
    assert!(modifier.base.requesting());
    assert_eq!(bus.lock_requests(), 1);
    assert!(bus.notifies().is_empty());
}

/// A player unloading while inside a no-arbitration sensor is cleaned up as
/// if they had exited.
#[test]
fn test_page_out_forces_exit() {
    let mut sensor = VolumeSensorConditional::new(VolumeSensorType::Exit, -1);
    sensor.no_arbitration = true;
    let mut modifier = sensor_modifier(sensor);

    let mut bus = RecordingBus::new();
    let env = NetEnv {
        local_triggers: true,
        ..NetEnv::default()
    };

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&enter(1), &mut ctx);
    assert_eq!(sensor_of(&modifier).occupants().len(), 1);

    modifier.msg_receive(
        &Message::PlayerPage(PlayerPageMsg {
            player: ObjectKey(1),
            unload: true,
        }),
        &mut ctx,
    );

    drop(ctx);
    assert!(sensor_of(&modifier).occupants().is_empty());
    assert!(modifier.base.triggered());
}

/// Page-outs are ignored by arbitrated sensors (the detector layer owns
/// their exits).
#[test]
fn test_page_out_ignored_with_arbitration() {
    let mut modifier = sensor_modifier(VolumeSensorConditional::new(VolumeSensorType::Exit, -1));
    let mut bus = RecordingBus::new();
    let env = NetEnv::default();

    let mut ctx = LogicCtx::new(&mut bus, &env);
    modifier.msg_receive(&enter(1), &mut ctx);
    let handled = modifier.msg_receive(
        &Message::PlayerPage(PlayerPageMsg {
            player: ObjectKey(1),
            unload: true,
        }),
        &mut ctx,
    );

    assert!(!handled);
    assert_eq!(sensor_of(&modifier).occupants().len(), 1);
}

proptest! {
    /// With `ignore_extra_enters`, arbitrary enter/exit interleavings over a
    /// small occupant universe never produce duplicate occupants, and an exit
    /// immediately following its matching enter always removes the occupant.
    #[test]
    fn occupants_never_duplicated(script in proptest::collection::vec((0u32..4, any::<bool>()), 0..64)) {
        let mut sensor = VolumeSensorConditional::new(VolumeSensorType::Enter, -1);
        sensor.ignore_extra_enters = true;

        let mut owner_mod = sensor_modifier(sensor);
        let mut bus = RecordingBus::new();
        let env = NetEnv { local_triggers: true, ..NetEnv::default() };
        let mut ctx = LogicCtx::new(&mut bus, &env);

        for (who, entering) in script {
            let msg = if entering { enter(who) } else { exit(who) };
            owner_mod.msg_receive(&msg, &mut ctx);

            let occupants = sensor_of(&owner_mod).occupants();
            let mut seen = std::collections::HashSet::new();
            for key in occupants {
                prop_assert!(seen.insert(*key), "duplicate occupant {:?}", key);
            }

            if entering {
                // Matching exit right away removes the occupant.
                owner_mod.msg_receive(&exit(who), &mut ctx);
                prop_assert!(!sensor_of(&owner_mod).occupants().contains(&ObjectKey(who)));
            }
        }
    }

    /// The threshold mode is a pure function of the occupant count.
    #[test]
    fn threshold_satisfaction_tracks_count(count in 0usize..6) {
        let sensor = VolumeSensorConditional::new(VolumeSensorType::Enter, 2);
        let mut owner_mod = LogicModifier::new(MODIFIER);
        let mut bus = RecordingBus::new();
        let env = NetEnv { local_triggers: true, ..NetEnv::default() };
        let mut ctx = LogicCtx::new(&mut bus, &env);

        owner_mod.add_condition(Conditional::VolumeSensor(sensor));
        for who in 0..count {
            owner_mod.msg_receive(&enter(who as u32), &mut ctx);
        }

        let satisfied_now = match owner_mod.conditions().next().unwrap() {
            Conditional::VolumeSensor(s) => s.clone().satisfied(),
            _ => unreachable!(),
        };
        prop_assert_eq!(satisfied_now, count == 2);
    }
}
