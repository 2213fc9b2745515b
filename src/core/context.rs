//! Session environment for trigger evaluation.
//!
//! The original runtime reached into process globals for "is this a
//! single-player session", "who is the local player", and the avatar
//! validation switch. Those live here instead, as plain data handed to the
//! evaluation entry points.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::key::ObjectKey;

/// Policy knobs for volume-sensor evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSensorPolicy {
    /// Run the same-machine-authority check on Enter/Exit. When set, enter
    /// events from remote avatars that this client neither owns nor drives as
    /// AI are dropped before they touch the occupant set.
    pub validate_avatars: bool,
}

impl Default for VolumeSensorPolicy {
    fn default() -> Self {
        Self {
            validate_avatars: true,
        }
    }
}

/// What this client knows about the network session.
///
/// `local_triggers` marks a session with no arbitration authority (offline /
/// single-player): trigger requests skip the server round-trip entirely.
#[derive(Clone, Debug, Default)]
pub struct NetEnv {
    /// Skip server arbitration for every trigger request.
    pub local_triggers: bool,

    /// The local player's avatar, if one exists yet.
    pub local_player: Option<ObjectKey>,

    /// Keys known to be player avatars (local or remote).
    pub avatars: FxHashSet<ObjectKey>,

    /// Avatars this client has authority over.
    pub locally_owned: FxHashSet<ObjectKey>,

    /// Avatars driven by local AI rather than a remote peer.
    pub ai_controlled: FxHashSet<ObjectKey>,

    /// Volume-sensor evaluation policy.
    pub volume_policy: VolumeSensorPolicy,
}

impl NetEnv {
    /// Environment for an offline session: no arbitration, given local player.
    #[must_use]
    pub fn offline(local_player: ObjectKey) -> Self {
        let mut env = Self {
            local_triggers: true,
            local_player: Some(local_player),
            ..Self::default()
        };
        env.avatars.insert(local_player);
        env.locally_owned.insert(local_player);
        env
    }

    /// Is this key an avatar the local machine has no authority over?
    #[must_use]
    pub fn is_remote_avatar(&self, key: ObjectKey) -> bool {
        self.avatars.contains(&key)
            && self.local_player != Some(key)
            && !self.locally_owned.contains(&key)
            && !self.ai_controlled.contains(&key)
    }

    /// Same-machine-authority check used by volume sensors.
    ///
    /// Passes when validation is disabled by policy, or when the key is not a
    /// remote-controlled avatar.
    #[must_use]
    pub fn passes_avatar_check(&self, key: ObjectKey) -> bool {
        if !self.volume_policy.validate_avatars {
            return true;
        }
        !self.is_remote_avatar(key)
    }
}

/// Read access to scene geometry, supplied by the transform/avatar system.
///
/// Only the facing conditional needs geometry; everything else in this crate
/// works on keys alone.
pub trait SceneQuery {
    /// World-space forward vector of the object, if known.
    fn forward(&self, key: ObjectKey) -> Option<[f32; 3]>;

    /// World-space position of the object, if known.
    fn position(&self, key: ObjectKey) -> Option<[f32; 3]>;
}
