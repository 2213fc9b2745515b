//! Core types: object identity, key resolution, and the session environment.
//!
//! Everything here is engine-agnostic plumbing the rest of the crate builds
//! on; the collaborating systems (resource manager, transform system) plug in
//! through the traits defined in these modules.

pub mod context;
pub mod key;

pub use context::{NetEnv, SceneQuery, VolumeSensorPolicy};
pub use key::{KeyContext, ObjectKey, RawKeys};
