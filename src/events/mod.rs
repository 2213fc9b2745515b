//! Event records and the notification envelope.

mod data;
mod notify;

pub use data::{EventData, EventType, VariableValue};
pub use notify::{bcast, NotifyMsg, NotifyType};
