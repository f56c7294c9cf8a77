//! Outbound notification hooks
//!
//! The core announces state changes here; delivery to people (push,
//! email, chat) belongs to an external collaborator subscribed to the bus.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, HookBus};
pub use types::Hook;
