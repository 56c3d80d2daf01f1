//! Per-client session state
//!
//! A session owns the ordered transcript and the active persona
//! instruction. Nothing here is persisted; a session lives as long as the
//! client that created it.

mod event;
mod state;
mod store;

pub use event::SessionEvent;
#[cfg(test)]
pub use state::Role;
pub use state::{Message, SessionState, DEFAULT_INSTRUCTION};
pub use store::SessionStore;
