//! Wire types exchanged between the editor page and the execution engine.
//!
//! Every frame is a JSON text message. Inbound frames carry an `action` tag;
//! outbound frames are either `{"output": ...}` or `{"event": "finished"}`.

mod command;
mod event;
mod language;

pub use command::ClientCommand;
pub use event::OutboundEvent;
pub use language::Language;
