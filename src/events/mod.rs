//! Event handling module
//!
//! The dispatch handler registry, built-in handlers, and serialization of
//! dispatches for the message broker.

mod guilds;
mod registry;
pub mod serialize;

pub use guilds::GuildTracker;
pub use registry::{chain, handler_fn, EventHandler, EventRegistry, HandlerChain, HandlerFn};
pub use serialize::{serialize_event, GatewayEvent};
