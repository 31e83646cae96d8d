//! Shard management module
//!
//! A shard is one gateway connection. [`ShardConnection`] runs the protocol
//! state machine; [`ShardPool`] owns the connections this process runs.

mod connection;
mod handle;
mod heartbeat;
mod pool;
mod session;
mod state;

pub use connection::ShardConnection;
pub use handle::{
    Diagnostic, HandlerFailure, ShardCommand, ShardEvent, ShardHandle, ShardStatus,
};
pub use heartbeat::{Beat, HeartbeatScheduler};
pub use pool::{pool_shard_range, shutdown, ShardPool, SHARDS_PER_POOL};
pub use session::SessionState;
pub use state::{ShardHealth, ShardState, ShardSummary};
