pub mod push;
pub mod registry;

pub use push::*;
pub use registry::*;

use thiserror::Error;

/// Faults from the best-effort push path. Callers log these and move on;
/// a dead or stale connection never blocks archival or finalization.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("push channel unreachable at {0}")]
    Transport(String),

    #[error("push request timed out after {0}s")]
    Timeout(u64),

    #[error("connection {connection_id} rejected by channel endpoint (status {status})")]
    Stale { connection_id: String, status: u16 },
}
