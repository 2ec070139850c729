pub mod client;

pub use client::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference endpoint unreachable at {0}")]
    Connection(String),

    #[error("inference request timed out after {0}s")]
    Timeout(u64),

    #[error("inference endpoint returned error (status {status}): {body}")]
    Endpoint { status: u16, body: String },

    #[error("malformed inference response: {0}")]
    ResponseParsing(String),
}
