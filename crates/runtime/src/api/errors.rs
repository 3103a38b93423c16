//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, the device registry, and the
//! wire codec so clients can bubble them up with consistent context.

use device_core::DeviceError;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::wire::WireError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{worker} worker command channel closed")]
    CommandChannelClosed { worker: &'static str },

    #[error("{worker} worker reply channel closed")]
    ReplyChannelClosed {
        worker: &'static str,
        #[source]
        source: oneshot::error::RecvError,
    },

    #[error("worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("runtime requires {0} to be configured before building")]
    MissingContent(&'static str),
}
