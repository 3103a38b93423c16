//! Binary framing for replication messages exchanged between participants.
//!
//! Frames are bincode with the 1.x default layout (fixed-width little-endian
//! integers), so every participant decodes what the authority encoded
//! byte-for-byte.

use std::sync::Arc;

use device_core::{DeviceId, ReplicationMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode replication message")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode replication frame")]
    Decode(#[source] bincode::Error),
}

pub fn encode(message: &ReplicationMessage) -> Result<Vec<u8>, WireError> {
    bincode::serialize(message).map_err(WireError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<ReplicationMessage, WireError> {
    bincode::deserialize(bytes).map_err(WireError::Decode)
}

/// Encoded message plus the routing fields readable without decoding.
#[derive(Debug, Clone)]
pub struct ReplicationFrame {
    pub device: DeviceId,
    pub seq: u64,
    payload: Arc<[u8]>,
}

impl ReplicationFrame {
    pub fn encode(message: &ReplicationMessage) -> Result<Self, WireError> {
        Ok(Self {
            device: message.device(),
            seq: message.seq(),
            payload: encode(message)?.into(),
        })
    }

    pub fn message(&self) -> Result<ReplicationMessage, WireError> {
        decode(&self.payload)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
