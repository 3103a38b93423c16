//! Common error infrastructure for device-core.
//!
//! The framework favours availability: most failures are logged and the
//! affected entity is skipped. Only a missing dependency aborts an
//! activation, and even then the device returns to an idle, controllable
//! state. Every error type here classifies itself through [`DeviceFault`]
//! so callers can pick a recovery strategy without matching on variants.

use crate::state::{DeviceId, EntityHandle, Identity};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the single effect is skipped, the batch continues
/// - **Validation**: the request referenced something that does not exist
/// - **Internal**: bookkeeping disagreed with itself; investigate
/// - **Fatal**: the in-progress activation cannot continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    Recoverable,
    Validation,
    Internal,
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }
}

/// Common trait for all device-core errors.
pub trait DeviceFault: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Stable identifier for metrics, logs and tests.
    fn error_code(&self) -> &'static str;
}

/// A subsystem an activation needs was not available when the phase ran.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DependencyError {
    #[error("world props container not found")]
    PropsContainer,

    #[error("trigger volume {0:?} is not registered")]
    Volume(crate::state::VolumeId),
}

impl DeviceFault for DependencyError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::PropsContainer => "DEPENDENCY_PROPS_CONTAINER",
            Self::Volume(_) => "DEPENDENCY_VOLUME",
        }
    }
}

/// The authority world refused an operation on one entity.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("entity {0} no longer exists")]
    Expired(EntityHandle),

    #[error("cannot spawn {identity}: {reason}")]
    SpawnRefused {
        identity: Identity,
        reason: &'static str,
    },
}

impl DeviceFault for WorldError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Recoverable
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Expired(_) => "WORLD_ENTITY_EXPIRED",
            Self::SpawnRefused { .. } => "WORLD_SPAWN_REFUSED",
        }
    }
}

/// Failures while a follower applies replicated state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    #[error("replication target {0} no longer resolves")]
    TargetExpired(EntityHandle),

    #[error("no shadow registered for {0}")]
    UnknownDevice(DeviceId),

    #[error("entity {handle} cannot receive {effect}")]
    Unsupported {
        handle: EntityHandle,
        effect: &'static str,
    },
}

impl DeviceFault for ReplicaError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TargetExpired(_) => ErrorSeverity::Recoverable,
            Self::UnknownDevice(_) => ErrorSeverity::Validation,
            Self::Unsupported { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::TargetExpired(_) => "REPLICA_TARGET_EXPIRED",
            Self::UnknownDevice(_) => "REPLICA_UNKNOWN_DEVICE",
            Self::Unsupported { .. } => "REPLICA_UNSUPPORTED",
        }
    }
}

/// Errors returned to callers of the device registry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("device {0} is already registered")]
    DuplicateDevice(DeviceId),
}

impl DeviceFault for DeviceError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownDevice(_) => "DEVICE_UNKNOWN",
            Self::DuplicateDevice(_) => "DEVICE_DUPLICATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dependency_errors_are_fatal() {
        assert_eq!(
            DependencyError::PropsContainer.severity(),
            ErrorSeverity::Fatal
        );
        assert!(
            ReplicaError::TargetExpired(EntityHandle(4))
                .severity()
                .is_recoverable()
        );
        assert!(WorldError::Expired(EntityHandle(1)).severity().is_recoverable());
    }
}
