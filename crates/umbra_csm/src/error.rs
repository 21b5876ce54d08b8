//! Error types for the cascaded shadow map subsystem

use thiserror::Error;

use crate::pipeline::FrameStage;

/// Shadow subsystem errors
#[derive(Debug, Error)]
pub enum ShadowError {
    /// Cascade count, split scheme or tuning values are unusable
    #[error("Invalid cascade configuration: {0}")]
    InvalidConfiguration(String),

    /// Camera parameters cannot describe a frustum this frame
    #[error("Degenerate camera parameters: {0}")]
    DegenerateCamera(String),

    /// Light direction cannot orient a light view
    #[error("Degenerate light direction: {0}")]
    DegenerateLight(String),

    /// A GPU resource could not be created
    #[error("Failed to allocate {resource}: {reason}")]
    ResourceAllocation {
        resource: &'static str,
        reason: String,
    },

    /// Cascade index past the configured count
    #[error("Cascade index {index} out of range ({count} cascades)")]
    CascadeOutOfRange { index: usize, count: usize },

    /// Frame stage transition that skips or repeats a stage
    #[error("Frame stage violation: expected {expected}, found {found:?}")]
    StageOrder {
        expected: &'static str,
        found: FrameStage,
    },

    /// Shadow storage used after deinit
    #[error("Shadow cascade store used after release")]
    StoreReleased,

    /// Config file could not be read
    #[error("Failed to read shadow config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Failed to parse shadow config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl ShadowError {
    /// Whether the frame can continue with last-known-good cascades
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateCamera(_) | Self::DegenerateLight(_))
    }
}

/// Result type for shadow operations
pub type Result<T> = std::result::Result<T, ShadowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ShadowError::DegenerateCamera("aspect".into()).is_recoverable());
        assert!(ShadowError::DegenerateLight("zero".into()).is_recoverable());
        assert!(!ShadowError::InvalidConfiguration("count".into()).is_recoverable());
        assert!(!ShadowError::StoreReleased.is_recoverable());
        assert!(!ShadowError::ResourceAllocation {
            resource: "shadow depth array",
            reason: "out of memory".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_allocation_message_names_resource() {
        let err = ShadowError::ResourceAllocation {
            resource: "shadow depth array",
            reason: "out of memory".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to allocate shadow depth array: out of memory"
        );
    }
}
