//! Viewer error types.

use std::time::Duration;

use thiserror::Error;

use crate::ids::{InstanceId, ProductId, VariantId};
use crate::lifecycle::ViewerState;

/// Errors raised while fetching or decoding a 3D asset.
///
/// `Clone` because every requester attached to a coalesced load receives
/// the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Nothing exists at the resolved path.
    #[error("Asset not found: {url}")]
    NotFound { url: String },

    /// Fetch failed or the connection dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// Asset was fetched but is malformed.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl AssetError {
    /// Short machine-readable kind, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AssetError::NotFound { .. } => "not_found",
            AssetError::Network(_) => "network",
            AssetError::Decode(_) => "decode",
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AssetError::Network(_))
    }
}

/// Errors surfaced by viewer lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// The asset load failed.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The load budget elapsed before the asset arrived.
    #[error("Load timed out after {0:?}")]
    Timeout(Duration),

    /// No viewer registered under this id.
    #[error("Unknown viewer instance: {0}")]
    UnknownInstance(InstanceId),

    /// The product has no catalog entry.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The product has no such variant.
    #[error("Unknown variant {variant} for product {product}")]
    UnknownVariant { product: ProductId, variant: VariantId },

    /// The viewer was disposed.
    #[error("Viewer {0} is disposed")]
    Disposed(InstanceId),

    /// The operation needs a different lifecycle state.
    #[error("Viewer {id} is {state}, expected {expected}")]
    NotReady {
        id: InstanceId,
        state: ViewerState,
        expected: ViewerState,
    },

    /// A newer load replaced this one before it completed.
    #[error("Load superseded by a newer request")]
    Superseded,

    /// The render backend rejected an operation.
    #[error("Render error: {0}")]
    Render(String),

    /// The orchestrator was torn down.
    #[error("Viewer registry is closed")]
    Closed,
}

impl ViewerError {
    /// Short machine-readable kind, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerError::Asset(e) => e.kind(),
            ViewerError::Timeout(_) => "timeout",
            ViewerError::UnknownInstance(_) => "unknown_instance",
            ViewerError::UnknownProduct(_) => "unknown_product",
            ViewerError::UnknownVariant { .. } => "unknown_variant",
            ViewerError::Disposed(_) => "disposed",
            ViewerError::NotReady { .. } => "not_ready",
            ViewerError::Superseded => "superseded",
            ViewerError::Render(_) => "render",
            ViewerError::Closed => "closed",
        }
    }

    /// Whether a manual retry is worth offering. Timeouts and lost render
    /// contexts count as transient; missing or corrupt assets do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ViewerError::Asset(e) => e.is_transient(),
            ViewerError::Timeout(_) | ViewerError::Render(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_error_kinds() {
        assert_eq!(AssetError::NotFound { url: "/x".into() }.kind(), "not_found");
        assert_eq!(AssetError::Network("reset".into()).kind(), "network");
        assert_eq!(AssetError::Decode("bad magic".into()).kind(), "decode");
    }

    #[test]
    fn test_only_network_is_transient() {
        assert!(AssetError::Network("reset".into()).is_transient());
        assert!(!AssetError::Decode("bad".into()).is_transient());
        assert!(!AssetError::NotFound { url: "/x".into() }.is_transient());
    }

    #[test]
    fn test_viewer_error_wraps_asset_error() {
        let err: ViewerError = AssetError::Network("reset".into()).into();
        assert_eq!(err.kind(), "network");
        assert_eq!(err.to_string(), "Network error: reset");
    }

    #[test]
    fn test_retryable_follows_error_kind() {
        assert!(ViewerError::Timeout(Duration::from_secs(8)).is_retryable());
        assert!(ViewerError::from(AssetError::Network("reset".into())).is_retryable());
        assert!(!ViewerError::from(AssetError::NotFound { url: "/x".into() }).is_retryable());
        assert!(!ViewerError::from(AssetError::Decode("bad magic".into())).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        let err = ViewerError::Timeout(Duration::from_secs(8));
        assert_eq!(err.to_string(), "Load timed out after 8s");
    }
}
