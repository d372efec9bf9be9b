//! Cache entry state.

use std::fmt;

use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use viewer_assets::AssetHandle;
use viewer_core::AssetError;

/// Outcome of a load, cloned out to every requester.
pub type LoadResult = Result<AssetHandle, AssetError>;

/// An in-flight load that any number of requesters can await.
pub(crate) type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Observable state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// A load is in flight.
    Pending,
    /// The asset is loaded and held.
    Resolved,
    /// The last load failed; the failure is served until the cool-down ends.
    Failed,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

pub(crate) enum EntryState {
    Pending { load: SharedLoad },
    Resolved { handle: AssetHandle },
    Failed { error: AssetError, failed_at: Instant },
}

/// One slot per asset key.
pub(crate) struct CacheEntry {
    pub(crate) state: EntryState,
    /// Bumped on every new load so a completion can tell whether it is current.
    pub(crate) generation: u64,
    /// Outstanding `acquire` calls not yet matched by `release`.
    pub(crate) ref_count: usize,
}

impl CacheEntry {
    pub(crate) fn pending(load: SharedLoad, generation: u64) -> Self {
        Self {
            state: EntryState::Pending { load },
            generation,
            ref_count: 0,
        }
    }

    pub(crate) fn status(&self) -> CacheStatus {
        match self.state {
            EntryState::Pending { .. } => CacheStatus::Pending,
            EntryState::Resolved { .. } => CacheStatus::Resolved,
            EntryState::Failed { .. } => CacheStatus::Failed,
        }
    }
}
