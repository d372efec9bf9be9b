//! Asset cache for the 3D product viewer.
//!
//! This crate provides:
//! - `ResourceCache` - At most one fetch per asset key, shared by every viewer
//! - `CacheStatus` - Pending / resolved / failed state of an entry
//! - `CacheStats` - Hit, coalescing and eviction counters
//!
//! # Example
//!
//! ```ignore
//! use viewer_cache::ResourceCache;
//! use viewer_core::AssetKey;
//!
//! let cache = ResourceCache::new(resolver, loader, &config.cache);
//!
//! // Both requests attach to the same in-flight load.
//! let a = cache.acquire(&AssetKey::new("rings", "walnut"));
//! let b = cache.acquire(&AssetKey::new("rings", "walnut"));
//! let (a, b) = futures::join!(a, b);
//! assert!(a?.ptr_eq(&b?));
//! ```

mod cache;
mod entry;
mod stats;

pub use cache::*;
pub use entry::{CacheStatus, LoadResult};
pub use stats::*;
