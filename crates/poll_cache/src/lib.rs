//! Polling data cache.
//!
//! Keeps the most recent successful result per resource key and revalidates
//! it on a fixed interval, on demand, and (optionally) when the consuming
//! context regains focus. Failed or timed-out fetches never clear a cached
//! value.

pub mod cache;
pub mod fetcher;
pub mod policy;
pub mod subscription;

pub use cache::{CacheKey, CacheStats, PollingCache};
pub use fetcher::{FetchFuture, Fetcher};
pub use policy::{ResourceKind, RevalidatePolicy, DEFAULT_REQUEST_TIMEOUT};
pub use subscription::{Snapshot, Subscription};
