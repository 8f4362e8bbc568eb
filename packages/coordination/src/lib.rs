// ABOUTME: Cross-instance coordination primitives for Warren
// ABOUTME: Shared cache backends and the TTL distributed lock built on them

pub mod cache;
pub mod error;
pub mod lock;

pub use cache::{CacheBackend, MemoryBackend, RedisBackend};
pub use error::{CoordinationError, Result};
pub use lock::DistributedLock;
