// ABOUTME: Error types for the shared cache and distributed locks
// ABOUTME: Lock callers see booleans; these surface only through cache APIs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinationError {
    /// The cache backend call itself failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Redis client/connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, CoordinationError>;
