// ABOUTME: Error types for fleet capacity tracking and placement
// ABOUTME: Capacity exhaustion is a typed result, never a blocking wait

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    /// No known host satisfies the placement constraints right now
    #[error("No host can satisfy the requested capacity: {0}")]
    CapacityExhausted(String),

    /// Referenced host is not in the registry
    #[error("Host not found: {0}")]
    HostNotFound(String),

    /// Host inventory could not be loaded
    #[error("Invalid host inventory: {0}")]
    InvalidInventory(String),
}

pub type Result<T> = std::result::Result<T, FleetError>;
