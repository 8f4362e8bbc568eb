// ABOUTME: Error types for container-engine driver calls
// ABOUTME: Wraps bollard failures into not-found/timeout/connection/api kinds

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Could not reach the engine endpoint on the host
    #[error("Engine connection error: {0}")]
    Connection(String),

    /// Container (or exec instance) does not exist on the host
    #[error("Container not found: {0}")]
    NotFound(String),

    /// The engine call did not complete within its deadline
    #[error("Engine call timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The engine rejected the call
    #[error("Engine API error: {0}")]
    Api(String),

    /// Tar packing/unpacking for file transfer failed
    #[error("File transfer error: {0}")]
    FileTransfer(String),
}

impl From<bollard::errors::Error> for EngineError {
    fn from(e: bollard::errors::Error) -> Self {
        match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => EngineError::NotFound(message),
            bollard::errors::Error::RequestTimeoutError => EngineError::Timeout { seconds: 0 },
            other => EngineError::Api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
