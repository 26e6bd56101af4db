use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Memory information unavailable: {0}")]
    MemoryInfoUnavailable(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
