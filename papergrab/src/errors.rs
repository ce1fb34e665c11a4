use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("Internal error: {0}")]
    Internal(String),
}
