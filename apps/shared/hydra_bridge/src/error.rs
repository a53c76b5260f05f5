use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("This object no longer exists")]
    Disposed,

    #[error("Wrong number of coordinates: expected 2 or 3, got {0}")]
    ArgumentArity(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote evaluation failed: {0}")]
    RemoteEvaluation(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Operation exceeded the specified time ({0:?})")]
    Timeout(Duration),

    #[error("The engine has not finished loading")]
    NotReady,

    #[error("Unexpected result: expected {expected}, got {actual}")]
    UnexpectedResult {
        expected: &'static str,
        actual: String,
    },

    #[error("Engine channel closed")]
    ChannelClosed,

    #[error("Failed to read '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[cfg(feature = "js")]
    #[error("JavaScript engine error: {0}")]
    Engine(#[from] rquickjs::Error),
}
