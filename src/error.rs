/// Errors returned by handlers.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("use of close() is supported only for buffered logging")]
    NothingToClose,

    #[error("logger buffer already closed")]
    AlreadyClosed,

    #[error("buffered output requires a running tokio runtime")]
    NoRuntime,

    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HandlerError>;
