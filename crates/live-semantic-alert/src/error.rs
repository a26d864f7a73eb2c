use thiserror::Error;

pub type AlertResult<T> = Result<T, AlertError>;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("delivery failed: {message}")]
    Delivery { message: String },

    #[error("alert endpoint rejected the event with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("alert receiver is gone")]
    Closed,

    #[error("{failed} of {total} sinks failed: {message}")]
    Partial {
        failed: usize,
        total: usize,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl AlertError {
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
