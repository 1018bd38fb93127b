use thiserror::Error;

/// Failures talking to the Telegram Bot API.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Telegram request {method} failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: teloxide::RequestError,
    },

    #[error("Failed to download Telegram file {path}: {source}")]
    Download {
        path: String,
        #[source]
        source: teloxide::DownloadError,
    },

    #[error("Update offset {0} is out of range")]
    InvalidOffset(i64),

    #[error("Invalid URL {0}")]
    InvalidUrl(String),
}

/// Outcome of a failed match or handler run.
///
/// `Validation` is shown to the chat; anything else is only logged.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        CommandError::Validation(message.into())
    }
}

impl From<TransportError> for CommandError {
    fn from(e: TransportError) -> Self {
        CommandError::Failed(e.into())
    }
}

impl From<reqwest::Error> for CommandError {
    fn from(e: reqwest::Error) -> Self {
        CommandError::Failed(e.into())
    }
}
