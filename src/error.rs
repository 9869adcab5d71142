use thiserror::Error;

/// A metadata lookup failed.
///
/// The detail is logged; users only ever see [`ExtractionError::USER_MESSAGE`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no URL was given")]
    EmptyUrl,
    #[error("{0}")]
    Service(String),
    #[error("a download is already running")]
    Busy,
}

impl ExtractionError {
    pub const USER_MESSAGE: &'static str = "Failed to fetch metadata. Please check the URL.";
}

impl From<vidgrab_extractor::error::Error> for ExtractionError {
    fn from(error: vidgrab_extractor::error::Error) -> Self {
        ExtractionError::Service(error.to_string())
    }
}

/// A download failed. The message is shown to the user as is.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("file not found")]
    FileNotFound,
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("search for a video before downloading")]
    NoLookup,
    #[error("a download is already running")]
    Busy,
}

impl From<vidgrab_extractor::error::Error> for DownloadError {
    fn from(error: vidgrab_extractor::error::Error) -> Self {
        DownloadError::Service(error.to_string())
    }
}

/// Publishing or rendering a progress update failed. Never leaves the progress pipeline.
#[derive(Debug, Error)]
pub enum FormattingError {
    #[error("progress receiver is gone")]
    SinkClosed,
    #[error("could not render progress: {0}")]
    Render(#[from] std::fmt::Error),
}
