//! Failures of the extraction service and of the binary installer.

use crate::utils::platform::{Architecture, Platform};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A spawned task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Runtime(#[from] tokio::task::JoinError),
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
    #[error("could not unpack archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The service printed something that is not the JSON we asked for.
    #[error("malformed JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid request header: {0}")]
    Header(String),

    /// The latest yt-dlp release has no asset for this platform.
    #[error("no yt-dlp release asset for {0}/{1}")]
    Github(Platform, Architecture),
    /// There is no static ffmpeg build for this platform.
    #[error("no ffmpeg build for {0}/{1}")]
    Binary(Platform, Architecture),
    /// A downloaded binary did not match its published digest. The file has been removed.
    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    Checksum {
        name: String,
        expected: String,
        actual: String,
    },

    /// The executable exited unsuccessfully; carries its stderr.
    #[error("yt-dlp failed: {0}")]
    Command(String),
    /// The service rejected the URL. The message is the service's own.
    #[error("{0}")]
    Extraction(String),
    #[error("invalid path: {0}")]
    Path(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
