//! A typed wrapper over the `yt-dlp` executable.
//!
//! The crate exposes the narrow surface an application needs from the extraction service:
//! a metadata-only lookup, a single blocking download invocation that reports progress
//! through [`ProgressHooks`], and an installer for the `yt-dlp` and `ffmpeg` binaries.

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::model::VideoInfo;
use crate::model::options::DownloadOptions;
use crate::model::progress::{DownloadEvent, PostProcessEvent, ProgressLine};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub mod executor;
pub mod fetcher;
pub mod model;
pub mod utils;

/// Observer for the two event streams emitted during one download invocation.
///
/// Hooks are called synchronously, in the order `yt-dlp` prints them, while
/// [`Extractor::download`] is still running. Implementations must not fail: whatever
/// they do with an event has no effect on the transfer itself.
pub trait ProgressHooks {
    /// Called for every download-phase event (`downloading`, `finished`, `error`, ...).
    fn on_download_event(&mut self, event: &DownloadEvent);

    /// Called for every post-processing event (`started`, `processing`, `finished`, ...).
    fn on_postprocess_event(&mut self, event: &PostProcessEvent);
}

/// Hooks that drop every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ProgressHooks for NoHooks {
    fn on_download_event(&mut self, _event: &DownloadEvent) {}

    fn on_postprocess_event(&mut self, _event: &PostProcessEvent) {}
}

/// The extraction service, as seen by the application.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetches the metadata of the given URL without downloading any media bytes.
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo>;

    /// Downloads the given URL once, according to `options`, reporting progress to `hooks`.
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        hooks: &mut (dyn ProgressHooks + Send),
    ) -> Result<()>;
}

/// The `yt-dlp` executable, driven as a child process.
///
/// # Examples
///
/// ```rust, no_run
/// # use vidgrab_extractor::{Extractor, YtDlp};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let yt_dlp = YtDlp::new("libs/yt-dlp");
///
/// let info = yt_dlp.extract_metadata("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
/// println!("Video title: {:?}", info.title);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct YtDlp {
    pub executable: PathBuf,
    /// The timeout for metadata lookups. Downloads are never timed out.
    pub timeout: Option<Duration>,
}

impl YtDlp {
    /// Creates a new driver for the given executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Sets the timeout for metadata lookups.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the version string reported by the executable.
    ///
    /// # Errors
    ///
    /// This function will return an error if the executable could not be run.
    pub async fn version(&self) -> Result<String> {
        let output = self
            .executor(Some(Duration::from_secs(10)), utils::to_owned(vec!["--version"]))
            .execute()
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    fn executor(&self, timeout: Option<Duration>, args: Vec<String>) -> Executor {
        Executor {
            executable_path: self.executable.clone(),
            timeout,
            args,
        }
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching metadata for {}", url);

        let args = vec![
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-progress",
            "--no-warnings",
            "--",
            url,
        ];

        let output = self
            .executor(self.timeout, utils::to_owned(args))
            .execute()
            .await
            .map_err(service_error)?;

        let info: VideoInfo = serde_json::from_str(&output.stdout).map_err(Error::Serde)?;
        Ok(info)
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        hooks: &mut (dyn ProgressHooks + Send),
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Downloading {} with {:?}", url, options);

        let mut args = options.to_args();
        args.push("--".to_string());
        args.push(url.to_string());

        self.executor(None, args)
            .execute_streaming(|line| match ProgressLine::parse(line) {
                Some(ProgressLine::Download(event)) => hooks.on_download_event(&event),
                Some(ProgressLine::PostProcess(event)) => hooks.on_postprocess_event(&event),
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("yt-dlp: {}", line);
                }
            })
            .await
            .map_err(service_error)?;

        Ok(())
    }
}

/// Turns a failed `yt-dlp` run into the message it printed after `ERROR:`.
fn service_error(error: Error) -> Error {
    match error {
        Error::Command(message) => {
            let reported = message
                .lines()
                .rev()
                .find_map(|line| line.split_once("ERROR:").map(|(_, rest)| rest.trim()))
                .filter(|rest| !rest.is_empty());

            match reported {
                Some(reported) => Error::Extraction(reported.to_string()),
                None => Error::Extraction(message),
            }
        }
        other => other,
    }
}
