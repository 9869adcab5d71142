//! Fetch one video from a URL: look up its metadata, download it at the best quality the
//! extraction service offers, merge it into MP4 and hand the bytes back.

use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{LevelFilter, warn};
use std::path::PathBuf;
use vidgrab_extractor::YtDlp;

pub mod config;
pub mod error;
pub mod locator;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod web;

pub use config::Settings;
pub use error::{DownloadError, ExtractionError, FormattingError};
pub use locator::BinaryLocator;
pub use metadata::LookupResult;
pub use orchestrator::StagedArtifact;
pub use progress::{DownloadState, ProgressPipeline, ProgressSnapshot, StateSink};
pub use session::Session;

/// The env_logger filter for one of the `--verbosity` values.
pub fn log_filter(verbosity: &str) -> &'static str {
    match verbosity {
        "full" => "trace",
        "debug" => "warn,vidgrab=debug,vidgrab_extractor=debug",
        "error" => "error",
        "none" => "off",
        _ => "warn,vidgrab=info,vidgrab_extractor=info",
    }
}

/// Installs the logger behind a [`MultiProgress`] so log lines never tear progress bars.
///
/// `RUST_LOG` still wins over `verbosity` when it is set.
pub fn init_logger(verbosity: &str) -> Result<MultiProgress, log::SetLoggerError> {
    let logger = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(verbosity)),
    )
    .build();
    let level: LevelFilter = logger.filter();

    let multi = MultiProgress::new();
    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(level);

    Ok(multi)
}

/// Finds the muxer, logging a warning when merging will be unavailable.
pub fn locate_muxer(settings: &Settings) -> Option<PathBuf> {
    let muxer = BinaryLocator::ffmpeg(settings).locate();
    if muxer.is_none() {
        warn!("{}", web::MUXER_MISSING);
    }
    muxer
}

/// The extraction service, falling back to a bare `yt-dlp` resolved by the OS.
pub fn extraction_service(settings: &Settings) -> YtDlp {
    let executable = BinaryLocator::yt_dlp(settings)
        .locate()
        .unwrap_or_else(|| PathBuf::from("yt-dlp"));

    YtDlp::new(executable).with_timeout(settings.metadata_timeout())
}
