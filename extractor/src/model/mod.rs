//! The models used to represent the data exchanged with 'yt-dlp'.
//!
//! The represented data is the video information, the thumbnails, the download options
//! and the progress events printed while a download runs.

use crate::model::thumbnail::Thumbnail;
use serde::{Deserialize, Serialize};

pub mod options;
pub mod progress;
pub mod thumbnail;

/// Represents a video, the output of `yt-dlp --dump-single-json`.
///
/// Every field is optional: extractors for different sites fill different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    /// The ID of the video, unique within its extractor.
    pub id: Option<String>,
    /// The title of the video.
    pub title: Option<String>,
    /// The thumbnail URL of the video, usually the highest quality.
    pub thumbnail: Option<String>,
    /// All known thumbnails, sorted by ascending preference.
    pub thumbnails: Option<Vec<Thumbnail>>,

    /// The display name of the uploader.
    pub uploader: Option<String>,
    /// The channel display name, used when the uploader is missing.
    pub channel: Option<String>,

    /// The duration of the video in seconds. Some extractors report fractions.
    pub duration: Option<f64>,
    /// The number of views the video has.
    pub view_count: Option<u64>,

    /// The canonical page URL of the video.
    pub webpage_url: Option<String>,
    /// The name of the extractor that handled the URL.
    pub extractor_key: Option<String>,
}

impl VideoInfo {
    /// Returns the best thumbnail URL: the top-level one, or the most preferred of the list.
    pub fn best_thumbnail(&self) -> Option<&str> {
        self.thumbnail
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.thumbnails
                    .iter()
                    .flatten()
                    .max_by_key(|thumbnail| thumbnail.preference.unwrap_or(i64::MIN))
                    .map(|thumbnail| thumbnail.url.as_str())
            })
    }

    /// Returns the uploader name, falling back to the channel name.
    pub fn uploader_name(&self) -> Option<&str> {
        [self.uploader.as_deref(), self.channel.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
    }

    /// Returns the duration in whole seconds, ignoring negative or non-finite values.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .map(|seconds| seconds.trunc() as u64)
    }
}
