//! Progress events printed by `yt-dlp` while a download runs.
//!
//! `yt-dlp` is asked to print one JSON object per line for each hook call, through
//! `--progress-template`. Each line starts with a marker naming the hook it came from,
//! so the two event streams can be told apart. Under `--quiet` the post-processing lines
//! arrive on stderr, so both pipes are parsed.

use serde::{Deserialize, Serialize};

/// Marker prefixed to download-phase lines.
pub const DOWNLOAD_MARKER: &str = "[vidgrab:download]";
/// Marker prefixed to post-processing lines.
pub const POSTPROCESS_MARKER: &str = "[vidgrab:postprocess]";

/// Builds the `--progress-template` value for download-phase events.
pub fn download_template() -> String {
    format!(
        "download:{} %(progress.{{status,downloaded_bytes,total_bytes,total_bytes_estimate,_speed_str,_eta_str,filename}})j",
        DOWNLOAD_MARKER
    )
}

/// Builds the `--progress-template` value for post-processing events.
pub fn postprocess_template() -> String {
    format!(
        "postprocess:{} %(progress.{{status,postprocessor}})j",
        POSTPROCESS_MARKER
    )
}

/// Status of a download-phase event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Bytes are being transferred.
    Downloading,
    /// The transfer of one stream ended.
    Finished,
    /// The transfer of one stream failed.
    Error,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

/// Status of a post-processing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostProcessStatus {
    /// A post-processor (e.g. the merger) started.
    Started,
    /// A post-processor reports intermediate work.
    Processing,
    /// A post-processor finished.
    Finished,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

/// One download-phase event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEvent {
    /// What happened.
    pub status: DownloadStatus,
    /// Bytes transferred so far for the current stream.
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    /// Total size of the current stream, when the server announced it.
    #[serde(default)]
    pub total_bytes: Option<f64>,
    /// Estimated total size, for fragmented streams.
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    /// Human readable speed, possibly carrying terminal colour sequences.
    #[serde(default, rename = "_speed_str")]
    pub speed: Option<String>,
    /// Human readable ETA, possibly carrying terminal colour sequences.
    #[serde(default, rename = "_eta_str")]
    pub eta: Option<String>,
    /// The file the stream is written to.
    #[serde(default)]
    pub filename: Option<String>,
}

impl DownloadEvent {
    /// Creates an event with the given status and no data.
    pub fn new(status: DownloadStatus) -> Self {
        Self {
            status,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
            filename: None,
        }
    }

    /// Returns the known total size: the exact one, else the estimate.
    pub fn total(&self) -> Option<f64> {
        self.total_bytes.or(self.total_bytes_estimate)
    }
}

/// One post-processing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessEvent {
    /// What happened.
    pub status: PostProcessStatus,
    /// The post-processor name, e.g. `Merger`.
    #[serde(default)]
    pub postprocessor: Option<String>,
}

impl PostProcessEvent {
    /// Creates an event with the given status.
    pub fn new(status: PostProcessStatus) -> Self {
        Self {
            status,
            postprocessor: None,
        }
    }
}

/// A parsed stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// A download-phase event.
    Download(DownloadEvent),
    /// A post-processing event.
    PostProcess(PostProcessEvent),
}

impl ProgressLine {
    /// Parses a stdout line, returning `None` for anything that is not a progress line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();

        if let Some(payload) = line.strip_prefix(DOWNLOAD_MARKER) {
            return serde_json::from_str(payload.trim())
                .ok()
                .map(ProgressLine::Download);
        }

        if let Some(payload) = line.strip_prefix(POSTPROCESS_MARKER) {
            return serde_json::from_str(payload.trim())
                .ok()
                .map(ProgressLine::PostProcess);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_download_line() {
        let line = r#"[vidgrab:download] {"status": "downloading", "downloaded_bytes": 50, "total_bytes": 200, "total_bytes_estimate": null, "_speed_str": "1.00MiB/s", "_eta_str": "00:03", "filename": "/tmp/x/Sample.f137.mp4"}"#;

        let Some(ProgressLine::Download(event)) = ProgressLine::parse(line) else {
            panic!("not a download line");
        };
        assert_eq!(event.status, DownloadStatus::Downloading);
        assert_eq!(event.downloaded_bytes, Some(50.0));
        assert_eq!(event.total(), Some(200.0));
        assert_eq!(event.speed.as_deref(), Some("1.00MiB/s"));
        assert_eq!(event.eta.as_deref(), Some("00:03"));
    }

    #[test]
    fn falls_back_to_the_estimate() {
        let line = r#"[vidgrab:download] {"status": "downloading", "downloaded_bytes": 10, "total_bytes_estimate": 40.5}"#;

        let Some(ProgressLine::Download(event)) = ProgressLine::parse(line) else {
            panic!("not a download line");
        };
        assert_eq!(event.total(), Some(40.5));
        assert_eq!(event.speed, None);
    }

    #[test]
    fn parses_a_postprocess_line() {
        let line = r#"[vidgrab:postprocess] {"status": "started", "postprocessor": "Merger"}"#;

        assert_eq!(
            ProgressLine::parse(line),
            Some(ProgressLine::PostProcess(PostProcessEvent {
                status: PostProcessStatus::Started,
                postprocessor: Some("Merger".to_string()),
            }))
        );
    }

    #[test]
    fn unknown_status_is_kept_as_unknown() {
        let line = r#"[vidgrab:download] {"status": "paused"}"#;

        let Some(ProgressLine::Download(event)) = ProgressLine::parse(line) else {
            panic!("not a download line");
        };
        assert_eq!(event.status, DownloadStatus::Unknown);
    }

    #[test]
    fn other_lines_are_ignored() {
        assert_eq!(ProgressLine::parse("[Merger] Merging formats into \"x.mp4\""), None);
        assert_eq!(ProgressLine::parse("[vidgrab:download] not json"), None);
        assert_eq!(ProgressLine::parse(""), None);
    }

    #[test]
    fn templates_carry_the_markers() {
        assert!(download_template().starts_with("download:[vidgrab:download] %(progress."));
        assert!(
            postprocess_template().starts_with("postprocess:[vidgrab:postprocess] %(progress.")
        );
        assert!(download_template().contains("_speed_str"));
    }
}
