//! Turns the extractor's download and post-processing events into display snapshots.
//!
//! Every event is reduced against the previous snapshot into a complete new one, so
//! skipped or interleaved events never leave a stale view behind. Publishing is best
//! effort: a sink failure is logged and dropped, and the transfer never sees it.

use crate::error::FormattingError;
use indicatif::ProgressBar;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::watch;
use vidgrab_extractor::ProgressHooks;
use vidgrab_extractor::model::progress::{
    DownloadEvent, DownloadStatus, PostProcessEvent, PostProcessStatus,
};

/// Placeholder for a missing speed or ETA.
pub const PLACEHOLDER: &str = "...";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI pattern is valid")
});

/// The user-visible state of one download attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading {
        fraction_complete: f64,
        speed_label: String,
        eta_label: String,
    },
    Merging,
    Complete {
        file_path: PathBuf,
    },
    Failed {
        message: String,
    },
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Complete { .. } | DownloadState::Failed { .. })
    }

    /// The completed fraction shown on a bar.
    pub fn fraction(&self) -> f64 {
        match self {
            DownloadState::Idle | DownloadState::Failed { .. } => 0.0,
            DownloadState::Downloading {
                fraction_complete, ..
            } => *fraction_complete,
            DownloadState::Merging | DownloadState::Complete { .. } => 1.0,
        }
    }
}

/// Which label goes with the current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    #[default]
    Starting,
    Transferring,
    TransferFinished,
    Merging,
    ProcessingComplete,
}

/// One complete displayable view of the download.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub state: DownloadState,
    pub phase: StatusPhase,
    pub status_line: String,
}

impl ProgressSnapshot {
    pub fn new(state: DownloadState, phase: StatusPhase) -> Self {
        let status_line = format_status_line(&state, &phase);
        Self {
            state,
            phase,
            status_line,
        }
    }
}

/// Receives every snapshot the pipeline produces.
pub trait StateSink {
    fn publish(&mut self, snapshot: &ProgressSnapshot) -> Result<(), FormattingError>;
}

impl<S: StateSink + ?Sized> StateSink for &mut S {
    fn publish(&mut self, snapshot: &ProgressSnapshot) -> Result<(), FormattingError> {
        (**self).publish(snapshot)
    }
}

impl StateSink for Vec<ProgressSnapshot> {
    fn publish(&mut self, snapshot: &ProgressSnapshot) -> Result<(), FormattingError> {
        self.push(snapshot.clone());
        Ok(())
    }
}

impl StateSink for &watch::Sender<ProgressSnapshot> {
    fn publish(&mut self, snapshot: &ProgressSnapshot) -> Result<(), FormattingError> {
        self.send(snapshot.clone())
            .map_err(|_| FormattingError::SinkClosed)
    }
}

impl StateSink for ProgressBar {
    fn publish(&mut self, snapshot: &ProgressSnapshot) -> Result<(), FormattingError> {
        let length = self.length().unwrap_or(1000);
        self.set_position((snapshot.state.fraction() * length as f64).round() as u64);
        self.set_message(snapshot.status_line.clone());
        Ok(())
    }
}

/// The event-to-state reducer for one download attempt.
#[derive(Debug)]
pub struct ProgressPipeline<S: StateSink> {
    snapshot: ProgressSnapshot,
    sink: S,
}

impl<S: StateSink> ProgressPipeline<S> {
    /// Creates a pipeline in `Idle` and publishes that first snapshot.
    pub fn new(sink: S) -> Self {
        let mut pipeline = Self {
            snapshot: ProgressSnapshot::default(),
            sink,
        };
        pipeline.apply(DownloadState::Idle, StatusPhase::Starting);
        pipeline
    }

    pub fn state(&self) -> &DownloadState {
        &self.snapshot.state
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Marks the attempt complete. Only the orchestrator knows a file exists.
    pub fn complete(&mut self, file_path: &Path) {
        if self.snapshot.state.is_terminal() {
            return;
        }
        let phase = self.snapshot.phase;
        self.apply(
            DownloadState::Complete {
                file_path: file_path.to_path_buf(),
            },
            phase,
        );
    }

    /// Marks the attempt failed. Reachable from any non-terminal state.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.snapshot.state.is_terminal() {
            return;
        }
        let phase = self.snapshot.phase;
        self.apply(
            DownloadState::Failed {
                message: message.into(),
            },
            phase,
        );
    }

    fn previous_fraction(&self) -> f64 {
        match &self.snapshot.state {
            DownloadState::Downloading {
                fraction_complete, ..
            } => *fraction_complete,
            _ => 0.0,
        }
    }

    fn on_downloading(&mut self, event: &DownloadEvent) {
        let fraction = match (event.downloaded_bytes, event.total()) {
            (Some(downloaded), Some(total)) if total > 0.0 && downloaded.is_finite() => {
                downloaded / total
            }
            _ => self.previous_fraction(),
        };

        self.apply(
            DownloadState::Downloading {
                fraction_complete: fraction.clamp(0.0, 1.0),
                speed_label: display_label(event.speed.as_deref()),
                eta_label: display_label(event.eta.as_deref()),
            },
            StatusPhase::Transferring,
        );
    }

    fn on_transfer_finished(&mut self) {
        let (speed_label, eta_label) = match &self.snapshot.state {
            DownloadState::Downloading {
                speed_label,
                eta_label,
                ..
            } => (speed_label.clone(), eta_label.clone()),
            _ => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
        };

        self.apply(
            DownloadState::Downloading {
                fraction_complete: 1.0,
                speed_label,
                eta_label,
            },
            StatusPhase::TransferFinished,
        );
    }

    fn apply(&mut self, state: DownloadState, phase: StatusPhase) {
        self.snapshot = ProgressSnapshot::new(state, phase);

        if let Err(e) = self.sink.publish(&self.snapshot) {
            debug!("Dropped progress update: {}", e);
        }
    }

    /// Download-phase events are ignored once merging started or the attempt ended.
    fn accepts_download_events(&self) -> bool {
        !matches!(
            self.snapshot.state,
            DownloadState::Merging | DownloadState::Complete { .. } | DownloadState::Failed { .. }
        )
    }
}

impl<S: StateSink> ProgressHooks for ProgressPipeline<S> {
    fn on_download_event(&mut self, event: &DownloadEvent) {
        if !self.accepts_download_events() {
            return;
        }

        match event.status {
            DownloadStatus::Downloading => self.on_downloading(event),
            DownloadStatus::Finished => self.on_transfer_finished(),
            DownloadStatus::Error | DownloadStatus::Unknown => {}
        }
    }

    fn on_postprocess_event(&mut self, event: &PostProcessEvent) {
        if self.snapshot.state.is_terminal() {
            return;
        }

        match event.status {
            PostProcessStatus::Started => self.apply(DownloadState::Merging, StatusPhase::Merging),
            PostProcessStatus::Finished => {
                let state = self.snapshot.state.clone();
                self.apply(state, StatusPhase::ProcessingComplete);
            }
            PostProcessStatus::Processing | PostProcessStatus::Unknown => {}
        }
    }
}

/// Strips terminal control sequences. Missing or blank values give [`PLACEHOLDER`].
pub fn display_label(raw: Option<&str>) -> String {
    let cleaned = raw
        .map(|raw| ANSI_ESCAPE.replace_all(raw, "").trim().to_string())
        .unwrap_or_default();

    if cleaned.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        cleaned
    }
}

/// Renders a one-line label for `state`. Never fails: a rendering error gives a generic line.
pub fn format_status_line(state: &DownloadState, phase: &StatusPhase) -> String {
    render_status_line(state, phase).unwrap_or_else(|e| {
        debug!("Could not render status line: {}", e);
        "Working...".to_string()
    })
}

fn render_status_line(
    state: &DownloadState,
    phase: &StatusPhase,
) -> Result<String, FormattingError> {
    let mut line = String::new();

    match (state, phase) {
        (DownloadState::Complete { .. }, _) => write!(line, "Ready for transfer!")?,
        (DownloadState::Failed { message }, _) => write!(line, "Download failed: {}", message)?,
        (_, StatusPhase::ProcessingComplete) => write!(line, "Processing complete!")?,
        (DownloadState::Merging, _) => write!(line, "100% completed | Merging video & audio...")?,
        (DownloadState::Downloading { .. }, StatusPhase::TransferFinished) => {
            write!(line, "Download finished. Preparing to merge...")?
        }
        (
            DownloadState::Downloading {
                fraction_complete,
                speed_label,
                eta_label,
            },
            _,
        ) => write!(
            line,
            "{:.1}% completed | Speed: {} | ETA: {}",
            fraction_complete * 100.0,
            speed_label,
            eta_label
        )?,
        (DownloadState::Idle, _) => write!(line, "Initializing download engine...")?,
    }

    Ok(line)
}
