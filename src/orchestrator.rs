use crate::error::DownloadError;
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use vidgrab_extractor::model::options::DownloadOptions;
use vidgrab_extractor::{Extractor, ProgressHooks};

/// Output file name template, relative to the staging directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
/// Container the separate video and audio streams are merged into.
pub const MERGE_FORMAT: &str = "mp4";

/// Suffixes of the partial files the extractor may leave behind.
const PARTIAL_SUFFIXES: [&str; 4] = [".part", ".ytdl", ".temp", ".frag"];

/// The one file produced by a download, held in memory.
#[derive(Clone, PartialEq)]
pub struct StagedArtifact {
    /// Where the file lived inside the staging directory, which no longer exists.
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl StagedArtifact {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("path", &self.path)
            .field("file_name", &self.file_name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Builds the option bag of one download into `staging`.
pub fn download_options(staging: &Path, muxer: Option<&Path>) -> DownloadOptions {
    DownloadOptions::new(staging.join(OUTPUT_TEMPLATE).to_string_lossy())
        .with_merge_output_format(MERGE_FORMAT)
        .with_ffmpeg_location(muxer.map(Path::to_path_buf))
}

/// Downloads `url` once into a private staging directory and returns the produced file.
///
/// The staging directory is removed when this returns, fails, or the future is dropped.
pub async fn run_download(
    service: &dyn Extractor,
    url: &str,
    muxer: Option<&Path>,
    hooks: &mut (dyn ProgressHooks + Send),
) -> Result<StagedArtifact, DownloadError> {
    let staging = tempfile::Builder::new().prefix("vidgrab-").tempdir()?;
    debug!("Staging {} in {}", url, staging.path().display());

    let options = download_options(staging.path(), muxer);
    service.download(url, &options, hooks).await.map_err(|e| {
        warn!("Download of {} failed: {}", url, e);
        DownloadError::from(e)
    })?;

    let path = pick_artifact(staging.path()).await?;
    let bytes = tokio::fs::read(&path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or(DownloadError::FileNotFound)?;

    info!("Downloaded {} ({} bytes)", file_name, bytes.len());
    Ok(StagedArtifact {
        path,
        file_name,
        bytes,
    })
}

/// Picks the produced file among the regular files directly inside `staging`.
///
/// Partial leftovers are skipped. Among the rest the most recently modified file wins,
/// ties going to the smallest name.
async fn pick_artifact(staging: &Path) -> Result<PathBuf, DownloadError> {
    let mut candidates: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(staging).await?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            debug!("Skipping partial file {}", name);
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, name, entry.path()));
    }

    if candidates.len() > 1 {
        warn!("{} files in the staging directory, keeping the newest", candidates.len());
    }

    candidates
        .into_iter()
        .max_by(|a, b| match a.0.cmp(&b.0) {
            Ordering::Equal => b.1.cmp(&a.1),
            other => other,
        })
        .map(|(_, _, path)| path)
        .ok_or(DownloadError::FileNotFound)
}
