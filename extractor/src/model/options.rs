//! The option bag of one download invocation.

use crate::model::progress;
use std::path::PathBuf;

/// Format selector asking for the best video and audio streams, or the best single stream.
pub const BEST_VIDEO_AND_AUDIO: &str = "bestvideo+bestaudio/best";

/// Options recognized by [`crate::Extractor::download`].
///
/// # Examples
///
/// ```rust
/// # use vidgrab_extractor::model::options::DownloadOptions;
/// let options = DownloadOptions::new("/tmp/staging/%(title)s.%(ext)s")
///     .with_merge_output_format("mp4");
///
/// assert!(options.to_args().contains(&"--merge-output-format".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// Output path template, e.g. `<dir>/%(title)s.%(ext)s`.
    pub output_template: String,
    /// Suppresses the regular console output. Progress lines are still printed, the
    /// post-processing ones on stderr.
    pub quiet: bool,
    /// Suppresses warnings.
    pub no_warnings: bool,
    /// Restricts file names to ASCII characters without spaces or `&`.
    pub restrict_filenames: bool,
    /// The format selector, e.g. [`BEST_VIDEO_AND_AUDIO`].
    pub format_selector: String,
    /// The container used when separate streams are merged.
    pub merge_output_format: Option<String>,
    /// The muxer binary, or the directory holding it.
    pub ffmpeg_location: Option<PathBuf>,
}

impl DownloadOptions {
    /// Creates options writing to the given template, with quiet output,
    /// restricted file names and the best video+audio selector.
    pub fn new(output_template: impl Into<String>) -> Self {
        Self {
            output_template: output_template.into(),
            quiet: true,
            no_warnings: true,
            restrict_filenames: true,
            format_selector: BEST_VIDEO_AND_AUDIO.to_string(),
            merge_output_format: None,
            ffmpeg_location: None,
        }
    }

    /// Sets the merge output container.
    pub fn with_merge_output_format(mut self, format: impl Into<String>) -> Self {
        self.merge_output_format = Some(format.into());
        self
    }

    /// Sets the muxer location, if one was found.
    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    /// Maps the options to `yt-dlp` command line arguments.
    ///
    /// Progress reporting is always enabled, one line per event, so the hooks fire
    /// even in quiet mode.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            self.output_template.clone(),
            "-f".to_string(),
            self.format_selector.clone(),
        ];

        if self.quiet {
            args.push("--quiet".to_string());
        }
        if self.no_warnings {
            args.push("--no-warnings".to_string());
        }
        if self.restrict_filenames {
            args.push("--restrict-filenames".to_string());
        }
        if let Some(format) = &self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(format.clone());
        }
        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().into_owned());
        }

        args.extend([
            "--no-playlist".to_string(),
            "--progress".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            progress::download_template(),
            "--progress-template".to_string(),
            progress::postprocess_template(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|index| args.get(index + 1))
            .map(String::as_str)
    }

    #[test]
    fn maps_every_option() {
        let options = DownloadOptions::new("/tmp/stage/%(title)s.%(ext)s")
            .with_merge_output_format("mp4")
            .with_ffmpeg_location(Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        let args = options.to_args();

        assert_eq!(value_after(&args, "-o"), Some("/tmp/stage/%(title)s.%(ext)s"));
        assert_eq!(value_after(&args, "-f"), Some("bestvideo+bestaudio/best"));
        assert_eq!(value_after(&args, "--merge-output-format"), Some("mp4"));
        assert_eq!(
            value_after(&args, "--ffmpeg-location"),
            Some("/opt/ffmpeg/bin/ffmpeg")
        );
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--no-warnings".to_string()));
        assert!(args.contains(&"--restrict-filenames".to_string()));
        assert!(args.contains(&"--newline".to_string()));
        assert_eq!(
            args.iter().filter(|arg| *arg == "--progress-template").count(),
            2
        );
    }

    #[test]
    fn omits_the_muxer_when_absent() {
        let args = DownloadOptions::new("%(title)s.%(ext)s").to_args();

        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }
}
