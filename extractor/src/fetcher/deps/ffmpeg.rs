//! Fetch the latest release of 'ffmpeg' from static builds.

use crate::error::{Error, Result};
use crate::fetcher::deps::{Asset, WantedRelease};
use crate::utils;
use crate::utils::file_system;
use crate::utils::platform::{Architecture, Platform};
use std::fmt;
use std::path::{Path, PathBuf};

/// URL templates for static builds, per platform and architecture.
struct Url;

impl Url {
    fn windows() -> &'static str {
        "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip"
    }

    fn macos_intel() -> &'static str {
        "https://www.osxexperts.net/ffmpeg71intel.zip"
    }

    fn macos_arm() -> &'static str {
        "https://www.osxexperts.net/ffmpeg71arm.zip"
    }

    fn linux(arch: &str) -> String {
        format!(
            "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-{}-static.tar.xz",
            arch
        )
    }
}

/// The ffmpeg fetcher selects the static build for the current platform and architecture,
/// and extracts the binary from the downloaded archive.
///
/// # Example
///
/// ```rust, no_run
/// # use vidgrab_extractor::fetcher::deps::ffmpeg::BuildFetcher;
/// # use std::path::PathBuf;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = BuildFetcher::new();
///
/// let release = fetcher.fetch_binary().await?;
/// let archive = PathBuf::from("libs").join(&release.name);
/// release.download(&archive).await?;
///
/// let ffmpeg = fetcher.extract_binary(archive).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct BuildFetcher;

impl BuildFetcher {
    /// Create a new fetcher for ffmpeg.
    pub fn new() -> Self {
        Self
    }

    /// Select the ffmpeg build for the current platform and architecture.
    pub async fn fetch_binary(&self) -> Result<WantedRelease> {
        let platform = Platform::detect();
        let architecture = Architecture::detect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Fetching ffmpeg binary for platform: {}, architecture: {}",
            platform,
            architecture
        );

        let asset = self
            .select_asset(&platform, &architecture)
            .ok_or(Error::Binary(platform, architecture))?;

        Ok(WantedRelease {
            url: asset.download_url,
            name: asset.name,
            checksums_url: None,
        })
    }

    /// Select the ffmpeg archive for the given platform and architecture.
    pub fn select_asset(&self, platform: &Platform, architecture: &Architecture) -> Option<Asset> {
        let url = match (platform, architecture) {
            (Platform::Windows, _) => Url::windows().to_string(),

            (Platform::Mac, Architecture::X64) => Url::macos_intel().to_string(),
            (Platform::Mac, Architecture::Aarch64) => Url::macos_arm().to_string(),

            (Platform::Linux, Architecture::X64) => Url::linux("amd64"),
            (Platform::Linux, Architecture::X86) => Url::linux("i686"),
            (Platform::Linux, Architecture::Armv7l) => Url::linux("armhf"),
            (Platform::Linux, Architecture::Aarch64) => Url::linux("arm64"),

            _ => return None,
        };

        let name = url.split('/').next_back()?.to_string();
        Some(Asset {
            name,
            download_url: url,
        })
    }

    /// Extract the ffmpeg binary from the downloaded archive.
    /// The binary is placed next to the archive; the archive and its unpacked tree are removed.
    pub async fn extract_binary(&self, archive: impl AsRef<Path> + fmt::Debug) -> Result<PathBuf> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Extracting ffmpeg binary from archive: {:?}", archive);

        let archive = archive.as_ref().to_path_buf();
        let archive_name = file_system::try_name(&archive)?;
        let destination = archive.with_file_name(format!("{}.unpacked", archive_name));

        if archive_name.ends_with(".zip") {
            file_system::extract_zip(&archive, &destination).await?;
        } else if archive_name.ends_with(".tar.xz") {
            file_system::extract_tar_xz(&archive, &destination).await?;
        } else {
            return Err(Error::Path(format!("Unsupported archive: {}", archive_name)));
        }

        let binary_name = utils::find_executable("ffmpeg");
        let executable = find_file(&destination, &binary_name)?.ok_or_else(|| {
            Error::Path(format!("{} not found in {}", binary_name, archive_name))
        })?;

        let binary = file_system::try_parent(&archive)?.join(&binary_name);
        tokio::fs::copy(&executable, &binary).await?;

        tokio::fs::remove_dir_all(&destination).await?;
        tokio::fs::remove_file(&archive).await?;

        file_system::set_executable(&binary)?;

        Ok(binary)
    }
}

/// Searches `root` depth-first for a regular file called `name`.
fn find_file(root: &Path, name: &str) -> Result<Option<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];

    while let Some(directory) = pending.pop() {
        for entry in std::fs::read_dir(&directory)? {
            let path = entry?.path();

            if path.is_dir() {
                pending.push(path);
            } else if path.file_name().is_some_and(|file| file == name) {
                return Ok(Some(path));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_a_build_per_platform() {
        let fetcher = BuildFetcher::new();

        let linux = fetcher
            .select_asset(&Platform::Linux, &Architecture::Aarch64)
            .unwrap();
        assert_eq!(linux.name, "ffmpeg-release-arm64-static.tar.xz");

        let windows = fetcher
            .select_asset(&Platform::Windows, &Architecture::X64)
            .unwrap();
        assert_eq!(windows.name, "ffmpeg-release-essentials.zip");

        assert!(
            fetcher
                .select_asset(&Platform::Mac, &Architecture::Armv7l)
                .is_none()
        );
    }

    #[test]
    fn finds_the_binary_in_a_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ffmpeg-7.1-amd64-static").join("bin");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("ffprobe"), b"").unwrap();
        std::fs::write(nested.join("ffmpeg"), b"").unwrap();

        let found = find_file(dir.path(), "ffmpeg").unwrap();
        assert_eq!(found, Some(nested.join("ffmpeg")));
        assert_eq!(find_file(dir.path(), "missing").unwrap(), None);
    }
}
