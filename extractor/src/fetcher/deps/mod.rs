//! The installers for the required binaries.

use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::fetcher::deps::ffmpeg::BuildFetcher;
use crate::fetcher::deps::youtube::GitHubFetcher;
use crate::utils::file_system;
use crate::{ternary, utils};
use derive_more::Constructor;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod ffmpeg;
pub mod youtube;

/// Downloads the binaries into `destination`, creating it when needed.
#[derive(Constructor, Clone, Debug)]
pub struct LibraryInstaller {
    pub destination: PathBuf,
}

/// Where the two managed binaries live.
#[derive(Constructor, Clone, Debug, PartialEq)]
pub struct Libraries {
    pub youtube: PathBuf,
    pub ffmpeg: PathBuf,
}

impl LibraryInstaller {
    /// Installs the latest upstream `yt-dlp` release for this platform, checksum verified.
    ///
    /// `GITHUB_TOKEN` is used for the release lookup when set.
    pub async fn install_youtube(&self, custom_name: Option<String>) -> Result<PathBuf> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Installing yt-dlp into {}", self.destination.display());

        file_system::create_dir(&self.destination)?;

        let name = custom_name.unwrap_or_else(|| "yt-dlp".to_string());
        let path = self.destination.join(utils::find_executable(&name));

        // Anonymous API calls are rate limited per address.
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty());
        let release = GitHubFetcher::new("yt-dlp", "yt-dlp")
            .fetch_release(token)
            .await?;
        release.download(&path).await?;
        file_system::set_executable(&path)?;

        Ok(path)
    }

    /// Installs a static `ffmpeg` build, unpacked from its release archive.
    pub async fn install_ffmpeg(&self, custom_name: Option<String>) -> Result<PathBuf> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Installing ffmpeg into {}", self.destination.display());

        file_system::create_dir(&self.destination)?;

        let fetcher = BuildFetcher::new();
        let release = fetcher.fetch_binary().await?;

        let archive = self.destination.join(&release.name);
        release.download(&archive).await?;
        let path = fetcher.extract_binary(archive).await?;

        match custom_name {
            Some(name) => {
                let renamed = self.destination.join(utils::find_executable(&name));
                std::fs::rename(&path, &renamed)?;
                Ok(renamed)
            }
            None => Ok(path),
        }
    }
}

impl Libraries {
    /// The default layout: both binaries directly inside `directory`.
    pub fn in_dir(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();

        Self::new(
            directory.join(utils::find_executable("yt-dlp")),
            directory.join(utils::find_executable("ffmpeg")),
        )
    }

    /// Install every missing binary.
    pub async fn install_dependencies(&self) -> Result<Self> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Installing required dependencies");

        let youtube = self.install_youtube().await?;
        let ffmpeg = self.install_ffmpeg().await?;

        Ok(Self::new(youtube, ffmpeg))
    }

    /// Install yt-dlp, unless it is already there.
    pub async fn install_youtube(&self) -> Result<PathBuf> {
        if self.youtube.exists() {
            return Ok(self.youtube.clone());
        }

        let parent = file_system::try_parent(&self.youtube)?;
        let installer = LibraryInstaller::new(parent);

        let name = utils::find_executable("yt-dlp");
        let file_name = file_system::try_name(&self.youtube)?;

        let custom_name = ternary!(file_name == name, None, Some(file_name));
        installer.install_youtube(custom_name).await
    }

    /// Install ffmpeg, unless it is already there.
    pub async fn install_ffmpeg(&self) -> Result<PathBuf> {
        if self.ffmpeg.exists() {
            return Ok(self.ffmpeg.clone());
        }

        let parent = file_system::try_parent(&self.ffmpeg)?;
        let installer = LibraryInstaller::new(parent);

        let name = utils::find_executable("ffmpeg");
        let file_name = file_system::try_name(&self.ffmpeg)?;

        let custom_name = ternary!(file_name == name, None, Some(file_name));
        installer.install_ffmpeg(custom_name).await
    }
}

/// The part of a GitHub release the installer reads.
#[derive(Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// A release asset selected for the current platform.
#[derive(Debug, Clone)]
pub struct WantedRelease {
    pub url: String,
    pub name: String,
    /// The URL of a `sha256sum`-style manifest covering the asset, if the release publishes one.
    pub checksums_url: Option<String>,
}

impl WantedRelease {
    /// Download the release asset to the given destination, verifying it against the
    /// checksum manifest when there is one.
    ///
    /// # Errors
    ///
    /// This function will return an error if the asset could not be downloaded, written to
    /// the destination, or if its digest does not match. A mismatching file is removed.
    pub async fn download(&self, destination: impl AsRef<Path> + fmt::Debug) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Downloading asset from {} to {}",
            self.url,
            destination.as_ref().display()
        );

        Fetcher::new(&self.url).fetch_asset(&destination).await?;

        let Some(checksums_url) = &self.checksums_url else {
            return Ok(());
        };

        let manifest = Fetcher::new(checksums_url).fetch_text().await?;
        let Some(expected) = expected_digest(&manifest, &self.name) else {
            #[cfg(feature = "tracing")]
            tracing::warn!("{} is not listed in the checksum manifest", self.name);
            return Ok(());
        };

        let actual = file_system::sha256_hex(&destination).await?;
        if actual != expected {
            tokio::fs::remove_file(destination.as_ref()).await?;

            return Err(Error::Checksum {
                name: self.name.clone(),
                expected,
                actual,
            });
        }

        Ok(())
    }
}

/// Looks up the digest of `name` in a `sha256sum`-style manifest.
pub fn expected_digest(manifest: &str, name: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let (digest, file) = line.trim().split_once(char::is_whitespace)?;
        // `sha256sum -b` marks binary entries with a leading '*'.
        let file = file.trim().trim_start_matches('*');

        ternary!(file == name, Some(digest.to_lowercase()), None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
0f4cfa8b2f2b3e3e4a1c0de7a7b1f1b19e5e8cbd1c9f3a1e4b7d6c5a4f3e2d1c  yt-dlp
AB12CD34EF56AB12CD34EF56AB12CD34EF56AB12CD34EF56AB12CD34EF56AB12 *yt-dlp_linux
";

    #[test]
    fn finds_the_digest_of_an_asset() {
        assert_eq!(
            expected_digest(MANIFEST, "yt-dlp").as_deref(),
            Some("0f4cfa8b2f2b3e3e4a1c0de7a7b1f1b19e5e8cbd1c9f3a1e4b7d6c5a4f3e2d1c")
        );
        assert_eq!(
            expected_digest(MANIFEST, "yt-dlp_linux").as_deref(),
            Some("ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12")
        );
        assert_eq!(expected_digest(MANIFEST, "yt-dlp_macos"), None);
    }

    #[test]
    fn default_layout_uses_platform_names() {
        let libraries = Libraries::in_dir("libs");

        assert_eq!(
            libraries.youtube,
            PathBuf::from("libs").join(utils::find_executable("yt-dlp"))
        );
        assert_eq!(
            libraries.ffmpeg,
            PathBuf::from("libs").join(utils::find_executable("ffmpeg"))
        );
    }

    #[tokio::test]
    async fn existing_binaries_are_not_reinstalled() {
        let dir = tempfile::tempdir().unwrap();
        let libraries = Libraries::in_dir(dir.path());
        std::fs::write(&libraries.youtube, b"#!/bin/sh\n").unwrap();
        std::fs::write(&libraries.ffmpeg, b"#!/bin/sh\n").unwrap();

        let installed = libraries.install_dependencies().await.unwrap();
        assert_eq!(installed, libraries);
    }
}
