//! Fetch the latest release of 'yt-dlp' from a GitHub repository.

use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::fetcher::deps::{Asset, Release, WantedRelease};
use crate::utils::platform::{Architecture, Platform};

/// Name of the checksum manifest published with every `yt-dlp` release.
pub const CHECKSUMS_ASSET: &str = "SHA2-256SUMS";

/// The GitHub fetcher is responsible for fetching the `yt-dlp` release asset for the
/// current platform and architecture.
///
/// # Example
///
/// ```rust, no_run
/// # use vidgrab_extractor::fetcher::deps::youtube::GitHubFetcher;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = GitHubFetcher::new("yt-dlp", "yt-dlp");
///
/// let release = fetcher.fetch_release(None).await?;
/// release.download("libs/yt-dlp").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct GitHubFetcher {
    /// The owner of the repository.
    pub owner: String,
    /// The name of the repository.
    pub repo: String,
}

impl GitHubFetcher {
    /// Create a new fetcher for the given repository.
    pub fn new(owner: impl AsRef<str>, repo: impl AsRef<str>) -> Self {
        Self {
            owner: owner.as_ref().to_string(),
            repo: repo.as_ref().to_string(),
        }
    }

    /// Fetch the latest release asset for the current platform and architecture.
    pub async fn fetch_release(&self, auth_token: Option<String>) -> Result<WantedRelease> {
        self.fetch_release_for_platform(Platform::detect(), Architecture::detect(), auth_token)
            .await
    }

    /// Fetch the latest release asset for the given platform and architecture.
    pub async fn fetch_release_for_platform(
        &self,
        platform: Platform,
        architecture: Architecture,
        auth_token: Option<String>,
    ) -> Result<WantedRelease> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Fetching latest release of {}/{} for {}/{}",
            self.owner,
            self.repo,
            platform,
            architecture
        );

        let url = format!(
            "https://api.github.com/repos/{}/{}/releases/latest",
            self.owner, self.repo
        );
        let json = Fetcher::new(url).fetch_json(auth_token).await?;
        let release: Release = serde_json::from_value(json)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Found release {} with {} assets", release.tag_name, release.assets.len());

        let asset = Self::select_asset(&release.assets, &platform, &architecture)
            .ok_or(Error::Github(platform, architecture))?;

        let checksums_url = release
            .assets
            .iter()
            .find(|candidate| candidate.name == CHECKSUMS_ASSET)
            .map(|candidate| candidate.download_url.clone());

        Ok(WantedRelease {
            url: asset.download_url.clone(),
            name: asset.name.clone(),
            checksums_url,
        })
    }

    /// Select the correct asset for the given platform and architecture.
    pub fn select_asset<'a>(
        assets: &'a [Asset],
        platform: &Platform,
        architecture: &Architecture,
    ) -> Option<&'a Asset> {
        let name = Self::asset_name(platform, architecture)?;
        assets.iter().find(|asset| asset.name == name)
    }

    /// The name of the standalone binary published for the given platform and architecture.
    pub fn asset_name(platform: &Platform, architecture: &Architecture) -> Option<&'static str> {
        match (platform, architecture) {
            (Platform::Windows, Architecture::X86) => Some("yt-dlp_x86.exe"),
            (Platform::Windows, Architecture::Aarch64) => Some("yt-dlp_arm64.exe"),
            (Platform::Windows, _) => Some("yt-dlp.exe"),

            (Platform::Mac, _) => Some("yt-dlp_macos"),

            (Platform::Linux, Architecture::X64) => Some("yt-dlp_linux"),
            (Platform::Linux, Architecture::Armv7l) => Some("yt-dlp_linux_armv7l"),
            (Platform::Linux, Architecture::Aarch64) => Some("yt-dlp_linux_aarch64"),
            (Platform::Linux, _) => Some("yt-dlp"),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            download_url: format!("https://github.com/yt-dlp/yt-dlp/releases/download/2025.01.01/{name}"),
        }
    }

    #[test]
    fn selects_the_platform_binary() {
        let assets = vec![
            asset("yt-dlp"),
            asset("yt-dlp.exe"),
            asset("yt-dlp_linux"),
            asset("yt-dlp_linux_aarch64"),
            asset("yt-dlp_macos"),
            asset(CHECKSUMS_ASSET),
        ];

        let linux = GitHubFetcher::select_asset(&assets, &Platform::Linux, &Architecture::X64);
        assert_eq!(linux.map(|a| a.name.as_str()), Some("yt-dlp_linux"));

        let arm = GitHubFetcher::select_asset(&assets, &Platform::Linux, &Architecture::Aarch64);
        assert_eq!(arm.map(|a| a.name.as_str()), Some("yt-dlp_linux_aarch64"));

        let mac = GitHubFetcher::select_asset(&assets, &Platform::Mac, &Architecture::Aarch64);
        assert_eq!(mac.map(|a| a.name.as_str()), Some("yt-dlp_macos"));

        let windows = GitHubFetcher::select_asset(&assets, &Platform::Windows, &Architecture::X64);
        assert_eq!(windows.map(|a| a.name.as_str()), Some("yt-dlp.exe"));
    }

    #[test]
    fn unknown_platform_has_no_asset() {
        let assets = vec![asset("yt-dlp")];
        let platform = Platform::Unknown("haiku".to_string());

        assert!(GitHubFetcher::select_asset(&assets, &platform, &Architecture::X64).is_none());
    }
}
