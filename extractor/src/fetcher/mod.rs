//! Plain HTTP GETs for the installer in [`deps`].

use crate::error::{Error, Result};
use crate::utils::file_system;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub mod deps;

const AGENT: &str = concat!("vidgrab/", env!("CARGO_PKG_VERSION"));

/// Upper bound for one whole request, body included. An ffmpeg archive is large.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
pub struct Fetcher {
    url: String,
}

impl Fetcher {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: url.as_ref().to_string(),
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
    }

    /// GETs the URL as JSON, sending `auth_token` as a bearer token when given.
    pub async fn fetch_json(&self, auth_token: Option<String>) -> Result<serde_json::Value> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching JSON from {}", self.url);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT));

        if let Some(auth_token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", auth_token))
                .map_err(|e| Error::Header(e.to_string()))?;

            headers.insert(AUTHORIZATION, value);
        }

        let response = self
            .client()?
            .get(&self.url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?;

        let json = response.json().await?;
        Ok(json)
    }

    pub async fn fetch_text(&self) -> Result<String> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching text from {}", self.url);

        let response = self
            .client()?
            .get(&self.url)
            .header(USER_AGENT, AGENT)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Streams the body into `destination`, replacing any previous file.
    pub async fn fetch_asset(&self, destination: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching asset from {} to {:?}", self.url, destination);

        file_system::create_parent_dir(&destination)?;

        let response = self
            .client()?
            .get(&self.url)
            .header(USER_AGENT, AGENT)
            .send()
            .await?
            .error_for_status()?;

        let mut file = file_system::create_file(&destination).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
