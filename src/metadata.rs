use crate::error::ExtractionError;
use log::{debug, info};
use serde::Serialize;
use vidgrab_extractor::Extractor;
use vidgrab_extractor::model::VideoInfo;

/// Shown in place of a missing title or uploader.
pub const UNKNOWN: &str = "Unknown";
/// Shown in place of a missing duration or view count.
pub const NOT_AVAILABLE: &str = "N/A";

/// The normalized metadata of one looked-up URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub uploader: String,
    pub duration_seconds: Option<u64>,
    pub view_count: Option<u64>,
    pub source_url: String,
}

impl LookupResult {
    pub fn from_info(info: &VideoInfo, source_url: &str) -> Self {
        let title = info
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNKNOWN);

        Self {
            title: title.to_string(),
            thumbnail_url: info.best_thumbnail().map(str::to_string),
            uploader: info.uploader_name().unwrap_or(UNKNOWN).to_string(),
            duration_seconds: info.duration_seconds(),
            view_count: info.view_count,
            source_url: source_url.to_string(),
        }
    }

    pub fn duration_label(&self) -> String {
        duration_label(self.duration_seconds)
    }

    pub fn views_label(&self) -> String {
        views_label(self.view_count)
    }
}

/// Looks up `url` without downloading any media.
pub async fn fetch(service: &dyn Extractor, url: &str) -> Result<LookupResult, ExtractionError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ExtractionError::EmptyUrl);
    }

    let info = service.extract_metadata(url).await.map_err(|e| {
        debug!("Metadata lookup for {} failed: {}", url, e);
        ExtractionError::from(e)
    })?;

    let lookup = LookupResult::from_info(&info, url);
    info!("Found \"{}\" by {}", lookup.title, lookup.uploader);
    Ok(lookup)
}

/// `m:ss` under an hour, `h:mm:ss` from one hour on. Absent or zero gives `N/A`.
pub fn duration_label(seconds: Option<u64>) -> String {
    match seconds {
        None | Some(0) => NOT_AVAILABLE.to_string(),
        Some(total) => {
            let (minutes, seconds) = (total / 60, total % 60);
            let (hours, minutes) = (minutes / 60, minutes % 60);

            if hours > 0 {
                format!("{}:{:02}:{:02}", hours, minutes, seconds)
            } else {
                format!("{}:{:02}", minutes, seconds)
            }
        }
    }
}

/// Thousands separated with `,`. Absent or zero gives `N/A`.
pub fn views_label(views: Option<u64>) -> String {
    match views {
        None | Some(0) => NOT_AVAILABLE.to_string(),
        Some(views) => {
            let digits = views.to_string();
            let mut label = String::with_capacity(digits.len() + digits.len() / 3);

            for (index, digit) in digits.chars().enumerate() {
                if index > 0 && (digits.len() - index) % 3 == 0 {
                    label.push(',');
                }
                label.push(digit);
            }
            label
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vidgrab_extractor::model::options::DownloadOptions;
    use vidgrab_extractor::{ProgressHooks, error};

    /// Answers every lookup with a fixed record and records the URLs it saw.
    pub struct StubLookup {
        pub info: Option<VideoInfo>,
        pub seen: Mutex<Vec<String>>,
    }

    impl StubLookup {
        pub fn answering(info: VideoInfo) -> Self {
            Self {
                info: Some(info),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                info: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Extractor for StubLookup {
        async fn extract_metadata(&self, url: &str) -> error::Result<VideoInfo> {
            self.seen.lock().unwrap().push(url.to_string());
            self.info
                .clone()
                .ok_or_else(|| error::Error::Extraction("[generic] Unsupported URL".to_string()))
        }

        async fn download(
            &self,
            _url: &str,
            _options: &DownloadOptions,
            _hooks: &mut (dyn ProgressHooks + Send),
        ) -> error::Result<()> {
            Ok(())
        }
    }

    pub fn sample_info(duration: f64) -> VideoInfo {
        VideoInfo {
            id: Some("abc123".to_string()),
            title: Some("Sample Video".to_string()),
            thumbnail: Some("https://i.example/abc123.jpg".to_string()),
            uploader: Some("Sample Channel".to_string()),
            duration: Some(duration),
            view_count: Some(1234567),
            ..VideoInfo::default()
        }
    }

    #[tokio::test]
    async fn fetch_normalizes_the_record() {
        let service = StubLookup::answering(sample_info(125.0));

        let lookup = fetch(&service, "  https://video.example/watch?v=abc123 ").await.unwrap();
        assert_eq!(lookup.title, "Sample Video");
        assert_eq!(lookup.duration_seconds, Some(125));
        assert_eq!(lookup.duration_label(), "2:05");
        assert_eq!(lookup.views_label(), "1,234,567");
        assert_eq!(lookup.source_url, "https://video.example/watch?v=abc123");
        assert_eq!(
            service.seen.lock().unwrap().as_slice(),
            ["https://video.example/watch?v=abc123".to_string()]
        );
    }

    #[tokio::test]
    async fn long_videos_get_hours() {
        let service = StubLookup::answering(sample_info(3725.0));

        let lookup = fetch(&service, "https://video.example/long").await.unwrap();
        assert_eq!(lookup.duration_label(), "1:02:05");
    }

    #[tokio::test]
    async fn missing_fields_become_sentinels() {
        let service = StubLookup::answering(VideoInfo::default());

        let lookup = fetch(&service, "https://video.example/bare").await.unwrap();
        assert_eq!(lookup.title, UNKNOWN);
        assert_eq!(lookup.uploader, UNKNOWN);
        assert_eq!(lookup.thumbnail_url, None);
        assert_eq!(lookup.duration_label(), NOT_AVAILABLE);
        assert_eq!(lookup.views_label(), NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn blank_url_never_reaches_the_service() {
        let service = StubLookup::answering(sample_info(1.0));

        let err = fetch(&service, "   ").await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyUrl));
        assert!(service.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_failure_is_an_extraction_error() {
        let err = fetch(&StubLookup::failing(), "https://nope.example").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Service(message) if message.contains("Unsupported URL")
        ));
    }

    #[test]
    fn duration_labels() {
        assert_eq!(duration_label(Some(5)), "0:05");
        assert_eq!(duration_label(Some(60)), "1:00");
        assert_eq!(duration_label(Some(3600)), "1:00:00");
        assert_eq!(duration_label(Some(0)), "N/A");
        assert_eq!(duration_label(None), "N/A");
    }

    #[test]
    fn view_labels() {
        assert_eq!(views_label(Some(7)), "7");
        assert_eq!(views_label(Some(1000)), "1,000");
        assert_eq!(views_label(Some(999_999)), "999,999");
        assert_eq!(views_label(None), "N/A");
    }
}
