use crate::error::{DownloadError, ExtractionError};
use crate::metadata::{self, LookupResult};
use crate::orchestrator::{self, StagedArtifact};
use crate::progress::{DownloadState, ProgressPipeline, StateSink};
use log::{debug, error};
use std::path::Path;
use vidgrab_extractor::Extractor;

/// The state of one user session: at most one lookup and one download at a time.
///
/// A new search resets everything. A download runs against the current lookup and,
/// on success, leaves its artifact here until the next search or download.
#[derive(Debug, Default)]
pub struct Session {
    current_url: Option<String>,
    lookup: Option<LookupResult>,
    download: DownloadState,
    artifact: Option<StagedArtifact>,
    in_flight: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn lookup(&self) -> Option<&LookupResult> {
        self.lookup.as_ref()
    }

    pub fn download_state(&self) -> &DownloadState {
        &self.download
    }

    pub fn artifact(&self) -> Option<&StagedArtifact> {
        self.artifact.as_ref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Replaces the current lookup with the metadata of `url`.
    pub async fn search(
        &mut self,
        service: &dyn Extractor,
        url: &str,
    ) -> Result<&LookupResult, ExtractionError> {
        if self.in_flight {
            return Err(ExtractionError::Busy);
        }

        let outcome = metadata::fetch(service, url).await;
        self.finish_search(url, outcome)
    }

    /// Stores the outcome of a lookup fetched without holding the session.
    ///
    /// Everything from the previous search is dropped, even when the lookup failed. A
    /// download that started while the lookup ran wins: the outcome is discarded and
    /// [`ExtractionError::Busy`] is returned.
    pub fn finish_search(
        &mut self,
        url: &str,
        outcome: Result<LookupResult, ExtractionError>,
    ) -> Result<&LookupResult, ExtractionError> {
        if self.in_flight {
            return Err(ExtractionError::Busy);
        }

        *self = Self::default();
        let lookup = outcome?;
        self.current_url = Some(url.trim().to_string());
        Ok(self.lookup.insert(lookup))
    }

    /// Claims the download slot for the current lookup and returns the URL to fetch.
    pub fn begin_download(&mut self) -> Result<String, DownloadError> {
        if self.in_flight {
            return Err(DownloadError::Busy);
        }
        let url = self
            .lookup
            .as_ref()
            .map(|lookup| lookup.source_url.clone())
            .ok_or(DownloadError::NoLookup)?;

        self.in_flight = true;
        self.artifact = None;
        self.download = DownloadState::Idle;
        Ok(url)
    }

    /// Records the outcome of the download started by [`Session::begin_download`] and
    /// releases the slot.
    pub fn finish_download<S: StateSink>(
        &mut self,
        pipeline: &mut ProgressPipeline<S>,
        outcome: Result<StagedArtifact, DownloadError>,
    ) -> Result<&StagedArtifact, DownloadError> {
        self.in_flight = false;

        match outcome {
            Ok(artifact) => {
                pipeline.complete(&artifact.path);
                self.download = pipeline.state().clone();
                Ok(self.artifact.insert(artifact))
            }
            Err(e) => {
                error!("Download failed: {}", e);
                pipeline.fail(e.to_string());
                self.download = pipeline.state().clone();
                Err(e)
            }
        }
    }

    /// Runs one download for the current lookup, reporting progress to `sink`.
    pub async fn download<S: StateSink + Send>(
        &mut self,
        service: &dyn Extractor,
        muxer: Option<&Path>,
        sink: S,
    ) -> Result<&StagedArtifact, DownloadError> {
        let url = self.begin_download()?;
        debug!("Starting download of {}", url);

        let mut pipeline = ProgressPipeline::new(sink);
        let outcome = orchestrator::run_download(service, &url, muxer, &mut pipeline).await;
        self.finish_download(&mut pipeline, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::{StubLookup, sample_info};
    use crate::orchestrator::tests::StubDownload;
    use crate::progress::{ProgressSnapshot, StatusPhase};

    #[tokio::test]
    async fn search_stores_one_lookup() {
        let service = StubLookup::answering(sample_info(125.0));
        let mut session = Session::new();

        let lookup = session.search(&service, "https://video.example/a").await.unwrap();
        assert_eq!(lookup.title, "Sample Video");
        assert_eq!(session.current_url(), Some("https://video.example/a"));
        assert!(session.lookup().is_some());
    }

    #[tokio::test]
    async fn failed_search_clears_the_slot() {
        let mut session = Session::new();
        session
            .search(&StubLookup::answering(sample_info(1.0)), "https://video.example/a")
            .await
            .unwrap();

        let err = session
            .search(&StubLookup::failing(), "https://video.example/b")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Service(_)));
        assert_eq!(session.current_url(), None);
        assert!(session.lookup().is_none());
    }

    #[tokio::test]
    async fn download_needs_a_lookup() {
        let mut session = Session::new();
        let service = StubDownload::writing(vec![("a.mp4", "x")]);

        let err = session
            .download(&service, None, Vec::<ProgressSnapshot>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::NoLookup));
    }

    #[tokio::test]
    async fn download_completes_and_keeps_the_artifact() {
        let mut session = Session::new();
        session
            .search(&StubLookup::answering(sample_info(125.0)), "https://video.example/a")
            .await
            .unwrap();

        let service = StubDownload::writing(vec![("Sample_Video.mp4", "bytes")]);
        let mut snapshots: Vec<ProgressSnapshot> = Vec::new();
        let artifact = session
            .download(&service, None, &mut snapshots)
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "Sample_Video.mp4");

        assert!(matches!(session.download_state(), DownloadState::Complete { .. }));
        assert!(!session.in_flight());
        assert_eq!(session.artifact().map(|a| a.size()), Some(5));

        let phases: Vec<StatusPhase> = snapshots.iter().map(|s| s.phase).collect();
        assert_eq!(phases.first(), Some(&StatusPhase::Starting));
        assert!(phases.contains(&StatusPhase::Merging));
        assert!(matches!(
            snapshots.last().map(|s| &s.state),
            Some(DownloadState::Complete { .. })
        ));
    }

    #[tokio::test]
    async fn failed_download_is_recorded() {
        let mut session = Session::new();
        session
            .search(&StubLookup::answering(sample_info(125.0)), "https://video.example/a")
            .await
            .unwrap();

        let service = StubDownload::writing(Vec::new());
        let err = session
            .download(&service, None, Vec::<ProgressSnapshot>::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "file not found");
        assert_eq!(
            session.download_state(),
            &DownloadState::Failed {
                message: "file not found".to_string()
            }
        );
        assert!(!session.in_flight());
        assert!(session.artifact().is_none());
    }

    #[tokio::test]
    async fn single_flight() {
        let mut session = Session::new();
        session
            .search(&StubLookup::answering(sample_info(125.0)), "https://video.example/a")
            .await
            .unwrap();

        let url = session.begin_download().unwrap();
        assert_eq!(url, "https://video.example/a");
        assert!(matches!(session.begin_download(), Err(DownloadError::Busy)));

        let err = session
            .search(&StubLookup::answering(sample_info(1.0)), "https://video.example/b")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Busy));

        let mut pipeline = ProgressPipeline::new(Vec::<ProgressSnapshot>::new());
        let _ = session.finish_download(&mut pipeline, Err(DownloadError::FileNotFound));
        assert!(session.begin_download().is_ok());
    }

    #[tokio::test]
    async fn lookup_finishing_during_a_download_is_dropped() {
        let mut session = Session::new();
        session
            .search(&StubLookup::answering(sample_info(125.0)), "https://video.example/a")
            .await
            .unwrap();
        session.begin_download().unwrap();

        let fetched = metadata::fetch(
            &StubLookup::answering(sample_info(1.0)),
            "https://video.example/b",
        )
        .await;
        let err = session
            .finish_search("https://video.example/b", fetched)
            .unwrap_err();

        assert!(matches!(err, ExtractionError::Busy));
        assert_eq!(session.current_url(), Some("https://video.example/a"));
        assert!(session.in_flight());
    }
}
