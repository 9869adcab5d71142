use serde::{Deserialize, Serialize};

/// One entry of the `thumbnails` list the service reports for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    /// Higher is better. Entries without one rank last.
    #[serde(default)]
    pub preference: Option<i64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}
