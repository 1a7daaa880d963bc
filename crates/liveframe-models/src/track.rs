//! Track descriptors carried on a [`crate::job::Job`], opaque to the core.

use serde::{Deserialize, Serialize};

/// The full track descriptor a client supplies with a render request.
/// Stored verbatim on the `Job` (modulo the `album_art_url` substitution
/// applied when listing history, see `liveframe-storage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album_art_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_video_id: Option<String>,
}

/// The narrow track projection exposed on [`crate::render::RenderStatusResponse`].
/// `album_art_url` carries the history image-URL substitution described in
/// `liveframe-storage`: verbatim for cache-hit jobs, rewritten to the local
/// static path for jobs that staged an input image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderTrackInfo {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub album_art_url: String,
}

impl From<&TrackInfo> for RenderTrackInfo {
    fn from(track: &TrackInfo) -> Self {
        Self {
            track_id: track.track_id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album_art_url: track.album_art_url.clone(),
        }
    }
}
