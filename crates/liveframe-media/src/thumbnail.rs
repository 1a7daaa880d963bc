//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Default scaled width for extracted thumbnails.
pub const THUMBNAIL_SCALE_WIDTH: u32 = 640;

/// Extract a single representative frame from `video_path`, scaled to
/// [`THUMBNAIL_SCALE_WIDTH`], and write it to `output_path`.
pub async fn generate_thumbnail(video_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    let filter = format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH);

    let cmd = FfmpegCommand::new(video_path, output_path)
        .input_arg("-ss")
        .input_arg("00:00:01.000")
        .single_frame()
        .video_filter(&filter)
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_filter_uses_configured_width() {
        let filter = format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH);
        assert!(filter.contains("640"));
    }
}
