//! Transcoding arbitrary ComfyUI output video containers to `video.mp4`.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Re-encode `input` (any container ffmpeg can demux) to an H.264/yuv420p
/// MP4 at `output`. Used when a render's output file isn't already `.mp4`.
pub async fn transcode_to_mp4(input: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_codec("libx264")
        .pixel_format("yuv420p")
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await
}
