//! FFmpeg `-progress pipe:2` parsing.

/// A single progress snapshot parsed from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub fps: f64,
    pub out_time_ms: i64,
    pub out_time: String,
    pub speed: f64,
    pub is_complete: bool,
}
