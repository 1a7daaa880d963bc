//! Narrow FFmpeg CLI wrapper used by `liveframe-comfy` to normalize render
//! outputs into the cache's fixed `video.mp4` / `thumb.jpg` pair.
//!
//! Provides type-safe FFmpeg command building, progress parsing from
//! `-progress pipe:2`, and cancellation/timeout support via tokio.

pub mod command;
pub mod error;
pub mod progress;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use progress::FfmpegProgress;
pub use thumbnail::generate_thumbnail;
pub use transcode::transcode_to_mp4;
