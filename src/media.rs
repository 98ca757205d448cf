//! Media I/O boundary and the ffmpeg mux step.
//!
//! Demux/decode and encode of intermediate artifacts live behind [`MediaIo`];
//! the final remux of silent video plus trimmed audio shells out to ffmpeg,
//! which must be present on the host before any heavy computation starts.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

use crate::modules::aligner::VideoFrame;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found on PATH")]
    FfmpegNotFound,

    #[error("ffmpeg exited with status {status}: {stderr}")]
    FfmpegFailed { status: i32, stderr: String },

    #[error("failed to read media from {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write media to {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Video/audio file access for the pipeline's inputs and intermediate
/// artifacts.
pub trait MediaIo {
    fn read_video(&self, path: &Path) -> Result<Vec<VideoFrame>, MediaError>;

    fn read_audio(&self, path: &Path) -> Result<Vec<f32>, MediaError>;

    fn write_video(
        &self,
        path: &Path,
        frames: &[VideoFrame],
        fps: usize,
    ) -> Result<(), MediaError>;

    fn write_audio(
        &self,
        path: &Path,
        samples: &[f32],
        sample_rate: usize,
    ) -> Result<(), MediaError>;
}

/// Final mux of a silent video and an audio track into one container.
pub trait Muxer {
    /// Fail fast if the external encoder is unavailable.
    fn ensure_available(&self) -> Result<(), MediaError>;

    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<(), MediaError>;
}

/// Muxer backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    video_codec: String,
    audio_codec: String,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }

    pub fn with_codecs(video_codec: impl Into<String>, audio_codec: impl Into<String>) -> Self {
        Self {
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for FfmpegMuxer {
    fn ensure_available(&self) -> Result<(), MediaError> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        Ok(())
    }

    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<(), MediaError> {
        debug!(?video, ?audio, ?out, "muxing final video");
        let output = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-nostdin", "-i"])
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", &self.video_codec, "-c:a", &self.audio_codec])
            .args(["-q:v", "0", "-q:a", "0"])
            .arg(out)
            .output()?;

        if !output.status.success() {
            return Err(MediaError::FfmpegFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        info!(?out, "wrote muxed video");
        Ok(())
    }
}

/// Scoped scratch directory for the intermediate silent-video and audio-only
/// artifacts. Removed on drop on every exit path, success or failure.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self, MediaError> {
        let dir = TempDir::with_prefix("lipsync-")?;
        debug!(path = ?dir.path(), "created scratch directory");
        Ok(Self { dir })
    }

    pub fn silent_video_path(&self) -> PathBuf {
        self.dir.path().join("video.mp4")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.path().join("audio.wav")
    }
}
