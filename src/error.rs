//! Error taxonomy for the lipsync inference engine.
//!
//! Configuration and missing-dependency errors are raised before any frame or
//! audio processing starts; collaborator failures abort the whole run.

use thiserror::Error;

use crate::media::MediaError;

/// Failure reported by an external collaborator (codec, denoiser, audio
/// encoder, super-resolver).
#[derive(Debug, Error)]
#[error("{context}: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed
    pub context: &'static str,
    /// Collaborator-reported detail
    pub message: String,
}

impl CollaboratorError {
    pub fn new(context: &'static str, message: impl Into<String>) -> Self {
        Self {
            context,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the face alignment collaborator.
#[derive(Debug, Error)]
pub enum AlignerError {
    /// The detector found no face in the frame.
    #[error("no face detected")]
    NoFace,
    #[error("face alignment failed: {0}")]
    Other(String),
}

/// Top-level error surface of [`crate::pipeline::LipsyncPipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("height and width must be equal but are {height} x {width}")]
    UnequalDimensions { height: usize, width: usize },

    #[error("height and width must be divisible by 8 but are {height} x {width}")]
    NotDivisibleBy8 { height: usize, width: usize },

    #[error("callback_steps must be a positive integer but is {0}")]
    InvalidCallbackSteps(usize),

    #[error("num_frames must be a positive integer but is {0}")]
    InvalidNumFrames(usize),

    #[error("num_inference_steps must be a positive integer but is {0}")]
    InvalidInferenceSteps(usize),

    #[error(
        "denoiser expects {expected} input channels but the latent layout \
         produces {actual} (noisy + mask + masked-image + reference)"
    )]
    ChannelLayoutMismatch { expected: usize, actual: usize },

    #[error("super-resolution mode {mode} selected but no resolver is registered for it")]
    SuperResolverMissing { mode: &'static str },

    #[error("no face detected in frame {frame}")]
    NoFaceDetected { frame: usize },

    #[error("face aligner failed on frame {frame}: {message}")]
    AlignerFailed { frame: usize, message: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("run aborted by progress callback at chunk {chunk}, step {step}: {message}")]
    Aborted {
        chunk: usize,
        step: usize,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Attach a frame index to an aligner failure.
    pub(crate) fn from_aligner(err: AlignerError, frame: usize) -> Self {
        match err {
            AlignerError::NoFace => PipelineError::NoFaceDetected { frame },
            AlignerError::Other(message) => PipelineError::AlignerFailed { frame, message },
        }
    }
}
