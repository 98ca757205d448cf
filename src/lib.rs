//! Lip-synchronized video generation via audio-conditioned latent diffusion.
//!
//! Given a source video and a target audio track, the engine replaces the
//! lower-face region of each frame with content generated by a conditional
//! diffusion denoiser, then composites the result back into the original
//! frame geometry:
//!
//! 1. **Face extraction**: detect and align a face crop per frame, keeping
//!    the bounding box and affine transform for restoration.
//! 2. **Audio features**: one embedding per output frame (when the denoiser
//!    carries audio conditioning).
//! 3. **Windowing**: both sequences are cut into fixed-length chunks; a
//!    trailing partial chunk is dropped, never padded.
//! 4. **Per chunk**: assemble noise / mask / masked-image / reference
//!    latents, run the iterative denoising loop with optional
//!    classifier-free guidance, decode, and alpha-composite inside the mask.
//! 5. **Restoration**: optionally super-resolve, resize to the bounding box,
//!    and inverse-warp each patch into its original frame; trim the audio to
//!    the output duration and mux with ffmpeg.
//!
//! Model internals (denoiser, codec, audio encoder, face alignment, super
//! resolution, media codecs) live behind boundary traits in [`modules`] and
//! [`media`]; this crate owns the orchestration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lipsync_burn::{InferenceConfig, LipsyncPipeline, NoiseGenerator, RunRequest};
//!
//! let mut pipeline = LipsyncPipeline::builder(device)
//!     .with_aligner(aligner)
//!     .with_codec(vae)
//!     .with_denoiser(unet)
//!     .with_scheduler(scheduler)
//!     .with_audio_encoder(whisper)
//!     .with_media(media)
//!     .with_muxer(Box::new(FfmpegMuxer::new()))
//!     .build()?;
//!
//! let report = pipeline.run(
//!     &RunRequest::new("face.mp4", "speech.wav", "synced.mp4"),
//!     &InferenceConfig::default(),
//!     &mut NoiseGenerator::from_seed(42),
//!     None,
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod latent;
pub mod media;
pub mod modules;
pub mod noise;
pub mod pipeline;
pub mod scheduler;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use config::{InferenceConfig, RunRequest};
pub use error::{AlignerError, CollaboratorError, PipelineError};
pub use media::{FfmpegMuxer, MediaError, MediaIo, Muxer};
pub use modules::aligner::{FaceAligner, MaskPolicy, VideoFrame};
pub use modules::audio::AudioFeatureEncoder;
pub use modules::codec::LatentCodec;
pub use modules::denoiser::Denoiser;
pub use modules::superres::{SuperResMode, SuperResolver, SuperResolvers};
pub use noise::NoiseGenerator;
pub use pipeline::{
    DenoiseProgress, LipsyncPipeline, LipsyncPipelineBuilder, PipelineBuildError,
    ProgressCallback, RunReport,
};
pub use scheduler::{EulerScheduler, NoiseScheduler, StepOptions};
pub use window::WindowPlan;
