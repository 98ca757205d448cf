//! Inference configuration and input validation.

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::modules::aligner::MaskPolicy;
use crate::modules::superres::SuperResMode;

/// Configuration for one lipsync inference run.
///
/// `height`/`width` default to the denoiser's native sample size multiplied
/// by the codec's spatial downsampling factor when left unset.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Chunk window length N: frames processed per diffusion pass
    pub num_frames: usize,
    /// Output video frame rate
    pub video_fps: usize,
    /// Audio sample rate of the target track
    pub audio_sample_rate: usize,
    /// Working height in pixels (must equal `width`, divisible by 8)
    pub height: Option<usize>,
    /// Working width in pixels
    pub width: Option<usize>,
    /// Number of denoising steps
    pub num_inference_steps: usize,
    /// Classifier-free guidance scale; guidance is active iff > 1.0
    pub guidance_scale: f32,
    /// Scheduler-specific eta, forwarded only if the scheduler accepts it
    pub eta: f32,
    /// Inpainting mask policy, forwarded to the face aligner
    pub mask: MaskPolicy,
    /// Invoke the progress callback every this many steps
    pub callback_steps: usize,
    /// Optional super-resolution variant applied during restoration
    pub superres: SuperResMode,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            num_frames: 16,
            video_fps: 25,
            audio_sample_rate: 16000,
            height: None,
            width: None,
            num_inference_steps: 20,
            guidance_scale: 1.5,
            eta: 0.0,
            mask: MaskPolicy::FixMask,
            callback_steps: 1,
            superres: SuperResMode::None,
        }
    }
}

impl InferenceConfig {
    /// Whether classifier-free guidance is active for this configuration.
    pub fn do_classifier_free_guidance(&self) -> bool {
        self.guidance_scale > 1.0
    }

    /// Resolve the working resolution, falling back to the model's native
    /// size, and validate it. Fails before any tensor is allocated.
    pub fn resolve_resolution(
        &self,
        native_sample_size: usize,
        downsample_factor: usize,
    ) -> Result<(usize, usize), PipelineError> {
        let height = self.height.unwrap_or(native_sample_size * downsample_factor);
        let width = self.width.unwrap_or(native_sample_size * downsample_factor);

        if height != width {
            return Err(PipelineError::UnequalDimensions { height, width });
        }
        if height % 8 != 0 || width % 8 != 0 {
            return Err(PipelineError::NotDivisibleBy8 { height, width });
        }
        Ok((height, width))
    }

    /// Validate per-run parameters that do not depend on the model.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.callback_steps == 0 {
            return Err(PipelineError::InvalidCallbackSteps(self.callback_steps));
        }
        if self.num_frames == 0 {
            return Err(PipelineError::InvalidNumFrames(self.num_frames));
        }
        if self.num_inference_steps == 0 {
            return Err(PipelineError::InvalidInferenceSteps(self.num_inference_steps));
        }
        Ok(())
    }
}

/// Input and output locations for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source video
    pub video_path: PathBuf,
    /// Target audio track
    pub audio_path: PathBuf,
    /// Destination for the muxed result
    pub video_out_path: PathBuf,
    /// Reserved: explicit mask video. Masking is currently policy-driven.
    pub video_mask_path: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
        video_out_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            audio_path: audio_path.into(),
            video_out_path: video_out_path.into(),
            video_mask_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolution_from_model() {
        let config = InferenceConfig::default();
        let (h, w) = config.resolve_resolution(32, 8).unwrap();
        assert_eq!((h, w), (256, 256));
    }

    #[test]
    fn explicit_resolution_wins() {
        let config = InferenceConfig {
            height: Some(512),
            width: Some(512),
            ..Default::default()
        };
        let (h, w) = config.resolve_resolution(32, 8).unwrap();
        assert_eq!((h, w), (512, 512));
    }

    #[test]
    fn unequal_dimensions_rejected() {
        let config = InferenceConfig {
            height: Some(256),
            width: Some(320),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_resolution(32, 8),
            Err(PipelineError::UnequalDimensions { .. })
        ));
    }

    #[test]
    fn non_multiple_of_8_rejected() {
        let config = InferenceConfig {
            height: Some(260),
            width: Some(260),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_resolution(32, 8),
            Err(PipelineError::NotDivisibleBy8 { .. })
        ));
    }

    #[test]
    fn zero_callback_steps_rejected() {
        let config = InferenceConfig {
            callback_steps: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidCallbackSteps(0))
        ));
    }

    #[test]
    fn zero_num_frames_rejected() {
        let config = InferenceConfig {
            num_frames: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidNumFrames(0))
        ));
    }

    #[test]
    fn zero_inference_steps_rejected() {
        let config = InferenceConfig {
            num_inference_steps: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidInferenceSteps(0))
        ));
    }

    #[test]
    fn guidance_active_only_above_one() {
        let mut config = InferenceConfig::default();
        config.guidance_scale = 1.0;
        assert!(!config.do_classifier_free_guidance());
        config.guidance_scale = 1.5;
        assert!(config.do_classifier_free_guidance());
    }
}
