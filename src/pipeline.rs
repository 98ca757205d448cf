//! Lipsync inference engine.
//!
//! Composes the face aligner, latent codec, audio encoder, denoiser, noise
//! scheduler, and optional super-resolvers into the end-to-end run:
//! face extraction, audio feature extraction, windowing, per-chunk latent
//! assembly and denoising, decode/composite, affine restoration, and the
//! final mux.

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use tracing::{debug, info};

use crate::config::{InferenceConfig, RunRequest};
use crate::error::{CollaboratorError, PipelineError};
use crate::latent::{
    composite_masked, decode_window_latents, duplicate_for_guidance, encode_window_latents,
    prepare_mask_latents,
};
use crate::media::{MediaIo, Muxer, ScratchDir};
use crate::modules::aligner::{AlignedFace, FaceAligner, FacePatch, VideoFrame};
use crate::modules::audio::AudioFeatureEncoder;
use crate::modules::codec::LatentCodec;
use crate::modules::denoiser::Denoiser;
use crate::modules::superres::{SuperResolver, SuperResolvers};
use crate::noise::NoiseGenerator;
use crate::scheduler::{NoiseScheduler, StepOptions};
use crate::window::WindowPlan;

/// Snapshot handed to the progress callback during denoising.
#[derive(Debug, Clone)]
pub struct DenoiseProgress {
    /// Chunk being denoised (0-indexed)
    pub chunk_index: usize,
    /// Total chunks in this run
    pub num_chunks: usize,
    /// Denoising step within the chunk (0-indexed)
    pub step: usize,
    /// Total steps per chunk
    pub total_steps: usize,
    /// Scheduler timestep at this step
    pub timestep: f32,
}

/// Progress hook. Returning an error aborts the run.
pub type ProgressCallback = Box<dyn Fn(DenoiseProgress) -> Result<(), String> + Send + Sync>;

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Frames in the final video (`num_chunks * num_frames`)
    pub output_frames: usize,
    /// Full windows processed
    pub num_chunks: usize,
    /// Audio samples kept after trimming to the video duration
    pub audio_samples: usize,
}

/// The inference orchestrator.
///
/// Heavy numerical work happens inside the collaborators; this type owns the
/// windowing, latent bookkeeping, the strictly sequential denoising
/// recurrence, and the geometric round-trip back into original frames.
pub struct LipsyncPipeline<B: Backend> {
    aligner: Box<dyn FaceAligner<B>>,
    codec: Box<dyn LatentCodec<B>>,
    denoiser: Box<dyn Denoiser<B>>,
    scheduler: Box<dyn NoiseScheduler<B>>,
    audio_encoder: Option<Box<dyn AudioFeatureEncoder<B>>>,
    super_resolvers: SuperResolvers<B>,
    media: Box<dyn MediaIo>,
    muxer: Box<dyn Muxer>,
    device: B::Device,
}

impl<B: Backend> LipsyncPipeline<B> {
    pub fn builder(device: B::Device) -> LipsyncPipelineBuilder<B> {
        LipsyncPipelineBuilder::new(device)
    }

    /// Run lipsync inference end to end.
    ///
    /// Validation and the external-encoder check happen before any frame or
    /// audio processing; the scratch directory for intermediate artifacts is
    /// removed on every exit path.
    pub fn run(
        &mut self,
        request: &RunRequest,
        config: &InferenceConfig,
        generator: &mut NoiseGenerator,
        callback: Option<&ProgressCallback>,
    ) -> Result<RunReport, PipelineError> {
        config.validate()?;
        self.muxer.ensure_available()?;

        let (height, width) = config.resolve_resolution(
            self.denoiser.sample_size(),
            self.codec.downsample_factor(),
        )?;

        let latent_channels = self.codec.latent_channels();
        // noisy latent + mask + masked-image + reference, concatenated on the
        // channel dimension
        let layout_channels = latent_channels * 3 + 1;
        if self.denoiser.in_channels() != layout_channels {
            return Err(PipelineError::ChannelLayoutMismatch {
                expected: self.denoiser.in_channels(),
                actual: layout_channels,
            });
        }
        // Resolve the configured super-resolution variant up front so a
        // misconfiguration fails before any heavy computation.
        let resolver = self.super_resolvers.select(config.superres)?;

        let frames = self.media.read_video(&request.video_path)?;
        info!(frames = frames.len(), "read source video");
        let faces = self.extract_faces(&frames)?;

        let mut audio_samples = self.media.read_audio(&request.audio_path)?;

        let audio_embeddings = match (&self.audio_encoder, self.denoiser.uses_audio()) {
            (Some(encoder), true) => {
                let features = encoder.features(
                    &audio_samples,
                    config.audio_sample_rate,
                    config.video_fps,
                )?;
                info!(embeddings = features.len(), "extracted audio features");
                Some(features)
            }
            _ => None,
        };

        let plan = WindowPlan::new(
            faces.len(),
            audio_embeddings.as_ref().map(Vec::len),
            config.num_frames,
        );
        info!(
            chunks = plan.num_chunks,
            window = plan.window_len,
            output_frames = plan.output_frames(),
            "planned inference windows"
        );

        self.scheduler.set_timesteps(config.num_inference_steps);
        let timesteps = self.scheduler.timesteps().to_vec();
        let step_options = StepOptions {
            eta: if self.scheduler.accepts_eta() {
                config.eta
            } else {
                0.0
            },
        };

        let latent_height = height / self.codec.downsample_factor();
        let latent_width = width / self.codec.downsample_factor();

        // One noise draw for the whole run, sliced per chunk, so output is
        // reproducible for a fixed seed.
        let all_noise = generator.sample::<B, 5>(
            [
                1,
                latent_channels,
                plan.output_frames(),
                latent_height,
                latent_width,
            ],
            &self.device,
        ) * self.scheduler.init_noise_sigma();

        let do_cfg = config.do_classifier_free_guidance();
        let mut synced_chunks: Vec<Tensor<B, 4>> = Vec::with_capacity(plan.num_chunks);

        for chunk_index in 0..plan.num_chunks {
            let range = plan.chunk_range(chunk_index);
            debug!(chunk = chunk_index, ?range, "denoising chunk");

            let audio_embeds = match &audio_embeddings {
                Some(features) => {
                    let stack: Vec<Tensor<B, 2>> = features[range.clone()].to_vec();
                    let embeds: Tensor<B, 3> = Tensor::stack::<3>(stack, 0);
                    Some(if do_cfg {
                        // classifier-free null branch first, conditional second
                        Tensor::cat(vec![embeds.zeros_like(), embeds], 0)
                    } else {
                        embeds
                    })
                }
                None => None,
            };

            let crops: Vec<Tensor<B, 3>> =
                faces[range.clone()].iter().map(|f| f.crop.clone()).collect();
            let chunk_faces: Tensor<B, 4> = Tensor::stack::<4>(crops, 0);

            let bundle = self
                .aligner
                .prepare_masks(chunk_faces, config.mask)
                .map_err(|e| CollaboratorError::new("face aligner", e.to_string()))?;

            let mask_latents =
                prepare_mask_latents(bundle.masks.clone(), latent_height, latent_width, do_cfg);
            let masked_image_latents = encode_window_latents(
                self.codec.as_ref(),
                bundle.masked_pixel_values.clone(),
                do_cfg,
            )?;
            let reference_latents =
                encode_window_latents(self.codec.as_ref(), bundle.pixel_values.clone(), do_cfg)?;

            let mut latents = all_noise.clone().slice([
                0..1,
                0..latent_channels,
                range.clone(),
                0..latent_height,
                0..latent_width,
            ]);

            let num_warmup_steps = timesteps
                .len()
                .saturating_sub(config.num_inference_steps * self.scheduler.order());

            for (step, &t) in timesteps.iter().enumerate() {
                let latent_model_input = if do_cfg {
                    duplicate_for_guidance(latents.clone())
                } else {
                    latents.clone()
                };
                let latent_model_input = self.scheduler.scale_model_input(latent_model_input, t);
                let latent_model_input = Tensor::cat(
                    vec![
                        latent_model_input,
                        mask_latents.clone(),
                        masked_image_latents.clone(),
                        reference_latents.clone(),
                    ],
                    1,
                );

                let noise_pred =
                    self.denoiser
                        .predict(latent_model_input, t, audio_embeds.as_ref())?;

                let noise_pred = if do_cfg {
                    let halves = noise_pred.chunk(2, 0);
                    let uncond = halves[0].clone();
                    let cond = halves[1].clone();
                    uncond.clone() + (cond - uncond) * config.guidance_scale
                } else {
                    noise_pred
                };

                latents = self.scheduler.step(noise_pred, t, latents, &step_options);

                // Multistep schedulers run sub-steps that should not each
                // produce a visible progress tick.
                let is_last = step == timesteps.len() - 1;
                let past_warmup = step + 1 > num_warmup_steps
                    && (step + 1) % self.scheduler.order() == 0;
                if is_last || past_warmup {
                    if let Some(callback) = callback {
                        if step % config.callback_steps == 0 {
                            callback(DenoiseProgress {
                                chunk_index,
                                num_chunks: plan.num_chunks,
                                step,
                                total_steps: timesteps.len(),
                                timestep: t,
                            })
                            .map_err(|message| PipelineError::Aborted {
                                chunk: chunk_index,
                                step,
                                message,
                            })?;
                        }
                    }
                }
            }

            let decoded = decode_window_latents(self.codec.as_ref(), latents)?;
            synced_chunks.push(composite_masked(
                decoded,
                bundle.pixel_values,
                bundle.masks,
            ));
        }

        let out_frames = if plan.num_chunks > 0 {
            let generated: Tensor<B, 4> = Tensor::cat(synced_chunks, 0);
            self.restore_frames(generated, &faces, &frames, resolver)?
        } else {
            Vec::new()
        };
        info!(frames = out_frames.len(), "restored output frames");

        let keep_samples = (plan.output_frames() as f64 / config.video_fps as f64
            * config.audio_sample_rate as f64) as usize;
        audio_samples.truncate(keep_samples);

        let scratch = ScratchDir::new()?;
        self.media
            .write_video(&scratch.silent_video_path(), &out_frames, config.video_fps)?;
        self.media.write_audio(
            &scratch.audio_path(),
            &audio_samples,
            config.audio_sample_rate,
        )?;
        self.muxer.mux(
            &scratch.silent_video_path(),
            &scratch.audio_path(),
            &request.video_out_path,
        )?;

        Ok(RunReport {
            output_frames: plan.output_frames(),
            num_chunks: plan.num_chunks,
            audio_samples: audio_samples.len(),
        })
    }

    /// Detect and align a face in every frame. A frame with no detectable
    /// face aborts the run with its index.
    fn extract_faces(
        &self,
        frames: &[VideoFrame],
    ) -> Result<Vec<AlignedFace<B>>, PipelineError> {
        let mut faces = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            let face = self
                .aligner
                .align(frame)
                .map_err(|e| PipelineError::from_aligner(e, index))?;
            faces.push(face);
        }
        info!(faces = faces.len(), "aligned face crops");
        Ok(faces)
    }

    /// Paste generated face patches back into the original frames through the
    /// inverse affine transform, optionally super-resolving patches that are
    /// smaller than their target bounding box.
    fn restore_frames(
        &self,
        generated: Tensor<B, 4>,
        faces: &[AlignedFace<B>],
        frames: &[VideoFrame],
        resolver: Option<&dyn SuperResolver<B>>,
    ) -> Result<Vec<VideoFrame>, PipelineError> {
        let [count, channels, patch_h, patch_w] = generated.dims();
        let mut out_frames = Vec::with_capacity(count);

        for index in 0..count {
            let face = &faces[index];
            let target_height = face.bbox.height();
            let target_width = face.bbox.width();

            let mut patch: Tensor<B, 3> = generated
                .clone()
                .slice([index..index + 1, 0..channels, 0..patch_h, 0..patch_w])
                .squeeze::<3>(0);

            let [_, face_h, face_w] = patch.dims();
            if let Some(resolver) = resolver {
                // Upscale only when the generated patch underfills the target
                // region in either dimension.
                if face_h < target_height || face_w < target_width {
                    let scale_h = target_height as f32 / face_h as f32;
                    let scale_w = target_width as f32 / face_w as f32;
                    patch = resolver.enhance(patch, scale_h.max(scale_w))?;
                }
            }

            let resized = interpolate(
                patch.unsqueeze::<4>(),
                [target_height, target_width],
                InterpolateOptions::new(InterpolateMode::Bilinear),
            )
            .squeeze::<3>(0);

            let face_patch = patch_to_bytes(resized)?;
            let out_frame = self
                .aligner
                .paste_back(&frames[index], &face_patch, &face.affine)
                .map_err(|e| PipelineError::from_aligner(e, index))?;
            out_frames.push(out_frame);
        }

        Ok(out_frames)
    }
}

/// Convert a `[C, H, W]` patch in `[-1, 1]` to RGB24 bytes.
fn patch_to_bytes<B: Backend>(patch: Tensor<B, 3>) -> Result<FacePatch, PipelineError> {
    let [channels, height, width] = patch.dims();
    let scaled = (patch / 2.0 + 0.5).clamp(0.0, 1.0) * 255.0;
    let values: Vec<f32> = scaled
        .into_data()
        .to_vec()
        .map_err(|e| CollaboratorError::new("patch conversion", format!("{e:?}")))?;

    let mut data = vec![0u8; height * width * channels];
    for c in 0..channels {
        for y in 0..height {
            for x in 0..width {
                data[(y * width + x) * channels + c] =
                    values[(c * height + y) * width + x].round() as u8;
            }
        }
    }
    Ok(FacePatch {
        data,
        width: width as u32,
        height: height as u32,
    })
}

/// Builder assembling the pipeline from its collaborators.
pub struct LipsyncPipelineBuilder<B: Backend> {
    aligner: Option<Box<dyn FaceAligner<B>>>,
    codec: Option<Box<dyn LatentCodec<B>>>,
    denoiser: Option<Box<dyn Denoiser<B>>>,
    scheduler: Option<Box<dyn NoiseScheduler<B>>>,
    audio_encoder: Option<Box<dyn AudioFeatureEncoder<B>>>,
    super_resolvers: SuperResolvers<B>,
    media: Option<Box<dyn MediaIo>>,
    muxer: Option<Box<dyn Muxer>>,
    device: B::Device,
}

/// Pipeline assembly errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineBuildError {
    #[error("missing required component: {0}")]
    MissingComponent(&'static str),
    #[error("denoiser uses audio conditioning but no audio encoder was provided")]
    MissingAudioEncoder,
}

impl<B: Backend> LipsyncPipelineBuilder<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            aligner: None,
            codec: None,
            denoiser: None,
            scheduler: None,
            audio_encoder: None,
            super_resolvers: SuperResolvers::default(),
            media: None,
            muxer: None,
            device,
        }
    }

    pub fn with_aligner(mut self, aligner: Box<dyn FaceAligner<B>>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_codec(mut self, codec: Box<dyn LatentCodec<B>>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_denoiser(mut self, denoiser: Box<dyn Denoiser<B>>) -> Self {
        self.denoiser = Some(denoiser);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn NoiseScheduler<B>>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_audio_encoder(mut self, encoder: Box<dyn AudioFeatureEncoder<B>>) -> Self {
        self.audio_encoder = Some(encoder);
        self
    }

    pub fn with_gfpgan(mut self, resolver: Box<dyn SuperResolver<B>>) -> Self {
        self.super_resolvers.gfpgan = Some(resolver);
        self
    }

    pub fn with_codeformer(mut self, resolver: Box<dyn SuperResolver<B>>) -> Self {
        self.super_resolvers.codeformer = Some(resolver);
        self
    }

    pub fn with_media(mut self, media: Box<dyn MediaIo>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_muxer(mut self, muxer: Box<dyn Muxer>) -> Self {
        self.muxer = Some(muxer);
        self
    }

    pub fn build(self) -> Result<LipsyncPipeline<B>, PipelineBuildError> {
        let denoiser = self
            .denoiser
            .ok_or(PipelineBuildError::MissingComponent("denoiser"))?;
        if denoiser.uses_audio() && self.audio_encoder.is_none() {
            return Err(PipelineBuildError::MissingAudioEncoder);
        }

        Ok(LipsyncPipeline {
            aligner: self
                .aligner
                .ok_or(PipelineBuildError::MissingComponent("face aligner"))?,
            codec: self
                .codec
                .ok_or(PipelineBuildError::MissingComponent("latent codec"))?,
            denoiser,
            scheduler: self
                .scheduler
                .ok_or(PipelineBuildError::MissingComponent("scheduler"))?,
            audio_encoder: self.audio_encoder,
            super_resolvers: self.super_resolvers,
            media: self
                .media
                .ok_or(PipelineBuildError::MissingComponent("media io"))?,
            muxer: self
                .muxer
                .ok_or(PipelineBuildError::MissingComponent("muxer"))?,
            device: self.device,
        })
    }
}
