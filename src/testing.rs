//! Mock collaborators for tests, concrete on the NdArray backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

use crate::error::{AlignerError, CollaboratorError};
use crate::media::{MediaError, MediaIo, Muxer};
use crate::modules::aligner::{
    AffineMatrix, AlignedFace, BoundingBox, FaceAligner, FacePatch, MaskBundle, MaskPolicy,
    VideoFrame,
};
use crate::modules::audio::AudioFeatureEncoder;
use crate::modules::codec::LatentCodec;
use crate::modules::denoiser::Denoiser;
use crate::modules::superres::SuperResolver;

pub type TestBackend = burn::backend::NdArray;

/// Deterministic stand-in codec: spatial resize plus channel projection.
pub struct MockCodec {
    latent_channels: usize,
    factor: usize,
}

impl MockCodec {
    pub fn new(latent_channels: usize, factor: usize) -> Self {
        Self {
            latent_channels,
            factor,
        }
    }
}

impl LatentCodec<TestBackend> for MockCodec {
    fn latent_channels(&self) -> usize {
        self.latent_channels
    }

    fn downsample_factor(&self) -> usize {
        self.factor
    }

    fn scaling_factor(&self) -> f32 {
        0.18215
    }

    fn shift_factor(&self) -> f32 {
        0.0
    }

    fn encode(
        &self,
        images: Tensor<TestBackend, 4>,
    ) -> Result<Tensor<TestBackend, 4>, CollaboratorError> {
        let [_, _, h, w] = images.dims();
        let pooled = interpolate(
            images,
            [h / self.factor, w / self.factor],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );
        Ok(pooled.mean_dim(1).repeat_dim(1, self.latent_channels))
    }

    fn decode(
        &self,
        latents: Tensor<TestBackend, 4>,
    ) -> Result<Tensor<TestBackend, 4>, CollaboratorError> {
        let [f, _, h, w] = latents.dims();
        let rgb = latents.slice([0..f, 0..3, 0..h, 0..w]);
        Ok(interpolate(
            rgb,
            [h * self.factor, w * self.factor],
            InterpolateOptions::new(InterpolateMode::Nearest),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictRecord {
    pub batch: usize,
    pub channels: usize,
    pub audio_rows: Option<usize>,
    pub null_branch_is_zero: Option<bool>,
}

/// Denoiser double that records every call and predicts zero velocity.
pub struct MockDenoiser {
    pub sample_size: usize,
    pub latent_channels: usize,
    pub uses_audio: bool,
    pub calls: Arc<Mutex<Vec<PredictRecord>>>,
}

impl MockDenoiser {
    pub fn new(sample_size: usize, latent_channels: usize, uses_audio: bool) -> Self {
        Self {
            sample_size,
            latent_channels,
            uses_audio,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Denoiser<TestBackend> for MockDenoiser {
    fn sample_size(&self) -> usize {
        self.sample_size
    }

    fn latent_channels(&self) -> usize {
        self.latent_channels
    }

    fn in_channels(&self) -> usize {
        // noisy + mask + masked-image + reference
        self.latent_channels * 3 + 1
    }

    fn uses_audio(&self) -> bool {
        self.uses_audio
    }

    fn predict(
        &self,
        latent_input: Tensor<TestBackend, 5>,
        _timestep: f32,
        audio: Option<&Tensor<TestBackend, 3>>,
    ) -> Result<Tensor<TestBackend, 5>, CollaboratorError> {
        let [b, ch, n, h, w] = latent_input.dims();
        if ch != self.in_channels() {
            return Err(CollaboratorError::new(
                "denoiser",
                format!("expected {} channels, got {ch}", self.in_channels()),
            ));
        }

        let mut record = PredictRecord {
            batch: b,
            channels: ch,
            ..Default::default()
        };
        if let Some(audio) = audio {
            let rows = audio.dims()[0];
            record.audio_rows = Some(rows);
            if b == 2 {
                // guidance doubling: the first half of the rows is the null branch
                let null = audio.clone().slice([0..rows / 2]);
                let cond = audio.clone().slice([rows / 2..rows]);
                let null_zero = null.abs().max().into_scalar() == 0.0;
                let cond_nonzero = cond.abs().max().into_scalar() > 0.0;
                record.null_branch_is_zero = Some(null_zero && cond_nonzero);
            }
        }
        self.calls.lock().unwrap().push(record);

        Ok(Tensor::zeros([b, self.latent_channels, n, h, w], &latent_input.device()))
    }
}

/// Aligner double with configurable crop resolution, bounding box, and mask.
pub struct MockAligner {
    pub resolution: usize,
    pub bbox: BoundingBox,
    pub mask_value: f32,
    /// Fail with `NoFace` on the nth `align` call, if set
    pub fail_on_call: Option<usize>,
    align_calls: Mutex<usize>,
    /// (width, height, first byte) of every pasted patch
    pub pasted: Arc<Mutex<Vec<(u32, u32, u8)>>>,
}

impl MockAligner {
    pub fn new(resolution: usize, bbox_size: f32) -> Self {
        Self {
            resolution,
            bbox: BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: bbox_size,
                y2: bbox_size,
            },
            mask_value: 1.0,
            fail_on_call: None,
            align_calls: Mutex::new(0),
            pasted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FaceAligner<TestBackend> for MockAligner {
    fn align(&self, frame: &VideoFrame) -> Result<AlignedFace<TestBackend>, AlignerError> {
        let mut calls = self.align_calls.lock().unwrap();
        let index = *calls;
        *calls += 1;
        if self.fail_on_call == Some(index) {
            return Err(AlignerError::NoFace);
        }

        let value = frame.data[0] as f32 / 127.5 - 1.0;
        let crop = Tensor::ones([3, self.resolution, self.resolution], &Default::default()) * value;
        Ok(AlignedFace {
            crop,
            bbox: self.bbox,
            affine: AffineMatrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
        })
    }

    fn prepare_masks(
        &self,
        faces: Tensor<TestBackend, 4>,
        _policy: MaskPolicy,
    ) -> Result<MaskBundle<TestBackend>, AlignerError> {
        let [n, _, h, w] = faces.dims();
        let masks = Tensor::ones([n, 1, h, w], &faces.device()) * self.mask_value;
        let keep = masks.clone().neg() + 1.0;
        Ok(MaskBundle {
            pixel_values: faces.clone(),
            masked_pixel_values: faces * keep,
            masks,
        })
    }

    fn paste_back(
        &self,
        frame: &VideoFrame,
        patch: &FacePatch,
        _affine: &AffineMatrix,
    ) -> Result<VideoFrame, AlignerError> {
        self.pasted
            .lock()
            .unwrap()
            .push((patch.width, patch.height, patch.data[0]));
        Ok(frame.clone())
    }
}

/// Audio encoder double producing a fixed number of constant embeddings.
pub struct MockAudioEncoder {
    pub count: usize,
}

impl AudioFeatureEncoder<TestBackend> for MockAudioEncoder {
    fn features(
        &self,
        _samples: &[f32],
        _sample_rate: usize,
        _fps: usize,
    ) -> Result<Vec<Tensor<TestBackend, 2>>, CollaboratorError> {
        Ok((0..self.count)
            .map(|_| Tensor::ones([2, 8], &Default::default()))
            .collect())
    }
}

/// Super-resolver double: records scales and performs a plain upscale.
pub struct MockSuperResolver {
    pub scales: Arc<Mutex<Vec<f32>>>,
}

impl MockSuperResolver {
    pub fn new() -> Self {
        Self {
            scales: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SuperResolver<TestBackend> for MockSuperResolver {
    fn enhance(
        &self,
        patch: Tensor<TestBackend, 3>,
        scale_factor: f32,
    ) -> Result<Tensor<TestBackend, 3>, CollaboratorError> {
        self.scales.lock().unwrap().push(scale_factor);
        let [_, h, w] = patch.dims();
        let new_h = (h as f32 * scale_factor).round() as usize;
        let new_w = (w as f32 * scale_factor).round() as usize;
        let up = interpolate(
            patch.unsqueeze::<4>(),
            [new_h, new_w],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        Ok(up.squeeze::<3>(0))
    }
}

/// Everything the pipeline wrote through the media boundary.
#[derive(Debug, Default)]
pub struct WrittenArtifacts {
    pub video_frames: Option<usize>,
    pub video_fps: Option<usize>,
    pub audio_samples: Option<usize>,
    pub audio_rate: Option<usize>,
    pub muxed_out: Option<PathBuf>,
}

/// Media double serving synthetic frames/samples and recording writes.
pub struct MockMedia {
    pub num_frames: usize,
    pub frame_size: (u32, u32),
    pub num_audio_samples: usize,
    pub written: Arc<Mutex<WrittenArtifacts>>,
}

impl MockMedia {
    pub fn new(num_frames: usize, num_audio_samples: usize) -> Self {
        Self {
            num_frames,
            frame_size: (64, 64),
            num_audio_samples,
            written: Arc::new(Mutex::new(WrittenArtifacts::default())),
        }
    }
}

impl MediaIo for MockMedia {
    fn read_video(&self, _path: &Path) -> Result<Vec<VideoFrame>, MediaError> {
        let (w, h) = self.frame_size;
        Ok((0..self.num_frames)
            .map(|i| VideoFrame::new(vec![(i % 200) as u8; (w * h * 3) as usize], w, h))
            .collect())
    }

    fn read_audio(&self, _path: &Path) -> Result<Vec<f32>, MediaError> {
        Ok(vec![0.1; self.num_audio_samples])
    }

    fn write_video(
        &self,
        _path: &Path,
        frames: &[VideoFrame],
        fps: usize,
    ) -> Result<(), MediaError> {
        let mut written = self.written.lock().unwrap();
        written.video_frames = Some(frames.len());
        written.video_fps = Some(fps);
        Ok(())
    }

    fn write_audio(
        &self,
        _path: &Path,
        samples: &[f32],
        sample_rate: usize,
    ) -> Result<(), MediaError> {
        let mut written = self.written.lock().unwrap();
        written.audio_samples = Some(samples.len());
        written.audio_rate = Some(sample_rate);
        Ok(())
    }
}

/// Muxer double; can simulate a missing ffmpeg install.
pub struct MockMuxer {
    pub available: bool,
    pub written: Arc<Mutex<WrittenArtifacts>>,
}

impl Muxer for MockMuxer {
    fn ensure_available(&self) -> Result<(), MediaError> {
        if self.available {
            Ok(())
        } else {
            Err(MediaError::FfmpegNotFound)
        }
    }

    fn mux(&self, _video: &Path, _audio: &Path, out: &Path) -> Result<(), MediaError> {
        self.written.lock().unwrap().muxed_out = Some(out.to_path_buf());
        Ok(())
    }
}
