//! Audio feature extraction boundary.

use burn::prelude::*;

use crate::error::CollaboratorError;

/// Maps a raw waveform to one feature embedding per output video frame.
pub trait AudioFeatureEncoder<B: Backend> {
    /// Extract per-frame embeddings `[seq, dim]`, aligned 1:1 with video
    /// frames at `fps`.
    fn features(
        &self,
        samples: &[f32],
        sample_rate: usize,
        fps: usize,
    ) -> Result<Vec<Tensor<B, 2>>, CollaboratorError>;
}
