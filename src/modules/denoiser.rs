//! Conditional denoiser boundary.

use burn::prelude::*;

use crate::error::CollaboratorError;

/// The conditional network at the heart of the sampling loop.
///
/// Input layout along the channel dimension is fixed by the pipeline as
/// `[noisy latent | mask | masked-image latent | reference latent]`;
/// [`in_channels`](Denoiser::in_channels) must agree with that layout.
pub trait Denoiser<B: Backend> {
    /// Native latent spatial size the model was trained at.
    fn sample_size(&self) -> usize;

    /// Channel count of the noisy latent alone.
    fn latent_channels(&self) -> usize;

    /// Total channel count the model expects after concatenation.
    fn in_channels(&self) -> usize;

    /// Whether the model carries audio conditioning layers at all. When
    /// false the embedding argument is omitted entirely.
    fn uses_audio(&self) -> bool;

    /// Predict noise/velocity for a batch of latent windows.
    ///
    /// `latent_input` is `[b, in_channels, N, h, w]`; `audio` is the
    /// per-frame embedding stack (null branch rows first under guidance).
    fn predict(
        &self,
        latent_input: Tensor<B, 5>,
        timestep: f32,
        audio: Option<&Tensor<B, 3>>,
    ) -> Result<Tensor<B, 5>, CollaboratorError>;
}
