//! Variational codec boundary: pixel space to compressed latents and back.

use burn::prelude::*;

use crate::error::CollaboratorError;

/// Encode/decode between pixel images and latents.
///
/// Normalization by [`scaling_factor`](LatentCodec::scaling_factor) and
/// [`shift_factor`](LatentCodec::shift_factor) is applied by the caller:
/// `(z - shift) * scale` after encode, `z / scale + shift` before decode.
pub trait LatentCodec<B: Backend> {
    /// Channel count of the latent representation.
    fn latent_channels(&self) -> usize;

    /// Spatial downsampling factor between pixel and latent resolution.
    fn downsample_factor(&self) -> usize;

    /// Latent normalization scale.
    fn scaling_factor(&self) -> f32;

    /// Latent normalization shift.
    fn shift_factor(&self) -> f32;

    /// Encode a frame batch `[F, C, H, W]` to raw latents `[F, c, H/f, W/f]`.
    fn encode(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 4>, CollaboratorError>;

    /// Decode raw latents `[F, c, h, w]` back to pixel space `[F, C, h*f, w*f]`.
    fn decode(&self, latents: Tensor<B, 4>) -> Result<Tensor<B, 4>, CollaboratorError>;
}
