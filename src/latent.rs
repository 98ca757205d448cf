//! Latent assembly for the inpainting denoiser.
//!
//! Per chunk the pipeline needs four aligned latent tensors at the working
//! latent resolution: the sliced noise, the mask, the masked-image encoding,
//! and the unmasked reference encoding. All are shaped `[b, c, N, h, w]` with
//! the batch doubled under classifier-free guidance.

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

use crate::error::CollaboratorError;
use crate::modules::codec::LatentCodec;

/// Normalize raw codec output into scheduler space: `(z - shift) * scale`.
pub fn normalize_encoded<B: Backend>(
    latents: Tensor<B, 4>,
    codec: &dyn LatentCodec<B>,
) -> Tensor<B, 4> {
    (latents - codec.shift_factor()) * codec.scaling_factor()
}

/// Undo [`normalize_encoded`] before handing latents to the decoder:
/// `z / scale + shift`.
pub fn denormalize_for_decode<B: Backend>(
    latents: Tensor<B, 4>,
    codec: &dyn LatentCodec<B>,
) -> Tensor<B, 4> {
    latents / codec.scaling_factor() + codec.shift_factor()
}

/// Reshape a per-frame batch `[N, c, h, w]` into the window layout
/// `[1, c, N, h, w]`.
fn frames_to_window<B: Backend>(latents: Tensor<B, 4>) -> Tensor<B, 5> {
    latents.swap_dims(0, 1).unsqueeze::<5>()
}

/// Duplicate the batch dimension for the unconditional guidance branch.
/// Mask, masked-image, and reference latents are identical across branches;
/// only the audio embedding differs.
pub fn duplicate_for_guidance<B: Backend>(latent: Tensor<B, 5>) -> Tensor<B, 5> {
    Tensor::cat(vec![latent.clone(), latent], 0)
}

/// Resize inpainting masks `[N, 1, H, W]` to latent resolution and broadcast
/// them into the window layout.
pub fn prepare_mask_latents<B: Backend>(
    masks: Tensor<B, 4>,
    latent_height: usize,
    latent_width: usize,
    do_classifier_free_guidance: bool,
) -> Tensor<B, 5> {
    let resized = interpolate(
        masks,
        [latent_height, latent_width],
        InterpolateOptions::new(InterpolateMode::Nearest),
    );
    let window = frames_to_window(resized);
    if do_classifier_free_guidance {
        duplicate_for_guidance(window)
    } else {
        window
    }
}

/// Encode a chunk of pixel images `[N, C, H, W]` into normalized window
/// latents `[b, c, N, h, w]`. Used for both the masked-image latents and the
/// unmasked reference latents.
pub fn encode_window_latents<B: Backend>(
    codec: &dyn LatentCodec<B>,
    images: Tensor<B, 4>,
    do_classifier_free_guidance: bool,
) -> Result<Tensor<B, 5>, CollaboratorError> {
    let encoded = codec.encode(images)?;
    let window = frames_to_window(normalize_encoded(encoded, codec));
    Ok(if do_classifier_free_guidance {
        duplicate_for_guidance(window)
    } else {
        window
    })
}

/// Decode window latents `[1, c, N, h, w]` back to pixel frames
/// `[N, C, H, W]`.
pub fn decode_window_latents<B: Backend>(
    codec: &dyn LatentCodec<B>,
    latents: Tensor<B, 5>,
) -> Result<Tensor<B, 4>, CollaboratorError> {
    let frames: Tensor<B, 4> = latents.squeeze::<4>(0).swap_dims(0, 1);
    codec.decode(denormalize_for_decode(frames, codec))
}

/// Per-pixel alpha blend of generated content into the original crop:
/// generated inside the mask, original outside it.
pub fn composite_masked<B: Backend>(
    decoded: Tensor<B, 4>,
    pixel_values: Tensor<B, 4>,
    masks: Tensor<B, 4>,
) -> Tensor<B, 4> {
    decoded * masks.clone() + pixel_values * (masks.neg() + 1.0)
}
