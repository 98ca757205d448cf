//! Face alignment boundary: detection, aligned crops, masks, and the inverse
//! warp used to paste generated patches back into original frame geometry.

use std::str::FromStr;

use burn::prelude::*;

use crate::error::AlignerError;

/// One decoded original frame, RGB24 row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            data,
            width,
            height,
        }
    }
}

/// Target paste region in original-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        (self.x2 - self.x1) as usize
    }

    pub fn height(&self) -> usize {
        (self.y2 - self.y1) as usize
    }
}

/// The 2x3 alignment transform used to extract a crop; its inverse pastes a
/// patch back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix(pub [[f32; 3]; 2]);

/// Aligned face crop plus the geometry needed for restoration.
#[derive(Debug, Clone)]
pub struct AlignedFace<B: Backend> {
    /// Pixel tensor `[C, H, W]` in `[-1, 1]`
    pub crop: Tensor<B, 3>,
    pub bbox: BoundingBox,
    pub affine: AffineMatrix,
}

/// Named inpainting mask policy forwarded to the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    /// Fixed lower-face rectangle
    #[default]
    FixMask,
    /// Landmark-tracked mouth region
    Mouth,
    /// Whole face
    Face,
    /// Lower half of the crop
    Half,
}

impl MaskPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskPolicy::FixMask => "fix_mask",
            MaskPolicy::Mouth => "mouth",
            MaskPolicy::Face => "face",
            MaskPolicy::Half => "half",
        }
    }
}

impl FromStr for MaskPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fix_mask" => Ok(MaskPolicy::FixMask),
            "mouth" => Ok(MaskPolicy::Mouth),
            "face" => Ok(MaskPolicy::Face),
            "half" => Ok(MaskPolicy::Half),
            other => Err(format!("unknown mask policy: {other}")),
        }
    }
}

/// Mask derivation output for one chunk of aligned faces.
#[derive(Debug, Clone)]
pub struct MaskBundle<B: Backend> {
    /// Original crops `[N, C, H, W]` in `[-1, 1]`
    pub pixel_values: Tensor<B, 4>,
    /// Crops with the mask region blanked `[N, C, H, W]`
    pub masked_pixel_values: Tensor<B, 4>,
    /// Masks `[N, 1, H, W]`, 1 inside the region to regenerate
    pub masks: Tensor<B, 4>,
}

/// A generated face patch converted back to image bytes, RGB24 row-major.
#[derive(Debug, Clone)]
pub struct FacePatch {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Face detection, alignment, mask derivation, and affine restoration.
pub trait FaceAligner<B: Backend> {
    /// Detect and align the face in one frame.
    fn align(&self, frame: &VideoFrame) -> Result<AlignedFace<B>, AlignerError>;

    /// Derive masks and masked images for a stack of aligned crops.
    fn prepare_masks(
        &self,
        faces: Tensor<B, 4>,
        policy: MaskPolicy,
    ) -> Result<MaskBundle<B>, AlignerError>;

    /// Inverse-warp a generated patch into the original frame.
    fn paste_back(
        &self,
        frame: &VideoFrame,
        patch: &FacePatch,
        affine: &AffineMatrix,
    ) -> Result<VideoFrame, AlignerError>;
}
