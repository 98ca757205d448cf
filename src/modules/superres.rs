//! Optional super-resolution of generated face patches during restoration.

use std::str::FromStr;

use burn::prelude::*;

use crate::error::{CollaboratorError, PipelineError};

/// Which restoration variant to apply, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuperResMode {
    #[default]
    None,
    Gfpgan,
    CodeFormer,
}

impl SuperResMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuperResMode::None => "none",
            SuperResMode::Gfpgan => "GFPGAN",
            SuperResMode::CodeFormer => "CodeFormer",
        }
    }
}

impl FromStr for SuperResMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SuperResMode::None),
            "GFPGAN" => Ok(SuperResMode::Gfpgan),
            "CodeFormer" => Ok(SuperResMode::CodeFormer),
            other => Err(format!("unknown superres mode: {other}")),
        }
    }
}

/// Upscale and refine a face patch.
///
/// Contract: given a patch `[C, H, W]` and a scale factor, return a patch of
/// at least the requested resolution in the same channel convention and value
/// range. Plain upscale-without-refinement does not satisfy the intent of
/// this interface.
pub trait SuperResolver<B: Backend> {
    fn enhance(
        &self,
        patch: Tensor<B, 3>,
        scale_factor: f32,
    ) -> Result<Tensor<B, 3>, CollaboratorError>;
}

/// Registry of the available variants; which one runs is selected per call
/// by [`SuperResMode`].
pub struct SuperResolvers<B: Backend> {
    pub gfpgan: Option<Box<dyn SuperResolver<B>>>,
    pub codeformer: Option<Box<dyn SuperResolver<B>>>,
}

impl<B: Backend> Default for SuperResolvers<B> {
    fn default() -> Self {
        Self {
            gfpgan: None,
            codeformer: None,
        }
    }
}

impl<B: Backend> SuperResolvers<B> {
    /// Resolve the configured mode to an implementation. `None` mode maps to
    /// no resolver; a named mode without a registered implementation is a
    /// configuration error.
    pub fn select(
        &self,
        mode: SuperResMode,
    ) -> Result<Option<&dyn SuperResolver<B>>, PipelineError> {
        match mode {
            SuperResMode::None => Ok(None),
            SuperResMode::Gfpgan => self
                .gfpgan
                .as_deref()
                .map(Some)
                .ok_or(PipelineError::SuperResolverMissing { mode: "GFPGAN" }),
            SuperResMode::CodeFormer => self
                .codeformer
                .as_deref()
                .map(Some)
                .ok_or(PipelineError::SuperResolverMissing { mode: "CodeFormer" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("none".parse::<SuperResMode>().unwrap(), SuperResMode::None);
        assert_eq!(
            "GFPGAN".parse::<SuperResMode>().unwrap(),
            SuperResMode::Gfpgan
        );
        assert_eq!(
            "CodeFormer".parse::<SuperResMode>().unwrap(),
            SuperResMode::CodeFormer
        );
        assert!("gfpgan".parse::<SuperResMode>().is_err());
    }

    #[test]
    fn missing_variant_is_an_error() {
        type TestBackend = burn::backend::NdArray;
        let resolvers = SuperResolvers::<TestBackend>::default();
        assert!(resolvers.select(SuperResMode::None).unwrap().is_none());
        assert!(matches!(
            resolvers.select(SuperResMode::Gfpgan),
            Err(PipelineError::SuperResolverMissing { mode: "GFPGAN" })
        ));
    }
}
