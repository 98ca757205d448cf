//! Boundary traits for the external model collaborators.
//!
//! The engine consumes these; it never reimplements their internals.

pub mod aligner;
pub mod audio;
pub mod codec;
pub mod denoiser;
pub mod superres;
