//! Window planning: slicing aligned faces and audio embeddings into
//! fixed-length chunks of diffusion work.
//!
//! Frames beyond the last full window are dropped, not padded. The output
//! video length is therefore always `num_chunks * window_len`.

use std::ops::Range;

/// The chunk layout for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    /// Window length N
    pub window_len: usize,
    /// Number of full windows that will be processed
    pub num_chunks: usize,
}

impl WindowPlan {
    /// Plan windows over the aligned face sequence and, when audio
    /// conditioning is active, the audio embedding sequence.
    ///
    /// The usable length is `min(num_faces, num_audio)` when `num_audio`
    /// participates, `num_faces` otherwise.
    pub fn new(num_faces: usize, num_audio: Option<usize>, window_len: usize) -> Self {
        let usable = match num_audio {
            Some(audio) => num_faces.min(audio),
            None => num_faces,
        };
        Self {
            window_len,
            // A zero-length window can never be filled.
            num_chunks: usable.checked_div(window_len).unwrap_or(0),
        }
    }

    /// Total frames present in the final output.
    pub fn output_frames(&self) -> usize {
        self.num_chunks * self.window_len
    }

    /// Face/audio index range covered by chunk `index`.
    pub fn chunk_range(&self, index: usize) -> Range<usize> {
        debug_assert!(index < self.num_chunks);
        index * self.window_len..(index + 1) * self.window_len
    }

    /// Iterate chunk ranges in order.
    pub fn chunks(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_chunks).map(|i| self.chunk_range(i))
    }
}
