//! Clip decoding, resampling and device output
//!
//! Pipeline for one clip: bytes → symphonia decode → rubato resample to the
//! device rate → cpal stream on a dedicated output thread.

pub mod decoder;
pub mod output;
pub mod resampler;

/// Fully decoded clip held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            0
        } else {
            self.frames() as u64 * 1000 / self.sample_rate as u64
        }
    }
}
