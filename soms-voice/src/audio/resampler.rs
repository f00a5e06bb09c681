//! Audio resampling using rubato
//!
//! Converts decoded clips to the sample rate the output device runs at.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Whole-clip resampler
pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }
        if channels == 0 || input_rate == 0 {
            return Err(Error::Decode(format!(
                "Cannot resample {} channels at {}Hz",
                channels, input_rate
            )));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        // rubato expects planar input
        let planar_input = Self::deinterleave(input, channels);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels as usize,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        Ok(Self::interleave(planar_output))
    }

    /// [L, R, L, R, ...] → [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let num_channels = channels as usize;
        let num_frames = samples.len() / num_channels;
        let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in samples.chunks_exact(num_channels) {
            for (ch_idx, sample) in frame.iter().enumerate() {
                planar[ch_idx].push(*sample);
            }
        }

        planar
    }

    /// [[L, L, ...], [R, R, ...]] → [L, R, L, R, ...]
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        let Some(first) = planar.first() else {
            return Vec::new();
        };

        let num_frames = first.len();
        let mut interleaved = Vec::with_capacity(num_frames * planar.len());
        for frame_idx in 0..num_frames {
            for channel in &planar {
                interleaved.push(channel.get(frame_idx).copied().unwrap_or(0.0));
            }
        }

        interleaved
    }
}
