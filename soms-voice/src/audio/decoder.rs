//! Audio decoder using symphonia
//!
//! Decodes a whole clip held in memory (MP3, WAV, FLAC, AAC, Vorbis) to
//! interleaved f32 PCM. Voice clips are short, so there is no streaming path.

use super::DecodedClip;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Extension of the last path segment of a locator, ignoring any query string
pub fn extension_hint(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let file_name = path.rsplit('/').next()?;
    let (_, extension) = file_name.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_ascii_lowercase())
    }
}

/// Decode an entire clip.
///
/// # Errors
/// - Unrecognized container
/// - No audio track, or missing sample rate / channel layout
/// - Codec not supported
/// - Nothing decodable in the stream
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedClip> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet, keep going
                warn!("Decode error: {}", e);
            }
            Err(e) => {
                return Err(Error::Decode(format!("Decoder failed: {}", e)));
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode("Clip contains no audio".to_string()));
    }

    let clip = DecodedClip {
        samples,
        sample_rate,
        channels,
    };
    debug!(
        "Decoded {} frames at {}Hz, {} channels ({}ms)",
        clip.frames(),
        sample_rate,
        channels,
        clip.duration_ms()
    );
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i as f32 * 0.05).sin() * i16::MAX as f32 * 0.5) as i16;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("http://h/audio/a.MP3"), Some("mp3".to_string()));
        assert_eq!(extension_hint("http://h/a.wav?token=1"), Some("wav".to_string()));
        assert_eq!(extension_hint("/tmp/clip.ogg"), Some("ogg".to_string()));
        assert_eq!(extension_hint("http://h/stream"), None);
        assert_eq!(extension_hint("http://h/dir.d/stream"), None);
    }

    #[test]
    fn test_decode_wav_clip() {
        let bytes = wav_bytes(22050, 1, 2205);
        let clip = decode_bytes(bytes, Some("wav")).unwrap();

        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.frames(), 2205);
        assert_eq!(clip.duration_ms(), 100);
        assert!(clip.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_decode_stereo_without_hint() {
        let bytes = wav_bytes(44100, 2, 441);
        let clip = decode_bytes(bytes, None).unwrap();

        assert_eq!(clip.channels, 2);
        assert_eq!(clip.samples.len(), 882);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = decode_bytes(b"definitely not audio".to_vec(), Some("mp3"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
