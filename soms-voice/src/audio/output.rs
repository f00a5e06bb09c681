//! Audio output using cpal
//!
//! Plays one decoded clip through the output device. cpal streams are not
//! `Send`, so each clip gets a short-lived output thread that owns the device
//! and the stream. The thread releases both as soon as the [`ClipPlayback`]
//! handle is dropped or a [`StopHandle`] fires.

use super::resampler::Resampler;
use super::DecodedClip;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

type DoneSender = Arc<Mutex<Option<oneshot::Sender<Result<()>>>>>;

/// List available audio output devices.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Handle to a clip playing on the output thread
///
/// Dropping the handle stops playback and releases the device.
pub struct ClipPlayback {
    done: oneshot::Receiver<Result<()>>,
    // A message or a disconnect wakes the output thread
    stop: mpsc::Sender<()>,
}

/// Stops a clip from outside the task awaiting it
#[derive(Debug, Clone)]
pub struct StopHandle(mpsc::Sender<()>);

impl StopHandle {
    /// Release the stream now. No-op once the clip has ended.
    pub fn stop(&self) {
        let _ = self.0.send(());
    }
}

impl ClipPlayback {
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Wait until the clip has played out or the stream failed.
    pub async fn finished(mut self) -> Result<()> {
        match (&mut self.done).await {
            Ok(result) => result,
            Err(_) => Err(Error::AudioOutput(
                "Output thread exited without reporting".to_string(),
            )),
        }
    }
}

/// Start playing `clip` on the named device (default device when `None`).
///
/// Device errors surface through [`ClipPlayback::finished`].
pub fn play_clip(device_name: Option<String>, clip: DecodedClip) -> Result<ClipPlayback> {
    let (done_tx, done_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let done: DoneSender = Arc::new(Mutex::new(Some(done_tx)));

    std::thread::Builder::new()
        .name("soms-audio-out".to_string())
        .spawn(move || match open_stream(device_name, clip, Arc::clone(&done)) {
            Ok(stream) => {
                // Returns on an explicit stop or once every handle is dropped
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    debug!("Failed to pause stream on release: {}", e);
                }
                drop(stream);
                report(&done, Err(Error::Playback("Playback stopped".to_string())));
                debug!("Output stream released");
            }
            Err(e) => report(&done, Err(e)),
        })?;

    Ok(ClipPlayback {
        done: done_rx,
        stop: stop_tx,
    })
}

fn report(done: &DoneSender, result: Result<()>) {
    let sender = done.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
}

/// Find the requested device, falling back to the default device
fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
        warn!(
            "Requested device '{}' not found, falling back to default device",
            name
        );
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

/// Open the device, adapt the clip to its format and start the stream
fn open_stream(device_name: Option<String>, clip: DecodedClip, done: DoneSender) -> Result<Stream> {
    let device = select_device(device_name.as_deref())?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    info!(
        "Output device '{}': {}Hz, {} channels, {:?}",
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let samples = Resampler::resample(
        &clip.samples,
        clip.sample_rate,
        config.sample_rate.0,
        clip.channels,
    )?;
    let frames = remap_channels(&samples, clip.channels, config.channels);

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, frames, done)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, frames, done)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, frames, done)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    Ok(stream)
}

/// Map interleaved samples from `in_channels` to `out_channels`.
///
/// Output channel `c` takes input channel `c`, or the last input channel when
/// the input has fewer (mono is duplicated to every output channel).
fn remap_channels(samples: &[f32], in_channels: u16, out_channels: u16) -> Vec<f32> {
    let in_channels = in_channels.max(1) as usize;
    let out_channels = out_channels.max(1) as usize;
    if in_channels == out_channels {
        return samples.to_vec();
    }

    let mut out = Vec::with_capacity(samples.len() / in_channels * out_channels);
    for frame in samples.chunks_exact(in_channels) {
        for c in 0..out_channels {
            out.push(frame[c.min(in_channels - 1)]);
        }
    }
    out
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    done: DoneSender,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let error_done = Arc::clone(&done);
    let mut position = 0usize;
    let mut reported = false;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    let value = samples.get(position).copied().unwrap_or(0.0);
                    *out = T::from_sample(value.clamp(-1.0, 1.0));
                    position += 1;
                }
                if !reported && position >= samples.len() {
                    reported = true;
                    report(&done, Ok(()));
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                report(
                    &error_done,
                    Err(Error::AudioOutput(format!("Stream error: {}", err))),
                );
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
