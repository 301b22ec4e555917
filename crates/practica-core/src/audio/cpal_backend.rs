//! CPAL output stream driving the render engine
//!
//! The stream callback owns the [`RenderEngine`] outright; the control side
//! reaches it only through the [`Session`]'s queues and atomics, so the
//! callback never shares a lock with another thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};

use super::error::{AudioError, AudioResult};
use crate::config::PracticaConfig;
use crate::engine::{RenderEngine, MAX_BLOCK};
use crate::session::Session;
use crate::types::DEFAULT_SAMPLE_RATE;

/// Device selection for [`start_output`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    /// Output device name; `None` uses the system default
    pub device: Option<String>,
    /// Preferred sample rate (falls back to the device maximum if unsupported)
    pub sample_rate: Option<u32>,
    /// Fixed buffer size in frames; `None` lets the driver choose
    pub buffer_size: Option<u32>,
}

/// Keeps the output stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Names of the default host's output devices
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::warn!("Failed to enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

/// Open the output device and start a session playing through it
///
/// The session runs at the device's sample rate; tracks with a different
/// rate are resampled by the engine's reader.
pub fn start_output(config: PracticaConfig, settings: &OutputSettings) -> AudioResult<(Session, AudioHandle)> {
    let device = find_device(settings.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();
    let target_rate = settings.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let (range, sample_rate) = pick_config(&supported, target_rate)?;
    if sample_rate != target_rate {
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            sample_rate
        );
    }

    let stream_config = StreamConfig {
        channels: range.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: match settings.buffer_size {
            Some(frames) => BufferSize::Fixed(frames.clamp(64, MAX_BLOCK as u32)),
            None => BufferSize::Default,
        },
    };
    log::info!(
        "Audio config: {} channels, {}Hz, buffer {:?}",
        stream_config.channels,
        sample_rate,
        stream_config.buffer_size
    );

    let (session, engine) = Session::new(config, sample_rate);
    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    session.start_dispatcher();

    log::info!("Audio stream started");

    let handle = AudioHandle {
        _stream: stream,
        device_name,
        sample_rate,
        channels: stream_config.channels,
    };
    Ok((session, handle))
}

fn find_device(name: Option<&str>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d: &cpal::Device| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string())),
    }
}

/// Choose an f32 configuration, preferring stereo and `target_rate`
fn pick_config(
    supported: &[SupportedStreamConfigRange],
    target_rate: u32,
) -> AudioResult<(SupportedStreamConfigRange, u32)> {
    if supported.is_empty() {
        return Err(AudioError::NoDevices);
    }
    let supports_rate =
        |c: &&SupportedStreamConfigRange| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0;

    let f32_configs: Vec<&SupportedStreamConfigRange> = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let best = f32_configs
        .iter()
        .copied()
        .filter(|c| c.channels() >= 2)
        .find(supports_rate)
        .or_else(|| f32_configs.iter().copied().find(supports_rate))
        .or_else(|| f32_configs.iter().copied().find(|c| c.channels() >= 2))
        .or_else(|| f32_configs.first().copied())
        .ok_or_else(|| AudioError::ConfigError("Device offers no f32 output configuration".to_string()))?;

    let sample_rate = if supports_rate(&best) {
        target_rate
    } else {
        best.max_sample_rate().0
    };
    Ok((best.clone(), sample_rate))
}

fn build_output_stream(device: &cpal::Device, config: &StreamConfig, mut engine: RenderEngine) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                engine.process(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleRate, SupportedBufferSize};

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_prefers_stereo_f32_at_target_rate() {
        let supported = vec![
            range(2, 44100, 192000, SampleFormat::I16),
            range(1, 8000, 192000, SampleFormat::F32),
            range(2, 44100, 96000, SampleFormat::F32),
        ];
        let (config, rate) = pick_config(&supported, 48000).unwrap();
        assert_eq!(config.channels(), 2);
        assert_eq!(config.sample_format(), SampleFormat::F32);
        assert_eq!(rate, 48000);
    }

    #[test]
    fn test_falls_back_to_max_rate() {
        let supported = vec![range(2, 44100, 44100, SampleFormat::F32)];
        let (_, rate) = pick_config(&supported, 48000).unwrap();
        assert_eq!(rate, 44100);
    }

    #[test]
    fn test_rejects_devices_without_f32() {
        let supported = vec![range(2, 44100, 48000, SampleFormat::I16)];
        assert!(matches!(pick_config(&supported, 48000), Err(AudioError::ConfigError(_))));
        assert!(matches!(pick_config(&[], 48000), Err(AudioError::NoDevices)));
    }
}
