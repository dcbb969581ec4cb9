//! Mikrofon-Capture
//!
//! Verwendet cpal für Cross-Platform Audio Input. Ein cpal-Stream ist nicht
//! Send, daher lebt er auf einem eigenen Thread, der bis zum Stoppen des
//! Tracks blockiert.

use super::devices::{DeviceKind, MediaDeviceInfo, MediaError};
use super::track::{MediaStreamTrack, TrackFeed, TrackSource};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Host, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Bevorzugte Sample Rate (48kHz)
pub const PREFERRED_SAMPLE_RATE: u32 = 48000;

const DEVICE: &str = "microphone";

// ============================================================================
// MICROPHONE SOURCE
// ============================================================================

/// Besitzt den Capture-Thread eines Audio-Tracks
struct MicrophoneSource {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TrackSource for MicrophoneSource {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Microphone capture thread panicked");
            }
        }
    }
}

/// Öffnet das Mikrofon und gibt einen Live-Audio-Track zurück
///
/// `device_name` wählt ein bestimmtes Eingabegerät, sonst das Standardgerät.
pub fn open_microphone(device_name: Option<&str>) -> Result<MediaStreamTrack, MediaError> {
    let enabled = Arc::new(AtomicBool::new(true));
    let level = Arc::new(Mutex::new(0.0f32));

    let (ready_tx, ready_rx) = mpsc::channel::<Result<String, MediaError>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let name = device_name.map(str::to_string);
    let thread_enabled = Arc::clone(&enabled);
    let thread_level = Arc::clone(&level);

    let thread = std::thread::Builder::new()
        .name("microphone-capture".to_string())
        .spawn(move || {
            let stream = match start_capture(name.as_deref(), thread_enabled, thread_level) {
                Ok((stream, label)) => {
                    let _ = ready_tx.send(Ok(label));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Blockiert bis stop() aufgerufen oder der Sender gedroppt wird
            let _ = stop_rx.recv();
            drop(stream);
            tracing::info!("Microphone capture stopped");
        })
        .map_err(|e| MediaError::Backend(format!("Failed to spawn microphone thread: {}", e)))?;

    let label = match ready_rx.recv() {
        Ok(Ok(label)) => label,
        Ok(Err(e)) => {
            let _ = thread.join();
            return Err(e);
        }
        Err(_) => {
            let _ = thread.join();
            return Err(MediaError::Backend(
                "Microphone thread exited before reporting".to_string(),
            ));
        }
    };

    Ok(MediaStreamTrack::new(
        label,
        TrackFeed::Audio { level },
        enabled,
        Box::new(MicrophoneSource {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }),
    ))
}

/// Listet alle Eingabegeräte
pub fn list_microphones() -> Result<Vec<MediaDeviceInfo>, MediaError> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| MediaError::Backend(e.to_string()))?
        .filter_map(|d| {
            d.name().ok().map(|name| MediaDeviceInfo {
                device_id: name.clone(),
                kind: DeviceKind::AudioInput,
                is_default: Some(&name) == default_input.as_ref(),
                label: name,
            })
        })
        .collect();

    Ok(devices)
}

// ============================================================================
// CAPTURE
// ============================================================================

/// Baut und startet den Input-Stream (läuft auf dem Capture-Thread)
fn start_capture(
    device_name: Option<&str>,
    enabled: Arc<AtomicBool>,
    level: Arc<Mutex<f32>>,
) -> Result<(Stream, String), MediaError> {
    let host = cpal::default_host();
    let device = find_input_device(&host, device_name)?;
    let label = device.name().unwrap_or_else(|_| "Microphone".to_string());

    let configs = device.supported_input_configs().map_err(|e| match e {
        cpal::SupportedStreamConfigsError::DeviceNotAvailable => {
            MediaError::NotReadable(DEVICE.to_string())
        }
        other => MediaError::Backend(other.to_string()),
    })?;
    let supported = select_best_config(configs.collect())?;
    let config: StreamConfig = supported.config();

    tracing::info!(
        "Starting microphone capture on '{}': {} Hz, {} channel(s), {:?}",
        label,
        config.sample_rate.0,
        config.channels,
        supported.sample_format()
    );

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_capture_stream::<f32>(&device, &config, enabled, level),
        SampleFormat::I16 => build_capture_stream::<i16>(&device, &config, enabled, level),
        SampleFormat::U16 => build_capture_stream::<u16>(&device, &config, enabled, level),
        other => {
            return Err(MediaError::Backend(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => MediaError::NotReadable(DEVICE.to_string()),
        other => MediaError::Backend(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| MediaError::Backend(format!("Failed to start microphone: {}", e)))?;

    Ok((stream, label))
}

fn find_input_device(host: &Host, device_name: Option<&str>) -> Result<Device, MediaError> {
    match device_name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| MediaError::Backend(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| MediaError::NotFound(format!("{} '{}'", DEVICE, wanted))),
        None => host
            .default_input_device()
            .ok_or_else(|| MediaError::NotFound(DEVICE.to_string())),
    }
}

fn build_capture_stream<T>(
    device: &Device,
    config: &StreamConfig,
    enabled: Arc<AtomicBool>,
    level: Arc<Mutex<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Deaktivierter Track liefert Stille
            let rms = if enabled.load(Ordering::Relaxed) {
                rms(data)
            } else {
                0.0
            };
            *level.lock() = rms;
        },
        |err| {
            tracing::error!("Microphone capture error: {}", err);
        },
        None,
    )
}

/// RMS-Pegel eines Sample-Blocks (0.0 - 1.0)
fn rms<T>(data: &[T]) -> f32
where
    T: Sample,
    f32: FromSample<T>,
{
    if data.is_empty() {
        return 0.0;
    }
    let sum: f32 = data
        .iter()
        .map(|&s| {
            let v = s.to_sample::<f32>();
            v * v
        })
        .sum();
    (sum / data.len() as f32).sqrt().min(1.0)
}

/// Wählt die beste Konfiguration aus einer Liste
fn select_best_config(
    configs: Vec<SupportedStreamConfigRange>,
) -> Result<SupportedStreamConfig, MediaError> {
    // Priorität: 48kHz > andere, F32 > Rest
    let target_rate = cpal::SampleRate(PREFERRED_SAMPLE_RATE);
    let supports_target =
        |c: &SupportedStreamConfigRange| c.min_sample_rate() <= target_rate && c.max_sample_rate() >= target_rate;

    if let Some(config) = configs
        .iter()
        .find(|c| supports_target(c) && c.sample_format() == SampleFormat::F32)
    {
        return Ok(config.clone().with_sample_rate(target_rate));
    }

    if let Some(config) = configs.iter().find(|c| supports_target(c)) {
        return Ok(config.clone().with_sample_rate(target_rate));
    }

    configs
        .into_iter()
        .next()
        .map(|c| c.with_max_sample_rate())
        .ok_or_else(|| MediaError::NotReadable(format!("{} (no supported configuration)", DEVICE)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleRate, SupportedBufferSize};

    fn range(min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            1,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_prefers_48k_f32() {
        let config = select_best_config(vec![
            range(8000, 48000, SampleFormat::I16),
            range(44100, 96000, SampleFormat::F32),
        ])
        .unwrap();

        assert_eq!(config.sample_rate(), SampleRate(PREFERRED_SAMPLE_RATE));
        assert_eq!(config.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_falls_back_to_other_format_at_48k() {
        let config = select_best_config(vec![
            range(8000, 22050, SampleFormat::F32),
            range(8000, 48000, SampleFormat::I16),
        ])
        .unwrap();

        assert_eq!(config.sample_rate(), SampleRate(PREFERRED_SAMPLE_RATE));
        assert_eq!(config.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn test_falls_back_to_max_rate() {
        let config = select_best_config(vec![range(8000, 22050, SampleFormat::F32)]).unwrap();
        assert_eq!(config.sample_rate(), SampleRate(22050));
    }

    #[test]
    fn test_no_config_is_not_readable() {
        assert!(matches!(
            select_best_config(Vec::new()),
            Err(MediaError::NotReadable(_))
        ));
    }

    #[test]
    fn test_rms_levels() {
        assert_eq!(rms::<f32>(&[]), 0.0);
        assert!((rms(&[0.5f32, -0.5]) - 0.5).abs() < 1e-6);
        assert!(rms(&[i16::MAX; 4]) > 0.99);
        assert!(rms(&[0i16; 4]) < 1e-6);
    }
}
