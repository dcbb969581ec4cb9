//! Native Capture-Geräte
//!
//! Öffnet Kamera (V4L2) und Mikrofon (cpal) für eine Capture-Anfrage.

use super::camera::{self, CameraSettings};
use super::devices::{MediaDeviceInfo, MediaDevices, MediaError};
use super::microphone;
use super::stream::{MediaStream, MediaStreamConstraints};
use super::track::MediaStreamTrack;
use crate::config::AppConfig;

/// `MediaDevices` mit echter Hardware
#[derive(Debug, Clone)]
pub struct NativeMediaDevices {
    camera: CameraSettings,
    microphone: Option<String>,
}

impl NativeMediaDevices {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            camera: CameraSettings {
                device_path: config.camera_device.clone(),
                width: config.capture_width,
                height: config.capture_height,
                fps: config.preview_fps,
            },
            microphone: config.microphone.clone(),
        }
    }
}

impl MediaDevices for NativeMediaDevices {
    fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, MediaError> {
        open_stream(
            constraints,
            || camera::open_camera(&self.camera),
            || microphone::open_microphone(self.microphone.as_deref()),
        )
    }

    fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, MediaError> {
        let mut devices = camera::list_cameras(&self.camera.device_path);
        devices.extend(microphone::list_microphones()?);
        Ok(devices)
    }
}

/// Öffnet erst die Kamera, dann das Mikrofon
///
/// Schlägt das Mikrofon fehl, wird die bereits laufende Kamera gestoppt.
fn open_stream<C, M>(
    constraints: &MediaStreamConstraints,
    open_camera: C,
    open_microphone: M,
) -> Result<MediaStream, MediaError>
where
    C: FnOnce() -> Result<MediaStreamTrack, MediaError>,
    M: FnOnce() -> Result<MediaStreamTrack, MediaError>,
{
    constraints.validate()?;

    tracing::info!(
        video = constraints.video,
        audio = constraints.audio,
        "Requesting local media"
    );

    let mut tracks = Vec::with_capacity(2);

    if constraints.video {
        tracks.push(open_camera()?);
    }

    if constraints.audio {
        match open_microphone() {
            Ok(track) => tracks.push(track),
            Err(e) => {
                for track in &tracks {
                    tracing::warn!(
                        track = %track.id(),
                        label = %track.label(),
                        "Releasing track of failed media request"
                    );
                    track.stop();
                }
                return Err(e);
            }
        }
    }

    for track in &tracks {
        tracing::debug!(track = %track.id(), kind = ?track.kind(), label = %track.label(), "Track live");
    }

    let stream = MediaStream::new(tracks);
    tracing::info!(stream = %stream.id(), "Local media acquired");
    Ok(stream)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::track::{TrackFeed, TrackSource};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig {
            camera_device: "/dev/video2".to_string(),
            microphone: Some("USB Mic".to_string()),
            capture_width: 1280,
            capture_height: 720,
            preview_fps: 30,
            ..AppConfig::default()
        };

        let devices = NativeMediaDevices::new(&config);
        assert_eq!(devices.camera.device_path, "/dev/video2");
        assert_eq!((devices.camera.width, devices.camera.height), (1280, 720));
        assert_eq!(devices.camera.fps, 30);
        assert_eq!(devices.microphone.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn test_rejects_empty_request_without_touching_hardware() {
        let devices = NativeMediaDevices::new(&AppConfig::default());
        let result = devices.get_user_media(&MediaStreamConstraints {
            video: false,
            audio: false,
        });
        assert!(matches!(result, Err(MediaError::InvalidConstraints(_))));
    }

    struct FlagSource(Arc<AtomicBool>);

    impl TrackSource for FlagSource {
        fn stop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn fake_track(feed: TrackFeed, stopped: &Arc<AtomicBool>) -> MediaStreamTrack {
        MediaStreamTrack::new(
            "fake",
            feed,
            Arc::new(AtomicBool::new(true)),
            Box::new(FlagSource(Arc::clone(stopped))),
        )
    }

    const BOTH: MediaStreamConstraints = MediaStreamConstraints {
        video: true,
        audio: true,
    };

    #[test]
    fn test_microphone_failure_stops_camera() {
        let camera_stopped = Arc::new(AtomicBool::new(false));

        let result = open_stream(
            &BOTH,
            || Ok(fake_track(TrackFeed::video(), &camera_stopped)),
            || Err(MediaError::NotReadable("microphone".to_string())),
        );

        assert_eq!(
            result.unwrap_err(),
            MediaError::NotReadable("microphone".to_string())
        );
        assert!(camera_stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_camera_failure_skips_microphone() {
        let mut microphone_opened = false;

        let result = open_stream(
            &BOTH,
            || Err(MediaError::NotAllowed("camera".to_string())),
            || {
                microphone_opened = true;
                Err(MediaError::Backend("unreachable".to_string()))
            },
        );

        assert_eq!(
            result.unwrap_err(),
            MediaError::NotAllowed("camera".to_string())
        );
        assert!(!microphone_opened);
    }

    #[test]
    fn test_opens_only_requested_devices() {
        let stopped = Arc::new(AtomicBool::new(false));

        let stream = open_stream(
            &MediaStreamConstraints {
                video: false,
                audio: true,
            },
            || panic!("camera must not be opened"),
            || Ok(fake_track(TrackFeed::audio(), &stopped)),
        )
        .unwrap();

        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().count(), 0);
        assert!(!stopped.load(Ordering::SeqCst));
    }
}
