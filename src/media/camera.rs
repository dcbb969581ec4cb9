//! Kamera-Capture über V4L2
//!
//! Der Capture-Thread öffnet das Gerät, handelt MJPG aus (der Treiber darf
//! ein anderes Format wählen) und verteilt Frames über einen
//! broadcast-Channel an die Vorschau. Ist der Track deaktiviert, werden
//! Frames verworfen.

use super::devices::{MediaDeviceInfo, MediaError};
use super::track::MediaStreamTrack;

/// Kamera-Parameter für eine Capture-Anfrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[cfg(target_os = "linux")]
pub use linux::{list_cameras, open_camera};

#[cfg(not(target_os = "linux"))]
pub use unsupported::{list_cameras, open_camera};

// ============================================================================
// LINUX (V4L2)
// ============================================================================

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use crate::media::devices::DeviceKind;
    use crate::media::frame::{PixelFormat, VideoFrame};
    use crate::media::track::{TrackFeed, TrackSource};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread::JoinHandle;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::prelude::*;
    use v4l::video::capture::Parameters;
    use v4l::video::Capture;
    use v4l::{Format, FourCC};

    const DEVICE: &str = "camera";

    /// Anzahl der mmap-Buffer
    const BUFFER_COUNT: u32 = 4;

    /// Maximale Wartezeit auf einen Frame, damit stop() nicht hängt
    const FRAME_TIMEOUT: Duration = Duration::from_secs(1);

    /// Besitzt den Capture-Thread eines Video-Tracks
    struct CameraSource {
        running: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl TrackSource for CameraSource {
        fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.thread.take() {
                match handle.join() {
                    Ok(_) => tracing::info!("Camera capture thread stopped"),
                    Err(_) => tracing::warn!("Camera capture thread panicked"),
                }
            }
        }
    }

    /// Öffnet die Kamera und gibt einen Live-Video-Track zurück
    ///
    /// Kehrt erst zurück, wenn der erste Frame erfasst wurde; ein belegtes
    /// Gerät fällt dadurch schon hier auf.
    pub fn open_camera(settings: &CameraSettings) -> Result<MediaStreamTrack, MediaError> {
        let enabled = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));
        let feed = TrackFeed::video();
        let frames = match &feed {
            TrackFeed::Video { frames } => frames.clone(),
            TrackFeed::Audio { .. } => {
                return Err(MediaError::Backend("camera needs a video feed".to_string()))
            }
        };

        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, MediaError>>();
        let thread_settings = settings.clone();
        let thread_enabled = Arc::clone(&enabled);
        let thread_running = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                capture_thread(
                    &thread_settings,
                    frames,
                    thread_enabled,
                    thread_running,
                    ready_tx,
                )
            })
            .map_err(|e| MediaError::Backend(format!("Failed to spawn camera thread: {}", e)))?;

        let label = match ready_rx.recv() {
            Ok(Ok(label)) => label,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MediaError::Backend(
                    "Camera thread exited before reporting".to_string(),
                ));
            }
        };

        Ok(MediaStreamTrack::new(
            label,
            feed,
            enabled,
            Box::new(CameraSource {
                running,
                thread: Some(thread),
            }),
        ))
    }

    /// Listet alle V4L2-Geräte
    pub fn list_cameras(default_path: &str) -> Vec<MediaDeviceInfo> {
        v4l::context::enum_devices()
            .into_iter()
            .map(|node| {
                let path = node.path().to_string_lossy().into_owned();
                MediaDeviceInfo {
                    kind: DeviceKind::VideoInput,
                    label: node.name().unwrap_or_else(|| path.clone()),
                    is_default: path == default_path,
                    device_id: path,
                }
            })
            .collect()
    }

    /// Öffnet das Gerät und setzt das Capture-Format
    fn open_device(settings: &CameraSettings) -> Result<(Device, Format, String), MediaError> {
        let dev = Device::with_path(&settings.device_path)
            .map_err(|e| MediaError::from_io(DEVICE, &e))?;

        let label = dev
            .query_caps()
            .map(|caps| caps.card)
            .unwrap_or_else(|_| settings.device_path.clone());

        let mut format = dev.format().map_err(|e| MediaError::from_io(DEVICE, &e))?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = FourCC::new(b"MJPG");

        let format = match dev.set_format(&format) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "Could not set camera format, using current device format");
                dev.format().map_err(|e| MediaError::from_io(DEVICE, &e))?
            }
        };

        if let Err(e) = dev.set_params(&Parameters::with_fps(settings.fps)) {
            tracing::debug!(error = %e, fps = settings.fps, "Camera rejected frame rate");
        }

        tracing::info!(
            device = %settings.device_path,
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            "Camera format negotiated"
        );

        Ok((dev, format, label))
    }

    fn capture_thread(
        settings: &CameraSettings,
        frames: broadcast::Sender<VideoFrame>,
        enabled: Arc<AtomicBool>,
        running: Arc<AtomicBool>,
        ready_tx: mpsc::Sender<Result<String, MediaError>>,
    ) {
        let (mut dev, format, label) = match open_device(settings) {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, BUFFER_COUNT) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(MediaError::from_io(DEVICE, &e)));
                return;
            }
        };
        stream.set_timeout(FRAME_TIMEOUT);

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr);
        if let PixelFormat::Other(fourcc) = &pixel_format {
            tracing::warn!(%fourcc, "Camera format cannot be previewed");
        }

        // Erster Frame: STREAMON schlägt bei belegtem Gerät hier fehl
        match stream.next() {
            Ok((buf, meta)) => {
                let _ = ready_tx.send(Ok(label));
                publish(&frames, &enabled, &format, &pixel_format, buf, meta.bytesused, meta.sequence);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(MediaError::from_io(DEVICE, &e)));
                return;
            }
        }

        tracing::info!("Camera capture started");

        while running.load(Ordering::SeqCst) {
            match stream.next() {
                Ok((buf, meta)) => {
                    publish(&frames, &enabled, &format, &pixel_format, buf, meta.bytesused, meta.sequence);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    tracing::debug!("Camera frame timeout");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to capture camera frame");
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        tracing::info!("Camera capture loop ended");
    }

    fn publish(
        frames: &broadcast::Sender<VideoFrame>,
        enabled: &AtomicBool,
        format: &Format,
        pixel_format: &PixelFormat,
        buf: &[u8],
        bytes_used: u32,
        sequence: u32,
    ) {
        // Deaktivierter Track: Frame verwerfen (Vorschau bleibt schwarz)
        if !enabled.load(Ordering::Relaxed) {
            return;
        }

        let used = (bytes_used as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };

        // Ohne Empfänger (keine Vorschau gebunden) ist send() ein Fehler
        let _ = frames.send(VideoFrame {
            width: format.width,
            height: format.height,
            format: pixel_format.clone(),
            data: Arc::from(data),
            sequence,
        });
    }
}

// ============================================================================
// ANDERE PLATTFORMEN
// ============================================================================

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::*;

    pub fn open_camera(settings: &CameraSettings) -> Result<MediaStreamTrack, MediaError> {
        Err(MediaError::NotFound(format!(
            "camera '{}' (no capture backend on this platform)",
            settings.device_path
        )))
    }

    pub fn list_cameras(_default_path: &str) -> Vec<MediaDeviceInfo> {
        Vec::new()
    }
}
