//! Vorschau im Webview
//!
//! Sendet die Frames des lokalen Video-Tracks als JPEG Data-URLs an die
//! Seite, gedrosselt auf die konfigurierte Frame-Rate.

use crate::call::PreviewSurface;
use crate::media::{MediaStream, VideoFrame};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tauri::async_runtime::JoinHandle;
use tauri::{AppHandle, Emitter};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

pub const EVENT_BOUND: &str = "preview:bound";
pub const EVENT_FRAME: &str = "preview:frame";
pub const EVENT_UNBOUND: &str = "preview:unbound";

// ============================================================================
// FRAME THROTTLE
// ============================================================================

/// Lässt höchstens `fps` Frames pro Sekunde durch
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            last_sent: None,
        }
    }

    /// Prüft, ob ein Frame zum Zeitpunkt `now` gesendet werden darf
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BoundPayload {
    stream_id: Uuid,
    has_video: bool,
    has_audio: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct FramePayload {
    stream_id: Uuid,
    width: u32,
    height: u32,
    data_url: String,
}

// ============================================================================
// WEBVIEW PREVIEW
// ============================================================================

/// `PreviewSurface` für das Picture-in-Picture Element der Seite
pub struct WebviewPreview {
    app: AppHandle,
    fps: u32,
    quality: u8,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl WebviewPreview {
    pub fn new(app: AppHandle, fps: u32, quality: u8) -> Self {
        Self {
            app,
            fps,
            quality,
            forwarder: Mutex::new(None),
        }
    }

    fn stop_forwarder(&self) -> bool {
        match self.forwarder.lock().take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl PreviewSurface for WebviewPreview {
    fn bind(&self, stream: &MediaStream) {
        self.stop_forwarder();

        let stream_id = stream.id();
        let frames = stream.video_tracks().find_map(|t| t.subscribe_frames());

        let _ = self.app.emit(
            EVENT_BOUND,
            BoundPayload {
                stream_id,
                has_video: frames.is_some(),
                has_audio: stream.audio_tracks().next().is_some(),
            },
        );

        let Some(mut frames) = frames else {
            tracing::debug!(stream = %stream_id, "Stream has no video, preview stays blank");
            return;
        };

        let app = self.app.clone();
        let quality = self.quality;
        let mut throttle = FrameThrottle::new(self.fps);

        let task = tauri::async_runtime::spawn(async move {
            loop {
                let frame: VideoFrame = match frames.recv().await {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::trace!(skipped, "Preview lagging behind camera");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !throttle.admit(Instant::now()) {
                    continue;
                }

                // JPEG-Kodierung blockiert, nicht auf dem Runtime-Thread
                let encoded = tokio::task::spawn_blocking(move || {
                    frame.to_data_url(quality).map(|url| (frame, url))
                })
                .await;

                match encoded {
                    Ok(Ok((frame, data_url))) => {
                        let _ = app.emit(
                            EVENT_FRAME,
                            FramePayload {
                                stream_id,
                                width: frame.width,
                                height: frame.height,
                                data_url,
                            },
                        );
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to encode preview frame: {}", e);
                    }
                    Err(_) => break,
                }
            }
            tracing::debug!(stream = %stream_id, "Preview forwarder finished");
        });

        *self.forwarder.lock() = Some(task);
    }

    fn unbind(&self) {
        if self.stop_forwarder() {
            tracing::debug!("Preview unbound");
        }
        let _ = self.app.emit(EVENT_UNBOUND, ());
    }
}

// ============================================================================
// TESTS
// ============================================================================
