//! Media Stream Tracks
//!
//! Ein Track ist ein einzelner Audio- oder Video-Kanal eines Streams.
//! Er kann unabhängig aktiviert/deaktiviert werden, ohne das Gerät
//! freizugeben. Erst `stop()` beendet den Track und gibt die Hardware frei.

use super::frame::VideoFrame;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Anzahl gepufferter Video-Frames pro Track
///
/// Langsame Empfänger verlieren ältere Frames (broadcast lag).
const FRAME_CHANNEL_CAPACITY: usize = 4;

// ============================================================================
// TRACK TYPES
// ============================================================================

/// Art eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Lebenszyklus eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Gerät ist geöffnet
    Live,
    /// Track wurde gestoppt, Gerät freigegeben
    Ended,
}

/// Hardware-Quelle hinter einem Track (Capture-Thread, Gerät, ...)
pub trait TrackSource: Send {
    /// Gibt das Gerät frei. Wird höchstens einmal aufgerufen.
    fn stop(&mut self);
}

/// Daten, die ein Track für Konsumenten bereitstellt
#[derive(Clone)]
pub enum TrackFeed {
    /// RMS-Pegel des Mikrofons (0.0 - 1.0)
    Audio { level: Arc<Mutex<f32>> },
    /// Kamera-Frames für die Vorschau
    Video { frames: broadcast::Sender<VideoFrame> },
}

impl TrackFeed {
    pub fn audio() -> Self {
        Self::Audio {
            level: Arc::new(Mutex::new(0.0)),
        }
    }

    pub fn video() -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self::Video { frames }
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Audio { .. } => TrackKind::Audio,
            Self::Video { .. } => TrackKind::Video,
        }
    }
}

// ============================================================================
// MEDIA STREAM TRACK
// ============================================================================

/// Ein Audio- oder Video-Track eines lokalen Media Streams
pub struct MediaStreamTrack {
    id: Uuid,
    label: String,
    feed: TrackFeed,
    /// Wird vom Capture-Thread gelesen
    enabled: Arc<AtomicBool>,
    state: Mutex<TrackState>,
    source: Mutex<Option<Box<dyn TrackSource>>>,
}

impl MediaStreamTrack {
    /// Erstellt einen Live-Track
    ///
    /// `enabled` muss dasselbe Flag sein, das die Quelle beim Capturen liest.
    pub fn new(
        label: impl Into<String>,
        feed: TrackFeed,
        enabled: Arc<AtomicBool>,
        source: Box<dyn TrackSource>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            feed,
            enabled,
            state: Mutex::new(TrackState::Live),
            source: Mutex::new(Some(source)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.feed.kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Aktiviert/deaktiviert den Track ohne das Gerät freizugeben
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(track = %self.id, kind = ?self.kind(), enabled, "Track enabled changed");
    }

    pub fn ready_state(&self) -> TrackState {
        *self.state.lock()
    }

    /// Stoppt den Track und gibt das Gerät frei (idempotent)
    pub fn stop(&self) {
        let source = {
            let mut state = self.state.lock();
            if *state == TrackState::Ended {
                return;
            }
            *state = TrackState::Ended;
            self.source.lock().take()
        };

        if let Some(mut source) = source {
            source.stop();
        }

        tracing::info!(track = %self.id, kind = ?self.kind(), label = %self.label, "Track stopped");
    }

    /// Aktueller Eingangspegel (nur Audio, sonst 0.0)
    pub fn level(&self) -> f32 {
        match &self.feed {
            TrackFeed::Audio { level } if self.ready_state() == TrackState::Live => *level.lock(),
            _ => 0.0,
        }
    }

    /// Abonniert die Frames eines Video-Tracks
    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<VideoFrame>> {
        match &self.feed {
            TrackFeed::Video { frames } => Some(frames.subscribe()),
            TrackFeed::Audio { .. } => None,
        }
    }
}

impl Drop for MediaStreamTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaStreamTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamTrack")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("label", &self.label)
            .field("enabled", &self.is_enabled())
            .field("state", &self.ready_state())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource(Arc<AtomicUsize>);

    impl TrackSource for CountingSource {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn track(feed: TrackFeed) -> (MediaStreamTrack, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let track = MediaStreamTrack::new(
            "test device",
            feed,
            Arc::new(AtomicBool::new(true)),
            Box::new(CountingSource(Arc::clone(&stops))),
        );
        (track, stops)
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (track, stops) = track(TrackFeed::audio());
        assert_eq!(track.ready_state(), TrackState::Live);

        track.stop();
        track.stop();

        assert_eq!(track.ready_state(), TrackState::Ended);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_device() {
        let (track, stops) = track(TrackFeed::video());
        drop(track);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_enabled_is_shared_with_source() {
        let enabled = Arc::new(AtomicBool::new(true));
        let track = MediaStreamTrack::new(
            "cam",
            TrackFeed::video(),
            Arc::clone(&enabled),
            Box::new(CountingSource(Arc::new(AtomicUsize::new(0)))),
        );

        track.set_enabled(false);
        assert!(!enabled.load(Ordering::SeqCst));
        assert!(!track.is_enabled());
        // Deaktivieren beendet den Track nicht
        assert_eq!(track.ready_state(), TrackState::Live);
    }

    #[test]
    fn test_feed_kinds() {
        let (audio, _) = track(TrackFeed::audio());
        let (video, _) = track(TrackFeed::video());

        assert_eq!(audio.kind(), TrackKind::Audio);
        assert!(audio.subscribe_frames().is_none());
        assert_eq!(video.kind(), TrackKind::Video);
        assert!(video.subscribe_frames().is_some());

        assert_eq!(audio.label(), "test device");
        assert_ne!(audio.id(), video.id());
    }

    #[test]
    fn test_level_is_zero_after_stop() {
        let feed = TrackFeed::audio();
        if let TrackFeed::Audio { level } = &feed {
            *level.lock() = 0.5;
        }
        let (track, _) = track(feed);
        assert!((track.level() - 0.5).abs() < f32::EPSILON);

        track.stop();
        assert_eq!(track.level(), 0.0);
    }
}
