//! Lokaler Media Stream
//!
//! Ein Stream bündelt die Tracks, die bei einer einzelnen
//! Capture-Anfrage geöffnet wurden.

use super::devices::MediaError;
use super::track::{MediaStreamTrack, TrackKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// CONSTRAINTS
// ============================================================================

/// Welche Geräte eine Capture-Anfrage öffnen soll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaStreamConstraints {
    /// Mindestens ein Gerät muss angefordert werden
    pub fn validate(&self) -> Result<(), MediaError> {
        if !self.video && !self.audio {
            return Err(MediaError::InvalidConstraints(
                "at least one of audio and video must be requested".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// MEDIA STREAM
// ============================================================================

/// Satz von Live-Tracks aus Kamera und Mikrofon
#[derive(Debug)]
pub struct MediaStream {
    id: Uuid,
    acquired_at: DateTime<Utc>,
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaStreamTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            acquired_at: Utc::now(),
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks.iter()
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Stoppt alle Tracks und gibt die Geräte frei
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
        tracing::info!(stream = %self.id, tracks = self.tracks.len(), "Media stream stopped");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::track::{TrackFeed, TrackSource, TrackState};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    struct NoopSource;

    impl TrackSource for NoopSource {
        fn stop(&mut self) {}
    }

    fn track(feed: TrackFeed) -> MediaStreamTrack {
        MediaStreamTrack::new(
            "dev",
            feed,
            Arc::new(AtomicBool::new(true)),
            Box::new(NoopSource),
        )
    }

    #[test]
    fn test_constraints_require_a_device() {
        let none = MediaStreamConstraints {
            video: false,
            audio: false,
        };
        assert!(matches!(
            none.validate(),
            Err(MediaError::InvalidConstraints(_))
        ));

        let audio_only = MediaStreamConstraints {
            video: false,
            audio: true,
        };
        assert!(audio_only.validate().is_ok());
    }

    #[test]
    fn test_tracks_by_kind() {
        let stream = MediaStream::new(vec![
            track(TrackFeed::video()),
            track(TrackFeed::audio()),
        ]);

        assert_eq!(stream.tracks().count(), 2);
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.audio_tracks().count(), 1);
        assert!(stream
            .video_tracks()
            .all(|t| t.kind() == TrackKind::Video));
    }

    #[test]
    fn test_stop_ends_every_track() {
        let stream = MediaStream::new(vec![
            track(TrackFeed::video()),
            track(TrackFeed::audio()),
        ]);

        stream.stop();

        assert!(stream.tracks().all(|t| t.ready_state() == TrackState::Ended));
    }
}
