//! View Model für die Anruf-Oberfläche
//!
//! Das Webview rendert ausschließlich, was hier berechnet wird: die
//! Remote-Fläche (Platzhalter oder Video), die lokale Vorschau und die
//! drei Buttons der Steuerleiste.

use crate::call::{CallPhase, CallSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Text der Remote-Fläche solange niemand verbunden ist
pub const WAITING_MESSAGE: &str = "Waiting for someone to join...";

// ============================================================================
// VIEW TYPES
// ============================================================================

/// Große Fläche für das Gegenüber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemoteSurface {
    Placeholder { message: String },
    Video,
}

/// Picture-in-Picture Vorschau des eigenen Streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSurface {
    /// Vorschau-Element sichtbar (Anruf aktiv)
    pub visible: bool,
    /// Eigener Ton wird nie lokal abgespielt
    pub muted: bool,
    /// Kamera deaktiviert, Vorschau schwarz
    pub blanked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlAction {
    ToggleVideo,
    ToggleAudio,
    ToggleCall,
}

/// Farbgebung eines Buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Danger,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlButton {
    pub action: ControlAction,
    /// Name des Icons (lucide)
    pub icon: &'static str,
    pub tone: Tone,
    pub label: &'static str,
}

/// Komplette Oberfläche
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallView {
    pub remote: RemoteSurface,
    pub local: LocalSurface,
    pub controls: Vec<ControlButton>,
    /// Geräte werden gerade geöffnet
    pub busy: bool,
    pub error: Option<String>,
    /// Beginn des Anrufs, die Seite zeigt daraus die Dauer an
    pub started_at: Option<DateTime<Utc>>,
}

// ============================================================================
// RENDERING
// ============================================================================

impl CallView {
    pub fn from_snapshot(snapshot: &CallSnapshot) -> Self {
        let remote = if snapshot.call_active {
            RemoteSurface::Video
        } else {
            RemoteSurface::Placeholder {
                message: WAITING_MESSAGE.to_string(),
            }
        };

        let local = LocalSurface {
            visible: snapshot.call_active,
            muted: true,
            blanked: !snapshot.video_enabled,
        };

        Self {
            remote,
            local,
            controls: vec![
                video_button(snapshot.video_enabled),
                audio_button(snapshot.audio_enabled),
                call_button(snapshot.call_active),
            ],
            busy: snapshot.phase == CallPhase::Acquiring,
            error: snapshot.error.clone(),
            started_at: snapshot.started_at,
        }
    }
}

fn video_button(enabled: bool) -> ControlButton {
    ControlButton {
        action: ControlAction::ToggleVideo,
        icon: if enabled { "video" } else { "video-off" },
        tone: if enabled { Tone::Neutral } else { Tone::Danger },
        label: if enabled { "Turn camera off" } else { "Turn camera on" },
    }
}

fn audio_button(enabled: bool) -> ControlButton {
    ControlButton {
        action: ControlAction::ToggleAudio,
        icon: if enabled { "mic" } else { "mic-off" },
        tone: if enabled { Tone::Neutral } else { Tone::Danger },
        label: if enabled { "Mute microphone" } else { "Unmute microphone" },
    }
}

fn call_button(active: bool) -> ControlButton {
    ControlButton {
        action: ControlAction::ToggleCall,
        icon: if active { "phone-off" } else { "phone" },
        tone: if active { Tone::Danger } else { Tone::Success },
        label: if active { "End call" } else { "Start call" },
    }
}

// ============================================================================
// TESTS
// ============================================================================
