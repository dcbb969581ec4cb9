//! Anrufstatus und Events

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Phase des lokalen Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    /// Kein Anruf, kein Stream
    Inactive,
    /// Anruf aktiv, Geräte werden geöffnet
    Acquiring,
    /// Anruf aktiv, Stream an die Vorschau gebunden
    Active,
}

/// Momentaufnahme des Controller-Zustands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub call_active: bool,
    pub phase: CallPhase,
    pub stream_id: Option<Uuid>,
    /// Zeitpunkt, an dem der gebundene Stream erfasst wurde
    pub started_at: Option<DateTime<Utc>>,
    /// Letzter Fehler beim Öffnen der Geräte
    pub error: Option<String>,
}

/// Events die vom CallController ausgelöst werden
#[derive(Debug, Clone)]
pub enum CallEvent {
    StateChanged(CallSnapshot),
    StreamAcquired { stream_id: Uuid },
    StreamReleased { stream_id: Uuid },
    Error(String),
}
