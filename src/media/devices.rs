//! Zugriff auf lokale Capture-Geräte
//!
//! `MediaDevices` ist die Schnittstelle zwischen dem Call-Controller und
//! der Hardware. Die native Implementierung öffnet Kamera und Mikrofon,
//! Tests verwenden eigene Implementierungen.

use super::stream::{MediaStream, MediaStreamConstraints};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Permission to access {0} was denied")]
    NotAllowed(String),

    #[error("No {0} device found")]
    NotFound(String),

    #[error("Could not start {0}: device is busy or failed")]
    NotReadable(String),

    #[error("Invalid capture request: {0}")]
    InvalidConstraints(String),

    #[error("Media backend error: {0}")]
    Backend(String),
}

impl MediaError {
    /// Ordnet einen I/O-Fehler beim Öffnen eines Geräts zu
    pub fn from_io(device: &str, err: &std::io::Error) -> Self {
        /// EBUSY unter Linux
        const EBUSY: i32 = 16;

        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::NotAllowed(device.to_string()),
            std::io::ErrorKind::NotFound => Self::NotFound(device.to_string()),
            _ if err.raw_os_error() == Some(EBUSY) => Self::NotReadable(device.to_string()),
            _ => Self::Backend(format!("{}: {}", device, err)),
        }
    }
}

// ============================================================================
// DEVICE INFO
// ============================================================================

/// Geräteklasse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    VideoInput,
}

/// Beschreibung eines verfügbaren Capture-Geräts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
    pub is_default: bool,
}

// ============================================================================
// MEDIA DEVICES
// ============================================================================

/// Capture-Fähigkeit für lokale Media Streams
pub trait MediaDevices: Send + Sync {
    /// Öffnet die angeforderten Geräte
    ///
    /// Blockiert bis alle Geräte laufen oder ein Fehler auftritt. Schlägt ein
    /// Gerät fehl, müssen bereits geöffnete Geräte wieder freigegeben sein.
    fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, MediaError>;

    /// Listet verfügbare Kameras und Mikrofone
    fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, MediaError>;
}

// ============================================================================
// TESTS
// ============================================================================
