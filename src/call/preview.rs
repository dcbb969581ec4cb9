//! Vorschau-Fläche für den lokalen Stream
//!
//! Entspricht dem Picture-in-Picture Element der Oberfläche: der Controller
//! bindet den Stream nach erfolgreicher Erfassung und löst ihn beim
//! Beenden wieder.

use crate::media::MediaStream;

/// Ziel, auf dem der lokale Stream angezeigt wird
pub trait PreviewSurface: Send + Sync {
    /// Zeigt den Stream an
    fn bind(&self, stream: &MediaStream);

    /// Entfernt den Stream von der Anzeige (idempotent)
    fn unbind(&self);
}
