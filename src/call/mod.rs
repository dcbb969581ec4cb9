//! Call Module - Anrufstatus und lokaler Stream
//!
//! Dieses Modul verwaltet:
//! - Die drei Flags (Video, Audio, Anruf aktiv)
//! - Erfassen und Freigeben des lokalen Media Streams
//! - Binden des Streams an die Vorschau

mod controller;
mod preview;
mod state;

pub use controller::{CallController, CallError};
pub use preview::PreviewSurface;
pub use state::{CallEvent, CallPhase, CallSnapshot};
