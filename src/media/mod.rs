//! Media Module - Lokale Kamera- und Mikrofon-Erfassung
//!
//! Dieses Modul verwaltet:
//! - Media Streams und Tracks (aktivieren, deaktivieren, stoppen)
//! - Kamera-Capture über V4L2 (Linux)
//! - Mikrofon-Capture über cpal
//! - Vorschau-Frames (JPEG) für das Webview

mod camera;
mod devices;
mod frame;
mod microphone;
mod native;
mod stream;
mod track;

pub use devices::{DeviceKind, MediaDeviceInfo, MediaDevices, MediaError};
pub use frame::{PixelFormat, VideoFrame};
pub use native::NativeMediaDevices;
pub use stream::{MediaStream, MediaStreamConstraints};
pub use track::{MediaStreamTrack, TrackFeed, TrackKind, TrackSource, TrackState};
