//! Kamera-Frames und Vorschau-Kodierung
//!
//! Die Vorschau im Webview zeigt JPEG-Bilder an. MJPG-Frames der Kamera
//! werden unverändert weitergereicht, YUYV wird nach RGB konvertiert
//! und neu kodiert.

use super::devices::MediaError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::sync::Arc;

// ============================================================================
// PIXEL FORMAT
// ============================================================================

/// Pixelformat eines Kamera-Frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    /// Motion-JPEG, jeder Frame ist ein vollständiges JPEG
    Mjpeg,
    /// YUV 4:2:2 gepackt (Y0 U Y1 V)
    Yuyv,
    /// Nicht unterstütztes Format (FourCC)
    Other(String),
}

impl PixelFormat {
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"MJPG" => Self::Mjpeg,
            b"YUYV" => Self::Yuyv,
            other => Self::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

// ============================================================================
// VIDEO FRAME
// ============================================================================

/// Ein von der Kamera erfasster Frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
    pub sequence: u32,
}

impl VideoFrame {
    /// Kodiert den Frame als JPEG
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, MediaError> {
        match &self.format {
            PixelFormat::Mjpeg => Ok(self.data.to_vec()),
            PixelFormat::Yuyv => {
                let rgb = yuyv_to_rgb(&self.data, self.width, self.height)?;
                let mut out = Vec::new();
                JpegEncoder::new_with_quality(&mut out, quality)
                    .encode(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
                    .map_err(|e| MediaError::Backend(format!("JPEG encoding failed: {}", e)))?;
                Ok(out)
            }
            PixelFormat::Other(fourcc) => Err(MediaError::Backend(format!(
                "Unsupported pixel format for preview: {}",
                fourcc
            ))),
        }
    }

    /// JPEG als `data:`-URL für ein `<img>` im Webview
    pub fn to_data_url(&self, quality: u8) -> Result<String, MediaError> {
        let jpeg = self.to_jpeg(quality)?;
        Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)))
    }
}

/// Konvertiert YUYV (BT.601) nach RGB8
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MediaError> {
    let pixels = width as usize * height as usize;
    if width % 2 != 0 || data.len() < pixels * 2 {
        return Err(MediaError::Backend(format!(
            "Invalid YUYV frame: {}x{} with {} bytes",
            width,
            height,
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

// ============================================================================
// TESTS
// ============================================================================
