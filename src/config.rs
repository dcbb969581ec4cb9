//! Konfiguration über Umgebungsvariablen
//!
//! Alle Werte haben Defaults; ungültige Werte sind ein Startfehler.

use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const ENV_CAMERA: &str = "VIDEO_CALL_CAMERA";
pub const ENV_MICROPHONE: &str = "VIDEO_CALL_MICROPHONE";
pub const ENV_CAPTURE_WIDTH: &str = "VIDEO_CALL_CAPTURE_WIDTH";
pub const ENV_CAPTURE_HEIGHT: &str = "VIDEO_CALL_CAPTURE_HEIGHT";
pub const ENV_PREVIEW_FPS: &str = "VIDEO_CALL_PREVIEW_FPS";
pub const ENV_PREVIEW_QUALITY: &str = "VIDEO_CALL_PREVIEW_QUALITY";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// V4L2-Gerätepfad der Kamera
    pub camera_device: String,
    /// Name des Eingabegeräts, `None` = Standardgerät
    pub microphone: Option<String>,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Maximale Frame-Rate der Vorschau im Webview
    pub preview_fps: u32,
    /// JPEG-Qualität der Vorschau (1 - 100)
    pub preview_quality: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            microphone: None,
            capture_width: 640,
            capture_height: 480,
            preview_fps: 15,
            preview_quality: 70,
        }
    }
}

impl AppConfig {
    /// Liest die Konfiguration aus der Prozess-Umgebung
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Liest die Konfiguration über eine beliebige Lookup-Funktion
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            camera_device: value(ENV_CAMERA).unwrap_or(defaults.camera_device),
            microphone: value(ENV_MICROPHONE),
            capture_width: parse_ranged(
                ENV_CAPTURE_WIDTH,
                value(ENV_CAPTURE_WIDTH),
                defaults.capture_width,
                16,
                7680,
            )?,
            capture_height: parse_ranged(
                ENV_CAPTURE_HEIGHT,
                value(ENV_CAPTURE_HEIGHT),
                defaults.capture_height,
                16,
                4320,
            )?,
            preview_fps: parse_ranged(
                ENV_PREVIEW_FPS,
                value(ENV_PREVIEW_FPS),
                defaults.preview_fps,
                1,
                60,
            )?,
            preview_quality: parse_ranged(
                ENV_PREVIEW_QUALITY,
                value(ENV_PREVIEW_QUALITY),
                defaults.preview_quality as u32,
                1,
                100,
            )? as u8,
        })
    }
}

fn parse_ranged(
    key: &'static str,
    raw: Option<String>,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    let invalid = |reason: String| ConfigError::InvalidValue {
        key,
        value: raw.clone(),
        reason,
    };

    let parsed: u32 = raw.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    if !(min..=max).contains(&parsed) {
        return Err(invalid(format!("expected {}..={}", min, max)));
    }
    Ok(parsed)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        assert_eq!(config_from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_CAMERA, "/dev/video2"),
            (ENV_MICROPHONE, "USB Audio"),
            (ENV_CAPTURE_WIDTH, "1280"),
            (ENV_CAPTURE_HEIGHT, "720"),
            (ENV_PREVIEW_FPS, " 30 "),
            (ENV_PREVIEW_QUALITY, "90"),
        ])
        .unwrap();

        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.microphone.as_deref(), Some("USB Audio"));
        assert_eq!((config.capture_width, config.capture_height), (1280, 720));
        assert_eq!(config.preview_fps, 30);
        assert_eq!(config.preview_quality, 90);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = config_from(&[(ENV_CAMERA, ""), (ENV_MICROPHONE, "  ")]).unwrap();
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.microphone, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[(ENV_PREVIEW_FPS, "fast")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_PREVIEW_FPS,
                ..
            }
        ));

        assert!(config_from(&[(ENV_PREVIEW_FPS, "0")]).is_err());
        assert!(config_from(&[(ENV_PREVIEW_QUALITY, "101")]).is_err());
    }
}
