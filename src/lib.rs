//! Video Call - lokale Seite eines Zwei-Personen-Videoanrufs
//!
//! Eine Desktop-Oberfläche mit:
//! - V4L2 Kamera und cpal Mikrofon als lokale Media-Quellen
//! - CallController für Anruf-, Kamera- und Mikrofon-Status
//! - Picture-in-Picture Vorschau des eigenen Streams im Webview

pub mod call;
pub mod config;
pub mod media;
pub mod preview;
pub mod view;

use anyhow::Context;
use call::{CallController, CallEvent};
use config::AppConfig;
use media::{MediaDeviceInfo, MediaDevices, NativeMediaDevices};
use once_cell::sync::OnceCell;
use preview::WebviewPreview;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager, State, WindowEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use view::CallView;

/// Log-Filter falls `RUST_LOG` nicht gesetzt ist
const DEFAULT_LOG_FILTER: &str = "video_call_lib=debug,cpal=warn";

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Globaler Application State
pub struct AppState {
    controller: Arc<CallController>,
    devices: Arc<NativeMediaDevices>,
}

/// Singleton für den AppState
static APP_STATE: OnceCell<Arc<AppState>> = OnceCell::new();

impl AppState {
    /// Initialisiert den Application State
    pub fn init(app: &AppHandle) -> anyhow::Result<Arc<Self>> {
        // Logging initialisieren
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

        tracing::info!("Initializing Video Call...");

        let config = AppConfig::from_env().context("Invalid configuration in environment")?;
        tracing::info!(
            camera = %config.camera_device,
            microphone = ?config.microphone,
            width = config.capture_width,
            height = config.capture_height,
            fps = config.preview_fps,
            "Configuration loaded"
        );

        let devices = Arc::new(NativeMediaDevices::new(&config));
        let preview = Arc::new(WebviewPreview::new(
            app.clone(),
            config.preview_fps,
            config.preview_quality,
        ));
        let controller = Arc::new(CallController::new(devices.clone(), preview));

        let state = Arc::new(Self {
            controller,
            devices,
        });

        APP_STATE
            .set(Arc::clone(&state))
            .map_err(|_| anyhow::anyhow!("AppState already initialized"))?;

        Ok(state)
    }

    /// Gibt den globalen AppState zurück
    pub fn get() -> Option<Arc<Self>> {
        APP_STATE.get().cloned()
    }
}

// ============================================================================
// TAURI COMMANDS - CALL
// ============================================================================

/// Startet oder beendet den Anruf
#[tauri::command]
async fn toggle_call(state: State<'_, Arc<AppState>>) -> Result<CallView, String> {
    let snapshot = state
        .controller
        .toggle_call()
        .await
        .map_err(|e| e.to_string())?;
    Ok(CallView::from_snapshot(&snapshot))
}

/// Schaltet die Kamera an oder aus
#[tauri::command]
async fn toggle_video(state: State<'_, Arc<AppState>>) -> Result<CallView, String> {
    Ok(CallView::from_snapshot(&state.controller.toggle_video()))
}

/// Schaltet das Mikrofon an oder aus
#[tauri::command]
async fn toggle_audio(state: State<'_, Arc<AppState>>) -> Result<CallView, String> {
    Ok(CallView::from_snapshot(&state.controller.toggle_audio()))
}

/// Gibt die aktuelle Oberfläche zurück
#[tauri::command]
async fn get_call_view(state: State<'_, Arc<AppState>>) -> Result<CallView, String> {
    Ok(CallView::from_snapshot(&state.controller.snapshot()))
}

/// Verwirft die Fehlermeldung
#[tauri::command]
async fn clear_error(state: State<'_, Arc<AppState>>) -> Result<CallView, String> {
    Ok(CallView::from_snapshot(&state.controller.clear_error()))
}

// ============================================================================
// TAURI COMMANDS - DEVICES
// ============================================================================

/// Eingangspegel des Mikrofons (0.0 - 1.0)
#[tauri::command]
async fn get_audio_level(state: State<'_, Arc<AppState>>) -> Result<f32, String> {
    Ok(state.controller.audio_level())
}

/// Gibt alle Kameras und Mikrofone zurück
#[tauri::command]
async fn get_media_devices(
    state: State<'_, Arc<AppState>>,
) -> Result<Vec<MediaDeviceInfo>, String> {
    // Geräte-Enumeration blockiert (ALSA, V4L2)
    let devices = Arc::clone(&state.devices);
    tokio::task::spawn_blocking(move || devices.enumerate_devices())
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

// ============================================================================
// EVENT HANDLER
// ============================================================================

/// Leitet Controller-Events an das Frontend weiter
async fn forward_call_events(app_handle: AppHandle, mut event_rx: broadcast::Receiver<CallEvent>) {
    loop {
        let event = match event_rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Call event forwarder lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            CallEvent::StateChanged(snapshot) => {
                tracing::debug!(phase = ?snapshot.phase, "Call state changed");
                let _ = app_handle.emit("call:view_changed", CallView::from_snapshot(&snapshot));
            }
            CallEvent::StreamAcquired { stream_id } => {
                tracing::info!(stream = %stream_id, "Call started");
            }
            CallEvent::StreamReleased { stream_id } => {
                tracing::info!(stream = %stream_id, "Call ended");
            }
            CallEvent::Error(err) => {
                tracing::error!("Call error: {}", err);
                let _ = app_handle.emit("call:error", &err);
            }
        }
    }
}

// ============================================================================
// TAURI APP RUNNER
// ============================================================================

/// Startet die Tauri-Anwendung
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.set_focus();
            }
        }))
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            // App State initialisieren
            let state = AppState::init(app.handle())?;

            tauri::async_runtime::spawn(forward_call_events(
                app.handle().clone(),
                state.controller.subscribe(),
            ));

            // State im Tauri-App registrieren
            app.manage(state);

            Ok(())
        })
        .on_window_event(|_window, event| {
            if matches!(event, WindowEvent::CloseRequested { .. } | WindowEvent::Destroyed) {
                // Kamera und Mikrofon freigeben, bevor das Fenster weg ist
                if let Some(state) = AppState::get() {
                    state.controller.shutdown();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            // Call
            toggle_call,
            toggle_video,
            toggle_audio,
            get_call_view,
            clear_error,
            // Devices
            get_audio_level,
            get_media_devices,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
