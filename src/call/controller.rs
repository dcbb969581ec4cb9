//! Call Controller
//!
//! Hält die Flags `video_enabled`, `audio_enabled` und `call_active` und
//! reagiert auf deren Änderungen:
//! - inaktiv → aktiv: lokalen Stream mit den aktuellen Flags anfordern
//!   und an die Vorschau binden
//! - aktiv → inaktiv: alle Tracks stoppen, Stream freigeben, Vorschau lösen
//!
//! Jede Anruf-Transition erhöht eine Generation. Eine Erfassung, deren
//! Generation beim Abschluss nicht mehr aktuell ist, wird sofort wieder
//! freigegeben, sodass nie zwei Streams gleichzeitig gehalten werden.

use super::preview::PreviewSurface;
use super::state::{CallEvent, CallPhase, CallSnapshot};
use crate::media::{MediaDevices, MediaError, MediaStream, MediaStreamConstraints, TrackKind};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Failed to access media devices: {0}")]
    Media(#[from] MediaError),
}

// ============================================================================
// CONTROLLER STATE
// ============================================================================

#[derive(Debug)]
struct ControllerState {
    video_enabled: bool,
    audio_enabled: bool,
    call_active: bool,
    stream: Option<MediaStream>,
    /// Token der letzten Anruf-Transition
    generation: u64,
    last_error: Option<MediaError>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
            call_active: false,
            stream: None,
            generation: 0,
            last_error: None,
        }
    }
}

impl ControllerState {
    fn snapshot(&self) -> CallSnapshot {
        let phase = match (self.call_active, &self.stream) {
            (false, _) => CallPhase::Inactive,
            (true, None) => CallPhase::Acquiring,
            (true, Some(_)) => CallPhase::Active,
        };

        CallSnapshot {
            video_enabled: self.video_enabled,
            audio_enabled: self.audio_enabled,
            call_active: self.call_active,
            phase,
            stream_id: self.stream.as_ref().map(MediaStream::id),
            started_at: self.stream.as_ref().map(MediaStream::acquired_at),
            error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    fn flag_mut(&mut self, kind: TrackKind) -> &mut bool {
        match kind {
            TrackKind::Video => &mut self.video_enabled,
            TrackKind::Audio => &mut self.audio_enabled,
        }
    }

    /// Überträgt die Flags auf die Tracks des gehaltenen Streams
    fn apply_flag(&self, kind: TrackKind) {
        let enabled = match kind {
            TrackKind::Video => self.video_enabled,
            TrackKind::Audio => self.audio_enabled,
        };

        if let Some(stream) = &self.stream {
            for track in stream.tracks().filter(|t| t.kind() == kind) {
                track.set_enabled(enabled);
            }
        }
    }
}

/// Ergebnis des Lock-Abschnitts von `toggle_call`
enum Transition {
    Start {
        token: u64,
        constraints: MediaStreamConstraints,
    },
    End(Option<MediaStream>),
}

/// Ergebnis einer abgeschlossenen Erfassung
enum Outcome {
    /// Generation nicht mehr aktuell, Stream wird verworfen
    Superseded(Result<MediaStream, MediaError>),
    Bound {
        stream_id: Uuid,
        snapshot: CallSnapshot,
    },
    Failed(MediaError),
}

/// Stoppt einen Stream im Blocking-Pool (Capture-Threads werden gejoint)
async fn stop_blocking(stream: MediaStream) {
    let stream_id = stream.id();
    if let Err(e) = tokio::task::spawn_blocking(move || stream.stop()).await {
        tracing::warn!(stream = %stream_id, "Stopping media stream failed: {}", e);
    }
}

// ============================================================================
// CALL CONTROLLER
// ============================================================================

/// Steuert den lokalen Anrufstatus und den zugehörigen Media Stream
pub struct CallController {
    state: Mutex<ControllerState>,
    devices: Arc<dyn MediaDevices>,
    preview: Arc<dyn PreviewSurface>,
    event_tx: broadcast::Sender<CallEvent>,
}

impl CallController {
    /// Erstellt einen inaktiven Controller (Video an, Audio an, kein Anruf)
    pub fn new(devices: Arc<dyn MediaDevices>, preview: Arc<dyn PreviewSurface>) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            state: Mutex::new(ControllerState::default()),
            devices,
            preview,
            event_tx,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    /// Gibt den aktuellen Zustand zurück
    pub fn snapshot(&self) -> CallSnapshot {
        self.state.lock().snapshot()
    }

    /// Startet oder beendet den Anruf
    ///
    /// Beim Starten wird gewartet, bis die Geräte offen sind. Schlägt das
    /// fehl, ist der Anruf danach wieder inaktiv und der Fehler sichtbar.
    pub async fn toggle_call(&self) -> Result<CallSnapshot, CallError> {
        let transition = {
            let mut state = self.state.lock();
            state.last_error = None;

            if state.call_active {
                Transition::End(self.end_locked(&mut state))
            } else {
                state.call_active = true;
                state.generation += 1;
                Transition::Start {
                    token: state.generation,
                    constraints: MediaStreamConstraints {
                        video: state.video_enabled,
                        audio: state.audio_enabled,
                    },
                }
            }
        };

        match transition {
            Transition::Start { token, constraints } => {
                tracing::info!(generation = token, "Call started, acquiring local media");
                self.emit_state();
                self.acquire(token, constraints).await
            }
            Transition::End(stream) => {
                tracing::info!("Call ended");
                if let Some(stream) = stream {
                    let stream_id = stream.id();
                    stop_blocking(stream).await;
                    self.emit_released(stream_id);
                }
                self.emit_state();
                Ok(self.snapshot())
            }
        }
    }

    /// Schaltet die Kamera an/aus, ohne den Stream neu anzufordern
    pub fn toggle_video(&self) -> CallSnapshot {
        self.toggle_track(TrackKind::Video)
    }

    /// Schaltet das Mikrofon an/aus, ohne den Stream neu anzufordern
    pub fn toggle_audio(&self) -> CallSnapshot {
        self.toggle_track(TrackKind::Audio)
    }

    /// Verwirft den angezeigten Fehler
    pub fn clear_error(&self) -> CallSnapshot {
        self.state.lock().last_error = None;
        self.emit_state();
        self.snapshot()
    }

    /// Eingangspegel des Mikrofons (0.0 ohne Audio-Track)
    pub fn audio_level(&self) -> f32 {
        self.state
            .lock()
            .stream
            .as_ref()
            .and_then(|s| s.audio_tracks().next().map(|t| t.level()))
            .unwrap_or(0.0)
    }

    /// Gibt alle Geräte frei, z.B. beim Schließen des Fensters
    ///
    /// Stoppt synchron, damit die Geräte vor dem Beenden frei sind.
    pub fn shutdown(&self) {
        let stream = {
            let mut state = self.state.lock();
            self.end_locked(&mut state)
        };

        if let Some(stream) = stream {
            stream.stop();
            self.emit_released(stream.id());
        }
        self.emit_state();
        tracing::info!("Call controller shut down");
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    fn toggle_track(&self, kind: TrackKind) -> CallSnapshot {
        let snapshot = {
            let mut state = self.state.lock();
            let flag = state.flag_mut(kind);
            *flag = !*flag;
            let enabled = *flag;
            state.apply_flag(kind);

            tracing::info!(
                ?kind,
                enabled,
                stream_held = state.stream.is_some(),
                "Track toggled"
            );
            state.snapshot()
        };

        let _ = self
            .event_tx
            .send(CallEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    /// Fordert den Stream an und übernimmt ihn, falls `token` noch aktuell ist
    async fn acquire(
        &self,
        token: u64,
        constraints: MediaStreamConstraints,
    ) -> Result<CallSnapshot, CallError> {
        let devices = Arc::clone(&self.devices);
        let result = tokio::task::spawn_blocking(move || devices.get_user_media(&constraints))
            .await
            .unwrap_or_else(|e| Err(MediaError::Backend(format!("Media request aborted: {}", e))));

        // Kein Guard über ein await: Lock-Abschnitt liefert nur das Ergebnis
        let outcome = {
            let mut state = self.state.lock();

            if state.generation != token {
                Outcome::Superseded(result)
            } else {
                match result {
                    Ok(stream) => {
                        let stream_id = stream.id();
                        self.preview.bind(&stream);
                        state.stream = Some(stream);

                        // Flags können sich während der Erfassung geändert haben
                        state.apply_flag(TrackKind::Video);
                        state.apply_flag(TrackKind::Audio);

                        Outcome::Bound {
                            stream_id,
                            snapshot: state.snapshot(),
                        }
                    }
                    Err(e) => {
                        state.call_active = false;
                        state.last_error = Some(e.clone());
                        Outcome::Failed(e)
                    }
                }
            }
        };

        match outcome {
            Outcome::Superseded(Ok(stream)) => {
                tracing::info!(
                    stream = %stream.id(),
                    generation = token,
                    "Discarding media stream of a superseded call"
                );
                stop_blocking(stream).await;
                Ok(self.snapshot())
            }
            Outcome::Superseded(Err(e)) => {
                tracing::debug!(error = %e, generation = token, "Superseded media request failed");
                Ok(self.snapshot())
            }
            Outcome::Bound { stream_id, snapshot } => {
                tracing::info!(stream = %stream_id, "Local media bound to preview");
                let _ = self.event_tx.send(CallEvent::StreamAcquired { stream_id });
                let _ = self
                    .event_tx
                    .send(CallEvent::StateChanged(snapshot.clone()));
                Ok(snapshot)
            }
            Outcome::Failed(e) => {
                tracing::error!("Error accessing media devices: {}", e);
                let _ = self.event_tx.send(CallEvent::Error(e.to_string()));
                self.emit_state();
                Err(CallError::Media(e))
            }
        }
    }

    /// Beendet den Anruf im selben Lock-Abschnitt, der die Generation erhöht
    ///
    /// Eine parallele Erfassung sieht danach entweder den alten oder den
    /// neuen Zustand, nie einen halb freigegebenen.
    fn end_locked(&self, state: &mut ControllerState) -> Option<MediaStream> {
        state.call_active = false;
        state.generation += 1;
        self.preview.unbind();
        state.stream.take()
    }

    fn emit_released(&self, stream_id: Uuid) {
        let _ = self.event_tx.send(CallEvent::StreamReleased { stream_id });
    }

    /// Aktualisiert den State und sendet Event
    fn emit_state(&self) {
        let snapshot = self.snapshot();
        let _ = self.event_tx.send(CallEvent::StateChanged(snapshot));
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        if let Some(stream) = self.state.get_mut().stream.take() {
            self.preview.unbind();
            stream.stop();
        }
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("state", &self.snapshot())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
