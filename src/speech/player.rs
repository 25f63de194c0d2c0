//! Single-utterance speech playback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::{SpeechEngine, SpeechError};

/// Identifies one call to [`SpeechPlayer::speak`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtteranceId(u64);

/// Observable playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeechStatus {
    pub speaking: bool,
    pub utterance: Option<UtteranceId>,
}

#[derive(Debug)]
struct Active {
    id: UtteranceId,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct PlayerState {
    next_id: u64,
    active: Option<Active>,
    speaking: bool,
}

/// Plays at most one utterance at a time.
///
/// Starting a new utterance cancels the one in flight (last write wins, no
/// queue). Start, end and error callbacks from a canceled utterance are
/// ignored, so `speaking` only ever describes the active one.
#[derive(Clone)]
pub struct SpeechPlayer {
    engine: Option<Arc<dyn SpeechEngine>>,
    state: Arc<Mutex<PlayerState>>,
}

impl std::fmt::Debug for SpeechPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechPlayer")
            .field("enabled", &self.is_enabled())
            .field("status", &self.status())
            .finish()
    }
}

impl SpeechPlayer {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine: Some(engine),
            state: Arc::new(Mutex::new(PlayerState::default())),
        }
    }

    /// A player that rejects every request.
    pub fn disabled() -> Self {
        Self {
            engine: None,
            state: Arc::new(Mutex::new(PlayerState::default())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SpeechStatus {
        let state = self.lock();
        SpeechStatus {
            speaking: state.speaking,
            utterance: state.active.as_ref().map(|a| a.id),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.lock().speaking
    }

    /// Start speaking `text`, canceling whatever is playing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn speak(&self, text: impl Into<String>) -> Result<UtteranceId, SpeechError> {
        let engine = self.engine.clone().ok_or(SpeechError::Disabled)?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyUtterance);
        }

        let cancel = CancellationToken::new();
        let id = {
            let mut state = self.lock();
            if let Some(previous) = state.active.take() {
                debug!(utterance = previous.id.0, "Canceling utterance");
                previous.cancel.cancel();
            }
            state.speaking = false;
            state.next_id += 1;
            let id = UtteranceId(state.next_id);
            state.active = Some(Active {
                id,
                cancel: cancel.clone(),
            });
            id
        };

        let player = self.clone();
        tokio::spawn(async move {
            player.on_start(id);
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(utterance = id.0, "Utterance canceled");
                }
                result = engine.speak(&text) => match result {
                    Ok(()) => player.on_end(id),
                    Err(e) => player.on_error(id, &e),
                },
            }
        });

        Ok(id)
    }

    /// Stop the active utterance. Returns whether anything was playing.
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        state.speaking = false;
        match state.active.take() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn is_active(state: &PlayerState, id: UtteranceId) -> bool {
        state.active.as_ref().is_some_and(|a| a.id == id)
    }

    fn on_start(&self, id: UtteranceId) {
        let mut state = self.lock();
        if Self::is_active(&state, id) {
            state.speaking = true;
        }
    }

    fn on_end(&self, id: UtteranceId) {
        let mut state = self.lock();
        if Self::is_active(&state, id) {
            state.speaking = false;
            state.active = None;
        }
    }

    fn on_error(&self, id: UtteranceId, error: &SpeechError) {
        warn!(name: "speech.failed", utterance = id.0, error = %error, "Speech playback failed");
        self.on_end(id);
    }
}
