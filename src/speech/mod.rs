//! Text-to-speech playback.
//!
//! - [`SpeechEngine`]: The platform synthesizer seam
//! - [`CommandEngine`]: Runs a TTS program such as `espeak-ng`
//! - [`SpeechPlayer`]: Serializes utterances with cancel-before-start

mod engine;
mod player;

use std::sync::Arc;

pub use engine::{CommandEngine, SpeechEngine, SpeechError};
pub use player::{SpeechPlayer, SpeechStatus, UtteranceId};

use crate::config::SpeechConfig;

/// Build the player described by `config`.
pub fn player_from_config(config: &SpeechConfig) -> SpeechPlayer {
    if config.enabled {
        SpeechPlayer::new(Arc::new(CommandEngine::from_config(config)))
    } else {
        SpeechPlayer::disabled()
    }
}
