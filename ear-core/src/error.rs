//! # Error Types
//!
//! Pitch math, scale construction and the catalog are total; only playback
//! can fail, either because the audio output is missing or refused or
//! because the requested timings cannot be placed on the clock.
//!
//! ## Usage
//! ```no_run
//! use ear_core::{play_frequency, PlaybackError};
//!
//! match play_frequency(440.0, 1.0) {
//!     Ok(()) => {}
//!     Err(PlaybackError::AudioUnavailable { reason }) => {
//!         eprintln!("Playing without sound: {reason}");
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The shared audio clock could not be created or resumed.
    ///
    /// Callers should keep going without sound; guess rounds and scoring do
    /// not depend on audio.
    #[error("Audio unavailable: {reason}")]
    AudioUnavailable { reason: String },

    /// A duration, gap or frequency was negative or not finite. Nothing
    /// was scheduled.
    #[error("Invalid {name}: {value}")]
    InvalidTiming { name: &'static str, value: f64 },
}

impl PlaybackError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        PlaybackError::AudioUnavailable {
            reason: reason.into(),
        }
    }

    /// Passes `value` through if it is finite and not negative.
    pub fn check_non_negative(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(PlaybackError::InvalidTiming { name, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        let err = PlaybackError::unavailable("no output device");
        assert_eq!(err.to_string(), "Audio unavailable: no output device");
    }

    #[test]
    fn test_check_non_negative() {
        assert_eq!(PlaybackError::check_non_negative("gap", 0.0), Ok(0.0));
        assert_eq!(
            PlaybackError::check_non_negative("gap", -0.5),
            Err(PlaybackError::InvalidTiming { name: "gap", value: -0.5 })
        );
        assert!(PlaybackError::check_non_negative("note_duration", f64::NAN).is_err());
        assert!(PlaybackError::check_non_negative("note_duration", f64::INFINITY).is_err());
    }
}
