//! # Playback Configuration
//!
//! Timing and envelope constants used by the scheduler and the tone voices.
//! Every field has a default, so a JSON file only needs the values it
//! overrides.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Length of each note in a sequence, in seconds
    pub note_duration: f64,
    /// Silence between consecutive notes, in seconds
    pub gap: f64,
    /// Offset added to the clock's current time before the first note,
    /// so a freshly started stream does not miss the first attack
    pub start_offset: f64,
    /// Linear fade-in from silence to `peak_gain`, in seconds
    pub fade_in: f64,
    /// Amplitude reached after the fade-in (0.0..=1.0)
    pub peak_gain: f32,
    /// Time a voice stays scheduled after its fade-out reaches silence
    pub release_tail: f64,
    /// How long highlight polling continues past the last note's end
    pub highlight_grace: f64,
    /// Highlight polling cadence in milliseconds (one display frame)
    pub frame_period_ms: u64,
    /// Extra wall time a wait on the clock allows before treating the
    /// output stream as stalled, in seconds
    pub stall_margin: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            note_duration: 0.6,
            gap: 0.1,
            start_offset: 0.05,
            fade_in: 0.01,
            peak_gain: 0.4,
            release_tail: 0.05,
            highlight_grace: 0.1,
            frame_period_ms: 16,
            stall_margin: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Loads a config from a JSON file, filling missing fields with defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file
    ///
    /// # Returns
    /// * `Ok(PlaybackConfig)` - Parsed and validated config
    /// * `Err(e)` - File I/O, JSON or validation error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading playback config {}", path.display()))?;
        let config = Self::from_json(&data)
            .with_context(|| format!("parsing playback config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: PlaybackConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects negative or non-finite timings and gains outside `0..=1`.
    pub fn validate(&self) -> Result<()> {
        let timings = [
            ("note_duration", self.note_duration),
            ("gap", self.gap),
            ("start_offset", self.start_offset),
            ("fade_in", self.fade_in),
            ("release_tail", self.release_tail),
            ("highlight_grace", self.highlight_grace),
            ("stall_margin", self.stall_margin),
        ];
        for (name, value) in timings {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number of seconds, got {value}");
            }
        }
        if !(0.0..=1.0).contains(&self.peak_gain) {
            bail!("peak_gain must be between 0 and 1, got {}", self.peak_gain);
        }
        if self.frame_period_ms == 0 {
            bail!("frame_period_ms must be at least 1");
        }
        Ok(())
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PlaybackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlaybackConfig::from_json(r#"{ "note_duration": 0.3, "gap": 0.0 }"#)
            .expect("valid config");
        assert_eq!(config.note_duration, 0.3);
        assert_eq!(config.gap, 0.0);
        assert_eq!(config.fade_in, 0.01);
        assert_eq!(config.frame_period(), Duration::from_millis(16));
        assert_eq!(config.stall_margin, 1.0);
    }

    #[test]
    fn test_rejects_negative_gap() {
        let err = PlaybackConfig::from_json(r#"{ "gap": -0.1 }"#).unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_rejects_loud_gain() {
        assert!(PlaybackConfig::from_json(r#"{ "peak_gain": 1.5 }"#).is_err());
    }

    #[test]
    fn test_missing_file_mentions_path() {
        let err = PlaybackConfig::load("/nonexistent/ear-config.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/ear-config.json"));
    }
}
