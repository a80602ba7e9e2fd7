//! # Tone Synthesis Module
//!
//! A [`Voice`] is one sine tone pinned to absolute clock times. It carries
//! its own envelope, so rendering only needs the current clock time: the
//! render callback never waits on timers, and repeated notes each get a
//! fresh attack.

use std::f64::consts::TAU;

use crate::config::PlaybackConfig;

/// One scheduled tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    /// Frequency in Hz
    pub frequency: f64,
    /// Clock time of the attack, in seconds
    pub start: f64,
    /// Clock time at which the fade-out reaches silence
    pub end: f64,
    /// Fade-in length, never more than half the note
    pub attack: f64,
    /// Amplitude at the end of the fade-in
    pub peak: f32,
    /// Extra time the voice stays alive after `end`
    pub release_tail: f64,
}

impl Voice {
    /// Creates a voice starting at `start` and fading to silence at `start + duration`.
    pub fn new(frequency: f64, start: f64, duration: f64, config: &PlaybackConfig) -> Self {
        let duration = duration.max(0.0);
        Self {
            frequency,
            start,
            end: start + duration,
            attack: config.fade_in.min(duration / 2.0),
            peak: config.peak_gain,
            release_tail: config.release_tail,
        }
    }

    /// Envelope gain at clock time `t`.
    ///
    /// Linear ramp from 0 at `start` to `peak` at `start + attack`, then
    /// linear ramp down to 0 at `end`. Zero outside `[start, end)`.
    pub fn gain_at(&self, t: f64) -> f32 {
        if t < self.start || t >= self.end {
            return 0.0;
        }
        let peak = self.peak as f64;
        let attack_end = self.start + self.attack;
        let gain = if t < attack_end {
            peak * (t - self.start) / self.attack
        } else {
            let release = self.end - attack_end;
            if release <= 0.0 {
                0.0
            } else {
                peak * (self.end - t) / release
            }
        };
        gain as f32
    }

    /// Output sample at clock time `t`.
    pub fn sample_at(&self, t: f64) -> f32 {
        let gain = self.gain_at(t);
        if gain == 0.0 {
            return 0.0;
        }
        let phase = TAU * self.frequency * (t - self.start);
        phase.sin() as f32 * gain
    }

    /// Clock time after which the voice can be dropped.
    pub fn stop_time(&self) -> f64 {
        self.end + self.release_tail
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.stop_time()
    }
}

/// Mixes every voice at clock time `t`, clamped to `[-1, 1]`.
pub fn mix_at(voices: &[Voice], t: f64) -> f32 {
    voices
        .iter()
        .map(|voice| voice.sample_at(t))
        .sum::<f32>()
        .clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(start: f64, duration: f64) -> Voice {
        Voice::new(440.0, start, duration, &PlaybackConfig::default())
    }

    #[test]
    fn test_envelope_shape() {
        let v = voice(1.0, 0.6);
        assert_eq!(v.gain_at(0.99), 0.0);
        assert_eq!(v.gain_at(1.0), 0.0);
        assert!((v.gain_at(1.005) - 0.2).abs() < 1e-4);
        assert!((v.gain_at(1.01) - 0.4).abs() < 1e-4);
        assert!(v.gain_at(1.3) < 0.4 && v.gain_at(1.3) > 0.0);
        assert!(v.gain_at(1.5999) < 0.001);
        assert_eq!(v.gain_at(1.6), 0.0);
    }

    #[test]
    fn test_fade_out_is_linear() {
        let v = voice(0.0, 1.01);
        // Halfway through the release the gain is half the peak.
        assert!((v.gain_at(0.51) - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_short_note_limits_attack() {
        let v = voice(0.0, 0.01);
        assert_eq!(v.attack, 0.005);
        assert!((v.gain_at(0.005) - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_repeated_notes_retrigger() {
        let first = voice(0.0, 0.5);
        let second = voice(0.5, 0.5);
        // Silence at the boundary, then a fresh attack.
        assert_eq!(first.gain_at(0.5), 0.0);
        assert_eq!(second.gain_at(0.5), 0.0);
        assert!(second.gain_at(0.51) > first.gain_at(0.49));
    }

    #[test]
    fn test_mix_is_clamped() {
        let config = PlaybackConfig { peak_gain: 1.0, ..PlaybackConfig::default() };
        let voices: Vec<Voice> = (0..4).map(|_| Voice::new(1.0, 0.0, 10.0, &config)).collect();
        // Quarter period of a 1 Hz sine: every voice is near its peak.
        assert_eq!(mix_at(&voices, 0.25), 1.0);
    }

    #[test]
    fn test_stop_time_includes_tail() {
        let v = voice(2.0, 0.6);
        assert!((v.stop_time() - 2.65).abs() < 1e-9);
        assert!(!v.is_finished(2.6));
        assert!(v.is_finished(2.7));
    }
}
