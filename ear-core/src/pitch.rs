//! # Pitch Module
//!
//! This module converts note identities (MIDI-style integers) into everything a
//! playable note needs: an equal-temperament frequency, an octave number and a
//! display label spelled with either sharps or flats.
//!
//! ## Features
//! - Equal temperament with A4 (identity 69) = 440 Hz
//! - Sharp and flat label tables indexed by pitch class
//! - Correct wrapping for negative identities
//! - Optional clamping to the 0-127 instrument range

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Identity of the tuning reference (A4).
pub const REFERENCE_IDENTITY: i32 = 69;

/// Frequency of the tuning reference in Hz.
pub const REFERENCE_FREQUENCY: f64 = 440.0;

/// Lowest identity accepted when clamping is requested.
pub const MIN_IDENTITY: i32 = 0;

/// Highest identity accepted when clamping is requested.
pub const MAX_IDENTITY: i32 = 127;

/// Labels for the twelve pitch classes using sharp spellings.
pub const SHARP_LABELS: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Labels for the twelve pitch classes using flat spellings.
pub const FLAT_LABELS: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Both spellings mapped back to their pitch class, built once on first use.
static LABEL_MAP: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    SHARP_LABELS
        .iter()
        .chain(FLAT_LABELS.iter())
        .enumerate()
        .map(|(i, label)| (*label, (i % 12) as u8))
        .collect()
});

/// A chromatic pitch ignoring octave, always in `0..12` (0 = C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const C_SHARP: PitchClass = PitchClass(1);
    pub const D: PitchClass = PitchClass(2);
    pub const D_SHARP: PitchClass = PitchClass(3);
    pub const E: PitchClass = PitchClass(4);
    pub const F: PitchClass = PitchClass(5);
    pub const F_SHARP: PitchClass = PitchClass(6);
    pub const G: PitchClass = PitchClass(7);
    pub const G_SHARP: PitchClass = PitchClass(8);
    pub const A: PitchClass = PitchClass(9);
    pub const A_SHARP: PitchClass = PitchClass(10);
    pub const B: PitchClass = PitchClass(11);

    /// Reduces any integer to a pitch class, wrapping negative values
    /// (`-1` becomes `11`).
    pub fn new(value: i32) -> Self {
        PitchClass(value.rem_euclid(12) as u8)
    }

    /// The pitch class as an index in `0..12`.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> i32 {
        self.0 as i32
    }

    /// Looks up a label in either spelling table ("C#" and "Db" both give 1).
    ///
    /// # Returns
    /// * `None` if the label is not one of the 17 known spellings
    pub fn from_label(label: &str) -> Option<Self> {
        LABEL_MAP.get(label.trim()).map(|&pc| PitchClass(pc))
    }

    /// The label for this pitch class in the requested spelling.
    pub fn label(self, use_flats: bool) -> &'static str {
        label_table(use_flats)[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(false))
    }
}

fn label_table(use_flats: bool) -> &'static [&'static str; 12] {
    if use_flats { &FLAT_LABELS } else { &SHARP_LABELS }
}

/// A concrete, playable note.
///
/// Two notes are the same pitch when their identities match, even if one is
/// labelled "C#" and the other "Db". Use [`NoteDef::same_pitch`] for that
/// comparison; `==` also compares the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDef {
    /// MIDI-style identity, totally ordering all pitches
    pub identity: i32,
    /// Frequency in Hz, rounded to 2 decimal places
    pub frequency: f64,
    /// Octave number (identity 60 is octave 4)
    pub octave: i32,
    /// Label shown to the user (e.g. "C", "F#", "Bb")
    pub label: &'static str,
}

impl NoteDef {
    pub fn same_pitch(&self, other: &NoteDef) -> bool {
        self.identity == other.identity
    }

    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::new(self.identity)
    }
}

impl fmt::Display for NoteDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.label, self.octave)
    }
}

/// Options for [`build_note`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteOptions {
    /// Spell accidentals with flats instead of sharps
    pub use_flats: bool,
    /// Clamp the identity to `MIN_IDENTITY..=MAX_IDENTITY` before deriving anything
    pub clamp_to_valid_range: bool,
}

/// Calculates the equal-temperament frequency of a note identity.
///
/// The formula is `f = 440 * 2^((identity - 69) / 12)`, rounded to two
/// decimal places. No clamping is applied, so identities far outside the
/// piano range still produce a (very low or very high) frequency.
///
/// # Arguments
/// * `identity` - MIDI-style note identity
///
/// # Returns
/// * Frequency in Hz
pub fn frequency_from_identity(identity: i32) -> f64 {
    let semitones = (identity as f64) - (REFERENCE_IDENTITY as f64);
    let frequency = REFERENCE_FREQUENCY * 2.0_f64.powf(semitones / 12.0);
    round_to_cents(frequency)
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Finds the display label of an identity's pitch class.
///
/// Negative identities wrap, so `-1` is labelled "B" in both tables.
pub fn pitch_class_label(identity: i32, use_flats: bool) -> &'static str {
    PitchClass::new(identity).label(use_flats)
}

/// Calculates the octave of an identity: `floor(identity / 12) - 1`.
///
/// Identity 60 (middle C) is octave 4 and identity 0 is octave -1.
pub fn octave_from_identity(identity: i32) -> i32 {
    identity.div_euclid(12) - 1
}

/// Converts a pitch class and octave into an identity: `(octave + 1) * 12 + pc`.
pub fn identity_from_pitch_class_octave(pitch_class: PitchClass, octave: i32) -> i32 {
    (octave + 1) * 12 + pitch_class.value()
}

/// Clamps an identity to the valid instrument range (0-127).
pub fn clamp_identity(identity: i32) -> i32 {
    identity.clamp(MIN_IDENTITY, MAX_IDENTITY)
}

/// Builds a [`NoteDef`] from an identity.
///
/// When `clamp_to_valid_range` is set the identity is clamped first, so the
/// frequency, label and octave all describe the clamped note.
///
/// # Arguments
/// * `identity` - MIDI-style note identity
/// * `options` - Spelling and clamping options
///
/// # Returns
/// * `NoteDef` - The fully derived note
pub fn build_note(identity: i32, options: NoteOptions) -> NoteDef {
    let identity = if options.clamp_to_valid_range {
        clamp_identity(identity)
    } else {
        identity
    };

    NoteDef {
        identity,
        frequency: frequency_from_identity(identity),
        octave: octave_from_identity(identity),
        label: pitch_class_label(identity, options.use_flats),
    }
}
