//! # Scale Module
//!
//! Builds concrete scales from a tonic, an interval pattern and a root octave.
//!
//! Every mode is just data: an ascending list of semitone offsets from the
//! tonic that starts at 0 and ends with the octave (12). The builder walks
//! any such pattern, so adding a mode never touches the algorithm.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pitch::{self, NoteDef, NoteOptions, PitchClass};

/// Scale modes with a registered interval pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Ionian: W W H W W W H
    Major,
    /// Aeolian (natural minor): W H W W H W W
    Minor,
    MajorPentatonic,
    MinorPentatonic,
    Blues,
}

const MAJOR: [i32; 8] = [0, 2, 4, 5, 7, 9, 11, 12];
const MINOR: [i32; 8] = [0, 2, 3, 5, 7, 8, 10, 12];
const MAJOR_PENTATONIC: [i32; 6] = [0, 2, 4, 7, 9, 12];
const MINOR_PENTATONIC: [i32; 6] = [0, 3, 5, 7, 10, 12];
const BLUES: [i32; 7] = [0, 3, 5, 6, 7, 10, 12];

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Major,
        Mode::Minor,
        Mode::MajorPentatonic,
        Mode::MinorPentatonic,
        Mode::Blues,
    ];

    /// Semitone offsets from the tonic, including the final octave (12).
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Mode::Major => &MAJOR,
            Mode::Minor => &MINOR,
            Mode::MajorPentatonic => &MAJOR_PENTATONIC,
            Mode::MinorPentatonic => &MINOR_PENTATONIC,
            Mode::Blues => &BLUES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
            Mode::MajorPentatonic => "major pentatonic",
            Mode::MinorPentatonic => "minor pentatonic",
            Mode::Blues => "blues",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by the scale builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOptions {
    /// Spell every degree with flats instead of sharps
    pub use_flats: bool,
    /// Keep the final octave degree (the 8th note of a major scale)
    pub include_octave: bool,
    /// Clamp each identity to the 0-127 instrument range
    pub clamp_to_valid_range: bool,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            use_flats: false,
            include_octave: true,
            clamp_to_valid_range: false,
        }
    }
}

impl ScaleOptions {
    pub fn with_flats(use_flats: bool) -> Self {
        Self { use_flats, ..Self::default() }
    }

    fn note_options(self) -> NoteOptions {
        NoteOptions {
            use_flats: self.use_flats,
            clamp_to_valid_range: self.clamp_to_valid_range,
        }
    }
}

/// Builds scale identities by adding each pattern offset to a root identity.
///
/// # Arguments
/// * `root_identity` - Identity of the tonic
/// * `pattern` - Ascending semitone offsets, ending with the octave
/// * `options` - `include_octave` drops the last offset, `clamp_to_valid_range` clamps each result
///
/// # Returns
/// * `Vec<i32>` - One identity per used offset, in pattern order
pub fn build_scale_identities_from_root(
    root_identity: i32,
    pattern: &[i32],
    options: ScaleOptions,
) -> Vec<i32> {
    let offsets = if options.include_octave || pattern.is_empty() {
        pattern
    } else {
        &pattern[..pattern.len() - 1]
    };

    offsets
        .iter()
        .map(|offset| root_identity + offset)
        .map(|identity| {
            if options.clamp_to_valid_range {
                pitch::clamp_identity(identity)
            } else {
                identity
            }
        })
        .collect()
}

/// Builds scale identities for a tonic pitch class placed in `root_octave`.
pub fn build_scale_identities(
    tonic: PitchClass,
    mode: Mode,
    root_octave: i32,
    options: ScaleOptions,
) -> Vec<i32> {
    let root = pitch::identity_from_pitch_class_octave(tonic, root_octave);
    build_scale_identities_from_root(root, mode.intervals(), options)
}

/// Builds a scale as playable notes from any interval pattern.
///
/// Spelling is chosen once for the whole scale. Keys with many accidentals
/// still go through the fixed 12-label tables, so F# major spells its
/// seventh degree "F" rather than "E#".
pub fn build_scale_from_pattern(
    tonic: PitchClass,
    pattern: &[i32],
    root_octave: i32,
    options: ScaleOptions,
) -> Vec<NoteDef> {
    let root = pitch::identity_from_pitch_class_octave(tonic, root_octave);
    build_scale_identities_from_root(root, pattern, options)
        .into_iter()
        .map(|identity| pitch::build_note(identity, options.note_options()))
        .collect()
}

/// Builds one ascending octave of `mode` starting on `tonic` in `root_octave`.
///
/// # Returns
/// * `Vec<NoteDef>` - 8 notes for major/minor (7 without the octave), lowest first
pub fn build_scale(
    tonic: PitchClass,
    mode: Mode,
    root_octave: i32,
    options: ScaleOptions,
) -> Vec<NoteDef> {
    build_scale_from_pattern(tonic, mode.intervals(), root_octave, options)
}
