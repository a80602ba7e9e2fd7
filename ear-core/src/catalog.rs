//! # Scale Catalog Module
//!
//! Static registry of the scales offered for training. Each entry carries its
//! key signature (accidental count and sharp/flat spelling), which follows
//! standard Western key-signature conventions and is written down here rather
//! than computed.

use log::warn;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::pitch::{NoteDef, PitchClass};
use crate::scale::{self, Mode, ScaleOptions};

/// Static metadata describing one selectable scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleSpec {
    /// Stable identifier (e.g. "bb-major")
    pub id: &'static str,
    /// Human readable name (e.g. "Bb Major")
    pub label: &'static str,
    pub tonic: PitchClass,
    /// Tonic as spelled in the label
    pub tonic_label: &'static str,
    pub mode: Mode,
    /// Number of sharps or flats in the key signature
    pub accidental_count: u8,
    /// Flat keys spell with flats, everything else with sharps
    pub use_flats: bool,
}

/// A scale realized at a specific octave.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleDef {
    pub id: &'static str,
    pub label: &'static str,
    pub mode: Mode,
    pub tonic: &'static str,
    pub notes: Vec<NoteDef>,
    pub accidental_count: u8,
    pub use_flats: bool,
}

const fn spec(
    id: &'static str,
    label: &'static str,
    tonic: PitchClass,
    tonic_label: &'static str,
    mode: Mode,
    accidental_count: u8,
    use_flats: bool,
) -> ScaleSpec {
    ScaleSpec {
        id,
        label,
        tonic,
        tonic_label,
        mode,
        accidental_count,
        use_flats,
    }
}

static SCALE_SPECS: [ScaleSpec; 22] = [
    // Major, natural and sharp keys
    spec("c-major", "C Major", PitchClass::C, "C", Mode::Major, 0, false),
    spec("g-major", "G Major", PitchClass::G, "G", Mode::Major, 1, false),
    spec("d-major", "D Major", PitchClass::D, "D", Mode::Major, 2, false),
    spec("a-major", "A Major", PitchClass::A, "A", Mode::Major, 3, false),
    spec("e-major", "E Major", PitchClass::E, "E", Mode::Major, 4, false),
    spec("b-major", "B Major", PitchClass::B, "B", Mode::Major, 5, false),
    spec("f-sharp-major", "F# Major", PitchClass::F_SHARP, "F#", Mode::Major, 6, false),
    spec("c-sharp-major", "C# Major", PitchClass::C_SHARP, "C#", Mode::Major, 7, false),
    // Major, flat keys
    spec("f-major", "F Major", PitchClass::F, "F", Mode::Major, 1, true),
    spec("bb-major", "Bb Major", PitchClass::A_SHARP, "Bb", Mode::Major, 2, true),
    spec("eb-major", "Eb Major", PitchClass::D_SHARP, "Eb", Mode::Major, 3, true),
    spec("ab-major", "Ab Major", PitchClass::G_SHARP, "Ab", Mode::Major, 4, true),
    spec("db-major", "Db Major", PitchClass::C_SHARP, "Db", Mode::Major, 5, true),
    spec("gb-major", "Gb Major", PitchClass::F_SHARP, "Gb", Mode::Major, 6, true),
    // Natural minor, accidentals shared with the relative major
    spec("a-minor", "A Minor", PitchClass::A, "A", Mode::Minor, 0, false),
    spec("e-minor", "E Minor", PitchClass::E, "E", Mode::Minor, 1, false),
    spec("b-minor", "B Minor", PitchClass::B, "B", Mode::Minor, 2, false),
    spec("f-sharp-minor", "F# Minor", PitchClass::F_SHARP, "F#", Mode::Minor, 3, false),
    spec("c-sharp-minor", "C# Minor", PitchClass::C_SHARP, "C#", Mode::Minor, 4, false),
    spec("d-minor", "D Minor", PitchClass::D, "D", Mode::Minor, 1, true),
    spec("g-minor", "G Minor", PitchClass::G, "G", Mode::Minor, 2, true),
    spec("c-minor", "C Minor", PitchClass::C, "C", Mode::Minor, 3, true),
];

/// Id to table position, built once on first lookup.
static SPEC_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    SCALE_SPECS
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.id, i))
        .collect()
});

impl ScaleSpec {
    /// Builds this scale with its tonic in `octave` and the octave tonic one above.
    pub fn build(&self, octave: i32) -> ScaleDef {
        let notes = scale::build_scale(
            self.tonic,
            self.mode,
            octave,
            ScaleOptions::with_flats(self.use_flats),
        );

        ScaleDef {
            id: self.id,
            label: self.label,
            mode: self.mode,
            tonic: self.tonic_label,
            notes,
            accidental_count: self.accidental_count,
            use_flats: self.use_flats,
        }
    }

    /// Short key-signature description, e.g. "2♭", "3♯" or "no accidentals".
    pub fn key_signature(&self) -> String {
        match (self.accidental_count, self.use_flats) {
            (0, _) => "no accidentals".to_string(),
            (n, true) => format!("{n}♭"),
            (n, false) => format!("{n}♯"),
        }
    }
}

/// All scale specs in their stable display order.
pub fn all_scale_specs() -> &'static [ScaleSpec] {
    &SCALE_SPECS
}

/// Looks up a single spec by id.
pub fn scale_spec_by_id(id: &str) -> Option<&'static ScaleSpec> {
    SPEC_INDEX.get(id).map(|&i| &SCALE_SPECS[i])
}

/// The spec used whenever a requested id cannot be resolved (C major).
pub fn default_scale_spec() -> &'static ScaleSpec {
    &SCALE_SPECS[0]
}

/// Builds a concrete scale for `id` at `octave`.
///
/// Unknown or empty ids fall back to [`default_scale_spec`], so this always
/// returns a playable scale.
///
/// # Arguments
/// * `id` - Scale id from [`all_scale_specs`]
/// * `octave` - Octave of the tonic; the octave tonic lands in `octave + 1`
///
/// # Returns
/// * `ScaleDef` - The scale realized at the requested octave
pub fn build_scale_at_octave(id: &str, octave: i32) -> ScaleDef {
    let spec = match scale_spec_by_id(id) {
        Some(spec) => spec,
        None => {
            let fallback = default_scale_spec();
            warn!("[CATALOG] Unknown scale id {id:?}, using {}", fallback.id);
            fallback
        }
    };
    spec.build(octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sharps (or flats) implied by a major key on the circle of fifths.
    fn major_key_accidentals(tonic: PitchClass, use_flats: bool) -> u8 {
        let step = if use_flats { 5 } else { 7 };
        ((tonic.value() * step).rem_euclid(12)) as u8
    }

    #[test]
    fn test_ids_are_unique() {
        assert_eq!(SPEC_INDEX.len(), all_scale_specs().len());
    }

    #[test]
    fn test_order_is_stable() {
        let ids: Vec<&str> = all_scale_specs().iter().take(3).map(|s| s.id).collect();
        assert_eq!(ids, vec!["c-major", "g-major", "d-major"]);
        assert_eq!(all_scale_specs().last().map(|s| s.id), Some("c-minor"));
    }

    #[test]
    fn test_key_signatures_follow_circle_of_fifths() {
        for spec in all_scale_specs() {
            let relative_major = match spec.mode {
                Mode::Minor => PitchClass::new(spec.tonic.value() + 3),
                _ => spec.tonic,
            };
            assert_eq!(
                spec.accidental_count,
                major_key_accidentals(relative_major, spec.use_flats),
                "{}",
                spec.id
            );
        }
    }

    #[test]
    fn test_tonic_label_matches_spelling_table() {
        for spec in all_scale_specs() {
            assert_eq!(spec.tonic.label(spec.use_flats), spec.tonic_label, "{}", spec.id);
            assert!(spec.label.starts_with(spec.tonic_label));
        }
    }

    #[test]
    fn test_lookup() {
        let spec = scale_spec_by_id("f-major").expect("f-major is registered");
        assert_eq!(spec.accidental_count, 1);
        assert!(spec.use_flats);
        assert!(scale_spec_by_id("h-major").is_none());
        assert!(scale_spec_by_id("").is_none());
    }

    #[test]
    fn test_build_uses_spec_spelling() {
        let scale = build_scale_at_octave("bb-major", 3);
        let labels: Vec<&str> = scale.notes.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec!["Bb", "C", "D", "Eb", "F", "G", "A", "Bb"]);
        assert_eq!(scale.notes[0].octave, 3);
        assert_eq!(scale.notes[7].octave, 4);
        assert_eq!(scale.tonic, "Bb");
        assert_eq!(scale.accidental_count, 2);
    }

    #[test]
    fn test_key_signature_text() {
        assert_eq!(default_scale_spec().key_signature(), "no accidentals");
        assert_eq!(scale_spec_by_id("eb-major").map(|s| s.key_signature()), Some("3♭".to_string()));
        assert_eq!(scale_spec_by_id("e-major").map(|s| s.key_signature()), Some("4♯".to_string()));
    }
}
