use ear_core::{
    Mode, PitchClass, ScaleOptions, all_scale_specs, build_scale, build_scale_at_octave,
    build_scale_identities, default_scale_spec, frequency_from_identity, octave_from_identity,
    pitch_class_label, scale_spec_by_id,
};

#[test]
fn test_reference_pitches() {
    assert_eq!(frequency_from_identity(69), 440.0);
    assert_eq!(octave_from_identity(60), 4);
    assert_eq!(octave_from_identity(0), -1);
    assert_eq!(pitch_class_label(-1, false), "B");
    assert_eq!(pitch_class_label(-1, true), "B");
}

#[test]
fn test_c_major_and_a_minor() {
    let c_major = build_scale(PitchClass::C, Mode::Major, 4, ScaleOptions::default());
    let ids: Vec<i32> = c_major.iter().map(|n| n.identity).collect();
    let labels: Vec<&str> = c_major.iter().map(|n| n.label).collect();
    assert_eq!(ids, vec![60, 62, 64, 65, 67, 69, 71, 72]);
    assert_eq!(labels, vec!["C", "D", "E", "F", "G", "A", "B", "C"]);

    assert_eq!(
        build_scale_identities(PitchClass::A, Mode::Minor, 4, ScaleOptions::default()),
        vec![69, 71, 72, 74, 76, 77, 79, 81]
    );
}

#[test]
fn test_without_octave_is_a_prefix() {
    for mode in Mode::ALL {
        let full = build_scale(PitchClass::D, mode, 4, ScaleOptions::default());
        let options = ScaleOptions { include_octave: false, ..ScaleOptions::default() };
        let short = build_scale(PitchClass::D, mode, 4, options);
        assert_eq!(short.len(), full.len() - 1);
        assert_eq!(short.as_slice(), &full[..full.len() - 1]);
    }
}

#[test]
fn test_every_spec_rebuilds_identically() {
    for spec in all_scale_specs() {
        for octave in 3..=5 {
            let first = build_scale_at_octave(spec.id, octave);
            let second = build_scale_at_octave(spec.id, octave);
            assert_eq!(first, second, "{} at octave {}", spec.id, octave);
            assert_eq!(first.notes.len(), 8);
            assert_eq!(first.notes[0].octave, octave);
            assert_eq!(first.notes[7].identity, first.notes[0].identity + 12);
        }
    }
}

#[test]
fn test_spelling_never_mixes_sharps_and_flats() {
    for spec in all_scale_specs() {
        let scale = spec.build(4);
        let has_sharp = scale.notes.iter().any(|n| n.label.contains('#'));
        let has_flat = scale.notes.iter().any(|n| n.label.ends_with('b'));
        assert!(!(has_sharp && has_flat), "{}", spec.id);
        if spec.use_flats {
            assert!(!has_sharp, "{}", spec.id);
        } else {
            assert!(!has_flat, "{}", spec.id);
        }
    }
}

#[test]
fn test_unknown_ids_fall_back_to_default() {
    let default_id = default_scale_spec().id;
    assert_eq!(
        build_scale_at_octave("unknown-id", 4),
        build_scale_at_octave(default_id, 4)
    );
    assert_eq!(build_scale_at_octave("", 3), build_scale_at_octave(default_id, 3));
    assert!(scale_spec_by_id("unknown-id").is_none());
}

#[test]
fn test_interval_distance_by_index() {
    let scale = build_scale_at_octave("g-major", 4);
    let tonic = scale.notes.iter().position(|n| n.label == "G").expect("tonic");
    let fifth = scale.notes.iter().position(|n| n.label == "D").expect("fifth");
    assert_eq!(fifth - tonic, 4);
}
