// ear-core/src/lib.rs

//! The core logic for the ear trainer.
//! This crate is responsible for pitch math, scale construction, the scale
//! catalog, and timeline-accurate playback on a shared audio clock. It is
//! completely headless and contains no UI code.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod pitch;
pub mod playback;
pub mod scale;
pub mod synth;
pub mod trainer;

pub use audio::{AudioClock, ManualClock, shared_clock};
pub use catalog::{
    ScaleDef, ScaleSpec, all_scale_specs, build_scale_at_octave, default_scale_spec,
    scale_spec_by_id,
};
pub use config::PlaybackConfig;
pub use error::PlaybackError;
pub use pitch::{
    NoteDef, NoteOptions, PitchClass, build_note, frequency_from_identity,
    identity_from_pitch_class_octave, octave_from_identity, pitch_class_label,
};
pub use playback::{
    HighlightCallback, PlaybackSchedule, Player, SequenceHandle, play_frequency, play_sequence,
};
pub use scale::{Mode, ScaleOptions, build_scale, build_scale_identities};
