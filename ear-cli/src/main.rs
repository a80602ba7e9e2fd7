//! # Ear Trainer - Terminal Front-End
//!
//! Command-line front-end for the ear-training core. It lists and shows
//! scales, plays them with live note highlighting, and runs note and
//! interval guessing quizzes.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing, terminal output, reading guesses
//! - **Audio Thread**: owned by `ear-core`, renders the shared clock
//! - **Highlight Thread**: polls the clock and forwards changes over a
//!   crossbeam channel so only the main thread writes to the terminal

mod quiz;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ear_core::{
    HighlightCallback, PlaybackConfig, Player, ScaleDef, all_scale_specs, build_scale_at_octave,
};
use log::{info, warn};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ear-trainer", about = "Scale playback and ear-training quizzes")]
#[command(version)]
struct Cli {
    /// JSON file overriding playback timings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every scale in the catalog
    Scales,

    /// Print the notes of a scale
    Show {
        /// Scale id, e.g. "bb-major" (unknown ids fall back to C major)
        id: String,

        /// Octave of the tonic
        #[arg(long, default_value_t = 4, allow_hyphen_values = true)]
        octave: i32,

        /// Drop the octave tonic at the top
        #[arg(long)]
        no_octave: bool,

        /// Print the scale as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a scale with live highlighting
    Play {
        id: String,

        #[arg(long, default_value_t = 4, allow_hyphen_values = true)]
        octave: i32,
    },

    /// Play a single tone
    Tone {
        /// Frequency in Hz
        frequency: f64,

        /// Duration in seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },

    /// Guess notes or intervals played from a scale
    Quiz {
        #[arg(value_enum)]
        kind: QuizKind,

        id: String,

        #[arg(long, default_value_t = 4, allow_hyphen_values = true)]
        octave: i32,

        /// Number of rounds
        #[arg(long, default_value_t = 5)]
        rounds: u32,

        /// Do not open the audio device
        #[arg(long)]
        silent: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum QuizKind {
    /// Name a single note
    Notes,
    /// Name the interval between two notes
    Intervals,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PlaybackConfig::load(path)?,
        None => PlaybackConfig::default(),
    };
    info!("[MAIN] Playback config: {config:?}");

    match cli.command {
        Command::Scales => print_catalog(),
        Command::Show {
            id,
            octave,
            no_octave,
            json,
        } => {
            let mut scale = build_scale_at_octave(&id, octave);
            if no_octave {
                drop_top_octave(&mut scale);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&scale)?);
            } else {
                print_scale(&scale);
            }
        }
        Command::Play { id, octave } => {
            let scale = build_scale_at_octave(&id, octave);
            let player = Player::shared()?.with_config(config);
            play_with_highlight(&player, &scale)?;
        }
        Command::Tone {
            frequency,
            duration,
        } => {
            let player = Player::shared()?.with_config(config);
            let start = player.clock().now();
            player.play_tone(frequency, duration)?;
            println!("Playing {frequency:.2} Hz for {duration:.2}s");
            let config = player.config();
            if !player.wait_until(start + config.start_offset + duration + config.release_tail) {
                warn!("[MAIN] Audio output stopped before the tone finished");
            }
        }
        Command::Quiz {
            kind,
            id,
            octave,
            rounds,
            silent,
        } => {
            let scale = build_scale_at_octave(&id, octave);
            let player = if silent {
                None
            } else {
                match Player::shared() {
                    Ok(player) => Some(player.with_config(config)),
                    Err(e) => {
                        warn!("[MAIN] {e}");
                        println!("(no audio: {e}; continuing without sound)");
                        None
                    }
                }
            };
            let session = quiz::run(kind, &scale, rounds, player.as_ref())?;
            println!();
            println!("Final score: {}", session.score());
        }
    }

    Ok(())
}

/// Removes the repeated tonic an octave above the first note.
fn drop_top_octave(scale: &mut ScaleDef) {
    let (Some(first), Some(last)) = (scale.notes.first(), scale.notes.last()) else {
        return;
    };
    if scale.notes.len() > 1 && last.identity == first.identity + 12 {
        scale.notes.pop();
    }
}

fn print_catalog() {
    println!("{:<16} {:<10} {}", "ID", "SCALE", "KEY SIGNATURE");
    for spec in all_scale_specs() {
        println!("{:<16} {:<10} {}", spec.id, spec.label, spec.key_signature());
    }
}

fn print_scale(scale: &ScaleDef) {
    println!("{} ({}, tonic {})", scale.label, scale.mode, scale.tonic);
    for (degree, note) in scale.notes.iter().enumerate() {
        println!(
            "  {:>2}. {:<4} identity {:>3}  {:>8.2} Hz",
            degree + 1,
            note.to_string(),
            note.identity,
            note.frequency
        );
    }
}

/// Plays a scale and redraws a one-line keyboard as each note sounds.
fn play_with_highlight(player: &Player, scale: &ScaleDef) -> Result<()> {
    println!("Playing {}", scale.label);

    let (tx, rx) = crossbeam_channel::unbounded::<Option<i32>>();
    let callback: HighlightCallback = Box::new(move |note| {
        let _ = tx.send(note.map(|n| n.identity));
    });
    let handle = player.play_scale(scale, Some(callback))?;

    let mut stdout = io::stdout();
    // The sender lives in the highlight loop, so this ends when the loop does.
    for active in rx.iter() {
        write!(stdout, "\r{}", render_row(scale, active))?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    handle.wait();
    Ok(())
}

fn render_row(scale: &ScaleDef, active: Option<i32>) -> String {
    scale
        .notes
        .iter()
        .map(|note| {
            if Some(note.identity) == active {
                format!("[{:^3}]", note.label)
            } else {
                format!(" {:^3} ", note.label)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_quiz() {
        let cli = Cli::try_parse_from(["ear-trainer", "quiz", "intervals", "d-minor", "--rounds", "3"])
            .expect("valid arguments");
        match cli.command {
            Command::Quiz { kind, id, rounds, octave, silent } => {
                assert_eq!(kind, QuizKind::Intervals);
                assert_eq!(id, "d-minor");
                assert_eq!(rounds, 3);
                assert_eq!(octave, 4);
                assert!(!silent);
            }
            _ => panic!("expected quiz"),
        }
    }

    #[test]
    fn test_cli_accepts_negative_octave() {
        let cli = Cli::try_parse_from(["ear-trainer", "show", "c-major", "--octave", "-1"])
            .expect("valid arguments");
        assert!(matches!(cli.command, Command::Show { octave: -1, .. }));
    }

    #[test]
    fn test_render_row_marks_active_note() {
        let scale = build_scale_at_octave("c-major", 4);
        let row = render_row(&scale, Some(64));
        assert!(row.contains("[ E ]"));
        assert_eq!(row.matches('[').count(), 1);
        assert!(!render_row(&scale, None).contains('['));
    }

    #[test]
    fn test_drop_top_octave_keeps_spelling() {
        let full = build_scale_at_octave("eb-major", 4);
        let mut scale = full.clone();
        drop_top_octave(&mut scale);
        assert_eq!(scale.notes.len(), 7);
        assert_eq!(scale.notes.as_slice(), &full.notes[..7]);

        // Already without the octave: nothing more is removed.
        drop_top_octave(&mut scale);
        assert_eq!(scale.notes.len(), 7);
    }
}
