//! Interactive guessing rounds read from stdin.

use anyhow::Result;
use ear_core::trainer::{INTERVAL_OPTIONS, IntervalRound, NoteRound, Session};
use ear_core::{NoteDef, Player, ScaleDef};
use log::warn;
use rand::Rng;
use std::io::{self, BufRead, Write};

use crate::QuizKind;

/// Typed instead of a guess to hear the round again.
const REPLAY: &str = "?";

/// Runs `rounds` rounds against stdin, playing through `player` when given.
pub fn run(
    kind: QuizKind,
    scale: &ScaleDef,
    rounds: u32,
    player: Option<&Player>,
) -> Result<Session> {
    let stdin = io::stdin();
    let mut rng = rand::rng();
    run_with(
        kind,
        scale,
        rounds,
        player,
        &mut rng,
        &mut stdin.lock(),
        &mut io::stdout(),
    )
}

enum Round {
    Note(NoteRound),
    Interval(IntervalRound),
}

impl Round {
    fn draw<R: Rng + ?Sized>(kind: QuizKind, notes: &[NoteDef], rng: &mut R) -> Option<Self> {
        match kind {
            QuizKind::Notes => NoteRound::new(notes, rng).map(Round::Note),
            QuizKind::Intervals => IntervalRound::new(notes, rng).map(Round::Interval),
        }
    }

    fn play(&self, player: &Player) {
        let config = player.config();
        let result = match self {
            Round::Note(round) => player.play_tone(round.note().frequency, config.note_duration),
            Round::Interval(round) => player
                .play_sequence(round.notes(), config.note_duration, config.gap, None)
                .map(|_| ()),
        };
        // Silence is not fatal, the round can still be answered.
        if let Err(e) = result {
            warn!("[QUIZ] {e}");
        }
    }
}

pub fn run_with<R, I, O>(
    kind: QuizKind,
    scale: &ScaleDef,
    rounds: u32,
    player: Option<&Player>,
    rng: &mut R,
    input: &mut I,
    output: &mut O,
) -> Result<Session>
where
    R: Rng + ?Sized,
    I: BufRead,
    O: Write,
{
    let mut session = Session::new();
    let choices = match kind {
        QuizKind::Notes => unique_labels(&scale.notes).join(" "),
        QuizKind::Intervals => INTERVAL_OPTIONS.join(" | "),
    };

    writeln!(output, "{} quiz: {}", scale.label, choices)?;
    if player.is_some() {
        writeln!(output, "Type {REPLAY} to hear a round again.")?;
    }

    'rounds: for number in 1..=rounds {
        let Some(round) = Round::draw(kind, &scale.notes, rng) else {
            break;
        };
        if let Some(player) = player {
            round.play(player);
        }

        let guess = loop {
            write!(output, "[{number}/{rounds}] > ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break 'rounds;
            }
            let replay = line.trim() == REPLAY;
            match player {
                Some(player) if replay => round.play(player),
                _ => break line,
            }
        };

        let (attempt, answer) = match &round {
            Round::Note(r) => (r.evaluate(&guess), r.answer().to_string()),
            Round::Interval(r) => (r.evaluate(&guess), r.answer().into_owned()),
        };
        if attempt.correct {
            writeln!(output, "Correct! ({})", attempt.played)?;
        } else {
            writeln!(output, "No, it was {answer} ({})", attempt.played)?;
        }
        session.record(attempt);
        writeln!(output, "Score: {}", session.score())?;
    }

    write_history(&session, output)?;
    Ok(session)
}

/// Prints the session's attempts, newest first.
fn write_history<O: Write>(session: &Session, output: &mut O) -> io::Result<()> {
    if session.history().is_empty() {
        return Ok(());
    }
    writeln!(output)?;
    writeln!(output, "History:")?;
    for entry in session.history() {
        let mark = if entry.attempt.correct { "✓" } else { "✗" };
        writeln!(
            output,
            "  #{:<3} {} {:<10} guessed {:?}",
            entry.id, mark, entry.attempt.played, entry.attempt.guess
        )?;
    }
    Ok(())
}

/// Labels in scale order, without the repeated tonic.
fn unique_labels(notes: &[NoteDef]) -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = Vec::with_capacity(notes.len());
    for note in notes {
        if !labels.contains(&note.label) {
            labels.push(note.label);
        }
    }
    labels
}
