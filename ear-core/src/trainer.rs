//! # Trainer Module
//!
//! Guessing rounds drawn from a built scale: a single note to name, or a
//! pair of notes whose interval (in scale steps) has to be identified.
//! Guesses are plain strings; anything that does not match the answer,
//! including labels that do not exist, is simply an incorrect attempt.
//! A [`Session`] keeps the running score and the attempt history in memory.

use rand::Rng;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pitch::NoteDef;

/// Interval names offered as guesses, indexed by scale steps.
pub const INTERVAL_OPTIONS: [&str; 8] = [
    "unison", "2nd", "3rd", "4th", "5th", "6th", "7th", "octave",
];

/// How many times the second note of an interval is re-drawn to avoid
/// repeating the first note's label.
const MAX_REDRAWS: usize = 10;

/// Names the interval spanning `steps` scale degrees.
///
/// Steps beyond an octave (possible with custom patterns) are named
/// "N steps".
pub fn interval_label(steps: usize) -> Cow<'static, str> {
    match INTERVAL_OPTIONS.get(steps) {
        Some(label) => Cow::Borrowed(*label),
        None => Cow::Owned(format!("{steps} steps")),
    }
}

/// Picks a random index into `notes`, or `None` if there are none.
pub fn pick_note<R: Rng + ?Sized>(notes: &[NoteDef], rng: &mut R) -> Option<usize> {
    if notes.is_empty() {
        None
    } else {
        Some(rng.random_range(0..notes.len()))
    }
}

fn matches_answer(guess: &str, answer: &str) -> bool {
    guess.trim().eq_ignore_ascii_case(answer)
}

/// The outcome of one guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// What was played, as shown to the user
    pub played: String,
    pub guess: String,
    pub correct: bool,
}

/// Name-the-note round.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRound {
    note: NoteDef,
}

impl NoteRound {
    /// Draws a random note from `notes`; `None` for an empty scale.
    pub fn new<R: Rng + ?Sized>(notes: &[NoteDef], rng: &mut R) -> Option<Self> {
        let index = pick_note(notes, rng)?;
        Some(Self::with_note(notes[index].clone()))
    }

    pub fn with_note(note: NoteDef) -> Self {
        Self { note }
    }

    pub fn note(&self) -> &NoteDef {
        &self.note
    }

    pub fn answer(&self) -> &'static str {
        self.note.label
    }

    pub fn evaluate(&self, guess: &str) -> Attempt {
        Attempt {
            played: self.note.label.to_string(),
            guess: guess.trim().to_string(),
            correct: matches_answer(guess, self.note.label),
        }
    }
}

/// Name-the-interval round: two degrees of the same scale.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRound {
    degrees: [usize; 2],
    notes: [NoteDef; 2],
}

impl IntervalRound {
    /// Draws two random degrees, re-drawing the second while it has the same
    /// label as the first (up to a small number of tries). The tonic and its
    /// octave share a label, so octaves are rarely asked.
    pub fn new<R: Rng + ?Sized>(notes: &[NoteDef], rng: &mut R) -> Option<Self> {
        let first = pick_note(notes, rng)?;
        let mut second = pick_note(notes, rng)?;

        if notes.len() > 1 {
            let mut redraws = 0;
            while notes[second].label == notes[first].label && redraws < MAX_REDRAWS {
                second = rng.random_range(0..notes.len());
                redraws += 1;
            }
        }

        Self::from_degrees(notes, first, second)
    }

    /// A round for two known degrees; `None` if either is out of range.
    pub fn from_degrees(notes: &[NoteDef], first: usize, second: usize) -> Option<Self> {
        let first_note = notes.get(first)?.clone();
        let second_note = notes.get(second)?.clone();
        Some(Self {
            degrees: [first, second],
            notes: [first_note, second_note],
        })
    }

    /// The two notes in playing order.
    pub fn notes(&self) -> &[NoteDef; 2] {
        &self.notes
    }

    /// Distance between the two degrees, in scale steps.
    pub fn steps(&self) -> usize {
        self.degrees[0].abs_diff(self.degrees[1])
    }

    pub fn answer(&self) -> Cow<'static, str> {
        interval_label(self.steps())
    }

    pub fn evaluate(&self, guess: &str) -> Attempt {
        Attempt {
            played: format!("{} → {}", self.notes[0].label, self.notes[1].label),
            guess: guess.trim().to_string(),
            correct: matches_answer(guess, &self.answer()),
        }
    }
}

/// Running score of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    pub fn record(&mut self, attempt: &Attempt) {
        self.total += 1;
        if attempt.correct {
            self.correct += 1;
        }
    }

    /// Rounded percentage of correct answers, `None` before the first attempt.
    pub fn percent(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        Some((self.correct as f64 / self.total as f64 * 100.0).round() as u32)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent() {
            None => f.write_str("—"),
            Some(percent) => write!(f, "{} / {} ({}%)", self.correct, self.total, percent),
        }
    }
}

/// An attempt as stored in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Increases by one per recorded attempt, starting at 1
    pub id: u64,
    /// Milliseconds since the Unix epoch
    pub ts: u64,
    #[serde(flatten)]
    pub attempt: Attempt,
}

/// Score and attempt history of one training session, newest attempt first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    score: Score,
    history: VecDeque<HistoryEntry>,
    next_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            score: Score::default(),
            history: VecDeque::new(),
            next_id: 1,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt stamped with the current time.
    pub fn record(&mut self, attempt: Attempt) -> &HistoryEntry {
        self.record_at(attempt, unix_millis())
    }

    /// Records an attempt with an explicit timestamp.
    pub fn record_at(&mut self, attempt: Attempt, ts: u64) -> &HistoryEntry {
        self.score.record(&attempt);
        let id = self.next_id;
        self.next_id += 1;
        self.history.push_front(HistoryEntry { id, ts, attempt });
        &self.history[0]
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Recorded attempts, newest first.
    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.history.front()
    }

    /// Forgets every attempt and resets the score. Ids keep increasing.
    pub fn clear(&mut self) {
        self.history.clear();
        self.score = Score::default();
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_scale_at_octave;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn c_major() -> Vec<NoteDef> {
        build_scale_at_octave("c-major", 4).notes
    }

    #[test]
    fn test_interval_labels() {
        assert_eq!(interval_label(0), "unison");
        assert_eq!(interval_label(4), "5th");
        assert_eq!(interval_label(7), "octave");
        assert_eq!(interval_label(9), "9 steps");
    }

    #[test]
    fn test_pick_note_on_empty_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_note(&[], &mut rng), None);
        assert!(NoteRound::new(&[], &mut rng).is_none());
        assert!(IntervalRound::new(&[], &mut rng).is_none());
    }

    #[test]
    fn test_note_round_draws_from_the_scale() {
        let notes = c_major();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let round = NoteRound::new(&notes, &mut rng).expect("non-empty scale");
            assert!(notes.contains(round.note()));
        }
    }

    #[test]
    fn test_note_guess_evaluation() {
        let notes = c_major();
        let round = NoteRound::with_note(notes[4].clone());
        assert!(round.evaluate("G").correct);
        assert!(round.evaluate(" g ").correct);
        assert!(!round.evaluate("A").correct);

        let malformed = round.evaluate("not-a-note");
        assert!(!malformed.correct);
        assert_eq!(malformed.played, "G");
        assert_eq!(malformed.guess, "not-a-note");
    }

    #[test]
    fn test_interval_round_avoids_repeating_a_label() {
        let notes = c_major();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let round = IntervalRound::new(&notes, &mut rng).expect("non-empty scale");
            let [first, second] = round.notes();
            assert_ne!(first.label, second.label);
            assert_ne!(round.steps(), 0);
            assert_ne!(round.steps(), 7);
        }
    }

    #[test]
    fn test_single_note_scale_allows_unison() {
        let notes = c_major()[..1].to_vec();
        let mut rng = StdRng::seed_from_u64(3);
        let round = IntervalRound::new(&notes, &mut rng).expect("one note");
        assert_eq!(round.steps(), 0);
        assert_eq!(round.answer(), "unison");
    }

    #[test]
    fn test_interval_steps_use_scale_degrees() {
        let notes = c_major();
        let round = IntervalRound::from_degrees(&notes, 4, 0).expect("in range");
        assert_eq!(round.steps(), 4);
        assert!(round.evaluate("5th").correct);
        assert!(!round.evaluate("4th").correct);
        assert_eq!(round.evaluate("5th").played, "G → C");

        let octave = IntervalRound::from_degrees(&notes, 0, 7).expect("in range");
        assert!(octave.evaluate("Octave").correct);
        assert!(IntervalRound::from_degrees(&notes, 0, 8).is_none());
    }

    #[test]
    fn test_score() {
        let mut score = Score::default();
        assert_eq!(score.to_string(), "—");

        let round = NoteRound::with_note(c_major()[0].clone());
        for guess in ["C", "C", "D", "C"] {
            score.record(&round.evaluate(guess));
        }
        assert_eq!(score.percent(), Some(75));
        assert_eq!(score.to_string(), "3 / 4 (75%)");
    }

    #[test]
    fn test_session_history_is_newest_first() {
        let round = NoteRound::with_note(c_major()[2].clone());
        let mut session = Session::new();
        assert!(session.last().is_none());

        session.record_at(round.evaluate("E"), 1_000);
        let entry = session.record_at(round.evaluate("F"), 2_000);
        assert_eq!(entry.id, 2);
        assert!(!entry.attempt.correct);

        let ids: Vec<u64> = session.history().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(session.history()[1].ts, 1_000);
        assert_eq!(session.history()[1].attempt.guess, "E");
        assert_eq!(session.score(), Score { correct: 1, total: 2 });
    }

    #[test]
    fn test_session_clear_resets_score_but_not_ids() {
        let round = NoteRound::with_note(c_major()[0].clone());
        let mut session = Session::new();
        session.record(round.evaluate("C"));
        session.record(round.evaluate("D"));
        assert!(session.last().is_some_and(|e| e.ts > 0));

        session.clear();
        assert!(session.history().is_empty());
        assert_eq!(session.score(), Score::default());

        assert_eq!(session.record(round.evaluate("C")).id, 3);
        assert_eq!(session.score(), Score { correct: 1, total: 1 });
    }

    #[test]
    fn test_history_entry_serializes_flat() {
        let round = NoteRound::with_note(c_major()[0].clone());
        let mut session = Session::new();
        let entry = session.record_at(round.evaluate("c"), 42);
        let json = serde_json::to_value(entry).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({ "id": 1, "ts": 42, "played": "C", "guess": "c", "correct": true })
        );
    }
}
