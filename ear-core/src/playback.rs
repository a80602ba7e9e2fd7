//! # Playback Scheduler Module
//!
//! Schedules notes as voices on the shared audio clock and, optionally,
//! reports which note is sounding so a front-end can highlight it.
//!
//! ## Features
//! - Whole sequences scheduled up front on absolute clock times (no drift)
//! - Highlight tracking as an explicit `Idle -> Polling -> Done` state machine
//! - Generic repeat-until driver that always terminates with its sequence
//! - Overlapping sequences are independent; nothing is cancelled
//!
//! Audio timing never depends on the highlight cadence: voices carry their
//! own start and end times, and the highlight loop only reads the clock.
//! Every loop that waits on the clock also carries a wall-clock deadline,
//! so a stalled or failed output stream cannot keep it alive.

use log::{debug, warn};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::{self, AudioClock};
use crate::catalog::ScaleDef;
use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::pitch::NoteDef;
use crate::synth::Voice;

/// Callback receiving the note that just became active, or `None` when
/// nothing is sounding.
pub type HighlightCallback = Box<dyn FnMut(Option<&NoteDef>) + Send + 'static>;

/// One note placed on the clock's timeline, active over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledNote {
    pub note: NoteDef,
    pub start: f64,
    pub end: f64,
}

impl ScheduledNote {
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// The notes of one playback invocation, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackSchedule {
    notes: Vec<ScheduledNote>,
}

impl PlaybackSchedule {
    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScheduledNote> {
        self.notes.get(index)
    }

    /// End of the last note, or `None` for an empty schedule.
    pub fn end_time(&self) -> Option<f64> {
        self.notes.last().map(|n| n.end)
    }

    /// Index of the note sounding at `t`, if any.
    pub fn active_index(&self, t: f64) -> Option<usize> {
        self.notes.iter().position(|n| n.contains(t))
    }
}

/// Lays notes out back to back starting at `first_start`.
///
/// Each note lasts `note_duration`; the cursor then advances by
/// `note_duration + gap`. Negative or NaN timings count as zero; the
/// [`Player`] rejects them before they get here.
///
/// # Arguments
/// * `notes` - Notes in playing order
/// * `first_start` - Clock time of the first attack
/// * `note_duration` - Length of each note in seconds
/// * `gap` - Silence between notes in seconds
pub fn build_schedule(
    notes: &[NoteDef],
    first_start: f64,
    note_duration: f64,
    gap: f64,
) -> PlaybackSchedule {
    let note_duration = note_duration.max(0.0);
    let gap = gap.max(0.0);
    let mut cursor = first_start;
    let notes = notes
        .iter()
        .map(|note| {
            let scheduled = ScheduledNote {
                note: note.clone(),
                start: cursor,
                end: cursor + note_duration,
            };
            cursor += note_duration + gap;
            scheduled
        })
        .collect();
    PlaybackSchedule { notes }
}

/// Where a [`HighlightTracker`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    /// Not polled yet
    Idle,
    /// Polling the clock
    Polling,
    /// The clock passed the last note plus the grace period
    Done,
}

/// Edge-triggered change reported by [`HighlightTracker::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightChange {
    /// The note at this schedule index became active
    Active(usize),
    /// No note is active any more
    Cleared,
}

impl HighlightChange {
    /// The newly active note, resolved against the tracked schedule.
    pub fn note<'a>(&self, schedule: &'a PlaybackSchedule) -> Option<&'a NoteDef> {
        match self {
            HighlightChange::Active(index) => schedule.get(*index).map(|n| &n.note),
            HighlightChange::Cleared => None,
        }
    }
}

/// Turns clock samples into highlight changes for one schedule.
///
/// Only changes are reported, so each note produces exactly one `Active`
/// event as long as it is sampled at least once while it sounds. Once the
/// clock passes the last note's end plus `grace`, the tracker is `Done`; if a
/// note was still reported active at that point a final `Cleared` is emitted.
#[derive(Debug, Clone)]
pub struct HighlightTracker {
    schedule: PlaybackSchedule,
    grace: f64,
    state: HighlightState,
    active: Option<usize>,
}

impl HighlightTracker {
    pub fn new(schedule: PlaybackSchedule, grace: f64) -> Self {
        Self {
            schedule,
            grace,
            state: HighlightState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == HighlightState::Done
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn schedule(&self) -> &PlaybackSchedule {
        &self.schedule
    }

    /// Samples the clock once.
    ///
    /// # Arguments
    /// * `now` - Current clock time
    ///
    /// # Returns
    /// * `Some(change)` - The active note changed since the previous poll
    /// * `None` - Nothing changed, or the tracker is already done
    pub fn poll(&mut self, now: f64) -> Option<HighlightChange> {
        match self.state {
            HighlightState::Done => return None,
            HighlightState::Idle => self.state = HighlightState::Polling,
            HighlightState::Polling => {}
        }

        let Some(last_end) = self.schedule.end_time() else {
            self.state = HighlightState::Done;
            return None;
        };

        if now >= last_end + self.grace {
            self.state = HighlightState::Done;
            return self.active.take().map(|_| HighlightChange::Cleared);
        }

        let current = self.schedule.active_index(now);
        if current == self.active {
            return None;
        }
        self.active = current;
        Some(match current {
            Some(index) => HighlightChange::Active(index),
            None => HighlightChange::Cleared,
        })
    }

    /// Stops tracking before the schedule has played out.
    ///
    /// Returns a final `Cleared` if a note was still active.
    pub fn finish(&mut self) -> Option<HighlightChange> {
        if self.is_done() {
            return None;
        }
        self.state = HighlightState::Done;
        self.active.take().map(|_| HighlightChange::Cleared)
    }
}

/// Calls `step` every `period` on a background thread until it breaks.
///
/// The thread exits as soon as `step` returns `ControlFlow::Break`, so a
/// loop whose step has a reachable end condition never outlives it.
pub fn repeat_until<F>(period: Duration, mut step: F) -> JoinHandle<()>
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    thread::spawn(move || {
        while step().is_continue() {
            thread::sleep(period);
        }
    })
}

/// A scheduled sequence and its highlight loop, if one was requested.
#[derive(Debug, Default)]
pub struct SequenceHandle {
    schedule: PlaybackSchedule,
    highlight: Option<JoinHandle<()>>,
}

impl SequenceHandle {
    pub fn schedule(&self) -> &PlaybackSchedule {
        &self.schedule
    }

    pub fn end_time(&self) -> Option<f64> {
        self.schedule.end_time()
    }

    /// True once the highlight loop has stopped (always true without one).
    pub fn is_finished(&self) -> bool {
        self.highlight.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Blocks until the highlight loop has delivered its last change.
    pub fn wait(self) {
        if let Some(handle) = self.highlight {
            if handle.join().is_err() {
                warn!("[PLAYBACK] Highlight callback panicked");
            }
        }
    }
}

/// Plays notes on an audio clock.
#[derive(Clone)]
pub struct Player {
    clock: Arc<dyn AudioClock>,
    config: PlaybackConfig,
}

impl Player {
    /// A player on the process-wide audio clock with the default config.
    pub fn shared() -> Result<Self, PlaybackError> {
        Ok(Self::with_clock(audio::shared_clock()?))
    }

    pub fn with_clock(clock: Arc<dyn AudioClock>) -> Self {
        Self {
            clock,
            config: PlaybackConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn AudioClock> {
        &self.clock
    }

    fn ensure_running(&self) -> Result<(), PlaybackError> {
        if self.clock.has_failed() {
            return Err(PlaybackError::unavailable("audio output stream failed"));
        }
        if !self.clock.is_running() {
            debug!("[PLAYBACK] Clock suspended, resuming");
            self.clock.resume()?;
        }
        Ok(())
    }

    /// Plays a single tone with a short fade-in and a fade-out ending at
    /// `duration_secs`.
    ///
    /// Returns once the tone is scheduled, not when it finishes.
    pub fn play_tone(&self, frequency: f64, duration_secs: f64) -> Result<(), PlaybackError> {
        PlaybackError::check_non_negative("frequency", frequency)?;
        PlaybackError::check_non_negative("duration", duration_secs)?;
        self.ensure_running()?;
        let start = self.clock.now() + self.config.start_offset;
        self.clock
            .schedule(Voice::new(frequency, start, duration_secs, &self.config))?;
        debug!("[PLAYBACK] Tone {frequency:.2} Hz at {start:.3}s for {duration_secs:.3}s");
        Ok(())
    }

    /// Schedules every note up front and returns the resulting timeline.
    ///
    /// An empty slice is a no-op and does not touch the clock. Negative or
    /// non-finite timings are rejected before the clock is touched.
    pub fn schedule_sequence(
        &self,
        notes: &[NoteDef],
        note_duration: f64,
        gap: f64,
    ) -> Result<PlaybackSchedule, PlaybackError> {
        if notes.is_empty() {
            return Ok(PlaybackSchedule::default());
        }
        PlaybackError::check_non_negative("note_duration", note_duration)?;
        PlaybackError::check_non_negative("gap", gap)?;

        self.ensure_running()?;
        let first_start = self.clock.now() + self.config.start_offset;
        let schedule = build_schedule(notes, first_start, note_duration, gap);

        for scheduled in schedule.notes() {
            self.clock.schedule(Voice::new(
                scheduled.note.frequency,
                scheduled.start,
                note_duration,
                &self.config,
            ))?;
        }

        debug!(
            "[PLAYBACK] Scheduled {} notes from {:.3}s to {:.3}s",
            schedule.len(),
            first_start,
            schedule.end_time().unwrap_or(first_start)
        );
        Ok(schedule)
    }

    /// Schedules a sequence and, if `on_highlight` is given, reports the
    /// sounding note from a loop polling the clock every frame period.
    ///
    /// # Arguments
    /// * `notes` - Notes in playing order
    /// * `note_duration` - Length of each note in seconds
    /// * `gap` - Silence between notes in seconds
    /// * `on_highlight` - Called whenever the active note changes
    ///
    /// # Returns
    /// * `Ok(handle)` - Everything is scheduled; the highlight loop (if any) is running
    /// * `Err(PlaybackError::AudioUnavailable)` - The clock could not be resumed
    /// * `Err(PlaybackError::InvalidTiming)` - Negative or non-finite duration or gap
    pub fn play_sequence(
        &self,
        notes: &[NoteDef],
        note_duration: f64,
        gap: f64,
        on_highlight: Option<HighlightCallback>,
    ) -> Result<SequenceHandle, PlaybackError> {
        let schedule = self.schedule_sequence(notes, note_duration, gap)?;

        let highlight = match on_highlight {
            Some(callback) if !schedule.is_empty() => Some(self.spawn_highlight(schedule.clone(), callback)),
            _ => None,
        };

        Ok(SequenceHandle { schedule, highlight })
    }

    /// Plays a whole scale with the configured note length and gap.
    pub fn play_scale(
        &self,
        scale: &ScaleDef,
        on_highlight: Option<HighlightCallback>,
    ) -> Result<SequenceHandle, PlaybackError> {
        self.play_sequence(
            &scale.notes,
            self.config.note_duration,
            self.config.gap,
            on_highlight,
        )
    }

    fn spawn_highlight(
        &self,
        schedule: PlaybackSchedule,
        mut callback: HighlightCallback,
    ) -> JoinHandle<()> {
        let clock = Arc::clone(&self.clock);
        let grace = self.config.highlight_grace;
        let deadline = self.stall_deadline(schedule.end_time().unwrap_or(0.0) + grace);
        let mut tracker = HighlightTracker::new(schedule, grace);

        repeat_until(self.config.frame_period(), move || {
            let now = clock.now();
            if let Some(change) = tracker.poll(now) {
                callback(change.note(tracker.schedule()));
            }
            if !tracker.is_done() && (clock.has_failed() || Instant::now() >= deadline) {
                warn!("[PLAYBACK] Audio clock stalled at {now:.3}s, stopping highlight");
                if let Some(change) = tracker.finish() {
                    callback(change.note(tracker.schedule()));
                }
            }
            if tracker.is_done() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Blocks until the clock reaches `time`, checking once per frame period.
    ///
    /// Gives up when the clock fails, or when it has not got there within
    /// the remaining clock time plus `stall_margin` of wall time.
    /// Returns whether `time` was reached.
    pub fn wait_until(&self, time: f64) -> bool {
        let deadline = self.stall_deadline(time);
        loop {
            let now = self.clock.now();
            if now >= time {
                return true;
            }
            if self.clock.has_failed() || Instant::now() >= deadline {
                warn!("[PLAYBACK] Audio clock stalled at {now:.3}s while waiting for {time:.3}s");
                return false;
            }
            thread::sleep(self.config.frame_period());
        }
    }

    /// Wall-clock instant after which waiting for clock time `target` stops.
    fn stall_deadline(&self, target: f64) -> Instant {
        let remaining = (target - self.clock.now()).max(0.0);
        let budget = Duration::try_from_secs_f64(remaining + self.config.stall_margin)
            .unwrap_or(Duration::ZERO);
        Instant::now() + budget
    }
}

/// Plays one tone on the shared clock.
pub fn play_frequency(frequency: f64, duration_secs: f64) -> Result<(), PlaybackError> {
    Player::shared()?.play_tone(frequency, duration_secs)
}

/// Plays a sequence on the shared clock. Empty input never opens the device.
pub fn play_sequence(
    notes: &[NoteDef],
    note_duration: f64,
    gap: f64,
    on_highlight: Option<HighlightCallback>,
) -> Result<SequenceHandle, PlaybackError> {
    if notes.is_empty() {
        return Ok(SequenceHandle::default());
    }
    Player::shared()?.play_sequence(notes, note_duration, gap, on_highlight)
}
