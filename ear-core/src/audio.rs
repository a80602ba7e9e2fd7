//! # Audio Output Module
//!
//! This module owns the shared audio clock that every tone is scheduled on.
//! The clock is a CPAL (Cross-Platform Audio Library) output stream: its time
//! is the number of frames rendered so far divided by the sample rate, so a
//! voice scheduled at time `t` starts on exactly the frame that renders `t`.
//!
//! ## Features
//! - One clock per process, created lazily on first use and never torn down
//! - Stream created suspended and started by [`AudioClock::resume`]
//! - Lock-free hand-off of new voices to the render callback
//! - [`ManualClock`] for headless runs and tests

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SupportedStreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::error::PlaybackError;
use crate::synth::{self, Voice};

/// Preferred output sample rate when the device supports a range.
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// A monotonic clock that tones can be scheduled against.
///
/// Times are seconds in the clock's own domain. Scheduling only appends
/// voices; nothing ever rewinds or resets the clock.
pub trait AudioClock: Send + Sync {
    /// Current clock time in seconds.
    fn now(&self) -> f64;

    /// Whether the clock is advancing.
    fn is_running(&self) -> bool;

    /// Whether the output behind the clock has failed. A failed clock
    /// stops advancing for good.
    fn has_failed(&self) -> bool;

    /// Starts a suspended clock. Does nothing if it is already running.
    fn resume(&self) -> Result<(), PlaybackError>;

    /// Adds a voice to the timeline.
    fn schedule(&self, voice: Voice) -> Result<(), PlaybackError>;
}

static SHARED_CLOCK: OnceCell<Arc<dyn AudioClock>> = OnceCell::new();

/// Returns the process-wide audio clock, opening the output device on first use.
///
/// A failed initialization is not cached, so a later call tries again.
///
/// # Returns
/// * `Ok(clock)` - The shared clock
/// * `Err(PlaybackError::AudioUnavailable)` - No usable output device
pub fn shared_clock() -> Result<Arc<dyn AudioClock>, PlaybackError> {
    SHARED_CLOCK
        .get_or_try_init(|| match CpalClock::start() {
            Ok(clock) => Ok(Arc::new(clock) as Arc<dyn AudioClock>),
            Err(e) => {
                warn!("[AUDIO] Could not open audio output: {e:#}");
                Err(PlaybackError::unavailable(format!("{e:#}")))
            }
        })
        .cloned()
}

/// Messages handled by the thread that owns the output stream.
enum Control {
    Resume { reply: Sender<Result<(), String>> },
}

/// Audio clock backed by the default CPAL output device.
pub struct CpalClock {
    sample_rate: u32,
    frames: Arc<AtomicU64>,
    running: AtomicBool,
    failed: Arc<AtomicBool>,
    voice_tx: Sender<Voice>,
    control_tx: Sender<Control>,
}

impl CpalClock {
    /// Opens the default output device on a dedicated audio thread.
    ///
    /// The thread owns the stream for the rest of the process (streams are
    /// not `Send` on every platform) and waits for control messages.
    pub fn start() -> Result<Self> {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded::<Voice>();
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<Control>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32>>(1);
        let frames = Arc::new(AtomicU64::new(0));
        let frames_for_stream = Arc::clone(&frames);
        let failed = Arc::new(AtomicBool::new(false));
        let failed_for_stream = Arc::clone(&failed);

        thread::Builder::new()
            .name("ear-audio".to_string())
            .spawn(move || {
                debug!("[AUDIO-THREAD] Opening output stream...");
                let opened = open_output_stream(voice_rx, frames_for_stream, failed_for_stream);
                let (stream, sample_rate) = match opened {
                    Ok(tuple) => tuple,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(sample_rate));

                for control in control_rx.iter() {
                    match control {
                        Control::Resume { reply } => {
                            let result = stream.play().map_err(|e| e.to_string());
                            let _ = reply.send(result);
                        }
                    }
                }
                debug!("[AUDIO-THREAD] Control channel closed, dropping stream");
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| anyhow!("audio thread exited before opening a stream"))??;

        info!("[AUDIO] Output clock ready at {sample_rate} Hz (suspended)");

        Ok(Self {
            sample_rate,
            frames,
            running: AtomicBool::new(false),
            failed,
            voice_tx,
            control_tx,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioClock for CpalClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        if self.is_running() {
            return Ok(());
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.control_tx
            .send(Control::Resume { reply: reply_tx })
            .map_err(|_| PlaybackError::unavailable("audio thread stopped"))?;
        reply_rx
            .recv()
            .map_err(|_| PlaybackError::unavailable("audio thread stopped"))?
            .map_err(|e| PlaybackError::unavailable(format!("failed to start stream: {e}")))?;

        self.running.store(true, Ordering::Release);
        info!("[AUDIO] Output clock resumed at {:.3}s", self.now());
        Ok(())
    }

    fn schedule(&self, voice: Voice) -> Result<(), PlaybackError> {
        self.voice_tx
            .send(voice)
            .map_err(|_| PlaybackError::unavailable("audio thread stopped"))
    }
}

/// Builds the output stream and its render callback.
///
/// The callback drains newly scheduled voices, renders every frame from the
/// absolute clock time, and advances the shared frame counter. A stream
/// error raises `failed`.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Stream handle (not yet started) and sample rate
/// * `Err(e)` - No output device or no `f32` output format
fn open_output_stream(
    voice_rx: Receiver<Voice>,
    frames: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    info!("[AUDIO] Using audio output device: {}", device.name()?);

    let configs = device.supported_output_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 output format found"))?;

    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels().max(1) as usize;
    let config: cpal::StreamConfig = supported_config.into();

    info!("[AUDIO] Selected sample rate: {sample_rate} Hz, {channels} channel(s)");

    let seconds_per_frame = 1.0 / sample_rate as f64;
    let mut voices: Vec<Voice> = Vec::new();

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            voices.extend(voice_rx.try_iter());

            let mut frame = frames.load(Ordering::Acquire);
            for output in data.chunks_mut(channels) {
                let sample = synth::mix_at(&voices, frame as f64 * seconds_per_frame);
                for element in output.iter_mut() {
                    *element = sample;
                }
                frame += 1;
            }
            frames.store(frame, Ordering::Release);

            let now = frame as f64 * seconds_per_frame;
            voices.retain(|voice| !voice.is_finished(now));
        },
        move |err| {
            error!("[AUDIO] Output stream error: {err}");
            failed.store(true, Ordering::Release);
        },
        None,
    )?;

    Ok((stream, sample_rate))
}

/// Picks an `f32` output configuration closest to the target sample rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfig> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            if in_range { 0 } else { min_diff.min(max_diff) }
        })
        .map(|c| {
            let rate = target_rate.clamp(c.min_sample_rate().0, c.max_sample_rate().0);
            c.with_sample_rate(cpal::SampleRate(rate))
        })
}

#[derive(Debug, Default)]
struct ManualState {
    now: f64,
    running: bool,
    failed: bool,
    voices: Vec<Voice>,
}

/// A clock whose time only moves when the caller says so.
///
/// Scheduled voices are recorded instead of rendered. Useful for headless
/// runs and for driving the scheduler deterministically in tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
    unavailable: bool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that refuses to resume, as if no output device existed.
    pub fn unavailable() -> Self {
        Self {
            state: Mutex::default(),
            unavailable: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_time(&self, now: f64) {
        self.lock().now = now;
    }

    pub fn advance(&self, seconds: f64) {
        self.lock().now += seconds;
    }

    /// Marks the clock as failed, as a device error would.
    pub fn fail(&self) {
        self.lock().failed = true;
    }

    /// Every voice scheduled so far, in scheduling order.
    pub fn voices(&self) -> Vec<Voice> {
        self.lock().voices.clone()
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.lock().now
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }

    fn has_failed(&self) -> bool {
        self.lock().failed
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        if self.unavailable {
            return Err(PlaybackError::unavailable("manual clock has no output"));
        }
        self.lock().running = true;
        Ok(())
    }

    fn schedule(&self, voice: Voice) -> Result<(), PlaybackError> {
        if self.unavailable {
            return Err(PlaybackError::unavailable("manual clock has no output"));
        }
        self.lock().voices.push(voice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;

    #[test]
    fn test_manual_clock_starts_suspended() {
        let clock = ManualClock::new();
        assert!(!clock.is_running());
        clock.resume().expect("manual clock resumes");
        assert!(clock.is_running());
    }

    #[test]
    fn test_manual_clock_time() {
        let clock = ManualClock::new();
        clock.set_time(1.5);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.75);
    }

    #[test]
    fn test_manual_clock_records_voices() {
        let clock = ManualClock::new();
        let voice = Voice::new(440.0, 0.0, 1.0, &PlaybackConfig::default());
        clock.schedule(voice).expect("schedule");
        assert_eq!(clock.voices(), vec![voice]);
    }

    #[test]
    fn test_unavailable_clock_fails() {
        let clock = ManualClock::unavailable();
        assert!(matches!(clock.resume(), Err(PlaybackError::AudioUnavailable { .. })));
    }

    #[test]
    fn test_manual_clock_failure_flag() {
        let clock = ManualClock::new();
        assert!(!clock.has_failed());
        clock.fail();
        assert!(clock.has_failed());
    }
}
