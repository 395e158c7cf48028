//! Playback position display and seek-control mapping.
//!
//! Samples arrive from the worker's poll ticks; gestures arrive from the UI.
//! While a gesture is in progress, or a seek has not been confirmed yet, the
//! optimistic position wins over whatever the engine last reported.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Samples this close to a pending seek target confirm it.
const SEEK_CONFIRM_TOLERANCE: Duration = Duration::from_millis(500);
/// Give up waiting for confirmation after this long.
const SEEK_CONFIRM_DEADLINE: Duration = Duration::from_secs(2);

/// What releasing the seek control does to playback.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
pub enum ScrubReleasePolicy {
    /// Always issue Play on release, even if playback was paused before.
    #[default]
    #[serde(rename = "always-resume")]
    AlwaysResume,
    /// Issue Play only if playback was running when the gesture started.
    #[serde(rename = "restore", alias = "restore-prior")]
    RestorePrior,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PositionSample {
    pub current: Duration,
    pub total: Duration,
}

impl PositionSample {
    pub fn new(current: Duration, total: Duration) -> Self {
        Self { current, total }
    }

    /// `None` while the total duration is not yet known.
    pub fn percent(&self) -> Option<f64> {
        if self.total.is_zero() {
            return None;
        }
        let ratio = self.current.as_secs_f64() / self.total.as_secs_f64();
        Some(ratio.clamp(0.0, 1.0) * 100.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingSeek {
    target: Duration,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct PositionSynchronizer {
    percent: f64,
    current: Duration,
    total: Duration,
    interacting: bool,
    playing_at_gesture_start: bool,
    seeked_during_gesture: bool,
    pending_seek: Option<PendingSeek>,
}

impl PositionSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    pub fn has_pending_seek(&self) -> bool {
        self.pending_seek.is_some()
    }

    /// `mm:ss / mm:ss`.
    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            format_timestamp(self.current),
            format_timestamp(self.total)
        )
    }

    /// Applies a poll sample. Returns whether the display changed.
    pub fn on_sample(&mut self, sample: PositionSample, now: Instant) -> bool {
        if self.interacting {
            return false;
        }
        let Some(percent) = sample.percent() else {
            return false;
        };

        if let Some(pending) = self.pending_seek {
            let off_by = if sample.current > pending.target {
                sample.current - pending.target
            } else {
                pending.target - sample.current
            };
            if off_by > SEEK_CONFIRM_TOLERANCE && now < pending.deadline {
                return false;
            }
            self.pending_seek = None;
        }

        self.percent = percent;
        self.current = sample.current.min(sample.total);
        self.total = sample.total;
        true
    }

    /// Records the duration without moving the indicator, e.g. right after opening.
    pub fn set_total(&mut self, total: Duration) {
        self.total = total;
        if !total.is_zero() {
            self.percent = PositionSample::new(self.current, total)
                .percent()
                .unwrap_or(0.0);
        }
    }

    pub fn begin_scrub(&mut self, playing: bool) {
        if !self.interacting {
            self.playing_at_gesture_start = playing;
            self.seeked_during_gesture = false;
        }
        self.interacting = true;
    }

    /// Maps a pointer position on the seek control to a target time and
    /// moves the indicator there immediately. `None` when the duration is unknown.
    pub fn scrub_to(&mut self, pointer_offset: f32, control_width: f32) -> Option<Duration> {
        if self.total.is_zero() {
            return None;
        }
        let fraction = seek_fraction(pointer_offset, control_width);
        let target = self.total.mul_f64(fraction).min(self.total);
        self.percent = fraction * 100.0;
        self.current = target;
        self.seeked_during_gesture = true;
        Some(target)
    }

    /// Ends the gesture. Returns whether playback should be (re)started.
    /// A gesture that never produced a seek changes nothing.
    pub fn end_scrub(&mut self, policy: ScrubReleasePolicy, now: Instant) -> bool {
        if !self.interacting {
            return false;
        }
        self.interacting = false;
        if !std::mem::take(&mut self.seeked_during_gesture) {
            return false;
        }
        self.pending_seek = Some(PendingSeek {
            target: self.current,
            deadline: now + SEEK_CONFIRM_DEADLINE,
        });
        match policy {
            ScrubReleasePolicy::AlwaysResume => true,
            ScrubReleasePolicy::RestorePrior => self.playing_at_gesture_start,
        }
    }

    /// Back to zero, keeping the known duration (end of media, stop).
    pub fn rewind(&mut self) {
        self.percent = 0.0;
        self.current = Duration::ZERO;
        self.pending_seek = None;
    }

    /// Forget everything (media closed or replaced).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Pointer offset over control width, clamped to `[0, 1]`.
pub fn seek_fraction(pointer_offset: f32, control_width: f32) -> f64 {
    if control_width.is_nan() || control_width <= 0.0 || !pointer_offset.is_finite() {
        return 0.0;
    }
    (f64::from(pointer_offset) / f64::from(control_width)).clamp(0.0, 1.0)
}

pub fn format_timestamp(time: Duration) -> String {
    let total_seconds = time.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn percent_tracks_current_over_total() {
        for total in [1u64, 7, 120, 3_600, 86_400] {
            for step in 0..=10 {
                let current = Duration::from_secs_f64(total as f64 * step as f64 / 10.0);
                let sample = PositionSample::new(current, secs(total));
                let expected = current.as_secs_f64() / total as f64 * 100.0;
                let percent = sample.percent().expect("known total");
                assert!((percent - expected).abs() < 1e-9, "{total} {step}");
            }
        }
    }

    #[test]
    fn zero_total_skips_update() {
        let mut sync = PositionSynchronizer::new();
        assert!(!sync.on_sample(PositionSample::new(secs(3), Duration::ZERO), Instant::now()));
        assert_eq!(sync.percent(), 0.0);
        assert_eq!(sync.label(), "00:00 / 00:00");
    }

    #[test]
    fn label_formats_minutes_and_hours() {
        assert_eq!(format_timestamp(secs(0)), "00:00");
        assert_eq!(format_timestamp(secs(60)), "01:00");
        assert_eq!(format_timestamp(Duration::from_millis(119_900)), "01:59");
        assert_eq!(format_timestamp(secs(3_725)), "1:02:05");
    }

    #[test]
    fn seek_fraction_is_clamped() {
        assert_eq!(seek_fraction(-20.0, 200.0), 0.0);
        assert_eq!(seek_fraction(250.0, 200.0), 1.0);
        assert_eq!(seek_fraction(50.0, 200.0), 0.25);
        assert_eq!(seek_fraction(10.0, 0.0), 0.0);
        assert_eq!(seek_fraction(f32::NAN, 100.0), 0.0);
    }

    #[test]
    fn scrub_targets_stay_within_duration() {
        let mut sync = PositionSynchronizer::new();
        sync.set_total(Duration::from_millis(123_456));
        sync.begin_scrub(true);
        for offset in [-50.0f32, 0.0, 33.3, 99.9, 100.0, 400.0] {
            let target = sync.scrub_to(offset, 100.0).expect("known total");
            assert!(target <= sync.total());
        }
    }

    #[test]
    fn scrub_without_duration_does_nothing() {
        let mut sync = PositionSynchronizer::new();
        sync.begin_scrub(false);
        assert_eq!(sync.scrub_to(40.0, 100.0), None);
        assert_eq!(sync.percent(), 0.0);
    }

    #[test]
    fn samples_do_not_fight_an_active_gesture() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.on_sample(PositionSample::new(secs(10), secs(100)), now);
        sync.begin_scrub(true);
        sync.scrub_to(80.0, 100.0);

        assert!(!sync.on_sample(PositionSample::new(secs(11), secs(100)), now));
        assert_eq!(sync.percent(), 80.0);
    }

    #[test]
    fn pending_seek_holds_until_confirmed() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.on_sample(PositionSample::new(secs(10), secs(100)), now);
        sync.begin_scrub(true);
        sync.scrub_to(60.0, 100.0);
        sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now);

        // Stale sample from before the engine applied the seek.
        assert!(!sync.on_sample(PositionSample::new(secs(11), secs(100)), now));
        assert_eq!(sync.percent(), 60.0);

        assert!(sync.on_sample(
            PositionSample::new(Duration::from_millis(60_300), secs(100)),
            now
        ));
        assert!(!sync.has_pending_seek());
    }

    #[test]
    fn pending_seek_expires() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.set_total(secs(100));
        sync.begin_scrub(true);
        sync.scrub_to(60.0, 100.0);
        sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now);

        let later = now + SEEK_CONFIRM_DEADLINE + Duration::from_millis(1);
        assert!(sync.on_sample(PositionSample::new(secs(20), secs(100)), later));
        assert_eq!(sync.percent(), 20.0);
    }

    #[test]
    fn release_policy_decides_resume() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.set_total(secs(100));

        sync.begin_scrub(false);
        sync.scrub_to(10.0, 100.0);
        assert!(sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now));

        sync.begin_scrub(false);
        sync.scrub_to(20.0, 100.0);
        assert!(!sync.end_scrub(ScrubReleasePolicy::RestorePrior, now));

        sync.begin_scrub(true);
        sync.scrub_to(30.0, 100.0);
        assert!(sync.end_scrub(ScrubReleasePolicy::RestorePrior, now));

        // Release without a press.
        assert!(!sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now));
    }

    #[test]
    fn drag_keeps_the_state_from_the_press() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.set_total(secs(100));
        sync.begin_scrub(false);
        sync.scrub_to(10.0, 100.0);
        // A drag event reports "playing" because release-resume already kicked in elsewhere.
        sync.begin_scrub(true);
        sync.scrub_to(20.0, 100.0);
        assert!(!sync.end_scrub(ScrubReleasePolicy::RestorePrior, now));
    }

    #[test]
    fn gesture_without_a_seek_changes_nothing() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.begin_scrub(false);
        assert_eq!(sync.scrub_to(50.0, 100.0), None);
        assert!(sync.is_interacting());

        assert!(!sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now));
        assert!(!sync.is_interacting());
        assert!(!sync.has_pending_seek());

        // Samples are not held back by a seek that never happened.
        assert!(sync.on_sample(PositionSample::new(secs(5), secs(100)), now));
        assert_eq!(sync.percent(), 5.0);
    }

    #[test]
    fn new_gesture_forgets_the_previous_seek() {
        let now = Instant::now();
        let mut sync = PositionSynchronizer::new();
        sync.set_total(secs(100));
        sync.begin_scrub(true);
        sync.scrub_to(40.0, 100.0);
        assert!(sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now));

        // Press and release on the same spot without a pointer position.
        sync.begin_scrub(true);
        assert!(!sync.end_scrub(ScrubReleasePolicy::AlwaysResume, now));
    }

    #[test]
    fn rewind_keeps_duration() {
        let mut sync = PositionSynchronizer::new();
        sync.on_sample(PositionSample::new(secs(30), secs(60)), Instant::now());
        sync.rewind();
        assert_eq!(sync.percent(), 0.0);
        assert_eq!(sync.label(), "00:00 / 01:00");
        sync.clear();
        assert_eq!(sync.total(), Duration::ZERO);
    }
}
