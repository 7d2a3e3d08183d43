//! Exclusive wall-clock time attribution across nested dispatch frames.
//!
//! The recorder keeps a stack of frames, one per component currently
//! responsible for work. Entering a frame pauses the frame below it and
//! leaving a frame resumes it, so each label only accumulates the time during
//! which it was on top of the stack. Pausing and resuming share a single
//! timestamp, which makes the per-label totals of a cascade add up to the
//! root frame's wall-clock duration.

use crate::domain::ComponentKind;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Accumulated time for one responsible component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingStatistic {
    /// Component the time was attributed to
    pub kind: ComponentKind,

    /// Total exclusive time
    pub total: Duration,

    /// Number of frames entered under this label
    pub frames: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulated {
    total: Duration,
    frames: u64,
}

#[derive(Debug)]
struct Frame {
    kind: ComponentKind,
    entered_at: Instant,
    resumed_at: Instant,
}

/// Stack-based timing recorder.
#[derive(Debug, Default)]
pub struct TimingRecorder {
    stats: HashMap<ComponentKind, Accumulated>,
    frames: Vec<Frame>,
    cascades: u64,
}

impl TimingRecorder {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` responsible from now on, pausing the current frame.
    pub fn enter(&mut self, kind: ComponentKind) {
        self.enter_at(kind, Instant::now());
    }

    /// Close the current frame and resume the one below it.
    ///
    /// Returns the frame's inclusive duration, nested frames included, or
    /// `None` if no frame was open.
    pub fn exit(&mut self) -> Option<Duration> {
        self.exit_at(Instant::now())
    }

    pub(crate) fn enter_at(&mut self, kind: ComponentKind, now: Instant) {
        if let Some(current) = self.frames.last() {
            let elapsed = now.saturating_duration_since(current.resumed_at);
            let kind = current.kind.clone();
            self.accumulate(kind, elapsed);
        }

        self.stats.entry(kind.clone()).or_default().frames += 1;
        self.frames.push(Frame {
            kind,
            entered_at: now,
            resumed_at: now,
        });
    }

    pub(crate) fn exit_at(&mut self, now: Instant) -> Option<Duration> {
        let frame = self.frames.pop()?;
        let elapsed = now.saturating_duration_since(frame.resumed_at);
        self.accumulate(frame.kind, elapsed);

        if let Some(parent) = self.frames.last_mut() {
            parent.resumed_at = now;
        }

        Some(now.saturating_duration_since(frame.entered_at))
    }

    fn accumulate(&mut self, kind: ComponentKind, elapsed: Duration) {
        let entry = self.stats.entry(kind).or_default();
        entry.total = entry.total.saturating_add(elapsed);
    }

    /// Mark the end of a top-level cascade.
    ///
    /// Any frames still open are closed at the current instant so that a
    /// later cascade starts from an empty stack.
    pub fn finish_cascade(&mut self) {
        let now = Instant::now();
        while self.exit_at(now).is_some() {}
        self.cascades += 1;
    }

    /// Number of top-level cascades completed since the last reset.
    #[must_use]
    pub fn cascades(&self) -> u64 {
        self.cascades
    }

    /// Number of frames currently open.
    #[must_use]
    pub fn open_frames(&self) -> usize {
        self.frames.len()
    }

    /// Discard all accumulated statistics.
    ///
    /// Open frames are kept so that a reset issued from inside a callback
    /// does not unbalance the stack.
    pub fn reset(&mut self) {
        self.stats.clear();
        self.cascades = 0;
    }

    /// Sorted snapshot of all statistics: longest total first, ties by label.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TimingStatistic> {
        let mut stats: Vec<TimingStatistic> = self
            .stats
            .iter()
            .map(|(kind, acc)| TimingStatistic {
                kind: kind.clone(),
                total: acc.total,
                frames: acc.frames,
            })
            .collect();
        stats.sort_by(|a, b| {
            (Reverse(a.total), &a.kind).cmp(&(Reverse(b.total), &b.kind))
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn total_for(recorder: &TimingRecorder, kind: &str) -> Duration {
        recorder
            .snapshot()
            .into_iter()
            .find(|s| s.kind.as_str() == kind)
            .map(|s| s.total)
            .unwrap_or_default()
    }

    #[test]
    fn test_single_frame() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();

        recorder.enter_at("builder".into(), t0);
        let inclusive = recorder.exit_at(t0 + ms(7));

        assert_eq!(inclusive, Some(ms(7)));
        assert_eq!(total_for(&recorder, "builder"), ms(7));
        assert_eq!(recorder.open_frames(), 0);
    }

    #[test]
    fn test_nested_frames_attribute_exclusive_time() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();

        // outer: 0..3 and 8..10, inner: 3..8
        recorder.enter_at("outer".into(), t0);
        recorder.enter_at("inner".into(), t0 + ms(3));
        assert_eq!(recorder.exit_at(t0 + ms(8)), Some(ms(5)));
        assert_eq!(recorder.exit_at(t0 + ms(10)), Some(ms(10)));

        assert_eq!(total_for(&recorder, "outer"), ms(5));
        assert_eq!(total_for(&recorder, "inner"), ms(5));
    }

    #[test]
    fn test_totals_sum_to_root_duration() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();

        recorder.enter_at(ComponentKind::DISPATCHER, t0);
        recorder.enter_at("builder".into(), t0 + ms(1));
        recorder.enter_at(ComponentKind::DISPATCHER, t0 + ms(4));
        recorder.enter_at("builder".into(), t0 + ms(5));
        recorder.exit_at(t0 + ms(9));
        recorder.exit_at(t0 + ms(10));
        recorder.exit_at(t0 + ms(12));
        let root = recorder.exit_at(t0 + ms(13)).unwrap();

        let sum: Duration = recorder.snapshot().iter().map(|s| s.total).sum();
        assert_eq!(sum, root);
        assert_eq!(total_for(&recorder, "builder"), ms(9));
        assert_eq!(total_for(&recorder, "dispatcher"), ms(4));
    }

    #[test]
    fn test_frames_counted_per_label() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();

        for i in 0..3 {
            recorder.enter_at("observer".into(), t0 + ms(i));
            recorder.exit_at(t0 + ms(i));
        }

        let stats = recorder.snapshot();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].frames, 3);
        assert_eq!(stats[0].total, Duration::ZERO);
    }

    #[test]
    fn test_snapshot_sorted_longest_first() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();

        recorder.enter_at("b".into(), t0);
        recorder.exit_at(t0 + ms(2));
        recorder.enter_at("a".into(), t0);
        recorder.exit_at(t0 + ms(2));
        recorder.enter_at("c".into(), t0);
        recorder.exit_at(t0 + ms(5));

        let labels: Vec<String> = recorder
            .snapshot()
            .into_iter()
            .map(|s| s.kind.to_string())
            .collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_exit_without_frame() {
        let mut recorder = TimingRecorder::new();
        assert_eq!(recorder.exit(), None);
    }

    #[test]
    fn test_finish_cascade_closes_open_frames() {
        let mut recorder = TimingRecorder::new();
        recorder.enter("a".into());
        recorder.enter("b".into());

        recorder.finish_cascade();

        assert_eq!(recorder.open_frames(), 0);
        assert_eq!(recorder.cascades(), 1);
    }

    #[test]
    fn test_reset_keeps_open_frames() {
        let mut recorder = TimingRecorder::new();
        recorder.enter("a".into());
        recorder.reset();

        assert!(recorder.snapshot().is_empty());
        assert_eq!(recorder.open_frames(), 1);
        recorder.exit();
        assert_eq!(recorder.snapshot().len(), 1);
    }

    #[test]
    fn test_snapshot_serializes_statistics() {
        let t0 = Instant::now();
        let mut recorder = TimingRecorder::new();
        recorder.enter_at("builder".into(), t0);
        recorder.exit_at(t0 + ms(7));

        let json = serde_json::to_value(recorder.snapshot()).unwrap();

        assert_eq!(
            json,
            serde_json::json!([{
                "kind": "builder",
                "total": { "secs": 0, "nanos": 7_000_000 },
                "frames": 1
            }])
        );
    }
}
