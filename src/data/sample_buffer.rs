//! Latest-value store for per-leg samples with a bounded arrival history.
//!
//! The ingestion task writes into the buffer at whatever rate the serial link delivers,
//! while the frame loop reads it at a fixed rate. The two sides share the buffer through
//! an `Arc` and never hold a lock for longer than a single sample copy.
//!
//! # Concurrency contract
//! - One writer and any number of readers may use the buffer at the same time.
//! - [`LegSample`] is `Copy`; a slot is replaced as a whole under a write lock, so
//!   [`SampleBuffer::latest`] and [`SampleBuffer::snapshot`] never observe a torn sample.
//! - Once a leg has received a sample it always has one; there is no way to clear a slot.
//! - The history is guarded separately so that statistics readers never stall
//!   `latest`/`snapshot` callers.

use crate::geometry::{LegIndex, LEG_COUNT};
use crate::sample::LegSample;
use nalgebra::{Point3, Vector3};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// History length used when none is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// A sample together with the host time it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivedSample {
    /// The sample as parsed
    pub sample: LegSample,
    /// Host arrival time
    pub received_at: Instant,
}

/// Thread-safe latest-sample-per-leg buffer.
#[derive(Debug)]
pub struct SampleBuffer {
    latest: RwLock<[Option<LegSample>; LEG_COUNT]>,
    history: Mutex<VecDeque<ReceivedSample>>,
    capacity: usize,
    received: [AtomicU64; LEG_COUNT],
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SampleBuffer {
    /// Creates an empty buffer keeping at most `history_capacity` recent samples
    /// (minimum 1).
    pub fn new(history_capacity: usize) -> Self {
        let capacity = history_capacity.max(1);
        Self {
            latest: RwLock::new([None; LEG_COUNT]),
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            received: Default::default(),
        }
    }

    /// Stores `sample` as the latest for its leg.
    pub fn put(&self, sample: LegSample) {
        self.put_at(sample, Instant::now());
    }

    /// Stores `sample`, recording `received_at` as its arrival time.
    pub fn put_at(&self, sample: LegSample, received_at: Instant) {
        let slot = sample.leg_index.as_usize();
        self.latest.write()[slot] = Some(sample);
        self.received[slot].fetch_add(1, Ordering::Relaxed);

        let mut history = self.history.lock();
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(ReceivedSample {
            sample,
            received_at,
        });
    }

    /// Most recent sample for `leg`, or `None` if the leg has not reported yet.
    pub fn latest(&self, leg: LegIndex) -> Option<LegSample> {
        self.latest.read()[leg.as_usize()]
    }

    /// Consistent copy of the latest sample of every leg that has reported.
    pub fn snapshot(&self) -> BTreeMap<LegIndex, LegSample> {
        let slots = *self.latest.read();
        LegIndex::ALL
            .into_iter()
            .zip(slots)
            .filter_map(|(leg, slot)| slot.map(|sample| (leg, sample)))
            .collect()
    }

    /// Number of legs that have reported at least once.
    pub fn active_legs(&self) -> usize {
        self.latest.read().iter().filter(|slot| slot.is_some()).count()
    }

    /// Samples received for `leg` since creation.
    pub fn received_count(&self, leg: LegIndex) -> u64 {
        self.received[leg.as_usize()].load(Ordering::Relaxed)
    }

    /// Samples received for all legs since creation.
    pub fn total_received(&self) -> u64 {
        self.received.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Maximum history length.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the history, oldest first.
    pub fn history(&self) -> Vec<ReceivedSample> {
        self.history.lock().iter().copied().collect()
    }

    /// Arrival rate over the history window, in samples per second.
    ///
    /// Returns `None` with fewer than two samples or a zero-length window.
    pub fn arrival_rate_hz(&self) -> Option<f64> {
        let history = self.history.lock();
        let (first, last) = (history.front()?, history.back()?);
        let span = last.received_at.duration_since(first.received_at).as_secs_f64();
        if history.len() < 2 || span <= 0.0 {
            return None;
        }
        Some((history.len() - 1) as f64 / span)
    }

    /// Mean `body_xyz` over the last `window` samples of `leg` still in the history.
    ///
    /// Falls back to the latest sample when the history holds none for this leg.
    pub fn smoothed(&self, leg: LegIndex, window: usize) -> Option<Point3<f64>> {
        let window = window.max(1);
        let (sum, n) = {
            let history = self.history.lock();
            history
                .iter()
                .rev()
                .filter(|r| r.sample.leg_index == leg)
                .take(window)
                .fold((Vector3::zeros(), 0usize), |(sum, n), r| {
                    (sum + r.sample.body_xyz.coords, n + 1)
                })
        };
        if n == 0 {
            return self.latest(leg).map(|s| s.body_xyz);
        }
        Some(Point3::from(sum / n as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn sample(leg: u8, ts: u64, x: f64) -> LegSample {
        LegSample {
            leg_index: LegIndex::new(leg).unwrap(),
            robot_timestamp_us: ts,
            body_xyz: Point3::new(x, 0.0, 0.0),
            leg_xyz: Point3::origin(),
            raw_angles: [0.0; 3],
        }
    }

    #[test]
    fn absent_until_first_put() {
        let buffer = SampleBuffer::default();
        for leg in LegIndex::ALL {
            assert!(buffer.latest(leg).is_none());
        }
        assert!(buffer.snapshot().is_empty());

        buffer.put(sample(2, 1, 0.5));
        assert_eq!(buffer.latest(LegIndex::ALL[2]), Some(sample(2, 1, 0.5)));
        assert!(buffer.latest(LegIndex::ALL[1]).is_none());
        assert_eq!(buffer.active_legs(), 1);
    }

    #[test]
    fn last_value_wins() {
        let buffer = SampleBuffer::default();
        buffer.put(sample(0, 10, 1.0));
        buffer.put(sample(0, 5, 2.0));
        // arrival order wins, not robot timestamp
        assert_eq!(buffer.latest(LegIndex::ALL[0]).unwrap().robot_timestamp_us, 5);
        assert_eq!(buffer.received_count(LegIndex::ALL[0]), 2);
        assert_eq!(buffer.total_received(), 2);
    }

    #[test]
    fn snapshot_is_keyed_by_leg() {
        let buffer = SampleBuffer::default();
        buffer.put(sample(4, 1, 4.0));
        buffer.put(sample(1, 1, 1.0));
        let snapshot = buffer.snapshot();
        let legs: Vec<u8> = snapshot.keys().map(|l| l.get()).collect();
        assert_eq!(legs, vec![1, 4]);
        assert_eq!(snapshot[&LegIndex::ALL[4]].body_xyz.x, 4.0);
    }

    #[test]
    fn history_is_bounded() {
        let buffer = SampleBuffer::new(3);
        for ts in 0..10 {
            buffer.put(sample(0, ts, 0.0));
        }
        let history = buffer.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].sample.robot_timestamp_us, 7);
        assert_eq!(history[2].sample.robot_timestamp_us, 9);
        assert_eq!(buffer.received_count(LegIndex::ALL[0]), 10);
    }

    #[test]
    fn arrival_rate_over_window() {
        let buffer = SampleBuffer::new(10);
        assert!(buffer.arrival_rate_hz().is_none());
        let t0 = Instant::now();
        for i in 0..5u64 {
            buffer.put_at(sample(0, i, 0.0), t0 + Duration::from_millis(10 * i));
        }
        let rate = buffer.arrival_rate_hz().unwrap();
        assert!((rate - 100.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn smoothing_averages_recent_samples_of_one_leg() {
        let buffer = SampleBuffer::new(10);
        buffer.put(sample(0, 0, 1.0));
        buffer.put(sample(1, 0, 100.0));
        buffer.put(sample(0, 1, 2.0));
        buffer.put(sample(0, 2, 3.0));

        let p = buffer.smoothed(LegIndex::ALL[0], 2).unwrap();
        assert!((p.x - 2.5).abs() < 1e-12);
        let p = buffer.smoothed(LegIndex::ALL[0], 50).unwrap();
        assert!((p.x - 2.0).abs() < 1e-12);
        assert!(buffer.smoothed(LegIndex::ALL[3], 5).is_none());
    }

    #[test]
    fn concurrent_puts_on_other_legs_do_not_disturb_latest() {
        let buffer = Arc::new(SampleBuffer::new(16));
        buffer.put(sample(0, 7, 0.25));

        std::thread::scope(|scope| {
            for leg in 1..6u8 {
                let buffer = Arc::clone(&buffer);
                scope.spawn(move || {
                    for ts in 0..1000 {
                        buffer.put(sample(leg, ts, leg as f64));
                    }
                });
            }
            let reader = Arc::clone(&buffer);
            scope.spawn(move || {
                for _ in 0..1000 {
                    let snapshot = reader.snapshot();
                    assert_eq!(snapshot[&LegIndex::ALL[0]], sample(0, 7, 0.25));
                    for (leg, s) in &snapshot {
                        // whole-sample swaps: position always matches its leg
                        assert_eq!(s.body_xyz.x, if leg.get() == 0 { 0.25 } else { leg.get() as f64 });
                    }
                }
            });
        });

        assert_eq!(buffer.latest(LegIndex::ALL[0]), Some(sample(0, 7, 0.25)));
        for leg in 1..6u8 {
            let latest = buffer.latest(LegIndex::new(leg).unwrap()).unwrap();
            assert_eq!(latest.robot_timestamp_us, 999);
        }
        assert_eq!(buffer.total_received(), 1 + 5 * 1000);
    }
}
