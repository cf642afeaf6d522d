//! Transport that synthesizes telemetry lines from a gait pattern.

use super::transport::LineTransport;
use crate::demo::GaitGenerator;
use crate::error::AppResult;
use crate::sample::{format_wire_line, DEFAULT_LINE_PREFIX};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Emits six wire-format lines (one per leg) per gait frame.
///
/// In real-time mode frames are paced at the generator's update rate. In simulated
/// mode they are produced as fast as they are consumed, with timestamps still
/// advancing by one frame period, which keeps tests deterministic.
pub struct DemoTransport {
    generator: GaitGenerator,
    period: Duration,
    ticker: Option<Interval>,
    queue: VecDeque<String>,
    frame: u64,
    max_frames: Option<u64>,
}

impl DemoTransport {
    /// Paced transport running until closed.
    pub fn realtime(generator: GaitGenerator) -> Self {
        let period = frame_period(&generator);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self::build(generator, period, Some(ticker))
    }

    /// Unpaced transport.
    pub fn simulated(generator: GaitGenerator) -> Self {
        let period = frame_period(&generator);
        Self::build(generator, period, None)
    }

    fn build(generator: GaitGenerator, period: Duration, ticker: Option<Interval>) -> Self {
        Self {
            generator,
            period,
            ticker,
            queue: VecDeque::with_capacity(6),
            frame: 0,
            max_frames: None,
        }
    }

    /// Ends the stream after `frames` gait frames.
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Frames generated so far.
    pub fn frames_emitted(&self) -> u64 {
        self.frame
    }

    fn fill(&mut self) {
        let t = self.period.as_secs_f64() * self.frame as f64;
        for sample in self.generator.frame(t) {
            self.queue
                .push_back(format_wire_line(&sample, DEFAULT_LINE_PREFIX));
        }
        self.frame += 1;
    }
}

fn frame_period(generator: &GaitGenerator) -> Duration {
    Duration::from_secs_f64(1.0 / generator.params().update_hz.max(1.0))
}

#[async_trait]
impl LineTransport for DemoTransport {
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        if let Some(line) = self.queue.pop_front() {
            return Ok(Some(line));
        }
        if self.max_frames.is_some_and(|max| self.frame >= max) {
            return Ok(None);
        }
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }
        self.fill();
        Ok(self.queue.pop_front())
    }

    fn describe(&self) -> String {
        format!("demo({})", self.generator.pattern())
    }
}
