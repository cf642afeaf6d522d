//! Renderer-facing frames.
//!
//! A [`FrameAssembler`] is ticked at the configured update rate. Each tick it takes a
//! snapshot of the sample buffer, reconstructs every reported leg and returns a
//! [`SkeletonFrame`] in output coordinates (units and handedness from the `data`
//! config section). The static part of the picture (body outline, axes, colors) is
//! described once by [`SceneDescription`].

use crate::config::{CoordinateSystem, DataConfig, HexapodConfig, Units, VisualizationConfig};
use crate::data::SampleBuffer;
use crate::geometry::{BodyDimensions, LegIndex, RobotGeometry, LEG_COUNT};
use crate::ingest::IngestStats;
use crate::kinematics::{EffectiveAngles, KinematicsReconstructor};
use crate::sample::LegSample;
use nalgebra::Point3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Maps body-frame meters into output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayTransform {
    /// Output unit
    pub units: Units,
    /// Output handedness
    pub coordinate_system: CoordinateSystem,
}

impl DisplayTransform {
    /// Transform described by the `data` config section.
    pub fn from_config(data: &DataConfig) -> Self {
        Self {
            units: data.units,
            coordinate_system: data.coordinate_system,
        }
    }

    /// Applies the unit scale and, for left-handed output, mirrors Y.
    pub fn apply(&self, p: Point3<f64>) -> Point3<f64> {
        let s = self.units.per_meter();
        let y_sign = match self.coordinate_system {
            CoordinateSystem::RightHand => 1.0,
            CoordinateSystem::LeftHand => -1.0,
        };
        Point3::new(p.x * s, p.y * s * y_sign, p.z * s)
    }
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::from_config(&DataConfig::default())
    }
}

/// Everything a renderer needs to draw one leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegFrame {
    /// Leg index
    pub leg: LegIndex,
    /// Display name
    pub name: String,
    /// Robot timestamp of the sample (microseconds)
    pub robot_timestamp_us: u64,
    /// Mount origin, coxa end, femur end, foot (output coordinates)
    pub chain: [Point3<f64>; 4],
    /// Foot position reported by the robot, smoothed when enabled (output coordinates)
    pub reported_foot: Point3<f64>,
    /// Distance between reconstructed and reported foot (meters)
    pub foot_deviation: f64,
    /// Effective joint angles (radians)
    pub angles: EffectiveAngles,
}

/// One rendered tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonFrame {
    /// Tick counter, starting at 0
    pub sequence: u64,
    /// Legs with data, by index
    pub legs: Vec<LegFrame>,
    /// Number of legs that have reported
    pub active_legs: usize,
    /// Frames per second over the last full window
    pub fps: f64,
    /// Sample arrival rate, if enough history exists
    pub data_rate_hz: Option<f64>,
    /// Lines rejected by the parser so far
    pub dropped: u64,
}

impl SkeletonFrame {
    /// One-line status summary.
    pub fn status_line(&self) -> String {
        let rate = self
            .data_rate_hz
            .map_or_else(|| "-".to_string(), |r| format!("{r:.1} Hz"));
        format!(
            "Hexapod Robot | Active Legs: {}/{} | FPS: {:.1} | Data: {} | Dropped: {}",
            self.active_legs, LEG_COUNT, self.fps, rate, self.dropped
        )
    }
}

/// Static scene content, sent once before frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneDescription {
    /// Body box corners (output coordinates), when shown
    pub body_corners: Option<[Point3<f64>; 8]>,
    /// Corner index pairs forming the body outline
    pub body_edges: Vec<(usize, usize)>,
    /// Length of the drawn body axes (output units), when shown
    pub axis_length: Option<f64>,
    /// Leg mount points (output coordinates) and names
    pub mounts: Vec<(LegIndex, String, Point3<f64>)>,
    /// Named RGB colors
    pub colors: BTreeMap<String, Vec<i64>>,
    /// Output coordinate convention
    pub display: DisplayTransform,
}

/// Frame-rate bookkeeping: frames counted over a one-second window.
#[derive(Debug, Clone)]
struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
    current: f64,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            current: 0.0,
        }
    }

    fn tick(&mut self, now: Instant) -> f64 {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            self.current = f64::from(self.frames) / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.current
    }
}

/// Builds [`SkeletonFrame`]s from the shared sample buffer.
#[derive(Debug)]
pub struct FrameAssembler {
    reconstructor: KinematicsReconstructor,
    buffer: Arc<SampleBuffer>,
    stats: Option<Arc<IngestStats>>,
    display: DisplayTransform,
    show_legs: bool,
    smoothing_window: Option<usize>,
    sequence: u64,
    fps: FpsCounter,
}

impl FrameAssembler {
    /// Assembler with default output settings.
    pub fn new(geometry: Arc<RobotGeometry>, buffer: Arc<SampleBuffer>) -> Self {
        Self {
            reconstructor: KinematicsReconstructor::new(geometry),
            buffer,
            stats: None,
            display: DisplayTransform::default(),
            show_legs: true,
            smoothing_window: None,
            sequence: 0,
            fps: FpsCounter::new(),
        }
    }

    /// Assembler configured from the `visualization` and `data` sections.
    pub fn from_config(
        config: &HexapodConfig,
        geometry: Arc<RobotGeometry>,
        buffer: Arc<SampleBuffer>,
    ) -> Self {
        let mut assembler = Self::new(geometry, buffer);
        assembler.display = DisplayTransform::from_config(&config.data);
        assembler.show_legs = config.visualization.show_legs;
        assembler.smoothing_window = config
            .data
            .enable_smoothing
            .then_some(config.data.smoothing_window);
        assembler
    }

    /// Reports rejected-line counts from these ingestion stats.
    pub fn with_stats(mut self, stats: Arc<IngestStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Averages reported foot positions over `window` samples.
    pub fn with_smoothing(mut self, window: Option<usize>) -> Self {
        self.smoothing_window = window;
        self
    }

    /// Output coordinate convention.
    pub fn with_display(mut self, display: DisplayTransform) -> Self {
        self.display = display;
        self
    }

    /// Builds the next frame.
    pub fn assemble(&mut self) -> SkeletonFrame {
        self.assemble_at(Instant::now())
    }

    /// Builds the next frame as of `now`.
    pub fn assemble_at(&mut self, now: Instant) -> SkeletonFrame {
        let snapshot = self.buffer.snapshot();
        let legs = if self.show_legs {
            snapshot
                .values()
                .map(|sample| self.leg_frame(sample))
                .collect()
        } else {
            Vec::new()
        };

        let frame = SkeletonFrame {
            sequence: self.sequence,
            legs,
            active_legs: snapshot.len(),
            fps: self.fps.tick(now),
            data_rate_hz: self.buffer.arrival_rate_hz(),
            dropped: self
                .stats
                .as_ref()
                .map_or(0, |stats| stats.snapshot().rejected()),
        };
        self.sequence += 1;
        frame
    }

    fn leg_frame(&self, sample: &LegSample) -> LegFrame {
        let chain = self.reconstructor.reconstruct(sample);
        let reported = match self.smoothing_window {
            Some(window) => self
                .buffer
                .smoothed(sample.leg_index, window)
                .unwrap_or(sample.body_xyz),
            None => sample.body_xyz,
        };

        LegFrame {
            leg: sample.leg_index,
            name: self.reconstructor.geometry().leg(sample.leg_index).name.clone(),
            robot_timestamp_us: sample.robot_timestamp_us,
            chain: chain.points.map(|p| self.display.apply(p)),
            reported_foot: self.display.apply(reported),
            foot_deviation: chain.foot_deviation(sample),
            angles: chain.angles,
        }
    }

    /// Static scene for `visualization`.
    pub fn scene(&self, visualization: &VisualizationConfig) -> SceneDescription {
        let geometry = self.reconstructor.geometry();
        let body: BodyDimensions = geometry.body;
        SceneDescription {
            body_corners: visualization
                .show_body
                .then(|| body.outline_corners().map(|p| self.display.apply(p))),
            body_edges: BodyDimensions::OUTLINE_EDGES.to_vec(),
            axis_length: visualization
                .show_coordinates
                .then(|| body.length.max(body.width) * 0.3 * self.display.units.per_meter()),
            mounts: geometry
                .iter()
                .map(|(leg, g)| (leg, g.name.clone(), self.display.apply(g.mount_position)))
                .collect(),
            colors: visualization.colors.clone(),
            display: self.display,
        }
    }
}
