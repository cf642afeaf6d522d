//! Synthetic gait patterns for running the pipeline without a robot.
//!
//! The generator produces the same kind of [`LegSample`] the robot reports, placing each
//! foot relative to its configured mount. Angles are placeholders: the coxa is held at
//! zero, the femur follows the body height and the tibia is fixed.

use crate::geometry::{LegIndex, RobotGeometry, LEG_COUNT};
use crate::sample::LegSample;
use nalgebra::Point3;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Horizontal distance from the mount to the foot assumed by the placeholder angles.
const NOMINAL_REACH: f64 = 0.23;
/// Fixed placeholder tibia angle (radians).
const NOMINAL_TIBIA: f64 = 0.8;

/// Tripod sharing phase zero; the other three legs run half a cycle apart.
const TRIPOD_GROUP_A: [u8; 3] = [0, 2, 4];

/// Movement pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GaitPattern {
    /// Alternating tripods: legs 0, 2, 4 against 1, 3, 5
    #[default]
    Tripod,
    /// Sinusoidal lift travelling around the body
    Wave,
}

impl FromStr for GaitPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tripod" => Ok(GaitPattern::Tripod),
            "wave" => Ok(GaitPattern::Wave),
            _ => Err(format!("Unknown pattern '{s}'. Must be one of: tripod, wave")),
        }
    }
}

impl fmt::Display for GaitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GaitPattern::Tripod => "tripod",
            GaitPattern::Wave => "wave",
        })
    }
}

/// Gait shape parameters (meters, hertz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitParams {
    /// Peak foot lift
    pub step_height: f64,
    /// Stride length along the leg axis
    pub step_length: f64,
    /// Body height above ground
    pub body_height: f64,
    /// Gait cycles per second
    pub gait_speed: f64,
    /// Sample frames per second
    pub update_hz: f64,
}

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            step_height: 0.05,
            step_length: 0.08,
            body_height: 0.28,
            gait_speed: 2.0,
            update_hz: 60.0,
        }
    }
}

/// Computes foot positions for a pattern over time.
#[derive(Debug, Clone)]
pub struct GaitGenerator {
    geometry: Arc<RobotGeometry>,
    pattern: GaitPattern,
    params: GaitParams,
}

impl GaitGenerator {
    /// Creates a generator over the configured leg mounts.
    pub fn new(geometry: Arc<RobotGeometry>, pattern: GaitPattern, params: GaitParams) -> Self {
        Self {
            geometry,
            pattern,
            params,
        }
    }

    /// Pattern in use.
    pub fn pattern(&self) -> GaitPattern {
        self.pattern
    }

    /// Parameters in use.
    pub fn params(&self) -> &GaitParams {
        &self.params
    }

    /// Sample for `leg` at `t` seconds after the start.
    pub fn sample(&self, leg: LegIndex, t: f64) -> LegSample {
        let (radial, lift) = match self.pattern {
            GaitPattern::Tripod => self.tripod_offsets(leg, t),
            GaitPattern::Wave => self.wave_offsets(leg, t),
        };

        let mount = self.geometry.leg(leg);
        let (sin, cos) = mount.mount_rotation.sin_cos();
        let z = -self.params.body_height + lift;

        LegSample {
            leg_index: leg,
            robot_timestamp_us: (t.max(0.0) * 1_000_000.0) as u64,
            body_xyz: Point3::new(
                mount.mount_position.x + radial * cos,
                mount.mount_position.y + radial * sin,
                z,
            ),
            leg_xyz: Point3::new(NOMINAL_REACH, 0.0, z),
            raw_angles: [0.0, (-z).atan2(NOMINAL_REACH), NOMINAL_TIBIA],
        }
    }

    /// Samples for all six legs at `t`.
    pub fn frame(&self, t: f64) -> [LegSample; LEG_COUNT] {
        LegIndex::ALL.map(|leg| self.sample(leg, t))
    }

    /// Stance: foot slides back along the leg axis on the ground.
    /// Swing: foot returns forward on a parabolic arc.
    fn tripod_offsets(&self, leg: LegIndex, t: f64) -> (f64, f64) {
        let p = &self.params;
        let cycle = (t * p.gait_speed).rem_euclid(1.0);
        let phase = if TRIPOD_GROUP_A.contains(&leg.get()) {
            cycle
        } else {
            (cycle + 0.5).rem_euclid(1.0)
        };

        if phase < 0.5 {
            let progress = phase / 0.5;
            (p.step_length * (0.5 - progress), 0.0)
        } else {
            let progress = (phase - 0.5) / 0.5;
            (
                p.step_length * (progress - 0.5),
                p.step_height * 4.0 * progress * (1.0 - progress),
            )
        }
    }

    fn wave_offsets(&self, leg: LegIndex, t: f64) -> (f64, f64) {
        let phase = t * 2.0 + f64::from(leg.get()) * PI / 3.0;
        let lift = self.params.step_height * 0.5 * (1.0 + phase.sin());
        let radial = 0.02 * (phase * 1.5).sin();
        (radial, lift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HexapodConfig;

    fn generator(pattern: GaitPattern) -> GaitGenerator {
        let geometry = HexapodConfig::default_config().robot_geometry().unwrap();
        GaitGenerator::new(Arc::new(geometry), pattern, GaitParams::default())
    }

    #[test]
    fn pattern_names() {
        assert_eq!("Wave".parse::<GaitPattern>(), Ok(GaitPattern::Wave));
        assert!("crawl".parse::<GaitPattern>().is_err());
        assert_eq!(GaitPattern::Tripod.to_string(), "tripod");
    }

    #[test]
    fn tripod_groups_alternate() {
        let gen = generator(GaitPattern::Tripod);
        // half a stance in: group A on the ground, group B at the top of its swing
        let frame = gen.frame(0.125);
        for sample in &frame {
            let lifted = sample.body_xyz.z > -0.28 + 1e-9;
            assert_eq!(lifted, !TRIPOD_GROUP_A.contains(&sample.leg_index.get()));
        }
        assert!((frame[1].body_xyz.z - (-0.28 + 0.05)).abs() < 1e-9);
    }

    #[test]
    fn stride_runs_along_leg_axis() {
        let gen = generator(GaitPattern::Tripod);
        // leg 0 starts its stance at the front of the stride
        let front = gen.sample(LegIndex::ALL[0], 0.0);
        let axis = 0.7854f64;
        assert!((front.body_xyz.x - (0.075 + 0.04 * axis.cos())).abs() < 1e-9);
        assert!((front.body_xyz.y - (0.075 + 0.04 * axis.sin())).abs() < 1e-9);

        // leg 1 (mounted at +90 degrees) starts its swing at the back
        let back = gen.sample(LegIndex::ALL[1], 0.0);
        assert!(back.body_xyz.x.abs() < 1e-3);
        assert!((back.body_xyz.y - (0.085 - 0.04)).abs() < 1e-3);
        assert!((back.body_xyz.z + 0.28).abs() < 1e-12);
    }

    #[test]
    fn wave_stays_within_lift_envelope() {
        let gen = generator(GaitPattern::Wave);
        for step in 0..240 {
            for sample in gen.frame(f64::from(step) / 60.0) {
                let lift = sample.body_xyz.z + 0.28;
                assert!((-1e-12..=0.05 + 1e-12).contains(&lift));
                assert_eq!(sample.leg_xyz.x, NOMINAL_REACH);
                assert_eq!(sample.raw_angles[2], NOMINAL_TIBIA);
            }
        }
    }

    #[test]
    fn timestamps_are_microseconds() {
        let gen = generator(GaitPattern::Wave);
        assert_eq!(gen.sample(LegIndex::ALL[0], 1.5).robot_timestamp_us, 1_500_000);
    }
}
