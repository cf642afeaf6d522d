//! Per-leg kinematic samples reported by the robot.

use crate::geometry::LegIndex;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// One inverse-kinematics report for a single leg.
///
/// Produced by [`crate::parser::parse`] from one telemetry line. Samples are small and
/// `Copy`, so replacing one in the sample buffer is a single whole-value swap.
///
/// # Fields
/// * `leg_index` - Reporting leg
/// * `robot_timestamp_us` - Controller clock in microseconds; each leg reports
///   independently, so this is not strictly increasing across legs
/// * `body_xyz` - Foot position in body coordinates, as computed by the robot
/// * `leg_xyz` - Foot position in the leg-local frame (diagnostic only)
/// * `raw_angles` - Uncorrected servo angles for coxa, femur and tibia, in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegSample {
    /// Reporting leg
    pub leg_index: LegIndex,
    /// Controller timestamp (microseconds)
    pub robot_timestamp_us: u64,
    /// Foot position, body frame (meters)
    pub body_xyz: Point3<f64>,
    /// Foot position, leg frame (meters)
    pub leg_xyz: Point3<f64>,
    /// Raw servo angles: coxa, femur, tibia (radians)
    pub raw_angles: [f64; 3],
}

/// Prefix the walking controller puts in front of every IK line.
pub const DEFAULT_LINE_PREFIX: &str = "I (0) wbc: ";

/// Renders a sample in the controller's telemetry line format.
///
/// `prefix` is emitted verbatim before the timestamp group; the parser ignores it.
/// Values are printed with 6 decimals, so parsing the result reproduces the sample
/// to within `5e-7`.
pub fn format_wire_line(sample: &LegSample, prefix: &str) -> String {
    let b = &sample.body_xyz;
    let l = &sample.leg_xyz;
    let a = &sample.raw_angles;
    format!(
        "{prefix}({ts})Leg {leg} IK: BodyXYZ({:.6}, {:.6}, {:.6}) -> LegXYZ({:.6}, {:.6}, {:.6}) -> LegAng({:.6}, {:.6}, {:.6})",
        b.x,
        b.y,
        b.z,
        l.x,
        l.y,
        l.z,
        a[0],
        a[1],
        a[2],
        ts = sample.robot_timestamp_us,
        leg = sample.leg_index,
    )
}
