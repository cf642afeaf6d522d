//! Forward kinematics: joint angles to a chain of 3D joint positions.
//!
//! Each leg is modelled as a serial chain of rigid transforms, composed with
//! [`nalgebra::Isometry3`]:
//!
//! ```text
//! mount     = T(mount_position) * Rz(mount_rotation)
//! coxa_end  = mount     * Rz(coxa)  * Tx(coxa_length)
//! femur_end = coxa_end  * Ry(femur) * Tx(femur_length)
//! foot      = femur_end * Ry(tibia) * Tx(tibia_length)
//! ```
//!
//! Angles are the *effective* angles, i.e. raw servo angle minus the configured
//! calibration offset. A positive femur or tibia angle tilts the distal link towards
//! body -Z. Effective angles are not wrapped into a canonical range; callers that need
//! one must normalize themselves. Near +/-pi this can show up as a visual flip.

use crate::geometry::{LegGeometry, LegIndex, RobotGeometry};
use crate::sample::LegSample;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One of the three actuated joints of a leg, proximal to distal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    /// Hip yaw joint at the body
    Coxa,
    /// Hip pitch joint
    Femur,
    /// Knee joint
    Tibia,
}

impl Joint {
    /// Joints in chain order.
    pub const ALL: [Joint; 3] = [Joint::Coxa, Joint::Femur, Joint::Tibia];

    /// Lower-case display name.
    pub fn name(self) -> &'static str {
        match self {
            Joint::Coxa => "coxa",
            Joint::Femur => "femur",
            Joint::Tibia => "tibia",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw servo angles corrected by the calibration offsets, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectiveAngles {
    /// Coxa angle
    pub coxa: f64,
    /// Femur angle
    pub femur: f64,
    /// Tibia angle
    pub tibia: f64,
}

impl EffectiveAngles {
    /// `raw[i] - offsets[i]` for each joint.
    pub fn new(raw: [f64; 3], offsets: [f64; 3]) -> Self {
        Self {
            coxa: raw[0] - offsets[0],
            femur: raw[1] - offsets[1],
            tibia: raw[2] - offsets[2],
        }
    }

    /// Angle of one joint.
    pub fn get(&self, joint: Joint) -> f64 {
        match joint {
            Joint::Coxa => self.coxa,
            Joint::Femur => self.femur,
            Joint::Tibia => self.tibia,
        }
    }

    /// Angles tagged by joint, in chain order.
    pub fn tagged(&self) -> [(Joint, f64); 3] {
        Joint::ALL.map(|joint| (joint, self.get(joint)))
    }
}

/// Named positions along a reconstructed leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPoint {
    /// Leg attachment point on the body
    MountOrigin,
    /// End of the coxa link
    CoxaEnd,
    /// End of the femur link
    FemurEnd,
    /// End of the tibia link
    Foot,
}

impl ChainPoint {
    /// Points in chain order.
    pub const ALL: [ChainPoint; 4] = [
        ChainPoint::MountOrigin,
        ChainPoint::CoxaEnd,
        ChainPoint::FemurEnd,
        ChainPoint::Foot,
    ];
}

/// Reconstructed leg: four points in body coordinates plus the angles that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointChain {
    /// Mount origin, coxa end, femur end, foot
    pub points: [Point3<f64>; 4],
    /// Effective angles used for the three segments
    pub angles: EffectiveAngles,
}

impl JointChain {
    /// Position of a named point.
    pub fn point(&self, which: ChainPoint) -> Point3<f64> {
        match which {
            ChainPoint::MountOrigin => self.points[0],
            ChainPoint::CoxaEnd => self.points[1],
            ChainPoint::FemurEnd => self.points[2],
            ChainPoint::Foot => self.points[3],
        }
    }

    /// Foot position.
    pub fn foot(&self) -> Point3<f64> {
        self.points[3]
    }

    /// Points tagged by name, in chain order.
    pub fn named_points(&self) -> [(ChainPoint, Point3<f64>); 4] {
        ChainPoint::ALL.map(|which| (which, self.point(which)))
    }

    /// Euclidean length of each of the three segments.
    pub fn segment_lengths(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| (self.points[i + 1] - self.points[i]).norm())
    }

    /// Distance between the reconstructed foot and the foot position the robot reported.
    ///
    /// Small values mean the configured geometry agrees with the robot's own model.
    pub fn foot_deviation(&self, sample: &LegSample) -> f64 {
        (self.foot() - sample.body_xyz).norm()
    }
}

/// Pose of the leg's local frame at its mount point, in body coordinates.
pub fn mount_frame(geometry: &LegGeometry) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::from(geometry.mount_position.coords),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), geometry.mount_rotation),
    )
}

fn origin_of(frame: &Isometry3<f64>) -> Point3<f64> {
    Point3::from(frame.translation.vector)
}

/// Rotate about a local axis, then advance along the rotated local X axis.
fn link(axis: Vector3<f64>, angle: f64, length: f64) -> Isometry3<f64> {
    Isometry3::rotation(axis * angle) * Isometry3::translation(length, 0.0, 0.0)
}

/// Reconstructs the joint chain of one leg.
///
/// Never fails: `geometry` has already been validated, so link-length arity is fixed
/// by construction. A two-entry link length configuration yields a zero-length coxa
/// segment; the coxa rotation is still applied.
pub fn reconstruct(sample: &LegSample, geometry: &LegGeometry) -> JointChain {
    let angles = EffectiveAngles::new(sample.raw_angles, geometry.joint_angle_offsets);
    let [coxa_len, femur_len, tibia_len] = geometry.link_lengths.as_array();

    let mount = mount_frame(geometry);
    let coxa_end = mount * link(Vector3::z(), angles.coxa, coxa_len);
    let femur_end = coxa_end * link(Vector3::y(), angles.femur, femur_len);
    let foot = femur_end * link(Vector3::y(), angles.tibia, tibia_len);

    JointChain {
        points: [
            origin_of(&mount),
            origin_of(&coxa_end),
            origin_of(&femur_end),
            origin_of(&foot),
        ],
        angles,
    }
}

/// Reconstructs legs against a shared robot geometry.
#[derive(Debug, Clone)]
pub struct KinematicsReconstructor {
    geometry: Arc<RobotGeometry>,
}

impl KinematicsReconstructor {
    /// Creates a reconstructor over `geometry`.
    pub fn new(geometry: Arc<RobotGeometry>) -> Self {
        Self { geometry }
    }

    /// Geometry in use.
    pub fn geometry(&self) -> &RobotGeometry {
        &self.geometry
    }

    /// Reconstructs `sample` using the geometry of the leg it reports.
    pub fn reconstruct(&self, sample: &LegSample) -> JointChain {
        reconstruct(sample, self.geometry.leg(sample.leg_index))
    }

    /// Reconstructs every leg in a buffer snapshot.
    pub fn reconstruct_all(
        &self,
        snapshot: &BTreeMap<LegIndex, LegSample>,
    ) -> BTreeMap<LegIndex, JointChain> {
        snapshot
            .iter()
            .map(|(&leg, sample)| (leg, self.reconstruct(sample)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BodyDimensions, LegIndex};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPS: f64 = 1e-12;

    fn assert_close(a: Point3<f64>, b: Point3<f64>) {
        assert!((a - b).norm() < EPS, "{a} != {b}");
    }

    fn geometry(rotation: f64, lengths: &[f64], offsets: [f64; 3]) -> LegGeometry {
        LegGeometry::new(
            LegIndex::ALL[0],
            "Left Front",
            [0.075, 0.075, 0.0],
            rotation,
            lengths,
            &offsets,
        )
        .unwrap()
    }

    fn sample_with_angles(raw: [f64; 3]) -> LegSample {
        LegSample {
            leg_index: LegIndex::ALL[0],
            robot_timestamp_us: 0,
            body_xyz: Point3::origin(),
            leg_xyz: Point3::origin(),
            raw_angles: raw,
        }
    }

    #[test]
    fn identity_calibration_gives_straight_chain_along_mount_axis() {
        let offsets = [0.1, -0.2, 0.3];
        let geometry = geometry(FRAC_PI_4, &[0.03, 0.08, 0.12], offsets);
        let chain = reconstruct(&sample_with_angles(offsets), &geometry);

        let lengths = chain.segment_lengths();
        for (got, want) in lengths.iter().zip([0.03, 0.08, 0.12]) {
            assert!((got - want).abs() < EPS);
        }

        let axis = Vector3::new(FRAC_PI_4.cos(), FRAC_PI_4.sin(), 0.0);
        let origin = chain.point(ChainPoint::MountOrigin);
        assert_close(origin, Point3::new(0.075, 0.075, 0.0));
        for p in &chain.points[1..] {
            let d = p - origin;
            // collinear with the mount axis and pointing outward
            assert!(d.cross(&axis).norm() < EPS);
            assert!(d.dot(&axis) > 0.0);
        }
        assert_close(chain.foot(), origin + axis * 0.23);
        assert_eq!(chain.angles.tagged(), [(Joint::Coxa, 0.0), (Joint::Femur, 0.0), (Joint::Tibia, 0.0)]);
    }

    #[test]
    fn two_link_configuration_collapses_coxa() {
        let geometry = geometry(0.0, &[0.08, 0.12], [0.0; 3]);
        let chain = reconstruct(&sample_with_angles([0.3, 0.0, 0.0]), &geometry);
        assert_eq!(chain.points.len(), 4);
        assert!((chain.points[1] - chain.points[0]).norm() < EPS);
        // coxa rotation still steers the rest of the chain
        let dir = (chain.foot() - chain.points[0]).normalize();
        assert!((dir - Vector3::new(0.3f64.cos(), 0.3f64.sin(), 0.0)).norm() < EPS);
    }

    #[test]
    fn two_link_matches_three_link_with_zero_coxa() {
        let a = reconstruct(
            &sample_with_angles([0.2, 0.4, 0.9]),
            &geometry(1.0, &[0.08, 0.12], [0.0; 3]),
        );
        let b = reconstruct(
            &sample_with_angles([0.2, 0.4, 0.9]),
            &geometry(1.0, &[0.0, 0.08, 0.12], [0.0; 3]),
        );
        for (p, q) in a.points.iter().zip(b.points.iter()) {
            assert_close(*p, *q);
        }
    }

    #[test]
    fn positive_femur_angle_points_down() {
        let geometry = geometry(0.0, &[0.03, 0.08, 0.12], [0.0; 3]);
        let chain = reconstruct(&sample_with_angles([0.0, FRAC_PI_2, 0.0]), &geometry);
        let mount = Point3::new(0.075, 0.075, 0.0);
        assert_close(chain.points[1], mount + Vector3::new(0.03, 0.0, 0.0));
        assert_close(chain.points[2], mount + Vector3::new(0.03, 0.0, -0.08));
        assert_close(chain.foot(), mount + Vector3::new(0.03, 0.0, -0.20));
    }

    #[test]
    fn tibia_angle_is_relative_to_femur() {
        let geometry = geometry(0.0, &[0.0, 0.1, 0.1], [0.0; 3]);
        // femur up 90 degrees, tibia bends back down 90 degrees: tibia is horizontal
        let chain = reconstruct(&sample_with_angles([0.0, -FRAC_PI_2, FRAC_PI_2]), &geometry);
        let mount = Point3::new(0.075, 0.075, 0.0);
        assert_close(chain.points[2], mount + Vector3::new(0.0, 0.0, 0.1));
        assert_close(chain.foot(), mount + Vector3::new(0.1, 0.0, 0.1));
    }

    #[test]
    fn mount_rotation_turns_the_leg_about_body_z() {
        let geometry = geometry(FRAC_PI_2, &[0.03, 0.08, 0.12], [0.0; 3]);
        let chain = reconstruct(&sample_with_angles([0.0; 3]), &geometry);
        assert_close(chain.foot(), Point3::new(0.075, 0.075 + 0.23, 0.0));
    }

    #[test]
    fn offsets_are_subtracted_without_wrapping() {
        let geometry = geometry(0.0, &[0.03, 0.08, 0.12], [0.5, 0.25, -3.0]);
        let chain = reconstruct(&sample_with_angles([4.0, 0.25, 1.0]), &geometry);
        assert_eq!(chain.angles.coxa, 3.5);
        assert_eq!(chain.angles.femur, 0.0);
        assert_eq!(chain.angles.tibia, 4.0);
    }

    #[test]
    fn foot_deviation_against_reported_position() {
        let geometry = geometry(0.0, &[0.03, 0.08, 0.12], [0.0; 3]);
        let mut sample = sample_with_angles([0.0; 3]);
        sample.body_xyz = Point3::new(0.075 + 0.23, 0.075, 0.0);
        let chain = reconstruct(&sample, &geometry);
        assert!(chain.foot_deviation(&sample) < EPS);

        sample.body_xyz.z = -0.01;
        assert!((chain.foot_deviation(&sample) - 0.01).abs() < EPS);
    }

    #[test]
    fn reconstructor_uses_geometry_of_reporting_leg() {
        let legs = LegIndex::ALL.map(|leg| {
            LegGeometry::new(
                leg,
                format!("leg {leg}"),
                [f64::from(leg.get()), 0.0, 0.0],
                0.0,
                &[0.0, 0.1, 0.1],
                &[0.0; 3],
            )
            .unwrap()
        });
        let robot = RobotGeometry::new(
            BodyDimensions {
                length: 0.2,
                width: 0.15,
                height: 0.05,
            },
            legs,
        );
        let reconstructor = KinematicsReconstructor::new(Arc::new(robot));

        let mut snapshot = BTreeMap::new();
        for leg in [LegIndex::ALL[1], LegIndex::ALL[4]] {
            let mut sample = sample_with_angles([0.0; 3]);
            sample.leg_index = leg;
            snapshot.insert(leg, sample);
        }
        let chains = reconstructor.reconstruct_all(&snapshot);
        assert_eq!(chains.len(), 2);
        assert_close(chains[&LegIndex::ALL[4]].points[0], Point3::new(4.0, 0.0, 0.0));
        assert_close(chains[&LegIndex::ALL[1]].foot(), Point3::new(1.2, 0.0, 0.0));
    }
}
