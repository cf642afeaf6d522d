//! Static robot geometry: leg indices, mount poses, link lengths and calibration offsets.
//!
//! Everything in this module is immutable once built. Values are validated on
//! construction so that downstream code (notably [`crate::kinematics`]) never has to
//! re-check arity or sign of the inputs it consumes.

use crate::error::ConfigError;
use crate::validation;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of legs on the robot.
pub const LEG_COUNT: usize = 6;

/// Index of one of the six legs, guaranteed to be in `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LegIndex(u8);

impl LegIndex {
    /// All leg indices in ascending order.
    pub const ALL: [LegIndex; LEG_COUNT] = [
        LegIndex(0),
        LegIndex(1),
        LegIndex(2),
        LegIndex(3),
        LegIndex(4),
        LegIndex(5),
    ];

    /// Returns `Some` if `value` is a valid leg index.
    pub fn new(value: u8) -> Option<Self> {
        (usize::from(value) < LEG_COUNT).then_some(LegIndex(value))
    }

    /// Raw index value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Index usable for array access.
    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for LegIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LegIndex::new(value).ok_or_else(|| format!("leg index {value} is outside 0-5"))
    }
}

impl From<LegIndex> for u8 {
    fn from(value: LegIndex) -> Self {
        value.0
    }
}

impl fmt::Display for LegIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Link lengths of one leg, in meters.
///
/// The two-entry form (`[femur, tibia]`) is the older configuration layout; it behaves
/// exactly like the three-entry form with a zero-length coxa.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LinkLengths {
    /// `[coxa, femur, tibia]`
    ThreeLink {
        /// Coxa length
        coxa: f64,
        /// Femur length
        femur: f64,
        /// Tibia length
        tibia: f64,
    },
    /// `[femur, tibia]`, coxa collapsed to zero length
    TwoLink {
        /// Femur length
        femur: f64,
        /// Tibia length
        tibia: f64,
    },
}

impl LinkLengths {
    /// Builds link lengths from a 2- or 3-entry slice.
    ///
    /// Returns the offending length on arity mismatch.
    pub fn from_slice(values: &[f64]) -> Result<Self, usize> {
        match *values {
            [femur, tibia] => Ok(LinkLengths::TwoLink { femur, tibia }),
            [coxa, femur, tibia] => Ok(LinkLengths::ThreeLink { coxa, femur, tibia }),
            _ => Err(values.len()),
        }
    }

    /// Coxa length; zero for the two-link form.
    pub fn coxa(&self) -> f64 {
        match *self {
            LinkLengths::ThreeLink { coxa, .. } => coxa,
            LinkLengths::TwoLink { .. } => 0.0,
        }
    }

    /// Femur length.
    pub fn femur(&self) -> f64 {
        match *self {
            LinkLengths::ThreeLink { femur, .. } | LinkLengths::TwoLink { femur, .. } => femur,
        }
    }

    /// Tibia length.
    pub fn tibia(&self) -> f64 {
        match *self {
            LinkLengths::ThreeLink { tibia, .. } | LinkLengths::TwoLink { tibia, .. } => tibia,
        }
    }

    /// `[coxa, femur, tibia]` with the implicit zero filled in.
    pub fn as_array(&self) -> [f64; 3] {
        [self.coxa(), self.femur(), self.tibia()]
    }

    /// Lengths exactly as configured (2 or 3 entries).
    pub fn configured(&self) -> Vec<f64> {
        match *self {
            LinkLengths::ThreeLink { coxa, femur, tibia } => vec![coxa, femur, tibia],
            LinkLengths::TwoLink { femur, tibia } => vec![femur, tibia],
        }
    }

    /// Total reach of the leg when fully extended.
    pub fn reach(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// Static configuration of one leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegGeometry {
    /// Display name, e.g. "Left Front"
    pub name: String,
    /// Leg attachment origin in body coordinates (meters)
    pub mount_position: Point3<f64>,
    /// Rotation of the leg's local X axis from the body X axis, about body Z (radians)
    pub mount_rotation: f64,
    /// Link lengths (meters)
    pub link_lengths: LinkLengths,
    /// Calibration bias per joint: coxa, femur, tibia (radians)
    pub joint_angle_offsets: [f64; 3],
}

impl LegGeometry {
    /// Builds and validates the geometry of leg `leg`.
    ///
    /// # Errors
    /// * [`ConfigError::LinkLengthCount`] if `link_lengths` does not have 2 or 3 entries
    /// * [`ConfigError::OffsetCount`] if `offsets` does not have exactly 3 entries
    /// * [`ConfigError::NegativeLinkLength`] for any length below zero
    /// * [`ConfigError::NonFinite`] for NaN or infinite values anywhere
    pub fn new(
        leg: LegIndex,
        name: impl Into<String>,
        position: [f64; 3],
        rotation: f64,
        link_lengths: &[f64],
        offsets: &[f64],
    ) -> Result<Self, ConfigError> {
        let id = leg.get();

        for (axis, value) in ["x", "y", "z"].iter().zip(position) {
            validation::is_finite(value).map_err(|_| ConfigError::NonFinite {
                field: format!("robot.legs.{id}.position.{axis}"),
            })?;
        }
        validation::is_finite(rotation).map_err(|_| ConfigError::NonFinite {
            field: format!("robot.legs.{id}.rotation"),
        })?;

        let lengths = LinkLengths::from_slice(link_lengths).map_err(|count| {
            ConfigError::LinkLengthCount { leg: id, count }
        })?;
        for &value in link_lengths {
            if value.is_nan() || value.is_infinite() {
                return Err(ConfigError::NonFinite {
                    field: format!("robot.legs.{id}.link_lengths"),
                });
            }
            if validation::is_non_negative(value).is_err() {
                return Err(ConfigError::NegativeLinkLength { leg: id, value });
            }
        }

        let joint_angle_offsets: [f64; 3] = offsets.try_into().map_err(|_| {
            ConfigError::OffsetCount {
                leg: id,
                count: offsets.len(),
            }
        })?;
        if joint_angle_offsets.iter().any(|o| !o.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: format!("robot.legs.{id}.joint_angle_offsets"),
            });
        }

        if rotation.abs() > 2.0 * std::f64::consts::PI {
            tracing::warn!(
                leg = id,
                rotation,
                "Large mount rotation angle ({:.1} deg). Consider normalizing.",
                rotation.to_degrees()
            );
        }

        Ok(Self {
            name: name.into(),
            mount_position: Point3::from(position),
            mount_rotation: rotation,
            link_lengths: lengths,
            joint_angle_offsets,
        })
    }
}

/// Outer dimensions of the robot body, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDimensions {
    /// Extent along body X
    pub length: f64,
    /// Extent along body Y
    pub width: f64,
    /// Extent along body Z
    pub height: f64,
}

impl BodyDimensions {
    /// Corner indices joined by the 12 edges of the body box.
    pub const OUTLINE_EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];

    /// Corners of the body box centered on the body origin: bottom face first, then top.
    pub fn outline_corners(&self) -> [Point3<f64>; 8] {
        let (l, w, h) = (self.length / 2.0, self.width / 2.0, self.height / 2.0);
        [
            Point3::new(-l, -w, -h),
            Point3::new(l, -w, -h),
            Point3::new(l, w, -h),
            Point3::new(-l, w, -h),
            Point3::new(-l, -w, h),
            Point3::new(l, -w, h),
            Point3::new(l, w, h),
            Point3::new(-l, w, h),
        ]
    }
}

/// Complete, validated geometry of the robot: body plus exactly six legs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotGeometry {
    /// Body box
    pub body: BodyDimensions,
    legs: [LegGeometry; LEG_COUNT],
}

impl RobotGeometry {
    /// Assembles a robot from six leg geometries ordered by leg index.
    pub fn new(body: BodyDimensions, legs: [LegGeometry; LEG_COUNT]) -> Self {
        Self { body, legs }
    }

    /// Geometry of one leg.
    pub fn leg(&self, leg: LegIndex) -> &LegGeometry {
        &self.legs[leg.as_usize()]
    }

    /// Iterates legs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (LegIndex, &LegGeometry)> {
        LegIndex::ALL.into_iter().zip(self.legs.iter())
    }
}
