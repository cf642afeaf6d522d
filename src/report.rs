//! Human-readable console output for samples.

use crate::geometry::LegGeometry;
use crate::sample::LegSample;
use nalgebra::Point3;

fn triple(p: &Point3<f64>) -> String {
    format!("({:6.3}, {:6.3}, {:6.3})", p.x, p.y, p.z)
}

/// One monitor line for `sample`, with mount details when `geometry` is known.
pub fn format_sample(sample: &LegSample, geometry: Option<&LegGeometry>) -> String {
    let name = geometry.map_or_else(String::new, |g| format!("({})", g.name));
    let [a0, a1, a2] = sample.raw_angles;
    let mut out = format!(
        "Leg {} {:<13} | Time: {:8}μs | Body: {} | Leg: {} | Angles: ({:6.3}, {:6.3}, {:6.3})",
        sample.leg_index,
        name,
        sample.robot_timestamp_us,
        triple(&sample.body_xyz),
        triple(&sample.leg_xyz),
        a0,
        a1,
        a2,
    );

    if let Some(g) = geometry {
        let p = &g.mount_position;
        out.push_str(&format!(
            " | Cfg: pos=({:5.3}, {:5.3}, {:5.3}) rot={:5.3}rad ({:4.1}°)",
            p.x,
            p.y,
            p.z,
            g.mount_rotation,
            g.mount_rotation.to_degrees()
        ));
    }
    out
}
