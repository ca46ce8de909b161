//! Rotation helpers shared by pose derivation and realignment.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Rotation whose matrix is `m`.
///
/// `m` must be orthonormal with determinant +1. The largest of the trace and the
/// three diagonal terms picks the branch, so no division is taken over a value
/// near zero, including around the identity and half turns.
pub fn rotation_from_basis(m: &Matrix3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(basis_quaternion(m))
}

fn basis_quaternion(m: &Matrix3<f32>) -> Quaternion<f32> {
    let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];
    if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quaternion::new(
            0.25 / s,
            (m[(2, 1)] - m[(1, 2)]) * s,
            (m[(0, 2)] - m[(2, 0)]) * s,
            (m[(1, 0)] - m[(0, 1)]) * s,
        )
    } else if m[(0, 0)] > m[(1, 1)] && m[(0, 0)] > m[(2, 2)] {
        let s = 2.0 * (1.0 + m[(0, 0)] - m[(1, 1)] - m[(2, 2)]).sqrt();
        Quaternion::new(
            (m[(2, 1)] - m[(1, 2)]) / s,
            0.25 * s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
        )
    } else if m[(1, 1)] > m[(2, 2)] {
        let s = 2.0 * (1.0 + m[(1, 1)] - m[(0, 0)] - m[(2, 2)]).sqrt();
        Quaternion::new(
            (m[(0, 2)] - m[(2, 0)]) / s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            0.25 * s,
            (m[(1, 2)] + m[(2, 1)]) / s,
        )
    } else {
        let s = 2.0 * (1.0 + m[(2, 2)] - m[(0, 0)] - m[(1, 1)]).sqrt();
        Quaternion::new(
            (m[(1, 0)] - m[(0, 1)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
            (m[(1, 2)] + m[(2, 1)]) / s,
            0.25 * s,
        )
    }
}

/// Pre-multiplies `rotation` by the X, then Y, then Z offsets (radians).
/// Zero offsets are skipped so an unconfigured grip leaves the rotation untouched.
pub fn apply_grip_offset(
    rotation: UnitQuaternion<f32>,
    offset: &Vector3<f32>,
) -> UnitQuaternion<f32> {
    let axes = [
        Vector3::<f32>::x_axis(),
        Vector3::<f32>::y_axis(),
        Vector3::<f32>::z_axis(),
    ];
    axes.iter()
        .zip(offset.iter())
        .filter(|(_, angle)| **angle != 0.0)
        .fold(rotation, |rotation, (axis, angle)| {
            UnitQuaternion::from_axis_angle(axis, *angle) * rotation
        })
}

const ROTATION_TOLERANCE: f32 = 1.0e-3;

/// Whether `m` is finite, orthonormal and right-handed, within a small tolerance.
pub fn is_rotation(m: &Matrix3<f32>) -> bool {
    m.iter().all(|c| c.is_finite())
        && (m * m.transpose() - Matrix3::identity()).abs().max() < ROTATION_TOLERANCE
        && (m.determinant() - 1.0).abs() < ROTATION_TOLERANCE
}

/// Normalizes `v`, refusing zero-length or non-finite input.
pub fn checked_unit(v: &Vector3<f32>) -> Option<Vector3<f32>> {
    if !v.iter().all(|c| c.is_finite()) {
        return None;
    }
    v.try_normalize(1.0e-6)
}
