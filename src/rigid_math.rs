//! Small rigid-body math primitives used by the instantiator.
//!
//! These correspond to the `quat2Vel`, `rotVecMat`, `mulQuat`, `mulQuatAxis`, `negQuat`,
//! `normalize3` collaborator contracts listed in the external-interfaces section: elsewhere
//! in a full engine they live in a separate kinematics/math module, but they are small and
//! self-contained enough that this crate implements them directly rather than injecting them
//! as a collaborator trait.

use crate::Num;

/// Quaternion in `(w, x, y, z)` order.
pub type Quat = [Num; 4];
/// 3-vector.
pub type Vec3 = [Num; 3];
/// Row-major 3x3 matrix.
pub type Mat3 = [Num; 9];

/// Normalizes `v` in place, returning the original norm. Leaves `v` untouched (zero vector)
/// if the norm is degenerate.
pub fn normalize3(v: &mut Vec3) -> Num {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if norm >= crate::MINVAL {
        v[0] /= norm;
        v[1] /= norm;
        v[2] /= norm;
    }
    norm
}

/// `mat * v`, treating `mat` as row-major 3x3.
pub fn rot_vec_mat(v: Vec3, mat: &Mat3) -> Vec3 {
    [
        mat[0] * v[0] + mat[1] * v[1] + mat[2] * v[2],
        mat[3] * v[0] + mat[4] * v[1] + mat[5] * v[2],
        mat[6] * v[0] + mat[7] * v[1] + mat[8] * v[2],
    ]
}

/// Hamilton product `a * b`.
pub fn mul_quat(a: Quat, b: Quat) -> Quat {
    [
        a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
        a[0] * b[1] + a[1] * b[0] + a[2] * b[3] - a[3] * b[2],
        a[0] * b[2] - a[1] * b[3] + a[2] * b[0] + a[3] * b[1],
        a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + a[3] * b[0],
    ]
}

/// Conjugate of a unit quaternion (its inverse).
pub fn neg_quat(q: Quat) -> Quat {
    [q[0], -q[1], -q[2], -q[3]]
}

/// `q * (0, axis)`, i.e. quaternion-times-pure-vector product, used to propagate a Jacobian
/// column through a quaternion multiplication.
pub fn mul_quat_axis(q: Quat, axis: Vec3) -> Quat {
    mul_quat(q, [0.0, axis[0], axis[1], axis[2]])
}

/// Converts a unit quaternion to a rotation vector (angle-axis, scaled by `1/dt`).
/// With `dt = 1` this is simply `angle * axis`.
pub fn quat2_vel(q: Quat, dt: Num) -> Vec3 {
    let mut axis = [q[1], q[2], q[3]];
    let sin_a = normalize3(&mut axis);
    if sin_a < crate::MINVAL {
        return [0.0, 0.0, 0.0];
    }
    let angle = 2.0 * sin_a.atan2(q[0]);
    let angle = if angle > std::f64::consts::PI {
        angle - 2.0 * std::f64::consts::PI
    } else {
        angle
    };
    let scale = angle / dt;
    [axis[0] * scale, axis[1] * scale, axis[2] * scale]
}

/// `frame[..rows*3] * a`, where `frame` is row-major 3x3 (only the first `rows` rows are
/// used) and `a` is a row-major `3 x cols` matrix. Returns a row-major `rows x cols` matrix.
pub fn mat3_mul(frame: &Mat3, rows: usize, a: &[Num], cols: usize) -> Vec<Num> {
    let mut out = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for k in 0..3 {
                acc += frame[r * 3 + k] * a[k * cols + c];
            }
            out[r * cols + c] = acc;
        }
    }
    out
}
