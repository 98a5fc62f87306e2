//! Reference acceleration computation, `efc_vel` and `aref` (spec §4.8).
//!
//! Grounded on `mj_referenceConstraint`: `efc_vel = J * qvel`, and `aref` combines a
//! velocity-damping term and a position-correction term scaled by the row's cooked impedance,
//! `aref = -B * vel - K * D * pos`. `pos` here is already margin-adjusted by the instantiator
//! (every row's `RowMeta::pos` is the signed constraint-space violation, zero at the
//! boundary), so no further margin subtraction happens in this stage.

use crate::impedance::RowImpedance;
use crate::jacobian::Jacobian;
use crate::Num;

/// `efc_vel[i] = J_i . qvel`, one entry per row.
pub fn constraint_velocity(jacobian: &Jacobian, qvel: &[Num]) -> Vec<Num> {
    jacobian.mul_vec(qvel)
}

/// `aref[i] = -B_i * vel_i - K_i * D_i * pos_i`.
pub fn reference_acceleration(positions: &[Num], vel: &[Num], cooked: &[RowImpedance]) -> Vec<Num> {
    positions
        .iter()
        .zip(vel)
        .zip(cooked)
        .map(|((&pos, &v), row)| -row.b * v - row.k * row.d * pos)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::{Jacobian, RowBuilder};

    #[test]
    fn velocity_is_jacobian_times_qvel() {
        let mut builder = Jacobian::dense_builder(2);
        let mut row = RowBuilder::default();
        row.push(0, 2.0);
        row.push(1, -1.0);
        builder.push_row(&row);
        let jacobian = builder.finish();
        let vel = constraint_velocity(&jacobian, &[3.0, 1.0]);
        assert_eq!(vel, vec![5.0]);
    }

    #[test]
    fn aref_combines_damping_and_stiffness() {
        let cooked = vec![RowImpedance { k: 10.0, b: 2.0, imp: 0.9, p: 0.0, r: 0.1, d: 0.9 }];
        let aref = reference_acceleration(&[0.5], &[1.0], &cooked);
        assert_eq!(aref[0], -2.0 * 1.0 - 10.0 * 0.9 * 0.5);
    }
}
