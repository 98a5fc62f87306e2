//! Constraint force, cost, and (for elliptic contacts) cone-Hessian evaluation (spec §4.9).
//!
//! Grounded on `mj_constraintUpdate`: given the reference acceleration `aref` and each row's
//! regularization `R`, this stage classifies every row into its active/inactive (or, for
//! friction cones, sticking/sliding/separating) zone, and produces the resulting constraint
//! force. The outer iterative solver (out of scope) calls this repeatedly with updated `aref`
//! candidates during its line search; this crate only evaluates one candidate per call.

use crate::impedance::RowImpedance;
use crate::jacobian::Jacobian;
use crate::model::ConeType;
use crate::row::{ConeShape, ConstraintRowKind, RowMeta};
use crate::Num;

/// Which complementarity zone a row landed in, mirrored in the name of the cost contribution
/// it produces (`mj_constraintUpdate`'s `Inactive`/`Linear`/`Quadratic` states).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Inactive,
    Linear,
    Quadratic,
}

/// Result of evaluating one candidate `aref` against the committed rows.
#[derive(Debug, Clone, Default)]
pub struct ConstraintUpdate {
    pub force: Vec<Num>,
    pub state: Vec<RowState>,
    pub cost: Num,
    /// `nv`-length generalized force, `J^T * force`.
    pub qfrc_constraint: Vec<Num>,
    /// Per-contact `dim x dim` cone Hessian, only populated for elliptic contacts in the
    /// sliding zone when `want_hessian` is set.
    pub cone_hessian: Vec<Option<Vec<Num>>>,
}

/// Evaluates force/cost/Hessian for every row given `aref` and each row's cooked `(K, B, imp,
/// R, D)`. Rows are grouped by contact for the elliptic cone; every other row is independent.
pub fn evaluate(
    rows: &[RowMeta],
    cooked: &[RowImpedance],
    aref: &[Num],
    jacobian: &Jacobian,
    cone: ConeType,
    want_hessian: bool,
) -> ConstraintUpdate {
    let nefc = rows.len();
    let mut force = vec![0.0; nefc];
    let mut state = vec![RowState::Inactive; nefc];
    let mut cost = 0.0;
    let mut cone_hessian = Vec::new();

    let mut i = 0;
    while i < nefc {
        match &rows[i].kind {
            ConstraintRowKind::Equality { .. } => {
                let (f, s, c) = update_equality(aref[i], cooked[i]);
                force[i] = f;
                state[i] = s;
                cost += c;
                i += 1;
            }
            ConstraintRowKind::Friction { .. } => {
                let (f, s, c) = update_friction(aref[i], cooked[i], rows[i].friction);
                force[i] = f;
                state[i] = s;
                cost += c;
                i += 1;
            }
            ConstraintRowKind::Limit { .. } => {
                let (f, s, c) = update_unilateral(aref[i], cooked[i]);
                force[i] = f;
                state[i] = s;
                cost += c;
                i += 1;
            }
            ConstraintRowKind::Contact { cone: row_cone, .. } => {
                let span = contact_span(rows, i);
                match (cone, row_cone) {
                    (_, ConeShape::Frictionless) => {
                        let (f, s, c) = update_unilateral(aref[i], cooked[i]);
                        force[i] = f;
                        state[i] = s;
                        cost += c;
                    }
                    (ConeType::Pyramidal, _) => {
                        for k in 0..span {
                            let (f, s, c) = update_unilateral(aref[i + k], cooked[i + k]);
                            force[i + k] = f;
                            state[i + k] = s;
                            cost += c;
                        }
                    }
                    (ConeType::Elliptic, _) => {
                        let (f, s, c, hessian) =
                            update_elliptic_cone(&aref[i..i + span], &cooked[i..i + span], &row_friction(rows, i, span), want_hessian);
                        force[i..i + span].copy_from_slice(&f);
                        state[i..i + span].copy_from_slice(&s);
                        cost += c;
                        if want_hessian {
                            cone_hessian.push(hessian);
                        }
                    }
                }
                i += span;
            }
        }
    }

    let qfrc_constraint = jacobian.mul_t_vec(&force);
    ConstraintUpdate {
        force,
        state,
        cost,
        qfrc_constraint,
        cone_hessian,
    }
}

fn contact_span(rows: &[RowMeta], start: usize) -> usize {
    let contact_id = match rows[start].kind {
        ConstraintRowKind::Contact { contact_id, .. } => contact_id,
        _ => return 1,
    };
    rows[start..]
        .iter()
        .take_while(|r| matches!(r.kind, ConstraintRowKind::Contact { contact_id: c, .. } if c == contact_id))
        .count()
}

fn row_friction(rows: &[RowMeta], start: usize, span: usize) -> Vec<Num> {
    (1..span).map(|k| rows[start + k].friction).collect()
}

/// Equality rows are always fully active (bilateral): quadratic cost, `force = -aref / R`.
fn update_equality(aref: Num, row: RowImpedance) -> (Num, RowState, Num) {
    let r = row.r.max(crate::MINVAL);
    let force = -aref / r;
    let cost = 0.5 * force * aref;
    (force, RowState::Quadratic, cost)
}

/// Friction-loss rows are box-bounded: `|force| <= frictionloss`, three zones.
fn update_friction(aref: Num, row: RowImpedance, limit: Num) -> (Num, RowState, Num) {
    let r = row.r.max(crate::MINVAL);
    let raw = -aref / r;
    if raw > limit {
        (limit, RowState::Linear, limit * (-aref) - 0.5 * r * limit * limit)
    } else if raw < -limit {
        (-limit, RowState::Linear, -limit * (-aref) - 0.5 * r * limit * limit)
    } else {
        let cost = 0.5 * raw * aref;
        (raw, RowState::Quadratic, cost)
    }
}

/// Limit and non-elliptic contact rows are one-sided: `force >= 0`, `force = max(-aref/R, 0)`.
fn update_unilateral(aref: Num, row: RowImpedance) -> (Num, RowState, Num) {
    let r = row.r.max(crate::MINVAL);
    let raw = -aref / r;
    if raw <= 0.0 {
        (0.0, RowState::Inactive, 0.0)
    } else {
        (raw, RowState::Quadratic, 0.5 * raw * aref)
    }
}

/// Elliptic friction cone for one contact: `aref`/`cooked` span the normal row followed by
/// `dim - 1` tangential/torsional rows. Classifies into the bottom (separating), top
/// (sticking), or middle (sliding) zone and projects onto the cone surface in the middle zone.
fn update_elliptic_cone(aref: &[Num], cooked: &[RowImpedance], friction: &[Num], want_hessian: bool) -> (Vec<Num>, Vec<RowState>, Num, Option<Vec<Num>>) {
    let dim = aref.len();
    let r0 = cooked[0].r.max(crate::MINVAL);
    let n = -aref[0] / r0;

    if n <= 0.0 {
        return (vec![0.0; dim], vec![RowState::Inactive; dim], 0.0, None);
    }

    let raw_t: Vec<Num> = (1..dim).map(|k| -aref[k] / cooked[k].r.max(crate::MINVAL)).collect();
    let scaled: Vec<Num> = raw_t.iter().zip(friction).map(|(&t, &mu)| t / mu.max(crate::MINVAL)).collect();
    let e = scaled.iter().map(|s| s * s).sum::<Num>().sqrt();

    let mut force = vec![0.0; dim];
    let mut state = vec![RowState::Quadratic; dim];
    force[0] = n;

    if e <= n {
        // sticking: inside the cone, every row is in its unconstrained quadratic zone.
        force[1..].copy_from_slice(&raw_t);
        let cost = (0..dim).map(|k| 0.5 * force[k] * aref[k]).sum();
        return (force, state, cost, None);
    }

    // sliding: project the tangential impulse onto the cone surface, direction preserved.
    let scale = n / e;
    for k in 0..dim - 1 {
        force[1 + k] = raw_t[k] * scale;
        state[1 + k] = RowState::Linear;
    }
    let cost = 0.5 * force[0] * aref[0] + (0..dim - 1).map(|k| force[1 + k] * aref[1 + k]).sum::<Num>();

    let hessian = if want_hessian {
        Some(cone_hessian_sliding(n, e, &scaled, friction))
    } else {
        None
    };

    (force, state, cost, hessian)
}

/// Approximate Hessian of the sliding-zone projection w.r.t. the raw (unprojected) impulse,
/// symmetrized. Exact away from `e == 0`; the source special-cases the degenerate tangential
/// direction, which cannot occur here since `e > n >= 0` on this branch.
fn cone_hessian_sliding(n: Num, e: Num, scaled: &[Num], friction: &[Num]) -> Vec<Num> {
    let dim = scaled.len() + 1;
    let mut h = vec![0.0; dim * dim];
    let scale = n / e;
    for k in 0..dim - 1 {
        h[(1 + k) * dim + (1 + k)] = scale / friction[k].max(crate::MINVAL);
        h[(1 + k) * dim] = scaled[k] / e;
        h[(1 + k)] = scaled[k] / e;
        for j in 0..dim - 1 {
            if j != k {
                h[(1 + k) * dim + (1 + j)] -= scale * scaled[k] * scaled[j] / (e * e);
            }
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::{Jacobian, RowBuilder};
    use crate::row::LimitSource;

    fn identity_jacobian(n: usize) -> Jacobian {
        let mut builder = Jacobian::dense_builder(n);
        for i in 0..n {
            let mut row = RowBuilder::default();
            row.push(i, 1.0);
            builder.push_row(&row);
        }
        builder.finish()
    }

    #[test]
    fn limit_row_inactive_when_not_pushing() {
        let rows = vec![RowMeta {
            kind: ConstraintRowKind::Limit { source: LimitSource::Joint(0) },
            pos: 0.0,
            margin: 0.0,
            solref: [0.02, 1.0],
            solimp: [0.9, 0.95, 0.001, 0.5, 2.0],
            solreffriction: [0.0, 0.0],
            friction: 0.0,
        }];
        let cooked = vec![RowImpedance { k: 1.0, b: 1.0, imp: 0.9, p: 0.0, r: 1.0, d: 0.9 }];
        let jac = identity_jacobian(1);
        let update = evaluate(&rows, &cooked, &[1.0], &jac, ConeType::Pyramidal, false);
        assert_eq!(update.state[0], RowState::Inactive);
        assert_eq!(update.force[0], 0.0);
    }

    #[test]
    fn friction_row_saturates_outside_box() {
        let rows = vec![RowMeta {
            kind: ConstraintRowKind::Friction { source: crate::row::FrictionSource::Dof(0) },
            pos: 0.0,
            margin: 0.0,
            solref: [0.02, 1.0],
            solimp: [0.9, 0.95, 0.001, 0.5, 2.0],
            solreffriction: [0.0, 0.0],
            friction: 0.5,
        }];
        let cooked = vec![RowImpedance { k: 1.0, b: 1.0, imp: 0.9, p: 0.0, r: 0.1, d: 0.9 }];
        let jac = identity_jacobian(1);
        let update = evaluate(&rows, &cooked, &[-10.0], &jac, ConeType::Pyramidal, false);
        assert_eq!(update.state[0], RowState::Linear);
        assert_eq!(update.force[0], 0.5);
    }
}
