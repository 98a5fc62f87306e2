//! Builds every active row's Jacobian, reference position, and diagonal approximation (spec
//! §4.4-4.5) — the largest stage of the pipeline. One function per constraint family, grounded
//! on `mj_instantiateEquality`, `mj_instantiateFriction`, `mj_instantiateLimit`, and
//! `mj_instantiateContact` respectively; the per-family `diagApprox` table of `mj_diagApprox`
//! is computed alongside each row, since that is where the owning bodies/dofs/tendons are
//! already in scope.

use crate::collaborators::JacobianDifference;
use crate::diag_approx::{
    diag_approx_connect, diag_approx_contact_elliptic, diag_approx_contact_frictionless, diag_approx_contact_pyramidal, diag_approx_dof, diag_approx_eq_dof,
    diag_approx_eq_tendon, diag_approx_tendon, diag_approx_weld, WeldCounter,
};
use crate::model::{EqType, JointType, Model};
use crate::rigid_math::{mat3_mul, mul_quat, neg_quat, normalize3, quat2_vel};
use crate::row::{ConeShape, ConstraintRowKind, FrictionSource, LimitSource, RowMeta};
use crate::state::State;
use crate::Num;

/// One instantiated row: its metadata, the DOF chain and values of its Jacobian row, and its
/// diagonal approximation (`efc_diagApprox[i]`, spec §4.5).
pub struct InstantiatedRow {
    pub meta: RowMeta,
    pub chain: Vec<usize>,
    pub values: Vec<Num>,
    pub diag_approx: Num,
}

fn lookup(chain: &[usize], values: &[Num], stride: usize, row: usize, dof: usize) -> Num {
    match chain.binary_search(&dof) {
        Ok(p) => values[row * stride + p],
        Err(_) => 0.0,
    }
}

fn diff_row(chain_a: &[usize], vals_a: &[Num], chain_b: &[usize], vals_b: &[Num], row: usize, merged: &[usize]) -> Vec<Num> {
    merged
        .iter()
        .map(|&d| lookup(chain_a, vals_a, chain_a.len(), row, d) - lookup(chain_b, vals_b, chain_b.len(), row, d))
        .collect()
}

/// `mj_instantiateEquality`: one entry per active equality, contributing `3` (CONNECT), `6`
/// (WELD), or `1` (JOINT/TENDON) rows each.
pub fn instantiate_equality(model: &Model, state: &State, jac: &impl JacobianDifference) -> Vec<InstantiatedRow> {
    if model.options.disable.equality {
        return Vec::new();
    }
    let mut out = Vec::new();
    for eq in 0..model.equality.neq() {
        if !model.equality.active[eq] {
            continue;
        }
        let data = model.equality.data[eq];
        let solref = model.equality.solref[eq];
        let solimp = model.equality.solimp[eq];
        match model.equality.eq_type[eq] {
            EqType::Connect => instantiate_connect(model, state, jac, eq, data, solref, solimp, &mut out),
            EqType::Weld => instantiate_weld(model, state, jac, eq, data, solref, solimp, &mut out),
            EqType::Joint => instantiate_joint_eq(model, state, eq, data, solref, solimp, &mut out),
            EqType::Tendon => instantiate_tendon_eq(model, state, eq, data, solref, solimp, &mut out),
        }
    }
    out
}

fn instantiate_connect(
    model: &Model,
    state: &State,
    jac: &impl JacobianDifference,
    eq: usize,
    data: [Num; 11],
    solref: [Num; 2],
    solimp: [Num; 5],
    out: &mut Vec<InstantiatedRow>,
) {
    let body1 = model.equality.obj1id[eq];
    let anchor1 = [data[0], data[1], data[2]];
    let pos1 = add3(state.xpos[body1], crate::rigid_math::rot_vec_mat(anchor1, &state.xmat[body1]));
    let (body2, pos2) = match model.equality.obj2id[eq] {
        Some(body2) => {
            let anchor2 = [data[3], data[4], data[5]];
            (body2, add3(state.xpos[body2], crate::rigid_math::rot_vec_mat(anchor2, &state.xmat[body2])))
        }
        None => (body1, [data[3], data[4], data[5]]),
    };
    let cpos = sub3(pos1, pos2);
    let (chain, values) = jac.jac_dif_pair(model, state, body1, pos1, body2, pos2);
    let diag_approx = diag_approx_connect(model, body1, body2);
    for axis in 0..3 {
        let row_values = chain.iter().enumerate().map(|(p, _)| values[axis * chain.len() + p]).collect();
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Equality { eq_id: eq },
                pos: cpos[axis],
                margin: 0.0,
                solref,
                solimp,
                solreffriction: [0.0, 0.0],
                friction: 0.0,
            },
            chain: chain.clone(),
            values: row_values,
            diag_approx,
        });
    }
}

fn instantiate_weld(
    model: &Model,
    state: &State,
    jac: &impl JacobianDifference,
    eq: usize,
    data: [Num; 11],
    solref: [Num; 2],
    solimp: [Num; 5],
    out: &mut Vec<InstantiatedRow>,
) {
    let body1 = model.equality.obj1id[eq];
    let body2 = match model.equality.obj2id[eq] {
        Some(b) => b,
        None => body1,
    };
    let anchor1 = [data[0], data[1], data[2]];
    let anchor2 = [data[3], data[4], data[5]];
    let torquescale = if data[10] != 0.0 { data[10] } else { 1.0 };

    let pos1 = add3(state.xpos[body1], crate::rigid_math::rot_vec_mat(anchor1, &state.xmat[body1]));
    let pos2 = add3(state.xpos[body2], crate::rigid_math::rot_vec_mat(anchor2, &state.xmat[body2]));
    let cpos = sub3(pos1, pos2);

    let (chain1, jacp1, jacr1) = jac.jac_body(model, state, body1, pos1);
    let (chain2, jacp2, jacr2) = jac.jac_body(model, state, body2, pos2);
    let merged = crate::sparse::merge_chain(&chain1, &chain2);
    let mut weldcnt = WeldCounter::new();

    for axis in 0..3 {
        let values = diff_row(&chain1, &jacp1, &chain2, &jacp2, axis, &merged);
        let diag_approx = diag_approx_weld(model, body1, body2, false, &mut weldcnt);
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Equality { eq_id: eq },
                pos: cpos[axis],
                margin: 0.0,
                solref,
                solimp,
                solreffriction: [0.0, 0.0],
                friction: 0.0,
            },
            chain: merged.clone(),
            values,
            diag_approx,
        });
    }

    // relative-orientation residual: relquat = quat2^-1 * quat1, rotation-vector of that is
    // the angular error driving the last three rows.
    let relquat = mul_quat(neg_quat(state.xquat[body2]), state.xquat[body1]);
    let rel_vel = quat2_vel(relquat, 1.0);
    for axis in 0..3 {
        let mut values = diff_row(&chain1, &jacr1, &chain2, &jacr2, axis, &merged);
        for v in &mut values {
            *v *= torquescale;
        }
        let diag_approx = diag_approx_weld(model, body1, body2, true, &mut weldcnt);
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Equality { eq_id: eq },
                pos: rel_vel[axis] * torquescale,
                margin: 0.0,
                solref,
                solimp,
                solreffriction: [0.0, 0.0],
                friction: 0.0,
            },
            chain: merged.clone(),
            values,
            diag_approx,
        });
    }
}

/// Cubic-in-`qpos2` polynomial coupling two scalar joints (or one joint to a fixed pose if
/// `obj2id` is unset): `pos = qpos1 - poly(qpos2)`, `poly(x) = sum_i data[i] * x^i`.
fn instantiate_joint_eq(model: &Model, state: &State, eq: usize, data: [Num; 11], solref: [Num; 2], solimp: [Num; 5], out: &mut Vec<InstantiatedRow>) {
    let joint1 = model.equality.obj1id[eq];
    let dof1 = model.joint.dofadr[joint1];
    let q1 = state.qpos[model.joint.qposadr[joint1]];

    let (pos, chain, values, dof2) = match model.equality.obj2id[eq] {
        Some(joint2) => {
            let dof2 = model.joint.dofadr[joint2];
            let q2 = state.qpos[model.joint.qposadr[joint2]];
            let (poly, dpoly) = poly5(&data, q2);
            let pos = q1 - poly;
            let merged = crate::sparse::merge_chain(&[dof1], &[dof2]);
            let values = merged.iter().map(|&d| (if d == dof1 { 1.0 } else { 0.0 }) - (if d == dof2 { dpoly } else { 0.0 })).collect();
            (pos, merged, values, Some(dof2))
        }
        None => {
            let (poly, _) = poly5(&data, 0.0);
            (q1 - poly, vec![dof1], vec![1.0], None)
        }
    };

    out.push(InstantiatedRow {
        meta: RowMeta {
            kind: ConstraintRowKind::Equality { eq_id: eq },
            pos,
            margin: 0.0,
            solref,
            solimp,
            solreffriction: [0.0, 0.0],
            friction: 0.0,
        },
        chain,
        values,
        diag_approx: diag_approx_eq_dof(model, dof1, dof2),
    });
}

fn instantiate_tendon_eq(model: &Model, state: &State, eq: usize, data: [Num; 11], solref: [Num; 2], solimp: [Num; 5], out: &mut Vec<InstantiatedRow>) {
    let ten1 = model.equality.obj1id[eq];
    let len1 = state.ten_length[ten1];
    let row1 = state.ten_jacobian.row_dense(ten1, model.nv);

    let (pos, values, ten2) = match model.equality.obj2id[eq] {
        Some(ten2) => {
            let len2 = state.ten_length[ten2];
            let row2 = state.ten_jacobian.row_dense(ten2, model.nv);
            let (poly, dpoly) = poly5(&data, len2);
            let values: Vec<Num> = row1.iter().zip(&row2).map(|(a, b)| a - dpoly * b).collect();
            (len1 - poly, values, Some(ten2))
        }
        None => {
            let (poly, _) = poly5(&data, 0.0);
            (len1 - poly, row1, None)
        }
    };

    out.push(InstantiatedRow {
        meta: RowMeta {
            kind: ConstraintRowKind::Equality { eq_id: eq },
            pos,
            margin: 0.0,
            solref,
            solimp,
            solreffriction: [0.0, 0.0],
            friction: 0.0,
        },
        chain: (0..model.nv).collect(),
        values,
        diag_approx: diag_approx_eq_tendon(model, ten1, ten2),
    });
}

/// Evaluates `sum(data[i] * x^i)` for `i in 0..5` and its derivative at `x`.
fn poly5(data: &[Num; 11], x: Num) -> (Num, Num) {
    let c = [data[0], data[1], data[2], data[3], data[4]];
    let poly = c[0] + c[1] * x + c[2] * x * x + c[3] * x * x * x + c[4] * x * x * x * x;
    let dpoly = c[1] + 2.0 * c[2] * x + 3.0 * c[3] * x * x + 4.0 * c[4] * x * x * x;
    (poly, dpoly)
}

/// `mj_instantiateFriction`: one identity row per frictional DOF, one tendon-Jacobian row per
/// frictional tendon.
pub fn instantiate_friction(model: &Model, state: &State) -> Vec<InstantiatedRow> {
    if model.options.disable.frictionloss {
        return Vec::new();
    }
    let mut out = Vec::new();
    for d in 0..model.dof.nv() {
        if model.dof.frictionloss[d] <= 0.0 {
            continue;
        }
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Friction { source: FrictionSource::Dof(d) },
                pos: 0.0,
                margin: 0.0,
                solref: model.dof.solref[d],
                solimp: model.dof.solimp[d],
                solreffriction: [0.0, 0.0],
                friction: model.dof.frictionloss[d],
            },
            chain: vec![d],
            values: vec![1.0],
            diag_approx: diag_approx_dof(model, d),
        });
    }
    for t in 0..model.tendon.ntendon() {
        if model.tendon.frictionloss[t] <= 0.0 {
            continue;
        }
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Friction { source: FrictionSource::Tendon(t) },
                pos: 0.0,
                margin: 0.0,
                solref: model.tendon.solref_fri[t],
                solimp: model.tendon.solimp_fri[t],
                solreffriction: [0.0, 0.0],
                friction: model.tendon.frictionloss[t],
            },
            chain: (0..model.nv).collect(),
            values: state.ten_jacobian.row_dense(t, model.nv),
            diag_approx: diag_approx_tendon(model, t),
        });
    }
    out
}

/// `mj_instantiateLimit`: joint and tendon range limits.
pub fn instantiate_limit(model: &Model, state: &State) -> Vec<InstantiatedRow> {
    if model.options.disable.limit {
        return Vec::new();
    }
    let mut out = Vec::new();
    for j in 0..model.joint.njnt() {
        if !model.joint.limited[j] {
            continue;
        }
        match model.joint.jnt_type[j] {
            JointType::Slide | JointType::Hinge => instantiate_scalar_limit(model, state, j, &mut out),
            JointType::Ball => instantiate_ball_limit(model, state, j, &mut out),
            JointType::Free => {}
        }
    }
    for t in 0..model.tendon.ntendon() {
        if !model.tendon.limited[t] {
            continue;
        }
        instantiate_tendon_limit(model, state, t, &mut out);
    }
    out
}

/// Checks both bounds of a scalar joint range independently (mirroring the source's
/// `for (int side=-1; side<=1; side+=2)` loop), so a degenerate near-zero range can produce up
/// to two rows in the same step rather than only the nearer bound.
fn instantiate_scalar_limit(model: &Model, state: &State, joint: usize, out: &mut Vec<InstantiatedRow>) {
    let dof = model.joint.dofadr[joint];
    let qpos = state.qpos[model.joint.qposadr[joint]];
    let [lo, hi] = model.joint.range[joint];
    let margin = model.joint.margin[joint];
    let diag_approx = diag_approx_dof(model, dof);

    for (dist, sign) in [(qpos - lo, 1.0), (hi - qpos, -1.0)] {
        if dist >= margin {
            continue;
        }
        out.push(InstantiatedRow {
            meta: RowMeta {
                kind: ConstraintRowKind::Limit { source: LimitSource::Joint(joint) },
                pos: dist - margin,
                margin,
                solref: model.joint.solref[joint],
                solimp: model.joint.solimp[joint],
                solreffriction: [0.0, 0.0],
                friction: 0.0,
            },
            chain: vec![dof],
            values: vec![sign],
            diag_approx,
        });
    }
}

fn instantiate_ball_limit(model: &Model, state: &State, joint: usize, out: &mut Vec<InstantiatedRow>) {
    let dof = model.joint.dofadr[joint];
    let qpos_adr = model.joint.qposadr[joint];
    let quat = [state.qpos[qpos_adr], state.qpos[qpos_adr + 1], state.qpos[qpos_adr + 2], state.qpos[qpos_adr + 3]];
    let mut axis = [quat[1], quat[2], quat[3]];
    let sin_a = normalize3(&mut axis);
    let angle = 2.0 * sin_a.atan2(quat[0]);
    let [_, hi] = model.joint.range[joint];
    let margin = model.joint.margin[joint];
    let dist = hi - angle.abs();
    if dist >= margin {
        return;
    }
    let sign = -angle.signum();
    out.push(InstantiatedRow {
        meta: RowMeta {
            kind: ConstraintRowKind::Limit { source: LimitSource::Joint(joint) },
            pos: dist - margin,
            margin,
            solref: model.joint.solref[joint],
            solimp: model.joint.solimp[joint],
            solreffriction: [0.0, 0.0],
            friction: 0.0,
        },
        chain: vec![dof, dof + 1, dof + 2],
        values: vec![sign * axis[0], sign * axis[1], sign * axis[2]],
        diag_approx: diag_approx_dof(model, dof),
    });
}

fn instantiate_tendon_limit(model: &Model, state: &State, tendon: usize, out: &mut Vec<InstantiatedRow>) {
    let len = state.ten_length[tendon];
    let [lo, hi] = model.tendon.range[tendon];
    let margin = model.tendon.margin[tendon];
    let lower_dist = len - lo;
    let upper_dist = hi - len;
    let (dist, sign) = if lower_dist < upper_dist { (lower_dist, 1.0) } else { (upper_dist, -1.0) };
    if dist >= margin {
        return;
    }
    let row = state.ten_jacobian.row_dense(tendon, model.nv);
    let values: Vec<Num> = row.iter().map(|v| v * sign).collect();
    out.push(InstantiatedRow {
        meta: RowMeta {
            kind: ConstraintRowKind::Limit { source: LimitSource::Tendon(tendon) },
            pos: dist - margin,
            margin,
            solref: model.tendon.solref_lim[tendon],
            solimp: model.tendon.solimp_lim[tendon],
            solreffriction: [0.0, 0.0],
            friction: 0.0,
        },
        chain: (0..model.nv).collect(),
        values,
        diag_approx: diag_approx_tendon(model, tendon),
    });
}

/// `mj_instantiateContact`: frictionless, pyramidal, or elliptic rows for each non-excluded
/// contact. `geom1`/`geom2` are treated as the colliding bodies directly — the geom-to-body
/// lookup and the contact frame/position/friction themselves are collision detection's
/// responsibility and are out of scope.
pub fn instantiate_contact(model: &Model, state: &State, jac: &impl JacobianDifference) -> Vec<InstantiatedRow> {
    if model.options.disable.contact {
        return Vec::new();
    }
    let pyramidal = model.options.cone == crate::model::ConeType::Pyramidal;
    let mut out = Vec::new();
    for (contact_id, c) in state.contact.iter().enumerate() {
        if c.exclude {
            continue;
        }
        let (chain, values) = jac.jac_dif_pair(model, state, c.geom1, [0.0, 0.0, 0.0], c.geom2, [0.0, 0.0, 0.0]);
        // project the translational difference Jacobian through the contact frame
        let frame_rows = if c.dim == 1 { 1 } else { c.dim.min(3) };
        let projected = mat3_mul(&c.frame, frame_rows, &values, chain.len());
        let dist = c.dist - c.includemargin;

        if c.dim == 1 {
            out.push(InstantiatedRow {
                meta: RowMeta {
                    kind: ConstraintRowKind::Contact { contact_id, axis: 0, cone: ConeShape::Frictionless },
                    pos: dist,
                    margin: c.includemargin,
                    solref: c.solref,
                    solimp: c.solimp,
                    solreffriction: [0.0, 0.0],
                    friction: 0.0,
                },
                chain: chain.clone(),
                values: projected[0..chain.len()].to_vec(),
                diag_approx: diag_approx_contact_frictionless(model, c.geom1, c.geom2),
            });
            continue;
        }

        if pyramidal {
            let ndir = c.dim - 1;
            let diag = diag_approx_contact_pyramidal(model, c.geom1, c.geom2, &c.friction, ndir);
            for d in 0..ndir {
                let mu = c.friction[d];
                // torsional/rolling axes (d >= 2) have no representation in the 3x3 contact
                // frame this crate carries; only the two tangential directions are projected.
                let tangent = if d + 1 < frame_rows {
                    projected[(d + 1) * chain.len()..(d + 2) * chain.len()].to_vec()
                } else {
                    vec![0.0; chain.len()]
                };
                for sign in [1.0, -1.0] {
                    let row: Vec<Num> = (0..chain.len())
                        .map(|k| projected[k] + sign * mu * tangent[k])
                        .collect();
                    let axis = 1 + 2 * d + if sign < 0.0 { 1 } else { 0 };
                    out.push(InstantiatedRow {
                        meta: RowMeta {
                            kind: ConstraintRowKind::Contact { contact_id, axis, cone: ConeShape::Pyramidal },
                            pos: dist,
                            margin: c.includemargin,
                            solref: c.solref,
                            solimp: c.solimp,
                            solreffriction: [0.0, 0.0],
                            friction: mu,
                        },
                        chain: chain.clone(),
                        values: row,
                        diag_approx: diag[axis - 1],
                    });
                }
            }
        } else {
            let diag = diag_approx_contact_elliptic(model, c.geom1, c.geom2, c.dim);
            for axis in 0..c.dim {
                // torsional/rolling axes (axis >= 3) have no representation in the 3x3
                // contact frame this crate carries.
                let row = if axis < frame_rows {
                    projected[axis * chain.len()..(axis + 1) * chain.len()].to_vec()
                } else {
                    vec![0.0; chain.len()]
                };
                // the normal row (axis 0) carries the penetration distance/margin; tangential
                // and torsional rows are numerically inert positions (spec §4.4).
                out.push(InstantiatedRow {
                    meta: RowMeta {
                        kind: ConstraintRowKind::Contact { contact_id, axis, cone: ConeShape::Elliptic },
                        pos: if axis == 0 { dist } else { 0.0 },
                        margin: if axis == 0 { c.includemargin } else { 0.0 },
                        solref: c.solref,
                        solimp: c.solimp,
                        solreffriction: c.solreffriction,
                        friction: if axis == 0 { 0.0 } else { c.friction[axis - 1] },
                    },
                    chain: chain.clone(),
                    values: row,
                    diag_approx: diag[axis],
                });
            }
        }
    }
    out
}

fn add3(a: [Num; 3], b: [Num; 3]) -> [Num; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub3(a: [Num; 3], b: [Num; 3]) -> [Num; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::IdentityCollaborators;

    #[test]
    fn scalar_limit_checks_both_bounds_independently() {
        let mut model = Model::default();
        model.nv = 1;
        model.joint.jnt_type.push(JointType::Hinge);
        model.joint.qposadr.push(0);
        model.joint.dofadr.push(0);
        model.joint.limited.push(true);
        model.joint.range.push([0.0, 1.0]);
        model.joint.margin.push(0.02);
        model.joint.solref.push([0.02, 1.0]);
        model.joint.solimp.push([0.9, 0.95, 0.001, 0.5, 2.0]);
        model.dof.invweight0 = vec![1.0];
        let mut state = State::default();
        state.qpos = vec![0.99];
        let mut out = Vec::new();
        instantiate_scalar_limit(&model, &state, 0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].values, vec![-1.0]);
    }

    #[test]
    fn scalar_limit_emits_both_rows_for_degenerate_range() {
        let mut model = Model::default();
        model.nv = 1;
        model.joint.jnt_type.push(JointType::Hinge);
        model.joint.qposadr.push(0);
        model.joint.dofadr.push(0);
        model.joint.limited.push(true);
        model.joint.range.push([-0.01, 0.01]);
        model.joint.margin.push(1.0);
        model.joint.solref.push([0.02, 1.0]);
        model.joint.solimp.push([0.9, 0.95, 0.001, 0.5, 2.0]);
        model.dof.invweight0 = vec![1.0];
        let mut state = State::default();
        state.qpos = vec![0.0];
        let mut out = Vec::new();
        instantiate_scalar_limit(&model, &state, 0, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].values, vec![1.0]);
        assert_eq!(out[1].values, vec![-1.0]);
    }

    #[test]
    fn friction_rows_skip_zero_frictionloss_dofs() {
        let mut model = Model::default();
        model.nv = 2;
        model.dof.parentid = vec![None, None];
        model.dof.madr = vec![0, 1];
        model.dof.invweight0 = vec![1.0, 1.0];
        model.dof.frictionloss = vec![0.0, 0.5];
        model.dof.solref = vec![[0.02, 1.0]; 2];
        model.dof.solimp = vec![[0.9, 0.95, 0.001, 0.5, 2.0]; 2];
        let state = State::default();
        let rows = instantiate_friction(&model, &state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].chain, vec![1]);
    }

    #[test]
    fn poly5_matches_hand_derivative() {
        let data = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let (poly, dpoly) = poly5(&data, 2.0);
        assert_eq!(poly, 1.0 + 4.0 + 12.0);
        assert_eq!(dpoly, 2.0 + 12.0);
    }

    #[allow(unused)]
    fn _uses_identity_collaborators(_: &IdentityCollaborators) {}
}
