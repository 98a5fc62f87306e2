//! Classifies and counts active constraint rows before any Jacobian is built (spec §4.1).
//!
//! Grounded on `mj_ne`, `mj_nf`, `mj_nl`, `mj_nc` and the precount half of `mj_makeConstraint`:
//! this pass only decides *how many* rows of each family will be instantiated (and, for the
//! sparse path, how many Jacobian nonzeros they will need), so the arena can be sized before
//! any row is actually written. Disabled families short-circuit to zero without inspecting
//! their data.

use crate::model::{EqType, JointType, Model};
use crate::rigid_math::normalize3;
use crate::state::State;

/// Row/nonzero counts produced by the classifier, one pass before instantiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub ne: usize,
    pub nf: usize,
    pub nl: usize,
    pub nc: usize,
    /// Only meaningful in sparse mode; dense mode ignores it (`nefc * nv` is implicit).
    pub nnz_j: usize,
}

impl Counts {
    pub fn nefc(&self) -> usize {
        self.ne + self.nf + self.nl + self.nc
    }
}

/// `mj_ne`: one row per active equality, `WELD` contributing six.
pub fn count_equality(model: &Model) -> usize {
    if model.options.disable.equality {
        return 0;
    }
    model
        .equality
        .active
        .iter()
        .zip(&model.equality.eq_type)
        .filter(|(&active, _)| active)
        .map(|(_, ty)| match ty {
            EqType::Connect => 3,
            EqType::Weld => 6,
            EqType::Joint => 1,
            EqType::Tendon => 1,
        })
        .sum()
}

/// `mj_nf`: one row per DOF/tendon with nonzero `frictionloss`.
pub fn count_friction(model: &Model) -> usize {
    if model.options.disable.frictionloss {
        return 0;
    }
    let dof_rows = model.dof.frictionloss.iter().filter(|&&f| f > 0.0).count();
    let tendon_rows = model.tendon.frictionloss.iter().filter(|&&f| f > 0.0).count();
    dof_rows + tendon_rows
}

/// `mj_nl`: joint limits contribute up to two rows for `SLIDE`/`HINGE` (lower and upper bound,
/// checked independently, mirroring the source's `for (side=-1; side<=1; side+=2)` loop), one
/// for `BALL` (the combined angular-deviation row, gated on the same angle/margin check
/// `instantiate_ball_limit` performs), and tendon limits one row each, all gated on the limit
/// actually being violated within `margin`.
pub fn count_limit(model: &Model, state: &State) -> usize {
    if model.options.disable.limit {
        return 0;
    }
    let mut count = 0;
    for j in 0..model.joint.njnt() {
        if !model.joint.limited[j] {
            continue;
        }
        let qpos = state.qpos[model.joint.qposadr[j]];
        let [lo, hi] = model.joint.range[j];
        let margin = model.joint.margin[j];
        match model.joint.jnt_type[j] {
            JointType::Slide | JointType::Hinge => {
                if qpos - lo < margin {
                    count += 1;
                }
                if hi - qpos < margin {
                    count += 1;
                }
            }
            JointType::Ball => {
                let qpos_adr = model.joint.qposadr[j];
                let quat = [state.qpos[qpos_adr], state.qpos[qpos_adr + 1], state.qpos[qpos_adr + 2], state.qpos[qpos_adr + 3]];
                let mut axis = [quat[1], quat[2], quat[3]];
                let sin_a = normalize3(&mut axis);
                let angle = 2.0 * sin_a.atan2(quat[0]);
                if hi - angle.abs() < margin {
                    count += 1;
                }
            }
            JointType::Free => {}
        }
    }
    for t in 0..model.tendon.ntendon() {
        if !model.tendon.limited[t] {
            continue;
        }
        let len = state.ten_length[t];
        let [lo, hi] = model.tendon.range[t];
        let margin = model.tendon.margin[t];
        if len < lo + margin || len > hi - margin {
            count += 1;
        }
    }
    count
}

/// `mj_nc`: one row per non-excluded contact if frictionless, otherwise `dim` rows
/// (elliptic cone) or `1 + 2*(dim-1)` rows (pyramidal cone, sign-paired tangent rows).
pub fn count_contact(model: &Model, state: &State) -> usize {
    if model.options.disable.contact {
        return 0;
    }
    let pyramidal = model.options.cone == crate::model::ConeType::Pyramidal;
    state
        .contact
        .iter()
        .filter(|c| !c.exclude)
        .map(|c| {
            if c.dim == 1 {
                1
            } else if pyramidal {
                1 + 2 * (c.dim - 1)
            } else {
                c.dim
            }
        })
        .sum()
}

/// Runs the full classifier, producing every family's row count. `nnz_j` is left at `0` here;
/// callers building a sparse Jacobian accumulate it alongside instantiation, since it depends
/// on each row's DOF-chain length, which the counter does not compute (only the instantiator
/// walks chains).
pub fn count_all(model: &Model, state: &State) -> Counts {
    Counts {
        ne: count_equality(model),
        nf: count_friction(model),
        nl: count_limit(model, state),
        nc: count_contact(model, state),
        nnz_j: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BodyModel, DofModel, EqualityModel, JointModel, Options, TendonModel};

    fn empty_model() -> Model {
        Model {
            nv: 0,
            body: BodyModel::default(),
            dof: DofModel::default(),
            joint: JointModel::default(),
            tendon: TendonModel::default(),
            equality: EqualityModel::default(),
            options: Options::default(),
        }
    }

    #[test]
    fn disabled_equality_counts_zero() {
        let mut model = empty_model();
        model.equality.eq_type.push(EqType::Weld);
        model.equality.active.push(true);
        model.equality.obj1id.push(0);
        model.equality.obj2id.push(None);
        model.equality.data.push([0.0; 11]);
        model.equality.solref.push([0.02, 1.0]);
        model.equality.solimp.push([0.9, 0.95, 0.001, 0.5, 2.0]);
        assert_eq!(count_equality(&model), 6);
        model.options.disable.equality = true;
        assert_eq!(count_equality(&model), 0);
    }

    #[test]
    fn ball_joint_counts_only_when_angle_within_margin_of_range() {
        let mut model = empty_model();
        model.joint.jnt_type.push(JointType::Ball);
        model.joint.qposadr.push(0);
        model.joint.dofadr.push(0);
        model.joint.limited.push(true);
        model.joint.range.push([0.0, 1.0]);
        model.joint.margin.push(0.0);
        model.joint.solref.push([0.02, 1.0]);
        model.joint.solimp.push([0.9, 0.95, 0.001, 0.5, 2.0]);

        // identity quaternion: zero rotation angle, nowhere near the 1.0 rad limit.
        let mut state = State::default();
        state.qpos = vec![1.0, 0.0, 0.0, 0.0];
        assert_eq!(count_limit(&model, &state), 0);

        // quaternion for a rotation past the limit (angle > 1.0 rad about the x axis).
        let half = 0.6_f64;
        state.qpos = vec![half.cos(), half.sin(), 0.0, 0.0];
        assert_eq!(count_limit(&model, &state), 1);
    }
}
