//! Top-level driver tying every stage together (spec §4, overall pipeline), grounded on
//! `mj_makeConstraint`: precount, allocate, instantiate every family, verify counts against the
//! precount, cook impedance, and compute the reference acceleration. Projection ([`projector`])
//! and force/cost evaluation ([`update`]) are exposed as separate calls since they run inside
//! an outer iterative solver's loop rather than once per step.

use crate::arena::Arena;
use crate::collaborators::{JacobianDifference, MassMatrixBacksolve};
use crate::counter::count_all;
use crate::error::{ConstraintError, Warning};
use crate::impedance::{self, RowImpedance};
use crate::instantiate::{instantiate_contact, instantiate_equality, instantiate_friction, instantiate_limit};
use crate::jacobian::{resolve_mode, ConcreteMode, Jacobian, RowBuilder};
use crate::model::{ConeType, Model};
use crate::projector::{self, DualOperator};
use crate::reference;
use crate::row::RowMeta;
use crate::state::State;
use crate::update::{self, ConstraintUpdate};
use crate::Num;
use tracing::{debug, trace, warn};

/// `mj_isPyramidal`.
pub fn is_pyramidal(model: &Model) -> bool {
    model.options.cone == ConeType::Pyramidal
}

/// `mj_isSparse`, resolving `Auto` via the `nv >= 60` threshold.
pub fn is_sparse(model: &Model) -> bool {
    resolve_mode(model.options.jacobian, model.nv) == ConcreteMode::Sparse
}

/// `mj_isDual`: the dual (projected) formulation is needed for PGS or whenever no-slip
/// post-processing iterations are requested.
pub fn is_dual(model: &Model) -> bool {
    matches!(model.options.solver, crate::model::SolverType::Pgs) || model.options.noslip_iterations > 0
}

/// Non-fatal conditions accumulated while building one step's constraint system.
#[derive(Debug, Clone, Default)]
pub struct StepWarnings(pub Vec<Warning>);

/// The fully-built constraint system for one step: every active row, its committed Jacobian,
/// cooked impedance, and reference acceleration. Ready for [`ConstraintSystem::project`] and
/// [`ConstraintSystem::evaluate`].
#[derive(Debug, Clone)]
pub struct ConstraintSystem {
    pub rows: Vec<RowMeta>,
    pub jacobian: Jacobian,
    pub cooked: Vec<RowImpedance>,
    pub aref: Vec<Num>,
    /// Per-row diagonal estimate of `A`'s diagonal (spec §4.5): seeds each row's `R` before
    /// cooking and is rewritten in place to stay consistent with the cooked `R`/`imp`.
    pub diag_approx: Vec<Num>,
}

impl ConstraintSystem {
    pub fn nefc(&self) -> usize {
        self.rows.len()
    }

    /// `mj_projectConstraint`.
    pub fn project(&self, model: &Model, state: &State, solver: &impl MassMatrixBacksolve) -> Result<DualOperator, ConstraintError> {
        let r_diag: Vec<Num> = self.cooked.iter().map(|c| c.r).collect();
        projector::project(model, state, &self.jacobian, solver, &r_diag)
    }

    /// `mj_constraintUpdate`.
    pub fn evaluate(&self, model: &Model, want_hessian: bool) -> ConstraintUpdate {
        update::evaluate(&self.rows, &self.cooked, &self.aref, &self.jacobian, model.options.cone, want_hessian)
    }
}

/// `mj_makeConstraint`: the top-level per-step driver. Clears the arena, counts every family,
/// instantiates their rows, verifies the instantiated counts against the precount, builds the
/// committed Jacobian, cooks impedance, and computes the reference acceleration.
#[tracing_attributes::instrument(skip_all)]
pub fn make_constraint(
    model: &Model,
    state: &State,
    jac: &impl JacobianDifference,
    arena: &mut Arena,
) -> Result<(ConstraintSystem, StepWarnings), ConstraintError> {
    arena.reset();
    let mut warnings = Vec::new();

    if model.options.disable.constraint {
        debug!("constraint family disabled, skipping step");
        return Ok((empty_system(model), StepWarnings(warnings)));
    }

    let counts = count_all(model, state);
    let nefc = counts.nefc();
    trace!(ne = counts.ne, nf = counts.nf, nl = counts.nl, nc = counts.nc, "counted active rows");
    if nefc == 0 {
        return Ok((empty_system(model), StepWarnings(warnings)));
    }

    if crate::arena::reserve_constraint_or_warn(arena, nefc).is_err() {
        warn!(nefc, "constraint arena full, emptying step's constraint system");
        warnings.push(Warning::ConstraintFull);
        return Ok((empty_system(model), StepWarnings(warnings)));
    }

    let equality = instantiate_equality(model, state, jac);
    let friction = instantiate_friction(model, state);
    let limit = instantiate_limit(model, state);
    let contact = instantiate_contact(model, state, jac);
    trace!("instantiated every constraint family");

    if equality.len() != counts.ne {
        return Err(ConstraintError::EqualityCountMismatch { counted: counts.ne, instantiated: equality.len() });
    }
    if friction.len() != counts.nf {
        return Err(ConstraintError::FrictionCountMismatch { counted: counts.nf, instantiated: friction.len() });
    }
    let instantiated_total = equality.len() + friction.len() + limit.len() + contact.len();
    if instantiated_total != nefc {
        return Err(ConstraintError::RowCountMismatch { counted: nefc, instantiated: instantiated_total });
    }

    let mode = resolve_mode(model.options.jacobian, model.nv);
    let mut rows = Vec::with_capacity(nefc);
    let mut diag_approx = Vec::with_capacity(nefc);

    let mut dense = (mode == ConcreteMode::Dense).then(|| Jacobian::dense_builder(model.nv));
    let mut sparse = (mode == ConcreteMode::Sparse).then(|| Jacobian::sparse_builder(model.nv));

    for instantiated in equality.into_iter().chain(friction).chain(limit).chain(contact) {
        diag_approx.push(instantiated.diag_approx);
        let mut row = RowBuilder::default();
        for (&col, &value) in instantiated.chain.iter().zip(&instantiated.values) {
            row.push(col, value);
        }
        row.sort();
        if let Some(b) = dense.as_mut() {
            b.push_row(&row);
        }
        if let Some(b) = sparse.as_mut() {
            b.push_row(&row);
        }
        rows.push(instantiated.meta);
    }

    let jacobian = match mode {
        ConcreteMode::Dense => dense.unwrap().finish(),
        ConcreteMode::Sparse => sparse.unwrap().finish(),
    };

    let positions: Vec<Num> = rows.iter().map(|r| r.pos).collect();
    let refsafe = !model.options.disable.refsafe;
    let (cooked, impedance_warnings) = impedance::make_impedance(
        &rows,
        &positions,
        &mut diag_approx,
        model.options.timestep,
        refsafe,
        model.options.impratio,
        model.options.cone,
    );
    for w in &impedance_warnings {
        warn!(%w, "row solver parameters rejected");
    }
    warnings.extend(impedance_warnings);

    let vel = reference::constraint_velocity(&jacobian, &state.qvel);
    let aref = reference::reference_acceleration(&positions, &vel, &cooked);
    debug!(nefc, sparse = matches!(mode, ConcreteMode::Sparse), "constraint system ready");

    Ok((
        ConstraintSystem {
            rows,
            jacobian,
            cooked,
            aref,
            diag_approx,
        },
        StepWarnings(warnings),
    ))
}

fn empty_system(model: &Model) -> ConstraintSystem {
    ConstraintSystem {
        rows: Vec::new(),
        jacobian: Jacobian::Dense { nv: model.nv, rows: Vec::new() },
        cooked: Vec::new(),
        aref: Vec::new(),
        diag_approx: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BodyModel, DofModel, JointModel, JointType, Options};
    use crate::testkit::IdentityCollaborators;

    fn single_hinge_model() -> Model {
        let mut model = Model::default();
        model.nv = 1;
        model.dof = DofModel {
            parentid: vec![None],
            madr: vec![0],
            invweight0: vec![1.0],
            frictionloss: vec![0.0],
            solref: vec![[0.02, 1.0]],
            solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
        };
        model.body = BodyModel {
            dofadr: vec![0, 0],
            dofnum: vec![0, 1],
            parentid: vec![0, 0],
            simple: vec![true, true],
            invweight0: vec![[1.0, 1.0], [1.0, 1.0]],
        };
        model.joint = JointModel {
            jnt_type: vec![JointType::Hinge],
            qposadr: vec![0],
            dofadr: vec![0],
            limited: vec![true],
            range: vec![[0.0, 1.0]],
            margin: vec![0.0],
            solref: vec![[0.02, 1.0]],
            solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
        };
        model.options = Options::default();
        model
    }

    #[test]
    fn make_constraint_builds_single_limit_row() {
        let model = single_hinge_model();
        let mut state = State::default();
        state.qpos = vec![1.001];
        state.qvel = vec![0.0];
        let mut arena = Arena::new(1024);
        let (system, warnings) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
        assert_eq!(warnings.0.len(), 0);
        assert_eq!(system.nefc(), 1);
        assert_eq!(system.jacobian.nefc(), 1);
    }

    #[test]
    fn make_constraint_is_empty_when_nothing_active() {
        let model = single_hinge_model();
        let mut state = State::default();
        state.qpos = vec![0.5];
        state.qvel = vec![0.0];
        let mut arena = Arena::new(1024);
        let (system, _) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
        assert_eq!(system.nefc(), 0);
    }
}
