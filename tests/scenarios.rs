//! End-to-end scenario and parity tests for the constraint pipeline.

use approx::assert_abs_diff_eq;
use rbd_constraint::arena::Arena;
use rbd_constraint::model::{BodyModel, ConeType, DofModel, EqType, EqualityModel, JacobianMode, JointModel, JointType, Model, Options};
use rbd_constraint::state::{Contact, State};
use rbd_constraint::system::make_constraint;
use rbd_constraint::testkit::IdentityCollaborators;

fn base_model(nv: usize) -> Model {
    let mut model = Model::default();
    model.nv = nv;
    model.options = Options::default();
    model
}

/// A single hinge joint, pushed past its upper range — exactly one limit row should appear,
/// and its force (one-sided by construction) must never pull the joint further out of range.
#[test]
fn pendulum_hinge_hits_upper_limit() {
    let mut model = base_model(1);
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
        range: vec![[-1.0, 1.0]],
        margin: vec![0.0],
        solref: vec![[0.02, 1.0]],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
    };

    let mut state = State::default();
    state.qpos = vec![1.001];
    state.qvel = vec![0.2];
    let mut arena = Arena::new(256);

    let (system, warnings) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
    assert!(warnings.0.is_empty());
    assert_eq!(system.nefc(), 1);

    let update = system.evaluate(&model, false);
    assert!(update.force[0] >= 0.0, "limit force must push, never pull");
}

/// A two-body CONNECT equality: the three position rows must reproduce the world-space anchor
/// offset exactly (`IdentityCollaborators` treats each body's own DOF range as world-aligned).
#[test]
fn connect_equality_reports_anchor_offset() {
    let mut model = base_model(6);
    model.dof = DofModel {
        parentid: vec![None, Some(0), Some(1), None, Some(3), Some(4)],
        madr: (0..6).collect(),
        invweight0: vec![1.0; 6],
        frictionloss: vec![0.0; 6],
        solref: vec![[0.02, 1.0]; 6],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]; 6],
    };
    model.body = BodyModel {
        dofadr: vec![0, 3],
        dofnum: vec![3, 3],
        parentid: vec![0, 0],
        simple: vec![true, true],
        invweight0: vec![[1.0, 1.0], [1.0, 1.0]],
    };
    model.equality = EqualityModel {
        eq_type: vec![EqType::Connect],
        obj1id: vec![0],
        obj2id: vec![Some(1)],
        active: vec![true],
        data: vec![{
            let mut d = [0.0; 11];
            d[0] = 0.0;
            d
        }],
        solref: vec![[0.02, 1.0]],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
    };

    let mut state = State::default();
    state.qpos = vec![0.0; 6];
    state.qvel = vec![0.0; 6];
    state.xpos = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
    state.xmat = vec![
        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    ];
    state.xquat = vec![[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]];

    let mut arena = Arena::new(256);
    let (system, _) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
    assert_eq!(system.nefc(), 3);
    assert_abs_diff_eq!(system.rows[0].pos, -1.0);
    assert_abs_diff_eq!(system.rows[1].pos, 0.0);
    assert_abs_diff_eq!(system.rows[2].pos, 0.0);
}

fn contact_model(nv: usize, cone: ConeType) -> Model {
    let mut model = base_model(nv);
    model.options.cone = cone;
    model.body = BodyModel {
        dofadr: vec![0, 3],
        dofnum: vec![3, 3],
        parentid: vec![0, 0],
        simple: vec![true, true],
        invweight0: vec![[1.0, 1.0], [1.0, 1.0]],
    };
    model.dof = DofModel {
        parentid: vec![None, Some(0), Some(1), None, Some(3), Some(4)],
        madr: (0..6).collect(),
        invweight0: vec![1.0; 6],
        frictionloss: vec![0.0; 6],
        solref: vec![[0.02, 1.0]; 6],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]; 6],
    };
    model
}

fn penetrating_contact(dim: usize) -> Contact {
    Contact {
        geom1: 0,
        geom2: 1,
        dim,
        friction: [1.0, 1.0, 0.005, 0.0001, 0.0001],
        solref: [0.02, 1.0],
        solreffriction: [0.02, 1.0],
        solimp: [0.9, 0.95, 0.001, 0.5, 2.0],
        frame: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        pos: 0.0,
        dist: -0.01,
        includemargin: 0.0,
        exclude: false,
        efc_address: None,
        cone_hessian: None,
    }
}

/// Pyramidal friction cone, `dim = 3`: one normal direction produces `1 + 2*2 = 5` rows.
#[test]
fn pyramidal_contact_produces_sign_paired_rows() {
    let model = contact_model(6, ConeType::Pyramidal);
    let mut state = State::default();
    state.qpos = vec![0.0; 6];
    state.qvel = vec![0.0; 6];
    state.xpos = vec![[0.0, 0.0, 0.0], [0.0, 0.0, -0.01]];
    state.xmat = vec![[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]; 2];
    state.xquat = vec![[1.0, 0.0, 0.0, 0.0]; 2];
    state.contact = vec![penetrating_contact(3)];

    let mut arena = Arena::new(256);
    let (system, _) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
    assert_eq!(system.nefc(), 5);
}

/// Elliptic friction cone: two bodies closing along the contact normal with no tangential
/// relative motion stay inside the friction cone (sticking), so only the normal row carries
/// force and the tangential rows stay at zero.
#[test]
fn elliptic_contact_normal_only_when_no_sliding() {
    let model = contact_model(6, ConeType::Elliptic);
    let mut state = State::default();
    state.qpos = vec![0.0; 6];
    state.qvel = vec![0.3, 0.0, 0.0, 0.0, 0.0, 0.0];
    state.xpos = vec![[0.0, 0.0, 0.0], [0.0, 0.0, -0.01]];
    state.xmat = vec![[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]; 2];
    state.xquat = vec![[1.0, 0.0, 0.0, 0.0]; 2];
    let mut contact = penetrating_contact(3);
    contact.dist = 0.0;
    state.contact = vec![contact];

    let mut arena = Arena::new(256);
    let (system, _) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
    assert_eq!(system.nefc(), 3);

    let update = system.evaluate(&model, false);
    assert!(update.force[0] > 0.0, "closing velocity against a touching contact must push back");
    assert_abs_diff_eq!(update.force[1], 0.0);
    assert_abs_diff_eq!(update.force[2], 0.0);
}

/// A DOF with a small Coulomb friction limit is easily overwhelmed by a default-stiffness
/// reference acceleration: the row saturates at `frictionloss` rather than floating free.
#[test]
fn frictional_dof_saturates_at_coulomb_limit() {
    let mut model = base_model(1);
    model.dof = DofModel {
        parentid: vec![None],
        madr: vec![0],
        invweight0: vec![1.0],
        frictionloss: vec![0.5],
        solref: vec![[0.02, 1.0]],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
    };
    model.body = BodyModel {
        dofadr: vec![0],
        dofnum: vec![1],
        parentid: vec![0],
        simple: vec![true],
        invweight0: vec![[1.0, 1.0]],
    };

    let mut state = State::default();
    state.qpos = vec![0.0];
    state.qvel = vec![0.01];
    let mut arena = Arena::new(256);
    let (system, _) = make_constraint(&model, &state, &IdentityCollaborators, &mut arena).unwrap();
    assert_eq!(system.nefc(), 1);

    let update = system.evaluate(&model, false);
    assert_abs_diff_eq!(update.force[0], 0.5);
}

/// Dense and sparse Jacobian storage must agree on every constraint-space quantity for the
/// same model/state, differing only in how `J` is stored.
#[test]
fn dense_and_sparse_jacobian_modes_agree() {
    let mut dense_model = base_model(1);
    dense_model.options.jacobian = JacobianMode::Dense;
    dense_model.dof = DofModel {
        parentid: vec![None],
        madr: vec![0],
        invweight0: vec![1.0],
        frictionloss: vec![0.0],
        solref: vec![[0.02, 1.0]],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
    };
    dense_model.body = BodyModel {
        dofadr: vec![0, 0],
        dofnum: vec![0, 1],
        parentid: vec![0, 0],
        simple: vec![true, true],
        invweight0: vec![[1.0, 1.0], [1.0, 1.0]],
    };
    dense_model.joint = JointModel {
        jnt_type: vec![JointType::Slide],
        qposadr: vec![0],
        dofadr: vec![0],
        limited: vec![true],
        range: vec![[-1.0, 1.0]],
        margin: vec![0.0],
        solref: vec![[0.02, 1.0]],
        solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]],
    };
    let mut sparse_model = dense_model.clone();
    sparse_model.options.jacobian = JacobianMode::Sparse;

    let mut state = State::default();
    state.qpos = vec![1.001];
    state.qvel = vec![0.1];

    let mut dense_arena = Arena::new(256);
    let mut sparse_arena = Arena::new(256);
    let (dense_system, _) = make_constraint(&dense_model, &state, &IdentityCollaborators, &mut dense_arena).unwrap();
    let (sparse_system, _) = make_constraint(&sparse_model, &state, &IdentityCollaborators, &mut sparse_arena).unwrap();

    assert_eq!(dense_system.aref, sparse_system.aref);
    let dense_update = dense_system.evaluate(&dense_model, false);
    let sparse_update = sparse_system.evaluate(&sparse_model, false);
    assert_eq!(dense_update.force, sparse_update.force);
    assert_eq!(dense_update.qfrc_constraint, sparse_update.qfrc_constraint);
}
