//! The read-only kinematic and parametric description of a mechanism (spec §3, "Model").
//!
//! Mirrors the field groups of `mjModel` closely enough to ground every formula in
//! `engine_core_constraint.c`, but organizes them the way the teacher groups per-entity
//! model data into small structs instead of one flat struct with `_adr`-suffixed arrays.

use crate::Num;

/// Joint kinematic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    Slide,
    Hinge,
    Ball,
    Free,
}

/// Equality-constraint kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqType {
    Connect,
    Weld,
    Joint,
    Tendon,
}

/// Friction-cone linearization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConeType {
    #[default]
    Pyramidal,
    Elliptic,
}

/// Constraint-Jacobian storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JacobianMode {
    Dense,
    Sparse,
    #[default]
    Auto,
}

/// Selects whether the primal or dual solver family is in use; only used to decide whether
/// the dual projection (`AR`) is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverType {
    #[default]
    Pgs,
    Cg,
    Newton,
}

/// `nv >= 60` is the AUTO threshold for switching a Jacobian to sparse storage.
pub const AUTO_SPARSE_NV_THRESHOLD: usize = 60;

/// Per-body kinematic tree data.
#[derive(Debug, Clone, Default)]
pub struct BodyModel {
    /// Address of the first DOF owned by each body.
    pub dofadr: Vec<usize>,
    /// Number of DOFs owned by each body.
    pub dofnum: Vec<usize>,
    /// Parent body id.
    pub parentid: Vec<usize>,
    /// Whether a body has a "simple" (single-joint, directly-nested) kinematic tree,
    /// enabling the cheaper `merge_chain_simple` path.
    pub simple: Vec<bool>,
    /// `[translational, rotational]` inverse-inertia-at-reference-configuration per body.
    pub invweight0: Vec<[Num; 2]>,
}

impl BodyModel {
    pub fn nbody(&self) -> usize {
        self.dofadr.len()
    }
}

/// Per-DOF data.
#[derive(Debug, Clone, Default)]
pub struct DofModel {
    /// Parent DOF id in the kinematic tree, `None` at the root of a chain.
    pub parentid: Vec<Option<usize>>,
    /// Address into the mass-matrix factor storage (used by the sparse projector).
    pub madr: Vec<usize>,
    pub invweight0: Vec<Num>,
    pub frictionloss: Vec<Num>,
    pub solref: Vec<[Num; 2]>,
    pub solimp: Vec<[Num; 5]>,
}

impl DofModel {
    pub fn nv(&self) -> usize {
        self.parentid.len()
    }
}

/// Per-joint data.
#[derive(Debug, Clone, Default)]
pub struct JointModel {
    pub jnt_type: Vec<JointType>,
    pub qposadr: Vec<usize>,
    pub dofadr: Vec<usize>,
    pub limited: Vec<bool>,
    pub range: Vec<[Num; 2]>,
    pub margin: Vec<Num>,
    pub solref: Vec<[Num; 2]>,
    pub solimp: Vec<[Num; 5]>,
}

impl JointModel {
    pub fn njnt(&self) -> usize {
        self.jnt_type.len()
    }
}

/// Per-tendon data.
#[derive(Debug, Clone, Default)]
pub struct TendonModel {
    pub limited: Vec<bool>,
    pub range: Vec<[Num; 2]>,
    pub margin: Vec<Num>,
    pub frictionloss: Vec<Num>,
    pub solref_lim: Vec<[Num; 2]>,
    pub solimp_lim: Vec<[Num; 5]>,
    pub solref_fri: Vec<[Num; 2]>,
    pub solimp_fri: Vec<[Num; 5]>,
    pub invweight0: Vec<Num>,
    pub length0: Vec<Num>,
}

impl TendonModel {
    pub fn ntendon(&self) -> usize {
        self.limited.len()
    }
}

/// 11-slot equality-constraint payload: anchor/polynomial coefficients (`CONNECT`/`JOINT`/
/// `TENDON`) or relative pose + torquescale (`WELD`).
pub type EqData = [Num; 11];

/// Per-equality-constraint data.
#[derive(Debug, Clone, Default)]
pub struct EqualityModel {
    pub eq_type: Vec<EqType>,
    pub obj1id: Vec<usize>,
    /// `None` for single-object `JOINT`/`TENDON` equalities.
    pub obj2id: Vec<Option<usize>>,
    pub active: Vec<bool>,
    pub data: Vec<EqData>,
    pub solref: Vec<[Num; 2]>,
    pub solimp: Vec<[Num; 5]>,
}

impl EqualityModel {
    pub fn neq(&self) -> usize {
        self.eq_type.len()
    }
}

/// Feature-disable mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableFlags {
    pub constraint: bool,
    pub equality: bool,
    pub frictionloss: bool,
    pub limit: bool,
    pub contact: bool,
    pub refsafe: bool,
}

/// Feature-enable mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnableFlags {
    pub override_: bool,
}

/// Global solver/stepping options.
#[derive(Debug, Clone)]
pub struct Options {
    pub cone: ConeType,
    pub jacobian: JacobianMode,
    pub solver: SolverType,
    pub noslip_iterations: usize,
    pub timestep: Num,
    pub impratio: Num,
    pub o_solref: [Num; 2],
    pub o_solimp: [Num; 5],
    pub o_margin: Num,
    pub disable: DisableFlags,
    pub enable: EnableFlags,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cone: ConeType::default(),
            jacobian: JacobianMode::default(),
            solver: SolverType::default(),
            noslip_iterations: 0,
            timestep: 0.002,
            impratio: 1.0,
            o_solref: crate::impedance::DEFAULT_SOLREF,
            o_solimp: crate::impedance::DEFAULT_SOLIMP,
            o_margin: 0.0,
            disable: DisableFlags::default(),
            enable: EnableFlags::default(),
        }
    }
}

/// The read-only, per-simulation kinematic/parametric description.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub nv: usize,
    pub body: BodyModel,
    pub dof: DofModel,
    pub joint: JointModel,
    pub tendon: TendonModel,
    pub equality: EqualityModel,
    pub options: Options,
}
