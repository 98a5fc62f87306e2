//! Constraint construction and evaluation core for a rigid-body physics engine.
//!
//! Given a [`model::Model`] (kinematic tree, joints, tendons, equality constraints) and a
//! per-step [`state::State`] (poses, velocities, contacts), this crate classifies and counts
//! the active constraint rows, instantiates their Jacobians and reference accelerations, cooks
//! per-row impedance from `solref`/`solimp`, projects the dual operator `A = J M^-1 J^T + R`,
//! and evaluates the constraint force/cost/Hessian used by an outer solver. The outer
//! iterative solver, collision detection, and integration are all out of scope: this crate
//! only builds and evaluates the constraint system for a single step.

pub mod arena;
pub mod collaborators;
pub mod counter;
pub mod diag_approx;
pub mod error;
pub mod impedance;
pub mod instantiate;
pub mod jacobian;
pub mod model;
pub mod projector;
pub mod reference;
pub mod rigid_math;
pub mod row;
pub mod sparse;
pub mod state;
pub mod system;
pub mod testkit;
pub mod update;

pub use error::{ConstraintError, Warning};
pub use model::Model;
pub use state::State;
pub use system::{ConstraintSystem, StepWarnings};

/// The numeric domain this crate computes in. Fixed at `f64` (the source engine's `mjtNum`):
/// unlike the teacher crate, which is generic over a float backend to support swappable
/// linear-algebra crates, this constraint core always operates on flat `f64` arrays, so the
/// genericity would add a type parameter to every public signature without a second caller to
/// justify it.
pub type Num = f64;

/// Values with magnitude below this are treated as exactly zero (degenerate normalization,
/// near-singular impedance denominators).
pub const MINVAL: Num = 1e-15;

/// Lower clamp for impedance (`imp`/`impP`) values produced by [`impedance`].
pub const MINIMP: Num = 0.0001;

/// Upper clamp for impedance (`imp`/`impP`) values produced by [`impedance`].
pub const MAXIMP: Num = 0.9999;

/// Length of a `solref` vector: `[timeconst, dampratio]` (standard) or `[-stiffness, -damping]`
/// (direct) form.
pub const NREF: usize = 2;

/// Length of a `solimp` vector: `[dmin, dmax, width, midpoint, power]`.
pub const NIMP: usize = 5;

/// Length of an equality constraint's `data` payload.
pub const NEQDATA: usize = 11;
