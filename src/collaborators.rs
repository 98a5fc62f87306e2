//! External collaborators this crate depends on but does not implement itself (spec §6,
//! "External interfaces").
//!
//! Forward kinematics derivatives and the mass-matrix factorization both live upstream of the
//! constraint core in a full engine; this crate only consumes their results through these two
//! traits, the same way the teacher crate injects a swappable backend behind `Rigid`/`Forward`.
//! [`crate::testkit`] provides reference implementations for tests.

use crate::model::Model;
use crate::state::State;
use crate::Num;

/// Computes the Jacobian of the difference between two body-fixed points with respect to
/// `qvel`, restricted to the union of the two bodies' DOF chains (`jacDifPair` /
/// `mj_mergeChain`'s caller). Returns the chain (ascending DOF indices) and a `3 x chain.len()`
/// row-major matrix, one column per chain entry, in the same order as the chain.
pub trait JacobianDifference {
    fn jac_dif_pair(
        &self,
        model: &Model,
        state: &State,
        body1: usize,
        pos1: [Num; 3],
        body2: usize,
        pos2: [Num; 3],
    ) -> (Vec<usize>, Vec<Num>);

    /// Translational and rotational Jacobian of a single body at a body-fixed point (`mj_jac`),
    /// restricted to that body's DOF chain: row-major `3 x chain.len()` each. `WELD` equality
    /// rows need both the point Jacobian and the rotational Jacobian of each body directly,
    /// rather than only their difference.
    fn jac_body(&self, model: &Model, state: &State, body: usize, pos: [Num; 3]) -> (Vec<usize>, Vec<Num>, Vec<Num>);
}

/// Backsolves the factored joint-space mass matrix, `M^{-1} * rhs` (`solveM2` /
/// `mj_solveM2`), used by the dense projector to form `J M^{-1} J^T`.
pub trait MassMatrixBacksolve {
    fn solve_m(&self, model: &Model, state: &State, rhs: &[Num]) -> Vec<Num>;
}
