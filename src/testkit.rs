//! Reference collaborator implementations used by this crate's own tests and available to
//! downstream integration tests (spec §6 names the collaborators; this crate does not ship a
//! production implementation of either, mirroring the teacher's `dummy.rs` test-only `Rigid`).
//!
//! [`IdentityCollaborators`] treats every body's local frame as coincident with the world
//! frame and every joint as a world-aligned translational DOF, so `jac_dif_pair`/`jac_body`
//! degenerate to picking out `+1`/`-1` entries at each body's own DOF range. This is enough to
//! exercise the row-instantiation and projector math without a real kinematic tree.

use crate::collaborators::{JacobianDifference, MassMatrixBacksolve};
use crate::model::Model;
use crate::state::State;
use crate::Num;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCollaborators;

impl JacobianDifference for IdentityCollaborators {
    fn jac_dif_pair(
        &self,
        model: &Model,
        _state: &State,
        body1: usize,
        _pos1: [Num; 3],
        body2: usize,
        _pos2: [Num; 3],
    ) -> (Vec<usize>, Vec<Num>) {
        let chain1 = body_dof_range(model, body1);
        let chain2 = body_dof_range(model, body2);
        let merged = crate::sparse::merge_chain(&chain1, &chain2);
        let mut values = vec![0.0; 3 * merged.len()];
        for axis in 0..3 {
            if let Some(&d) = chain1.get(axis) {
                if let Ok(p) = merged.binary_search(&d) {
                    values[axis * merged.len() + p] += 1.0;
                }
            }
            if let Some(&d) = chain2.get(axis) {
                if let Ok(p) = merged.binary_search(&d) {
                    values[axis * merged.len() + p] -= 1.0;
                }
            }
        }
        (merged, values)
    }

    fn jac_body(&self, model: &Model, _state: &State, body: usize, _pos: [Num; 3]) -> (Vec<usize>, Vec<Num>, Vec<Num>) {
        let chain = body_dof_range(model, body);
        let mut jacp = vec![0.0; 3 * chain.len()];
        for axis in 0..3.min(chain.len()) {
            jacp[axis * chain.len() + axis] = 1.0;
        }
        let jacr = vec![0.0; 3 * chain.len()];
        (chain, jacp, jacr)
    }
}

impl MassMatrixBacksolve for IdentityCollaborators {
    fn solve_m(&self, model: &Model, _state: &State, rhs: &[Num]) -> Vec<Num> {
        rhs.iter()
            .enumerate()
            .map(|(d, &v)| v * model.dof.invweight0.get(d).copied().unwrap_or(1.0))
            .collect()
    }
}

fn body_dof_range(model: &Model, body: usize) -> Vec<usize> {
    let adr = model.body.dofadr[body];
    let n = model.body.dofnum[body];
    (adr..adr + n).collect()
}
