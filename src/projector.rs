//! Dual-solver projection, `AR = J M^-1 J^T + diag(R)` (spec §4.7).
//!
//! Grounded on `mj_projectConstraint`. The source has separate dense (`solveM2` +
//! `mj_sqrMatTD`) and sparse (manual fill-in-chain backsubstitution over `qLD`) code paths,
//! because in the source the mass-matrix factor itself is only available in one storage
//! layout at a time. Here the factor access is already behind the injected
//! [`MassMatrixBacksolve`] collaborator regardless of `Jacobian` storage mode, so both paths
//! reduce to the same per-row backsolve-then-multiply; `AR` itself is always a dense,
//! `nefc x nefc` matrix, matching `efc_AR`'s actual layout in the source (only `efc_J` is ever
//! sparse in `nv`, never `efc_AR` in `nefc`).

use crate::collaborators::MassMatrixBacksolve;
use crate::error::ConstraintError;
use crate::jacobian::Jacobian;
use crate::model::Model;
use crate::state::State;
use crate::Num;

/// Row-major `nefc x nefc` dual operator.
#[derive(Debug, Clone)]
pub struct DualOperator {
    pub nefc: usize,
    pub data: Vec<Num>,
}

impl DualOperator {
    pub fn row(&self, i: usize) -> &[Num] {
        &self.data[i * self.nefc..(i + 1) * self.nefc]
    }
}

/// Builds `AR` from a committed Jacobian, the injected mass-matrix backsolve, and each row's
/// cooked `R`.
pub fn project(
    model: &Model,
    state: &State,
    jacobian: &Jacobian,
    solver: &impl MassMatrixBacksolve,
    r_diag: &[Num],
) -> Result<DualOperator, ConstraintError> {
    let nefc = jacobian.nefc();
    if r_diag.len() != nefc {
        return Err(ConstraintError::RowCountMismatch {
            counted: r_diag.len(),
            instantiated: nefc,
        });
    }
    let mut data = vec![0.0; nefc * nefc];
    for i in 0..nefc {
        let row_i = jacobian.row_dense(i)?;
        let y_i = solver.solve_m(model, state, &row_i);
        let ar_row = jacobian.mul_vec(&y_i);
        data[i * nefc..(i + 1) * nefc].copy_from_slice(&ar_row);
    }
    for i in 0..nefc {
        data[i * nefc + i] += r_diag[i];
    }
    Ok(DualOperator { nefc, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::{Jacobian, RowBuilder};
    use crate::model::{BodyModel, DofModel};
    use crate::testkit::IdentityCollaborators;

    #[test]
    fn identity_mass_gives_symmetric_gram_matrix() {
        let mut model = Model::default();
        model.nv = 2;
        model.dof = DofModel {
            parentid: vec![None, None],
            madr: vec![0, 1],
            invweight0: vec![1.0, 1.0],
            frictionloss: vec![0.0, 0.0],
            solref: vec![[0.02, 1.0]; 2],
            solimp: vec![[0.9, 0.95, 0.001, 0.5, 2.0]; 2],
        };
        model.body = BodyModel {
            dofadr: vec![0],
            dofnum: vec![2],
            parentid: vec![0],
            simple: vec![true],
            invweight0: vec![[1.0, 1.0]],
        };
        let state = State::default();

        let mut builder = Jacobian::dense_builder(2);
        let mut row0 = RowBuilder::default();
        row0.push(0, 1.0);
        let mut row1 = RowBuilder::default();
        row1.push(1, 1.0);
        builder.push_row(&row0);
        builder.push_row(&row1);
        let jacobian = builder.finish();

        let ar = project(&model, &state, &jacobian, &IdentityCollaborators, &[0.1, 0.1]).unwrap();
        assert_eq!(ar.row(0)[0], 1.1);
        assert_eq!(ar.row(0)[1], 0.0);
        assert_eq!(ar.row(1)[1], 1.1);
    }
}
