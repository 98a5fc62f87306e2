//! Per-step dynamic state consumed by the constraint pipeline (spec §3, "State"/"Data").
//!
//! Everything here is produced upstream (forward kinematics, collision detection, the mass
//! matrix factorization) and is read-only from this crate's point of view; this crate only
//! appends to `contact` via [`crate::arena`] bookkeeping and writes `qfrc_constraint` at the
//! end of [`crate::update`].

use crate::rigid_math::{Mat3, Quat};
use crate::Num;

/// Sparse tendon-Jacobian row: one row per tendon, `nv` columns.
#[derive(Debug, Clone, Default)]
pub struct TendonJacobian {
    pub rownnz: Vec<usize>,
    pub rowadr: Vec<usize>,
    pub colind: Vec<usize>,
    pub data: Vec<Num>,
}

impl TendonJacobian {
    /// Materializes tendon `t`'s row as a dense `nv`-length vector.
    pub fn row_dense(&self, t: usize, nv: usize) -> Vec<Num> {
        let mut out = vec![0.0; nv];
        let start = self.rowadr[t];
        let end = start + self.rownnz[t];
        for k in start..end {
            out[self.colind[k]] = self.data[k];
        }
        out
    }
}

/// Sparse Cholesky-like factor of the joint-space mass matrix, `M = L D L^T` with `L` unit
/// lower-triangular stored implicitly via `dof_parentid`. Used by the sparse projector's
/// fill-in-chain back-substitution (`mj_projectConstraint`'s sparse branch).
#[derive(Debug, Clone, Default)]
pub struct MassFactor {
    /// Off-diagonal `L` entries, addressed via `Model::dof::madr`.
    pub ld: Vec<Num>,
    /// `1 / sqrt(D_ii)` per DOF.
    pub ld_diag_sqrt_inv: Vec<Num>,
}

/// A single active contact (spec §3, "Contact"). Populated by upstream collision detection;
/// this crate only reads it (plus writes `efc_address` once the contact's rows are
/// instantiated) and optionally fills `cone_hessian` during [`crate::update`].
#[derive(Debug, Clone)]
pub struct Contact {
    pub geom1: usize,
    pub geom2: usize,
    /// `1` (frictionless), `3` (frictional, no torsion/rolling), `4`, or `6`.
    pub dim: usize,
    /// `[sliding, sliding, torsional, rolling, rolling]`, only the first `dim - 1` entries
    /// meaningful.
    pub friction: [Num; 5],
    pub solref: [Num; 2],
    pub solreffriction: [Num; 2],
    pub solimp: [Num; 5],
    /// Contact frame, row 0 is the normal, rows 1-2 the tangent basis.
    pub frame: Mat3,
    pub pos: Num,
    pub dist: Num,
    pub includemargin: Num,
    pub exclude: bool,
    /// First row's address in the committed Jacobian, filled in by the instantiator.
    pub efc_address: Option<usize>,
    /// `dim x dim` cone Hessian, only populated for elliptic contacts that request it.
    pub cone_hessian: Option<Vec<Num>>,
}

/// Per-step dynamic state.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub qpos: Vec<Num>,
    pub qvel: Vec<Num>,
    pub xpos: Vec<[Num; 3]>,
    pub xquat: Vec<Quat>,
    pub xmat: Vec<Mat3>,
    pub ten_length: Vec<Num>,
    pub ten_jacobian: TendonJacobian,
    pub mass_factor: MassFactor,
    pub contact: Vec<Contact>,
    /// `J^T * force` from the most recent [`crate::update`] pass, `nv` entries.
    pub qfrc_constraint: Vec<Num>,
}

impl State {
    pub fn body_velocity(&self, dofadr: usize, dofnum: usize) -> &[Num] {
        &self.qvel[dofadr..dofadr + dofnum]
    }
}
