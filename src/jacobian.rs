//! Constraint-Jacobian storage: dense row-major or sparse CSR-per-row (spec §3/§4.3).
//!
//! A single [`Jacobian`] stores every instantiated constraint row, one row per active
//! equality/friction/limit/contact-axis row, `nv` columns. `Dense` rows are a flat `nefc * nv`
//! row-major buffer; `Sparse` rows keep, per row, only the nonzero columns (`colind`) and their
//! values (`data`), plus the `rowadr`/`rownnz` index used to slice into the shared backing
//! vectors, and an optional row-supernode descriptor (`rowsuper`) recording how many
//! *consecutive* rows below a given one share the same column pattern (used by an outer
//! vectorized SpMV, not by this crate).

use crate::error::ConstraintError;
use crate::model::{JacobianMode, AUTO_SPARSE_NV_THRESHOLD};
use crate::Num;

/// Picks the concrete storage mode from the model's requested mode and problem size,
/// resolving `Auto` via the `nv >= 60` threshold (`mj_isSparse`).
pub fn resolve_mode(requested: JacobianMode, nv: usize) -> ConcreteMode {
    match requested {
        JacobianMode::Dense => ConcreteMode::Dense,
        JacobianMode::Sparse => ConcreteMode::Sparse,
        JacobianMode::Auto => {
            if nv >= AUTO_SPARSE_NV_THRESHOLD {
                ConcreteMode::Sparse
            } else {
                ConcreteMode::Dense
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcreteMode {
    Dense,
    Sparse,
}

/// A single row's nonzero pattern and values, used while building a [`Jacobian`] one row at a
/// time before it is committed (dense rows are scattered into the flat buffer, sparse rows are
/// appended to the backing `colind`/`data` vectors).
#[derive(Debug, Clone, Default)]
pub struct RowBuilder {
    pub colind: Vec<usize>,
    pub data: Vec<Num>,
}

impl RowBuilder {
    pub fn push(&mut self, col: usize, value: Num) {
        self.colind.push(col);
        self.data.push(value);
    }

    /// Sorts by column index, matching the invariant the sparse multiply routines assume.
    pub fn sort(&mut self) {
        let mut idx: Vec<usize> = (0..self.colind.len()).collect();
        idx.sort_unstable_by_key(|&i| self.colind[i]);
        let colind: Vec<usize> = idx.iter().map(|&i| self.colind[i]).collect();
        let data: Vec<Num> = idx.iter().map(|&i| self.data[i]).collect();
        self.colind = colind;
        self.data = data;
    }
}

/// The committed constraint Jacobian for one step, `nefc` rows by `nv` columns.
#[derive(Debug, Clone)]
pub enum Jacobian {
    Dense { nv: usize, rows: Vec<Num> },
    Sparse {
        nv: usize,
        rownnz: Vec<usize>,
        rowadr: Vec<usize>,
        colind: Vec<usize>,
        data: Vec<Num>,
        /// For each row, how many rows below it (inclusive) share its exact column pattern.
        rowsuper: Vec<usize>,
    },
}

impl Jacobian {
    pub fn nefc(&self) -> usize {
        match self {
            Jacobian::Dense { rows, nv } => {
                if *nv == 0 {
                    0
                } else {
                    rows.len() / nv
                }
            }
            Jacobian::Sparse { rownnz, .. } => rownnz.len(),
        }
    }

    pub fn nv(&self) -> usize {
        match self {
            Jacobian::Dense { nv, .. } => *nv,
            Jacobian::Sparse { nv, .. } => *nv,
        }
    }

    pub fn dense_builder(nv: usize) -> DenseBuilder {
        DenseBuilder { nv, rows: Vec::new() }
    }

    pub fn sparse_builder(nv: usize) -> SparseBuilder {
        SparseBuilder {
            nv,
            rownnz: Vec::new(),
            rowadr: Vec::new(),
            colind: Vec::new(),
            data: Vec::new(),
        }
    }

    /// `J * vec`, one entry per row.
    pub fn mul_vec(&self, vec: &[Num]) -> Vec<Num> {
        match self {
            Jacobian::Dense { nv, rows } => rows
                .chunks(*nv)
                .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum())
                .collect(),
            Jacobian::Sparse {
                rownnz, rowadr, colind, data, ..
            } => (0..rownnz.len())
                .map(|r| {
                    let start = rowadr[r];
                    let end = start + rownnz[r];
                    (start..end).map(|k| data[k] * vec[colind[k]]).sum()
                })
                .collect(),
        }
    }

    /// `J^T * force`, one entry per column (DOF).
    pub fn mul_t_vec(&self, force: &[Num]) -> Vec<Num> {
        let nv = self.nv();
        let mut out = vec![0.0; nv];
        match self {
            Jacobian::Dense { rows, .. } => {
                for (r, row) in rows.chunks(nv).enumerate() {
                    let f = force[r];
                    if f == 0.0 {
                        continue;
                    }
                    for (c, &value) in row.iter().enumerate() {
                        out[c] += value * f;
                    }
                }
            }
            Jacobian::Sparse {
                rownnz, rowadr, colind, data, ..
            } => {
                for r in 0..rownnz.len() {
                    let f = force[r];
                    if f == 0.0 {
                        continue;
                    }
                    let start = rowadr[r];
                    let end = start + rownnz[r];
                    for k in start..end {
                        out[colind[k]] += data[k] * f;
                    }
                }
            }
        }
        out
    }

    /// Materializes row `r` as a dense `nv`-length vector, regardless of storage mode.
    pub fn row_dense(&self, r: usize) -> Result<Vec<Num>, ConstraintError> {
        let nv = self.nv();
        match self {
            Jacobian::Dense { rows, .. } => {
                let start = r * nv;
                rows.get(start..start + nv)
                    .map(|s| s.to_vec())
                    .ok_or(ConstraintError::ChainIndexOutOfBounds(r, nv))
            }
            Jacobian::Sparse {
                rownnz, rowadr, colind, data, ..
            } => {
                let mut out = vec![0.0; nv];
                let start = *rowadr.get(r).ok_or(ConstraintError::ChainIndexOutOfBounds(r, nv))?;
                let end = start + rownnz[r];
                for k in start..end {
                    out[colind[k]] = data[k];
                }
                Ok(out)
            }
        }
    }
}

pub struct DenseBuilder {
    nv: usize,
    rows: Vec<Num>,
}

impl DenseBuilder {
    pub fn push_row(&mut self, row: &RowBuilder) {
        let mut dense = vec![0.0; self.nv];
        for (&c, &v) in row.colind.iter().zip(&row.data) {
            dense[c] = v;
        }
        self.rows.extend(dense);
    }

    /// Pushes a row already materialized as a dense, `nv`-length slice.
    pub fn push_dense_row(&mut self, row: &[Num]) {
        debug_assert_eq!(row.len(), self.nv);
        self.rows.extend_from_slice(row);
    }

    pub fn finish(self) -> Jacobian {
        Jacobian::Dense { nv: self.nv, rows: self.rows }
    }
}

pub struct SparseBuilder {
    nv: usize,
    rownnz: Vec<usize>,
    rowadr: Vec<usize>,
    colind: Vec<usize>,
    data: Vec<Num>,
}

impl SparseBuilder {
    pub fn push_row(&mut self, row: &RowBuilder) {
        let adr = self.colind.len();
        self.rowadr.push(adr);
        self.rownnz.push(row.colind.len());
        self.colind.extend_from_slice(&row.colind);
        self.data.extend_from_slice(&row.data);
    }

    pub fn finish(self) -> Jacobian {
        let rowsuper = crate::sparse::compute_rowsuper(&self.rownnz, &self.rowadr, &self.colind);
        Jacobian::Sparse {
            nv: self.nv,
            rownnz: self.rownnz,
            rowadr: self.rowadr,
            colind: self.colind,
            data: self.data,
            rowsuper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_resolves_by_nv() {
        assert_eq!(resolve_mode(JacobianMode::Auto, 10), ConcreteMode::Dense);
        assert_eq!(resolve_mode(JacobianMode::Auto, 60), ConcreteMode::Sparse);
        assert_eq!(resolve_mode(JacobianMode::Auto, 59), ConcreteMode::Dense);
    }

    #[test]
    fn dense_and_sparse_mul_vec_agree() {
        let mut dense = Jacobian::dense_builder(3);
        let mut sparse = Jacobian::sparse_builder(3);
        let mut row = RowBuilder::default();
        row.push(0, 1.0);
        row.push(2, 2.0);
        dense.push_row(&row);
        sparse.push_row(&row);
        let dense = dense.finish();
        let sparse = sparse.finish();
        let v = [1.0, 10.0, 3.0];
        assert_eq!(dense.mul_vec(&v), sparse.mul_vec(&v));
    }

    #[test]
    fn mul_t_vec_matches_transpose() {
        let mut dense = Jacobian::dense_builder(2);
        let mut row = RowBuilder::default();
        row.push(1, 4.0);
        dense.push_row(&row);
        let dense = dense.finish();
        assert_eq!(dense.mul_t_vec(&[2.0]), vec![0.0, 8.0]);
    }
}
