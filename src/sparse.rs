//! Sparse-index utilities shared by the instantiator and the projector.
//!
//! These correspond to the source's standalone sparse-index routines that sit below
//! `mjData`'s `efc_J` itself: merging two DOF chains into their union (`mj_mergeChain`,
//! `mj_mergeChainSimple`), counting/ materializing the merge of two already-sorted index sets
//! (`mju_combineSparseCount` / `mju_combineSparse`), and computing the row-supernode
//! descriptor used to batch identical-pattern adjacent rows (`efc_J_rowsuper`).

use crate::model::DofModel;
use crate::Num;

/// Walks the DOF parent-chain from `dof` up to the root, returning ids from root to `dof`
/// (ascending index order along the chain, matching `mj_mergeChain`'s convention of walking
/// parents and then reversing).
pub fn dof_chain(dof: &DofModel, mut index: usize) -> Vec<usize> {
    let mut chain = vec![index];
    while let Some(parent) = dof.parentid[index] {
        chain.push(parent);
        index = parent;
    }
    chain.reverse();
    chain
}

/// Union of two already-ascending DOF chains, itself returned in ascending order
/// (`mj_mergeChain`). Both input chains share a root (index 0 of a tree with a single base),
/// so merging degenerates to a sorted-merge of two monotonically increasing sequences with
/// the shared prefix deduplicated.
pub fn merge_chain(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Fast path for two chains known to be nested (one body is a kinematic ancestor of the
/// other): the merge is just the longer chain, since every DOF in the shorter chain is
/// already present in the longer one. Callers decide nestedness via `Model::body::simple`.
pub fn merge_chain_simple(a: &[usize], b: &[usize]) -> Vec<usize> {
    if a.len() >= b.len() {
        a.to_vec()
    } else {
        b.to_vec()
    }
}

/// Number of entries in the union of two sorted, deduplicated index slices, without
/// materializing it (`mju_combineSparseCount`) — used by counting passes that only need
/// `nnzJ`, not the indices themselves.
pub fn combine_sparse_count(a: &[usize], b: &[usize]) -> usize {
    let mut count = 0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
        count += 1;
    }
    count + (a.len() - i) + (b.len() - j)
}

/// Multiplies a sparse row-per-constraint matrix by a dense vector, row by row.
pub fn mul_mat_vec_sparse(rownnz: &[usize], rowadr: &[usize], colind: &[usize], data: &[Num], vec: &[Num]) -> Vec<Num> {
    (0..rownnz.len())
        .map(|r| {
            let start = rowadr[r];
            let end = start + rownnz[r];
            (start..end).map(|k| data[k] * vec[colind[k]]).sum()
        })
        .collect()
}

/// Transposes a sparse row-per-constraint matrix (`nefc x nv`) into column-major CSR
/// (`nv x nefc`), i.e. `efc_J` into `efc_JT` — needed by the sparse projector's fill-in-chain
/// backsubstitution, which walks columns (DOFs) rather than rows (constraints).
pub fn transpose_sparse(
    nv: usize,
    rownnz: &[usize],
    rowadr: &[usize],
    colind: &[usize],
    data: &[Num],
) -> (Vec<usize>, Vec<usize>, Vec<usize>, Vec<Num>) {
    let nefc = rownnz.len();
    let mut col_count = vec![0usize; nv];
    for r in 0..nefc {
        let start = rowadr[r];
        let end = start + rownnz[r];
        for &c in &colind[start..end] {
            col_count[c] += 1;
        }
    }
    let mut t_rowadr = vec![0usize; nv];
    let mut running = 0;
    for c in 0..nv {
        t_rowadr[c] = running;
        running += col_count[c];
    }
    let t_rownnz = col_count.clone();
    let mut cursor = t_rowadr.clone();
    let mut t_colind = vec![0usize; running];
    let mut t_data = vec![0.0; running];
    for r in 0..nefc {
        let start = rowadr[r];
        let end = start + rownnz[r];
        for k in start..end {
            let c = colind[k];
            let pos = cursor[c];
            t_colind[pos] = r;
            t_data[pos] = data[k];
            cursor[c] += 1;
        }
    }
    (t_rownnz, t_rowadr, t_colind, t_data)
}

/// For each row, counts how many immediately-following rows share an identical column
/// pattern (`colind` slice), so an outer vectorized SpMV can batch them. A row with no
/// matching successor has supernode count `1` (itself only).
pub fn compute_rowsuper(rownnz: &[usize], rowadr: &[usize], colind: &[usize]) -> Vec<usize> {
    let n = rownnz.len();
    let mut out = vec![1usize; n];
    for r in (0..n.saturating_sub(1)).rev() {
        let this = &colind[rowadr[r]..rowadr[r] + rownnz[r]];
        let next = &colind[rowadr[r + 1]..rowadr[r + 1] + rownnz[r + 1]];
        if this == next {
            out[r] = out[r + 1] + 1;
        }
    }
    out
}
