//! Cheap diagonal approximation of `A = J M^-1 J^T` (spec §4.5), used as the starting
//! regularization estimate before a row's `solref`/`solimp` are cooked against it.
//!
//! Grounded on `mj_diagApprox`: unlike a generic `Jacobian^2`-weighted sum, the source's table
//! is keyed on *which family* produced a row and draws straight from the `invweight0` of the
//! bodies/dofs/tendons involved, independent of the row's actual Jacobian values. Weld equality
//! rows touch two bodies' worth of rotational weight and keep a running `weldcnt` so the three
//! rotational rows of one weld do not each charge the full rotational inertia.

use crate::model::Model;
use crate::Num;

/// Per-weld scratch state the source keeps as a single static across the whole instantiation
/// pass (`weldcnt`); here it is explicit so the computation stays a pure function of its
/// inputs instead of hidden global state. Fresh per weld equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeldCounter {
    count: usize,
}

impl WeldCounter {
    pub fn new() -> Self {
        WeldCounter::default()
    }

    /// Returns `true` on the first call for a given weld id, `false` on the repeat (rotational
    /// rows 2 and 3 of the same weld).
    fn first_touch(&mut self) -> bool {
        self.count += 1;
        self.count == 1
    }
}

fn tran(model: &Model, body1: usize, body2: usize) -> Num {
    model.body.invweight0[body1][0] + model.body.invweight0[body2][0]
}

fn rot(model: &Model, body1: usize, body2: usize) -> Num {
    model.body.invweight0[body1][1] + model.body.invweight0[body2][1]
}

/// EQ CONNECT: `invw0_trans[b1] + invw0_trans[b2]`, shared by all three position rows.
pub fn diag_approx_connect(model: &Model, body1: usize, body2: usize) -> Num {
    tran(model, body1, body2).max(crate::MINVAL)
}

/// EQ WELD: translational rows always charge `invw0_trans[b1] + invw0_trans[b2]`; the three
/// rotational rows share `invw0_rot[b1] + invw0_rot[b2]`, folded in only on the first of them.
pub fn diag_approx_weld(model: &Model, body1: usize, body2: usize, is_rotational_row: bool, counter: &mut WeldCounter) -> Num {
    if is_rotational_row {
        if counter.first_touch() {
            rot(model, body1, body2).max(crate::MINVAL)
        } else {
            crate::MINVAL
        }
    } else {
        tran(model, body1, body2).max(crate::MINVAL)
    }
}

/// EQ JOINT / EQ TENDON: the driving dof's (or tendon's) own `invweight0`, plus the
/// second object's if the equality couples two.
pub fn diag_approx_eq_dof(model: &Model, dof1: usize, dof2: Option<usize>) -> Num {
    let mut acc = model.dof.invweight0[dof1];
    if let Some(d2) = dof2 {
        acc += model.dof.invweight0[d2];
    }
    acc.max(crate::MINVAL)
}

pub fn diag_approx_eq_tendon(model: &Model, tendon1: usize, tendon2: Option<usize>) -> Num {
    let mut acc = model.tendon.invweight0[tendon1];
    if let Some(t2) = tendon2 {
        acc += model.tendon.invweight0[t2];
    }
    acc.max(crate::MINVAL)
}

/// FRICTION_DOF / LIMIT_JOINT: `dof_invweight0[dof]`.
pub fn diag_approx_dof(model: &Model, dof: usize) -> Num {
    model.dof.invweight0[dof].max(crate::MINVAL)
}

/// FRICTION_TENDON / LIMIT_TENDON: `tendon_invweight0[id]`.
pub fn diag_approx_tendon(model: &Model, tendon: usize) -> Num {
    model.tendon.invweight0[tendon].max(crate::MINVAL)
}

/// CONTACT frictionless: the single normal row charges `tran`.
pub fn diag_approx_contact_frictionless(model: &Model, body1: usize, body2: usize) -> Num {
    tran(model, body1, body2).max(crate::MINVAL)
}

/// CONTACT elliptic: `[tran, tran, tran, rot, rot, rot]`, truncated to `dim` rows (normal,
/// then tangential, then torsional/rolling).
pub fn diag_approx_contact_elliptic(model: &Model, body1: usize, body2: usize, dim: usize) -> Vec<Num> {
    let t = tran(model, body1, body2).max(crate::MINVAL);
    let r = rot(model, body1, body2).max(crate::MINVAL);
    [t, t, t, r, r, r][..dim.min(6)].to_vec()
}

/// CONTACT pyramidal: for each of the `ndir = dim - 1` sign-paired directions `j`, both of its
/// rows charge `tran + friction[j]^2 * (tran if j < 2 else rot)`.
pub fn diag_approx_contact_pyramidal(model: &Model, body1: usize, body2: usize, friction: &[Num], ndir: usize) -> Vec<Num> {
    let t = tran(model, body1, body2);
    let r = rot(model, body1, body2);
    let mut out = Vec::with_capacity(2 * ndir);
    for j in 0..ndir {
        let mu = friction[j];
        let value = (t + mu * mu * (if j < 2 { t } else { r })).max(crate::MINVAL);
        out.push(value);
        out.push(value);
    }
    out
}
