//! Solver-reference/impedance cooking (spec §4.6): turns a row's `solref`/`solimp` pair into
//! the `(K, B, I, P, R, D)` sextuple the reference computer and updater consume.
//!
//! Grounded on the source's three static helpers `getsolparam`, `getposdim` (folded into
//! [`crate::row::RowMeta`] upstream, so not reproduced here), and `getimpedance`, plus the
//! driver `mj_makeImpedance`.

use crate::model::ConeType;
use crate::row::{ConeShape, ConstraintRowKind, RowMeta};
use crate::{error::Warning, Num, MAXIMP, MINIMP, MINVAL, NIMP, NREF};

/// Fallback used whenever a row's `solref` is rejected (mixed-sign direct form).
pub const DEFAULT_SOLREF: [Num; NREF] = [0.02, 1.0];
/// Fallback used whenever a row's `solimp` would otherwise be left unset.
pub const DEFAULT_SOLIMP: [Num; NIMP] = [0.9, 0.95, 0.001, 0.5, 2.0];

/// Validated solver-reference parameters for one row, after `getsolparam`'s checks.
#[derive(Debug, Clone, Copy)]
pub struct SolParam {
    pub solref: [Num; NREF],
    /// Validated `solreffriction`; `[0.0, 0.0]` means "unset", not an override.
    pub solreffriction: [Num; NREF],
    pub solimp: [Num; NIMP],
}

/// Validates and clamps `solref`: both entries positive is the standard `(timeconst,
/// dampratio)` form (clamped against `refsafe` below the minimum, `2 * timestep`, unless
/// disabled); both negative is the direct `(-stiffness, -damping)` form and passes through
/// unchanged; mixed sign is invalid and replaced with [`DEFAULT_SOLREF`], emitting a warning.
/// `solreffriction` goes through the same standard/direct classification, except `[0.0, 0.0]`
/// (unset) passes through untouched and a mixed-sign pair is replaced with zero rather than a
/// default, per `mj_makeImpedance`'s "unset means fall back to solref" convention.
pub fn getsolparam(solref: [Num; NREF], solreffriction: [Num; NREF], solimp: [Num; NIMP], timestep: Num, refsafe: bool) -> (SolParam, Vec<Warning>) {
    let mut warnings = Vec::new();

    let solref = validate_standard_or_direct(solref, timestep, refsafe).unwrap_or_else(|| {
        warnings.push(Warning::BadSolRef);
        DEFAULT_SOLREF
    });

    let solreffriction = if solreffriction == [0.0, 0.0] {
        solreffriction
    } else {
        validate_standard_or_direct(solreffriction, timestep, refsafe).unwrap_or_else(|| {
            warnings.push(Warning::BadSolRefFriction);
            [0.0, 0.0]
        })
    };

    let solimp = [
        solimp[0].clamp(MINIMP, MAXIMP),
        solimp[1].clamp(MINIMP, MAXIMP),
        solimp[2].max(MINVAL),
        solimp[3],
        solimp[4].max(1.0),
    ];

    (SolParam { solref, solreffriction, solimp }, warnings)
}

/// `None` if `ref_[0]`/`ref_[1]` have mixed sign (invalid); otherwise the standard form
/// (refsafe-clamped) or the direct form, passed through unchanged.
fn validate_standard_or_direct(ref_: [Num; NREF], timestep: Num, refsafe: bool) -> Option<[Num; NREF]> {
    let (a, b) = (ref_[0], ref_[1]);
    if a > 0.0 && b > 0.0 {
        let min_timeconst = 2.0 * timestep;
        let a = if refsafe && a < min_timeconst { min_timeconst } else { a };
        Some([a, b])
    } else if a < 0.0 && b < 0.0 {
        Some(ref_)
    } else {
        None
    }
}

/// The sigmoid mapping `(pos, solimp) -> (imp, impP)` (`getimpedance`). `imp` is the
/// impedance at `|pos|`, `impP` its derivative scaled for the linear blend the updater uses.
///
/// Four branches over `width = solimp[2]`-relative position: flat (`|pos| <= dmin`-adjacent
/// saturation at one end), the power-law transition through the midpoint, and the opposite
/// flat saturation. `power` must be `>= 1`; `power == 1` degenerates to a clamped linear ramp.
pub fn getimpedance(pos: Num, solimp: [Num; NIMP]) -> (Num, Num) {
    let (dmin, dmax, width, midpoint, power) = (solimp[0], solimp[1], solimp[2], solimp[3], solimp[4]);
    if width < MINVAL {
        return (dmid_clamped(dmin, dmax), 0.0);
    }
    let x = (pos.abs() / width).clamp(0.0, 1.0);
    let (imp, dimp_dx) = if x < midpoint {
        let a = midpoint.max(MINVAL);
        let y = x / a;
        let pw = y.powf(power);
        (dmin + (dmid_clamped(dmin, dmax) - dmin) * pw, (dmid_clamped(dmin, dmax) - dmin) * power * y.powf(power - 1.0) / a)
    } else {
        let a = (1.0 - midpoint).max(MINVAL);
        let y = (1.0 - x) / a;
        let pw = y.powf(power);
        (dmax + (dmid_clamped(dmin, dmax) - dmax) * pw, -(dmid_clamped(dmin, dmax) - dmax) * power * y.powf(power - 1.0) / a)
    };
    let imp = imp.clamp(MINIMP, MAXIMP);
    // scale derivative w.r.t. raw pos, not the normalized x, and fold in the sign of pos.
    let dimp_dpos = dimp_dx / width * pos.signum();
    (imp, dimp_dpos)
}

fn dmid_clamped(dmin: Num, dmax: Num) -> Num {
    0.5 * (dmin + dmax)
}

/// Per-row cooked coefficients.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowImpedance {
    pub k: Num,
    pub b: Num,
    pub imp: Num,
    pub p: Num,
    pub r: Num,
    pub d: Num,
}

/// `true` for rows whose stiffness the source forces to zero regardless of `solref`: DOF/tendon
/// friction-loss rows, and the tangential/torsional rows (`axis > 0`) of an elliptic contact.
fn is_zero_k_row(kind: &ConstraintRowKind) -> bool {
    matches!(kind, ConstraintRowKind::Friction { .. }) || is_tangential_elliptic(kind)
}

fn is_tangential_elliptic(kind: &ConstraintRowKind) -> bool {
    matches!(kind, ConstraintRowKind::Contact { axis, cone: ConeShape::Elliptic, .. } if *axis > 0)
}

/// Turns validated `solref`/`solimp` into stiffness/damping/impedance/position-impedance
/// (`K, B, imp, impP`), following `mj_makeImpedance`'s per-row loop: `K` is forced to zero for
/// friction and tangential elliptic-contact rows, otherwise standard or direct form using
/// `solimp[1]` (`dmax`), never `dampratio`; `B` is independently standard-or-direct on the same
/// effective reference.
pub fn make_kbip(pos: Num, param: SolParam, zero_k: bool, use_solreffriction: bool) -> RowImpedance {
    let (imp, imp_p) = getimpedance(pos, param.solimp);
    let dmax = param.solimp[1];
    let ref_ = if use_solreffriction { param.solreffriction } else { param.solref };

    let k = if zero_k {
        0.0
    } else if ref_[0] > 0.0 {
        1.0 / (dmax * dmax * ref_[0] * ref_[0] * ref_[1] * ref_[1]).max(MINVAL)
    } else {
        -ref_[0] / (dmax * dmax).max(MINVAL)
    };

    let b = if ref_[1] > 0.0 {
        2.0 / (dmax * ref_[0]).max(MINVAL)
    } else {
        -ref_[1] / dmax.max(MINVAL)
    };

    RowImpedance {
        k,
        b,
        imp,
        p: imp_p,
        r: 0.0,
        d: 0.0,
    }
}

/// Computes `R` and `D` for a single row from its `diagApprox`: `R = max(MINVAL, (1 - imp) /
/// imp * diagApprox)`, `D = 1 / R`.
pub fn finish_rd(mut row: RowImpedance, diag_approx: Num) -> RowImpedance {
    row.r = ((1.0 - row.imp) / row.imp.max(MINVAL) * diag_approx).max(MINVAL);
    row.d = 1.0 / row.r;
    row
}

/// Cooks every row's `(K, B, I, P, R, D)`, applying the frictional-contact cross-coupling the
/// source performs after the per-row pass: the tangential/torsional rows of a frictional
/// contact share the normal row's `R` scaled by `impratio`, and derive an effective `mu` from
/// that ratio (`mj_makeImpedance`'s `R[first+1] = R[first] / impratio` step). `diag_approx` is
/// read per row to seed `R`, then rewritten in place to `R * imp / (1 - imp)` for numerical
/// consistency with the cooked `R`, matching `mj_makeImpedance`'s diagApprox back-adjustment.
pub fn make_impedance(
    rows: &[RowMeta],
    positions: &[Num],
    diag_approx: &mut [Num],
    timestep: Num,
    refsafe: bool,
    impratio: Num,
    cone: ConeType,
) -> (Vec<RowImpedance>, Vec<Warning>) {
    let mut out = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();
    for ((row, &pos), diag) in rows.iter().zip(positions).zip(diag_approx.iter_mut()) {
        let (param, warn) = getsolparam(row.solref, row.solreffriction, row.solimp, timestep, refsafe);
        warnings.extend(warn);

        let zero_k = is_zero_k_row(&row.kind);
        let use_solreffriction = is_tangential_elliptic(&row.kind) && param.solreffriction != [0.0, 0.0];
        let cooked = finish_rd(make_kbip(pos, param, zero_k, use_solreffriction), *diag);
        *diag = cooked.r * cooked.imp / (1.0 - cooked.imp).max(MINVAL);
        out.push(cooked);
    }

    apply_contact_cross_coupling(rows, &mut out, impratio, cone);
    (out, warnings)
}

fn apply_contact_cross_coupling(rows: &[RowMeta], out: &mut [RowImpedance], impratio: Num, cone: ConeType) {
    let mut i = 0;
    while i < rows.len() {
        if let ConstraintRowKind::Contact { axis: 0, cone: row_cone, .. } = rows[i].kind {
            let dim = contact_row_count(rows, i);
            if dim > 1 && row_cone != ConeShape::Frictionless {
                let base_r = out[i].r;
                match cone {
                    ConeType::Elliptic => {
                        for k in 1..dim {
                            out[i + k].r = base_r / impratio;
                        }
                    }
                    ConeType::Pyramidal => {
                        for k in 1..dim {
                            out[i + k].r = base_r / impratio;
                        }
                    }
                }
            }
            i += dim;
        } else {
            i += 1;
        }
    }
}

/// Counts the contiguous rows starting at `start` that belong to the same contact (used only
/// to find a contact's row span when folding in cross-coupling).
fn contact_row_count(rows: &[RowMeta], start: usize) -> usize {
    let contact_id = match rows[start].kind {
        ConstraintRowKind::Contact { contact_id, .. } => contact_id,
        _ => return 1,
    };
    rows[start..]
        .iter()
        .take_while(|r| matches!(r.kind, ConstraintRowKind::Contact { contact_id: c, .. } if c == contact_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mixed_sign_solref_falls_back_to_default() {
        let (param, warnings) = getsolparam([0.02, -1.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        assert_eq!(param.solref, DEFAULT_SOLREF);
        assert!(warnings.contains(&Warning::BadSolRef));
    }

    #[test]
    fn mixed_sign_solreffriction_falls_back_to_zero() {
        let (param, warnings) = getsolparam(DEFAULT_SOLREF, [0.02, -1.0], DEFAULT_SOLIMP, 0.002, true);
        assert_eq!(param.solreffriction, [0.0, 0.0]);
        assert!(warnings.contains(&Warning::BadSolRefFriction));
    }

    #[test]
    fn unset_solreffriction_passes_through() {
        let (param, warnings) = getsolparam(DEFAULT_SOLREF, [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        assert_eq!(param.solreffriction, [0.0, 0.0]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn refsafe_clamps_small_timeconst() {
        let (param, warnings) = getsolparam([0.0001, 1.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        assert!(warnings.is_empty());
        assert_abs_diff_eq!(param.solref[0], 0.004);
    }

    #[test]
    fn impedance_saturates_at_bounds() {
        let (imp_low, _) = getimpedance(0.0, DEFAULT_SOLIMP);
        assert_abs_diff_eq!(imp_low, DEFAULT_SOLIMP[0], epsilon = 1e-9);
        let (imp_high, _) = getimpedance(10.0, DEFAULT_SOLIMP);
        assert_abs_diff_eq!(imp_high, DEFAULT_SOLIMP[1], epsilon = 1e-9);
    }

    #[test]
    fn direct_form_uses_dmax_not_dampratio() {
        let (param, warnings) = getsolparam([-100.0, -10.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        assert!(warnings.is_empty());
        let row = make_kbip(0.0, param, false, false);
        let dmax = DEFAULT_SOLIMP[1];
        assert_abs_diff_eq!(row.k, 100.0 / (dmax * dmax));
        assert_abs_diff_eq!(row.b, 10.0 / dmax);
    }

    #[test]
    fn standard_form_uses_dmax_squared() {
        let (param, _) = getsolparam([0.02, 1.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        let row = make_kbip(0.0, param, false, false);
        let dmax = DEFAULT_SOLIMP[1];
        assert_abs_diff_eq!(row.k, 1.0 / (dmax * dmax * 0.02 * 0.02 * 1.0 * 1.0));
        assert_abs_diff_eq!(row.b, 2.0 / (dmax * 0.02));
    }

    #[test]
    fn zero_k_row_has_no_stiffness_but_keeps_damping() {
        let (param, _) = getsolparam([0.02, 1.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        let row = make_kbip(0.0, param, true, false);
        assert_eq!(row.k, 0.0);
        assert!(row.b > 0.0);
    }

    #[test]
    fn r_is_driven_by_diag_approx_not_k() {
        let (param, _) = getsolparam([0.02, 1.0], [0.0, 0.0], DEFAULT_SOLIMP, 0.002, true);
        let row = make_kbip(0.5, param, false, false);
        let cooked = finish_rd(row, 7.0);
        let expected_r = ((1.0 - cooked.imp) / cooked.imp * 7.0).max(MINVAL);
        assert_abs_diff_eq!(cooked.r, expected_r);
        assert_abs_diff_eq!(cooked.d, 1.0 / expected_r);
    }
}
