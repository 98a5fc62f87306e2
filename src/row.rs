//! The tagged-union representation of a single constraint row (spec §9's "polymorphic
//! constraint rows" design note).
//!
//! Every row in the arena — equality, friction-loss, limit, or contact — carries the same
//! handful of per-row scalars (`solref`, `solimp`, `margin`, `pos`, ...) consumed identically
//! by [`crate::diag_approx`], [`crate::impedance`], [`crate::reference`], and
//! [`crate::update`]. Rather than dispatching through a trait object per row, `ConstraintRowKind`
//! tags which family produced a row and carries only that family's extra fields; the
//! pipeline stages match on the tag where the family actually changes behavior (equality rows
//! use a quadratic cost unconditionally, contact rows branch on cone shape, etc.) and share
//! code everywhere else.

use crate::Num;

/// Which original constraint produced a row, and the famly-specific data needed downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRowKind {
    Equality { eq_id: usize },
    Friction { source: FrictionSource },
    Limit { source: LimitSource },
    Contact {
        contact_id: usize,
        /// Row index within the contact's own `dim` rows: `0` is the normal, `1..dim` are
        /// tangential/torsional. Pyramidal cones instead spread `2*(dim-1)` sign-paired rows.
        axis: usize,
        cone: ConeShape,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrictionSource {
    Dof(usize),
    Tendon(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    Joint(usize),
    Tendon(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeShape {
    Frictionless,
    Pyramidal,
    Elliptic,
}

/// Per-row scalars shared by every family, independent of Jacobian storage (spec §3, the
/// `efc_*` parallel arrays): constraint-space position/velocity reference data, and the
/// `solref`/`solimp` pair that [`crate::impedance`] cooks into `(K, B, I, P, R, D)`.
#[derive(Debug, Clone)]
pub struct RowMeta {
    pub kind: ConstraintRowKind,
    pub pos: Num,
    pub margin: Num,
    pub solref: [Num; 2],
    pub solimp: [Num; 5],
    /// Override reference used in place of `solref` for tangential elliptic-contact rows when
    /// non-zero (spec §4.6); `[0.0, 0.0]` for every row outside that one case.
    pub solreffriction: [Num; 2],
    /// Friction coefficient for this row's family, `0` for equality rows.
    pub friction: Num,
}

impl RowMeta {
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintRowKind::Equality { .. })
    }

    pub fn is_friction(&self) -> bool {
        matches!(self.kind, ConstraintRowKind::Friction { .. })
    }

    pub fn is_limit(&self) -> bool {
        matches!(self.kind, ConstraintRowKind::Limit { .. })
    }

    pub fn is_contact(&self) -> bool {
        matches!(self.kind, ConstraintRowKind::Contact { .. })
    }
}
