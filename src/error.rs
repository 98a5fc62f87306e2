//! Error and warning types for the constraint core.
//!
//! Grounded on [`mannequin::MannequinError`](crate) (a `thiserror`-derived enum): fatal,
//! internal-invariant violations are a proper `Result::Err`, while capacity and parameter
//! problems are recoverable and are instead pushed onto a per-step warning buffer (see
//! [`crate::system::StepWarnings`]).

use thiserror::Error;

/// Fatal, internal-invariant violations (spec §7, "Internal invariant (fatal)").
///
/// These never occur in a correctly-counted step; seeing one means the counter and
/// instantiator disagree, which is a bug in this crate (or in a caller-supplied
/// collaborator), not a recoverable runtime condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("equality row count mismatch: counted {counted} active rows but instantiated {instantiated}")]
    EqualityCountMismatch { counted: usize, instantiated: usize },

    #[error("friction row count mismatch: counted {counted} active rows but instantiated {instantiated}")]
    FrictionCountMismatch { counted: usize, instantiated: usize },

    #[error("total row count mismatch: counted nefc={counted} but instantiated {instantiated}")]
    RowCountMismatch { counted: usize, instantiated: usize },

    #[error("Jacobian non-zero count mismatch: counted nnzJ={counted} but instantiated {instantiated}")]
    NonzeroCountMismatch { counted: usize, instantiated: usize },

    #[error("unknown equality constraint type for equality #{0}")]
    UnknownEqualityType(usize),

    #[error("unknown constraint row type at row {0}")]
    UnknownRowType(usize),

    #[error("sparse Jacobian row constructed without a DOF chain (dense arguments supplied in sparse mode)")]
    DenseArgsInSparseMode,

    #[error("DOF chain index {0} out of bounds (nv = {1})")]
    ChainIndexOutOfBounds(usize, usize),
}

/// Recoverable, non-fatal conditions (spec §7, warning buckets). Pushed to a per-step
/// buffer rather than interrupting the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    #[error("CONTACTFULL: contact array full, {0} contacts dropped")]
    ContactFull(usize),

    #[error("CNSTRFULL: constraint arena full, step produced an empty constraint system")]
    ConstraintFull,

    #[error("mixed-sign solref, replaced with default")]
    BadSolRef,

    #[error("solreffriction values should have the same sign, replaced with zero")]
    BadSolRefFriction,
}
