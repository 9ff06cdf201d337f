//! Pure status-to-surface routing rule (spec §3.4/§4.8).
//!
//! Grounded on spec's explicit table; there is no corresponding
//! `status_router.py` in the retrieved source, so this is authored directly
//! from the specification in the teacher's small-pure-function style (see
//! `domain_types.rs`'s `as_str`/`from_str_opt` pairs for the idiom of a
//! total, table-driven function over a closed enum).

use crate::domain_types::{ExecutionStatus, Surface};

/// Maps an execution status to the UI surfaces it must be delivered to.
///
/// `running` goes to `activity` only; every terminal/attention-worthy status
/// dual-emits to both `stream` and `activity` so nothing gets silently
/// swallowed on a UI that only watches one surface (spec §3.4). This
/// function is total — there is no unknown `ExecutionStatus` variant to
/// default on, but callers parsing a raw wire string should route an
/// unparseable value through [`unknown_status_surfaces`] rather than
/// dropping it.
#[must_use]
pub const fn surfaces_for(status: ExecutionStatus) -> &'static [Surface] {
    match status {
        ExecutionStatus::Running => &[Surface::Activity],
        ExecutionStatus::Done
        | ExecutionStatus::Failed
        | ExecutionStatus::Stuck
        | ExecutionStatus::Blocked
        | ExecutionStatus::VerificationFailed => &[Surface::Stream, Surface::Activity],
    }
}

/// The fail-loud default for a status value that didn't parse into
/// [`ExecutionStatus`] at all (spec §3.4: "any unknown value defaults to
/// (stream, activity)").
#[must_use]
pub const fn unknown_status_surfaces() -> &'static [Surface] {
    &[Surface::Stream, Surface::Activity]
}
