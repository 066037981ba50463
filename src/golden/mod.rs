//! Golden snapshot verification for rendered manifests.
//!
//! Comparison is byte-exact after trailing newline normalization. Only
//! [`GoldenFixture::regenerate`] ever writes a golden artifact.

mod diff;
mod fixture;
mod verifier;

pub use diff::{DiffHunk, DiffLine, DiffTag, LineDiff};
pub use fixture::{
    discover, regenerate_all, verify_all, BatchReport, FixtureReport, FixtureState, GoldenFixture,
};
pub use verifier::{
    explain, normalize_trailing_newlines, DiffExplanation, ExplainedLine, VerificationResult,
    Verifier, DEFAULT_CONTEXT_LINES,
};
