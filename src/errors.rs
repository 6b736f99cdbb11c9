//! Errors
//!
//! Custom error types used throughout the `uplift-meta` crate.
use thiserror::Error;

/// Errors that can occur while fitting or scoring a causal meta-learner.
///
/// The first three variants are the causal-validation taxonomy; they are
/// non-retriable data errors raised at the point of detection and abort the
/// whole fit or filter call. The remaining variants surface malformed frame
/// access or construction.
#[derive(Debug, Error)]
pub enum UpliftError {
    /// The designated control group is absent from the treatment column.
    #[error("Data does not contain the specified control.")]
    MissingControl,
    /// A requested treatment label is absent from the treatment column.
    #[error("Data does not contain the specified treatment.")]
    MissingTreatment,
    /// A two-group subset contains more than one distinct non-control label.
    #[error("Data contains multiple treatments.")]
    MultipleTreatments,
    /// A named column is not present in the frame.
    #[error("Column {0} is not present in the frame.")]
    MissingColumn(String),
    /// A column exists but holds the wrong value type.
    #[error("Column {0} holds the wrong type, expected {1}.")]
    ColumnType(String, String),
    /// A column or mask length disagrees with the frame's row count.
    #[error("Length of {0} is {1}, expected {2}.")]
    LengthMismatch(String, usize, usize),
}
