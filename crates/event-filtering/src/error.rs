use thiserror::Error;

/// Errors surfaced to the configuration loader while building a filter.
///
/// Both variants carry the offending input for diagnostics. Nothing here
/// is recoverable: a bad expression aborts the loading of that field's
/// filter and must be reported to the operator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),
    #[error("invalid filter value: {0}")]
    InvalidValue(String),
}
