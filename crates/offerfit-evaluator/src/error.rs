//! Evaluator error types.
//!
//! Insufficient resources, placement vetoes and TLS failures are not errors:
//! they fail the offer and the evaluator moves on. Only a requirement that
//! no offer could ever satisfy is surfaced here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("invalid requirement for pod '{pod}': {reason}")]
    InvalidRequirement { pod: String, reason: String },
}

pub type EvaluatorResult<T> = Result<T, EvaluatorError>;
