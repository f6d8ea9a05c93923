use std::fmt;

/// Domain error hierarchy. `InvalidOrder` is the base case from the upstream
/// source; `NotEnoughBalance` and `NotFoundOrder` are logically subtypes of
/// it there, surfaced here as sibling variants since Rust enums don't nest.
/// Callers that need the "is this an invalid-order family error" check match
/// all three together.
#[derive(Debug)]
pub enum EngineError {
    InvalidOrder(String),
    NotEnoughBalance(String),
    NotFoundOrder(String),
    ApiError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidOrder(s) => write!(f, "Invalid Order: {}", s),
            EngineError::NotEnoughBalance(s) => write!(f, "Not Enough Balance: {}", s),
            EngineError::NotFoundOrder(s) => write!(f, "Not Found Order: {}", s),
            EngineError::ApiError(s) => write!(f, "API Error: {}", s),
        }
    }
}

impl std::error::Error for EngineError {}
