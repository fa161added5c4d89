//! Error definitions for the ST interpreter

use st_common::Span;
use thiserror::Error;

/// Fatal scan errors raised while walking a POU body
///
/// Every variant names the source span of the statement or expression
/// where the error arose, so the host can surface a structured
/// diagnostic. Non-fatal conditions (NaN, infinities, out-of-bounds
/// array access) never appear here; they are observable only through
/// resulting output values.
#[derive(Debug, Clone, Error)]
pub enum InterpreterError {
    #[error("Undeclared variable '{name}' at {span}")]
    UndeclaredVariable { name: String, span: Span },

    #[error("Type mismatch: {message} at {span}")]
    TypeMismatch { message: String, span: Span },

    #[error("Division by zero at {span}")]
    DivisionByZero { span: Span },

    #[error("Unknown function '{name}' at {span}")]
    UnknownFunction { name: String, span: Span },

    #[error("Function '{name}' expects {expected} arguments, got {actual} at {span}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
        span: Span,
    },

    #[error("Call depth limit exceeded at {span}")]
    CallDepthExceeded { span: Span },

    #[error("Scan overrun: scan exceeded {budget_ms} ms")]
    ScanOverrun { budget_ms: u64 },
}

/// Result type alias for interpreter operations
pub type InterpreterResult<T> = Result<T, InterpreterError>;

impl InterpreterError {
    /// Create an undeclared variable error
    pub fn undeclared_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndeclaredVariable {
            name: name.into(),
            span,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    /// Create a division by zero error
    pub fn division_by_zero(span: Span) -> Self {
        Self::DivisionByZero { span }
    }

    /// Create an unknown function error
    pub fn unknown_function(name: impl Into<String>, span: Span) -> Self {
        Self::UnknownFunction {
            name: name.into(),
            span,
        }
    }

    /// Create an argument count mismatch error
    pub fn argument_count_mismatch(
        name: impl Into<String>,
        expected: usize,
        actual: usize,
        span: Span,
    ) -> Self {
        Self::ArgumentCountMismatch {
            name: name.into(),
            expected,
            actual,
            span,
        }
    }

    /// Create a call depth error
    pub fn call_depth_exceeded(span: Span) -> Self {
        Self::CallDepthExceeded { span }
    }

    /// Get the source span where this error arose, if it has one
    pub fn span(&self) -> Option<Span> {
        match self {
            InterpreterError::UndeclaredVariable { span, .. }
            | InterpreterError::TypeMismatch { span, .. }
            | InterpreterError::DivisionByZero { span }
            | InterpreterError::UnknownFunction { span, .. }
            | InterpreterError::ArgumentCountMismatch { span, .. }
            | InterpreterError::CallDepthExceeded { span } => Some(*span),
            InterpreterError::ScanOverrun { .. } => None,
        }
    }
}
