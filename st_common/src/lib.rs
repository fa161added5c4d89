//! Shared utilities and error types for the Structured Text toolchain
//!
//! This crate provides common functionality used across all pipeline stages:
//! - Error types and handling utilities
//! - Source location tracking
//! - Diagnostic collection

pub mod diagnostics;
pub mod error;
pub mod span;

pub use diagnostics::*;
pub use error::*;
pub use span::*;
