//! Lexer for IEC 61131-3 Structured Text
//!
//! Turns ST source text into a token stream. Keywords are matched
//! case-insensitively as the standard requires; user identifiers keep
//! their spelling.

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenType, TokenUtils};
