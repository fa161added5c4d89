//! Token definitions for Structured Text

use serde::{Deserialize, Serialize};
use st_common::{Span, Spanned};
use std::fmt;

/// Token types in the Structured Text surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    // Literals
    IntegerLiteral(i64),
    RealLiteral(String), // Stored as source text to keep Hash/Eq
    StringLiteral(String),
    BoolLiteral(bool),
    /// Duration literal, decoded to whole milliseconds
    TimeLiteral(i64),

    // Identifiers
    Identifier(String),

    // POU delimiters
    KeywordProgram,
    KeywordEndProgram,
    KeywordFunction,
    KeywordEndFunction,
    KeywordFunctionBlock,
    KeywordEndFunctionBlock,

    // Variable sections
    KeywordVar,
    KeywordVarInput,
    KeywordVarOutput,
    KeywordVarTemp,
    KeywordEndVar,

    // Statements
    KeywordIf,
    KeywordThen,
    KeywordElsif,
    KeywordElse,
    KeywordEndIf,
    KeywordCase,
    KeywordOf,
    KeywordEndCase,
    KeywordFor,
    KeywordTo,
    KeywordBy,
    KeywordDo,
    KeywordEndFor,
    KeywordWhile,
    KeywordEndWhile,
    KeywordRepeat,
    KeywordUntil,
    KeywordEndRepeat,
    KeywordExit,
    KeywordReturn,

    // Operator keywords
    KeywordAnd,
    KeywordOr,
    KeywordXor,
    KeywordNot,
    KeywordMod,

    // Type syntax
    KeywordArray,

    // Operators
    Assign,       // :=
    Equal,        // =
    NotEqual,     // <>
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Power,        // **
    Dot,          // .
    DotDot,       // ..

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Semicolon,    // ;
    Comma,        // ,
    Colon,        // :

    // Special
    EndOfFile,

    // Error token for error reporting
    Error(String),
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::IntegerLiteral(n) => write!(f, "{}", n),
            TokenType::RealLiteral(n) => write!(f, "{}", n),
            TokenType::StringLiteral(s) => write!(f, "'{}'", s),
            TokenType::BoolLiteral(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            TokenType::TimeLiteral(ms) => write!(f, "T#{}ms", ms),
            TokenType::Identifier(name) => write!(f, "{}", name),
            TokenType::Error(msg) => write!(f, "ERROR: {}", msg),
            _ => {
                let token_str = match self {
                    TokenType::KeywordProgram => "PROGRAM",
                    TokenType::KeywordEndProgram => "END_PROGRAM",
                    TokenType::KeywordFunction => "FUNCTION",
                    TokenType::KeywordEndFunction => "END_FUNCTION",
                    TokenType::KeywordFunctionBlock => "FUNCTION_BLOCK",
                    TokenType::KeywordEndFunctionBlock => "END_FUNCTION_BLOCK",
                    TokenType::KeywordVar => "VAR",
                    TokenType::KeywordVarInput => "VAR_INPUT",
                    TokenType::KeywordVarOutput => "VAR_OUTPUT",
                    TokenType::KeywordVarTemp => "VAR_TEMP",
                    TokenType::KeywordEndVar => "END_VAR",
                    TokenType::KeywordIf => "IF",
                    TokenType::KeywordThen => "THEN",
                    TokenType::KeywordElsif => "ELSIF",
                    TokenType::KeywordElse => "ELSE",
                    TokenType::KeywordEndIf => "END_IF",
                    TokenType::KeywordCase => "CASE",
                    TokenType::KeywordOf => "OF",
                    TokenType::KeywordEndCase => "END_CASE",
                    TokenType::KeywordFor => "FOR",
                    TokenType::KeywordTo => "TO",
                    TokenType::KeywordBy => "BY",
                    TokenType::KeywordDo => "DO",
                    TokenType::KeywordEndFor => "END_FOR",
                    TokenType::KeywordWhile => "WHILE",
                    TokenType::KeywordEndWhile => "END_WHILE",
                    TokenType::KeywordRepeat => "REPEAT",
                    TokenType::KeywordUntil => "UNTIL",
                    TokenType::KeywordEndRepeat => "END_REPEAT",
                    TokenType::KeywordExit => "EXIT",
                    TokenType::KeywordReturn => "RETURN",
                    TokenType::KeywordAnd => "AND",
                    TokenType::KeywordOr => "OR",
                    TokenType::KeywordXor => "XOR",
                    TokenType::KeywordNot => "NOT",
                    TokenType::KeywordMod => "MOD",
                    TokenType::KeywordArray => "ARRAY",
                    TokenType::Assign => ":=",
                    TokenType::Equal => "=",
                    TokenType::NotEqual => "<>",
                    TokenType::Less => "<",
                    TokenType::LessEqual => "<=",
                    TokenType::Greater => ">",
                    TokenType::GreaterEqual => ">=",
                    TokenType::Plus => "+",
                    TokenType::Minus => "-",
                    TokenType::Star => "*",
                    TokenType::Slash => "/",
                    TokenType::Power => "**",
                    TokenType::Dot => ".",
                    TokenType::DotDot => "..",
                    TokenType::LeftParen => "(",
                    TokenType::RightParen => ")",
                    TokenType::LeftBracket => "[",
                    TokenType::RightBracket => "]",
                    TokenType::Semicolon => ";",
                    TokenType::Comma => ",",
                    TokenType::Colon => ":",
                    TokenType::EndOfFile => "EOF",
                    _ => unreachable!(),
                };
                write!(f, "{}", token_str)
            }
        }
    }
}

/// Map an upper-cased word to its keyword token, if it is one
pub fn keyword_token(upper: &str) -> Option<TokenType> {
    let token = match upper {
        "PROGRAM" => TokenType::KeywordProgram,
        "END_PROGRAM" => TokenType::KeywordEndProgram,
        "FUNCTION" => TokenType::KeywordFunction,
        "END_FUNCTION" => TokenType::KeywordEndFunction,
        "FUNCTION_BLOCK" => TokenType::KeywordFunctionBlock,
        "END_FUNCTION_BLOCK" => TokenType::KeywordEndFunctionBlock,
        "VAR" => TokenType::KeywordVar,
        "VAR_INPUT" => TokenType::KeywordVarInput,
        "VAR_OUTPUT" => TokenType::KeywordVarOutput,
        "VAR_TEMP" => TokenType::KeywordVarTemp,
        "END_VAR" => TokenType::KeywordEndVar,
        "IF" => TokenType::KeywordIf,
        "THEN" => TokenType::KeywordThen,
        "ELSIF" => TokenType::KeywordElsif,
        "ELSE" => TokenType::KeywordElse,
        "END_IF" => TokenType::KeywordEndIf,
        "CASE" => TokenType::KeywordCase,
        "OF" => TokenType::KeywordOf,
        "END_CASE" => TokenType::KeywordEndCase,
        "FOR" => TokenType::KeywordFor,
        "TO" => TokenType::KeywordTo,
        "BY" => TokenType::KeywordBy,
        "DO" => TokenType::KeywordDo,
        "END_FOR" => TokenType::KeywordEndFor,
        "WHILE" => TokenType::KeywordWhile,
        "END_WHILE" => TokenType::KeywordEndWhile,
        "REPEAT" => TokenType::KeywordRepeat,
        "UNTIL" => TokenType::KeywordUntil,
        "END_REPEAT" => TokenType::KeywordEndRepeat,
        "EXIT" => TokenType::KeywordExit,
        "RETURN" => TokenType::KeywordReturn,
        "AND" => TokenType::KeywordAnd,
        "OR" => TokenType::KeywordOr,
        "XOR" => TokenType::KeywordXor,
        "NOT" => TokenType::KeywordNot,
        "MOD" => TokenType::KeywordMod,
        "ARRAY" => TokenType::KeywordArray,
        "TRUE" => TokenType::BoolLiteral(true),
        "FALSE" => TokenType::BoolLiteral(false),
        _ => return None,
    };
    Some(token)
}

/// A token with source location information
pub type Token = Spanned<TokenType>;

/// Token utility trait
pub trait TokenUtils {
    fn new(token_type: TokenType, span: Span) -> Self;
    fn is_literal(&self) -> bool;
    fn is_error(&self) -> bool;
}

impl TokenUtils for Token {
    fn new(token_type: TokenType, span: Span) -> Self {
        Spanned::new(token_type, span)
    }

    fn is_literal(&self) -> bool {
        matches!(
            self.value,
            TokenType::IntegerLiteral(_)
                | TokenType::RealLiteral(_)
                | TokenType::StringLiteral(_)
                | TokenType::BoolLiteral(_)
                | TokenType::TimeLiteral(_)
        )
    }

    fn is_error(&self) -> bool {
        matches!(self.value, TokenType::Error(_))
    }
}
