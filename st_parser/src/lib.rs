//! Parser for IEC 61131-3 Structured Text
//!
//! Builds the POU AST consumed by the interpreter. The grammar covers
//! PROGRAM / FUNCTION / FUNCTION_BLOCK declarations, the VAR section
//! family, the full statement set and the IEC expression precedence
//! chain.

pub mod ast;
pub mod parser;

pub use ast::CompilationUnit;
pub use parser::Parser;

/// Convenience entry point: lex and parse a complete source text
pub fn parse_source(source: &str) -> st_common::StResult<CompilationUnit> {
    let mut lexer = st_lexer::Lexer::new(source);
    let tokens = lexer.tokenize()?;
    if lexer.diagnostics().has_errors() {
        let first = lexer
            .diagnostics()
            .iter()
            .next()
            .map(|d| d.to_string())
            .unwrap_or_default();
        return Err(st_common::StError::lex_error(first));
    }
    let mut parser = Parser::new(tokens);
    parser.parse()
}
