//! Hand-written scanner for Structured Text source

use crate::token::{keyword_token, Token, TokenType, TokenUtils};
use st_common::{Diagnostics, Position, Span, StError, StResult};

const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_SECOND: f64 = 1_000.0;

/// Lexer for Structured Text source text
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    current_pos: Position,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer instance
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            current_pos: Position::start(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Get the collected diagnostics
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Tokenize the entire input into a vector of tokens
    pub fn tokenize(&mut self) -> StResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        let eof_span = Span::single(self.current_pos);
        tokens.push(TokenUtils::new(TokenType::EndOfFile, eof_span));

        Ok(tokens)
    }

    /// Get the next token from the input
    fn next_token(&mut self) -> StResult<Option<Token>> {
        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Ok(None);
        }

        let start_pos = self.current_pos;

        let token_type = match self.current_char() {
            '(' => {
                self.advance();
                TokenType::LeftParen
            }
            ')' => {
                self.advance();
                TokenType::RightParen
            }
            '[' => {
                self.advance();
                TokenType::LeftBracket
            }
            ']' => {
                self.advance();
                TokenType::RightBracket
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            ',' => {
                self.advance();
                TokenType::Comma
            }
            '+' => {
                self.advance();
                TokenType::Plus
            }
            '-' => {
                self.advance();
                TokenType::Minus
            }
            '/' => {
                self.advance();
                TokenType::Slash
            }
            '=' => {
                self.advance();
                TokenType::Equal
            }
            '*' => self.scan_star(),
            ':' => self.scan_colon(),
            '<' => self.scan_less(),
            '>' => self.scan_greater(),
            '.' => self.scan_dot(),
            '\'' => self.scan_string_literal(start_pos),
            c if c.is_ascii_digit() => self.scan_number(start_pos)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier_or_keyword(start_pos),
            c => {
                self.advance();
                let message = format!("Unexpected character: '{}'", c);
                self.diagnostics.error(&message, Span::single(start_pos));
                TokenType::Error(message)
            }
        };

        let span = Span::new(start_pos, self.current_pos);
        Ok(Some(TokenUtils::new(token_type, span)))
    }

    /// Skip whitespace, `//` line comments and `(* *)` block comments
    fn skip_whitespace_and_comments(&mut self) {
        while !self.is_at_end() {
            match self.current_char() {
                ' ' | '\t' | '\r' => self.advance(),
                '\n' => self.advance_line(),
                '/' if self.peek_char() == Some('/') => self.skip_line_comment(),
                '(' if self.peek_char() == Some('*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.current_pos;
        self.advance(); // (
        self.advance(); // *

        let mut nesting = 1;
        while !self.is_at_end() && nesting > 0 {
            if self.current_char() == '(' && self.peek_char() == Some('*') {
                self.advance();
                self.advance();
                nesting += 1;
            } else if self.current_char() == '*' && self.peek_char() == Some(')') {
                self.advance();
                self.advance();
                nesting -= 1;
            } else if self.current_char() == '\n' {
                self.advance_line();
            } else {
                self.advance();
            }
        }

        if nesting > 0 {
            self.diagnostics
                .error("Unterminated block comment", Span::single(start));
        }
    }

    fn scan_star(&mut self) -> TokenType {
        self.advance();
        if !self.is_at_end() && self.current_char() == '*' {
            self.advance();
            TokenType::Power
        } else {
            TokenType::Star
        }
    }

    fn scan_colon(&mut self) -> TokenType {
        self.advance();
        if !self.is_at_end() && self.current_char() == '=' {
            self.advance();
            TokenType::Assign
        } else {
            TokenType::Colon
        }
    }

    fn scan_less(&mut self) -> TokenType {
        self.advance();
        match self.current_char_opt() {
            Some('=') => {
                self.advance();
                TokenType::LessEqual
            }
            Some('>') => {
                self.advance();
                TokenType::NotEqual
            }
            _ => TokenType::Less,
        }
    }

    fn scan_greater(&mut self) -> TokenType {
        self.advance();
        if self.current_char_opt() == Some('=') {
            self.advance();
            TokenType::GreaterEqual
        } else {
            TokenType::Greater
        }
    }

    fn scan_dot(&mut self) -> TokenType {
        self.advance();
        if self.current_char_opt() == Some('.') {
            self.advance();
            TokenType::DotDot
        } else {
            TokenType::Dot
        }
    }

    /// Scan a single-quoted string literal with `$` escapes
    fn scan_string_literal(&mut self, start: Position) -> TokenType {
        self.advance(); // opening quote
        let mut text = String::new();

        while !self.is_at_end() && self.current_char() != '\'' {
            let c = self.current_char();
            if c == '\n' {
                break;
            }
            if c == '$' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.current_char();
                match escaped.to_ascii_uppercase() {
                    '$' => text.push('$'),
                    '\'' => text.push('\''),
                    'L' | 'N' => text.push('\n'),
                    'R' => text.push('\r'),
                    'T' => text.push('\t'),
                    other => text.push(other),
                }
                self.advance();
            } else {
                text.push(c);
                self.advance();
            }
        }

        if self.is_at_end() || self.current_char() != '\'' {
            let message = "Unterminated string literal".to_string();
            self.diagnostics.error(&message, Span::single(start));
            return TokenType::Error(message);
        }
        self.advance(); // closing quote

        TokenType::StringLiteral(text)
    }

    /// Scan a decimal integer, based integer (`16#FF`) or real literal
    fn scan_number(&mut self, start: Position) -> StResult<TokenType> {
        let digits_start = self.position;
        self.consume_digits();

        // Based integer: base # digits
        if self.current_char_opt() == Some('#') {
            let base_text = &self.input[digits_start..self.position];
            let base: u32 = base_text.parse().map_err(|_| {
                StError::lex_error(format!("Invalid integer base '{}'", base_text))
            })?;
            if !matches!(base, 2 | 8 | 16) {
                let message = format!("Unsupported integer base {}", base);
                self.diagnostics.error(&message, Span::single(start));
                return Ok(TokenType::Error(message));
            }
            self.advance(); // #
            let value_start = self.position;
            while !self.is_at_end()
                && (self.current_char().is_ascii_alphanumeric() || self.current_char() == '_')
            {
                self.advance();
            }
            let value_text: String = self.input[value_start..self.position]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            return match i64::from_str_radix(&value_text, base) {
                Ok(value) => Ok(TokenType::IntegerLiteral(value)),
                Err(_) => {
                    let message = format!("Invalid base-{} literal '{}'", base, value_text);
                    self.diagnostics.error(&message, Span::single(start));
                    Ok(TokenType::Error(message))
                }
            };
        }

        let mut is_real = false;

        // Fractional part; careful not to swallow the `..` of a range
        if self.current_char_opt() == Some('.')
            && self
                .peek_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            is_real = true;
            self.advance(); // .
            self.consume_digits();
        }

        // Exponent
        if matches!(self.current_char_opt(), Some('e') | Some('E')) {
            let after = self.peek_char();
            let signed_digit = matches!(after, Some('+') | Some('-'))
                && self
                    .peek_char_at(2)
                    .map(|c| c.is_ascii_digit())
                    .unwrap_or(false);
            if after.map(|c| c.is_ascii_digit()).unwrap_or(false) || signed_digit {
                is_real = true;
                self.advance(); // e
                if matches!(self.current_char_opt(), Some('+') | Some('-')) {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let text: String = self.input[digits_start..self.position]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        if is_real {
            Ok(TokenType::RealLiteral(text))
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(TokenType::IntegerLiteral(value)),
                Err(_) => {
                    let message = format!("Integer literal out of range: '{}'", text);
                    self.diagnostics.error(&message, Span::single(start));
                    Ok(TokenType::Error(message))
                }
            }
        }
    }

    /// Scan an identifier, keyword or `T#`/`TIME#` duration literal
    fn scan_identifier_or_keyword(&mut self, start: Position) -> TokenType {
        let word_start = self.position;
        while !self.is_at_end()
            && (self.current_char().is_ascii_alphanumeric() || self.current_char() == '_')
        {
            self.advance();
        }

        let word = &self.input[word_start..self.position];
        let upper = word.to_ascii_uppercase();

        if (upper == "T" || upper == "TIME") && self.current_char_opt() == Some('#') {
            self.advance(); // #
            return self.scan_duration(start);
        }

        keyword_token(&upper).unwrap_or_else(|| TokenType::Identifier(word.to_string()))
    }

    /// Scan the component list of a duration literal (`1m30s`, `500ms`, `1.5s`)
    fn scan_duration(&mut self, start: Position) -> TokenType {
        let mut total_ms = 0.0f64;
        let mut saw_component = false;

        loop {
            // Underscores may separate components: T#1d_2h
            while self.current_char_opt() == Some('_') {
                self.advance();
            }

            if !self
                .current_char_opt()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
            {
                break;
            }

            let number_start = self.position;
            self.consume_digits();
            if self.current_char_opt() == Some('.')
                && self
                    .peek_char()
                    .map(|c| c.is_ascii_digit())
                    .unwrap_or(false)
            {
                self.advance();
                self.consume_digits();
            }
            let number: f64 = self.input[number_start..self.position]
                .parse()
                .unwrap_or(0.0);

            let unit_start = self.position;
            while self
                .current_char_opt()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
            {
                self.advance();
            }
            let unit = self.input[unit_start..self.position].to_ascii_lowercase();

            let factor = match unit.as_str() {
                "d" => MS_PER_DAY,
                "h" => MS_PER_HOUR,
                "m" => MS_PER_MINUTE,
                "s" => MS_PER_SECOND,
                "ms" => 1.0,
                _ => {
                    let message = format!("Invalid duration unit '{}'", unit);
                    self.diagnostics.error(&message, Span::single(start));
                    return TokenType::Error(message);
                }
            };
            total_ms += number * factor;
            saw_component = true;
        }

        if !saw_component {
            let message = "Empty duration literal".to_string();
            self.diagnostics.error(&message, Span::single(start));
            return TokenType::Error(message);
        }

        TokenType::TimeLiteral(total_ms.round() as i64)
    }

    fn consume_digits(&mut self) {
        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || self.current_char() == '_')
        {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.position..].chars().next().unwrap_or('\0')
    }

    fn current_char_opt(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_char_at(1)
    }

    fn peek_char_at(&self, n: usize) -> Option<char> {
        self.input[self.position..].chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char_opt() {
            self.position += c.len_utf8();
            self.current_pos.column += 1;
            self.current_pos.offset += c.len_utf8() as u32;
        }
    }

    fn advance_line(&mut self) {
        self.position += 1;
        self.current_pos.line += 1;
        self.current_pos.column = 1;
        self.current_pos.offset += 1;
    }
}
