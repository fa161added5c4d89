//! Recursive-descent parser for Structured Text

use crate::ast::*;
use st_common::{Diagnostics, Span, Spanned, StError, StResult};
use st_lexer::{Token, TokenType};

/// Parser over a token stream produced by `st_lexer`
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Diagnostics,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Parse a complete compilation unit
    pub fn parse(&mut self) -> StResult<CompilationUnit> {
        let mut units = Vec::new();

        while !self.is_at_end() {
            let start = self.current_span();
            let pou = match self.current_type() {
                TokenType::KeywordProgram => Pou::Program(self.parse_program()?),
                TokenType::KeywordFunctionBlock => {
                    Pou::FunctionBlock(self.parse_function_block()?)
                }
                TokenType::KeywordFunction => Pou::Function(self.parse_function()?),
                other => {
                    let message = format!(
                        "Expected PROGRAM, FUNCTION or FUNCTION_BLOCK, found '{}'",
                        other
                    );
                    return Err(self.error_here(message));
                }
            };
            let span = start.combine(self.previous_span());
            units.push(Spanned::new(pou, span));
        }

        Ok(CompilationUnit { units })
    }

    fn parse_program(&mut self) -> StResult<Program> {
        self.expect(TokenType::KeywordProgram)?;
        let name = self.expect_identifier()?;
        let var_blocks = self.parse_var_blocks()?;
        let body = self.parse_statement_list(&[TokenType::KeywordEndProgram])?;
        self.expect(TokenType::KeywordEndProgram)?;
        self.consume_optional_semicolon();
        Ok(Program {
            name,
            var_blocks,
            body,
        })
    }

    fn parse_function_block(&mut self) -> StResult<FunctionBlock> {
        self.expect(TokenType::KeywordFunctionBlock)?;
        let name = self.expect_identifier()?;
        let var_blocks = self.parse_var_blocks()?;
        let body = self.parse_statement_list(&[TokenType::KeywordEndFunctionBlock])?;
        self.expect(TokenType::KeywordEndFunctionBlock)?;
        self.consume_optional_semicolon();
        Ok(FunctionBlock {
            name,
            var_blocks,
            body,
        })
    }

    fn parse_function(&mut self) -> StResult<Function> {
        self.expect(TokenType::KeywordFunction)?;
        let name = self.expect_identifier()?;
        self.expect(TokenType::Colon)?;
        let return_type = self.parse_type()?;
        let var_blocks = self.parse_var_blocks()?;
        let body = self.parse_statement_list(&[TokenType::KeywordEndFunction])?;
        self.expect(TokenType::KeywordEndFunction)?;
        self.consume_optional_semicolon();
        Ok(Function {
            name,
            return_type,
            var_blocks,
            body,
        })
    }

    /// Parse the run of VAR / VAR_INPUT / VAR_OUTPUT / VAR_TEMP sections
    fn parse_var_blocks(&mut self) -> StResult<Vec<VarBlock>> {
        let mut blocks = Vec::new();

        loop {
            let kind = match self.current_type() {
                TokenType::KeywordVar => VarBlockKind::Var,
                TokenType::KeywordVarInput => VarBlockKind::Input,
                TokenType::KeywordVarOutput => VarBlockKind::Output,
                TokenType::KeywordVarTemp => VarBlockKind::Temp,
                _ => break,
            };
            self.advance();

            let mut declarations = Vec::new();
            while !self.check(&TokenType::KeywordEndVar) && !self.is_at_end() {
                declarations.extend(self.parse_var_decl()?);
            }
            self.expect(TokenType::KeywordEndVar)?;
            self.consume_optional_semicolon();

            blocks.push(VarBlock { kind, declarations });
        }

        Ok(blocks)
    }

    /// Parse `name {, name} : type [:= initial] ;`
    fn parse_var_decl(&mut self) -> StResult<Vec<VarDecl>> {
        let start = self.current_span();
        let mut names = vec![self.expect_identifier()?];
        while self.match_token(&TokenType::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(TokenType::Colon)?;
        let data_type = self.parse_type()?;

        let initial = if self.match_token(&TokenType::Assign) {
            if self.check(&TokenType::LeftBracket) {
                Some(Initializer::Array(self.parse_array_initializer()?))
            } else {
                Some(Initializer::Expr(self.parse_expression()?))
            }
        } else {
            None
        };

        self.expect(TokenType::Semicolon)?;
        let span = start.combine(self.previous_span());

        Ok(names
            .into_iter()
            .map(|name| VarDecl {
                name,
                data_type: data_type.clone(),
                initial: initial.clone(),
                span,
            })
            .collect())
    }

    fn parse_array_initializer(&mut self) -> StResult<Vec<Spanned<Expression>>> {
        self.expect(TokenType::LeftBracket)?;
        let mut values = Vec::new();
        if !self.check(&TokenType::RightBracket) {
            values.push(self.parse_expression()?);
            while self.match_token(&TokenType::Comma) {
                values.push(self.parse_expression()?);
            }
        }
        self.expect(TokenType::RightBracket)?;
        Ok(values)
    }

    /// Parse a declared type name or ARRAY type
    fn parse_type(&mut self) -> StResult<DataType> {
        if self.check(&TokenType::KeywordArray) {
            self.advance();
            self.expect(TokenType::LeftBracket)?;
            let start = self.parse_array_bound()?;
            self.expect(TokenType::DotDot)?;
            let end = self.parse_array_bound()?;
            self.expect(TokenType::RightBracket)?;
            self.expect_word("OF")?;
            let element = self.parse_type()?;
            return Ok(DataType::Array {
                start,
                end,
                element: Box::new(element),
            });
        }

        let name = self.expect_identifier()?;
        let data_type = match name.to_ascii_uppercase().as_str() {
            "BOOL" => DataType::Bool,
            "INT" => DataType::Int,
            "DINT" => DataType::Dint,
            "REAL" | "LREAL" => DataType::Real,
            "TIME" => DataType::Time,
            "STRING" => DataType::StringType,
            _ => DataType::Named(name),
        };
        Ok(data_type)
    }

    fn parse_array_bound(&mut self) -> StResult<i64> {
        let negative = self.match_token(&TokenType::Minus);
        match self.current_type().clone() {
            TokenType::IntegerLiteral(value) => {
                self.advance();
                Ok(if negative { -value } else { value })
            }
            other => Err(self.error_here(format!(
                "Expected integer array bound, found '{}'",
                other
            ))),
        }
    }

    /// Parse statements until one of the terminator tokens is reached
    fn parse_statement_list(
        &mut self,
        terminators: &[TokenType],
    ) -> StResult<Vec<Spanned<Statement>>> {
        let mut statements = Vec::new();
        while !self.is_at_end() && !terminators.iter().any(|t| self.check(t)) {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> StResult<Spanned<Statement>> {
        let start = self.current_span();
        let statement = match self.current_type() {
            TokenType::Semicolon => {
                self.advance();
                Statement::Empty
            }
            TokenType::KeywordIf => self.parse_if()?,
            TokenType::KeywordCase => self.parse_case()?,
            TokenType::KeywordFor => self.parse_for()?,
            TokenType::KeywordWhile => self.parse_while()?,
            TokenType::KeywordRepeat => self.parse_repeat()?,
            TokenType::KeywordExit => {
                self.advance();
                self.expect(TokenType::Semicolon)?;
                Statement::Exit
            }
            TokenType::KeywordReturn => {
                self.advance();
                self.expect(TokenType::Semicolon)?;
                Statement::Return
            }
            TokenType::Identifier(_) => self.parse_assignment_or_call()?,
            other => {
                let message = format!("Unexpected token '{}'", other);
                return Err(self.error_here(message));
            }
        };
        let span = start.combine(self.previous_span());
        Ok(Spanned::new(statement, span))
    }

    /// Statements starting with an identifier: assignment or call
    fn parse_assignment_or_call(&mut self) -> StResult<Statement> {
        let name = self.expect_identifier()?;

        match self.current_type() {
            TokenType::LeftParen => {
                let arguments = self.parse_call_arguments()?;
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Call(CallStatement { name, arguments }))
            }
            TokenType::Dot => {
                let target_start = self.previous_span();
                self.advance();
                let field = self.expect_identifier()?;
                let target_span = target_start.combine(self.previous_span());
                self.expect(TokenType::Assign)?;
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Assignment {
                    target: Spanned::new(
                        Target::Field {
                            instance: name,
                            field,
                        },
                        target_span,
                    ),
                    value,
                })
            }
            TokenType::LeftBracket => {
                let target_start = self.previous_span();
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenType::RightBracket)?;
                let target_span = target_start.combine(self.previous_span());
                self.expect(TokenType::Assign)?;
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Assignment {
                    target: Spanned::new(
                        Target::ArrayElement {
                            name,
                            index: Box::new(index),
                        },
                        target_span,
                    ),
                    value,
                })
            }
            TokenType::Assign => {
                let target_span = self.previous_span();
                self.advance();
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Assignment {
                    target: Spanned::new(Target::Variable(name), target_span),
                    value,
                })
            }
            other => {
                let message = format!(
                    "Expected ':=', '(', '.' or '[' after '{}', found '{}'",
                    name, other
                );
                Err(self.error_here(message))
            }
        }
    }

    fn parse_if(&mut self) -> StResult<Statement> {
        self.expect(TokenType::KeywordIf)?;
        let condition = self.parse_expression()?;
        self.expect(TokenType::KeywordThen)?;
        let then_branch = self.parse_statement_list(&[
            TokenType::KeywordElsif,
            TokenType::KeywordElse,
            TokenType::KeywordEndIf,
        ])?;

        let mut elsif_branches = Vec::new();
        while self.match_token(&TokenType::KeywordElsif) {
            let condition = self.parse_expression()?;
            self.expect(TokenType::KeywordThen)?;
            let statements = self.parse_statement_list(&[
                TokenType::KeywordElsif,
                TokenType::KeywordElse,
                TokenType::KeywordEndIf,
            ])?;
            elsif_branches.push(ElsifBranch {
                condition,
                statements,
            });
        }

        let else_branch = if self.match_token(&TokenType::KeywordElse) {
            Some(self.parse_statement_list(&[TokenType::KeywordEndIf])?)
        } else {
            None
        };

        self.expect(TokenType::KeywordEndIf)?;
        self.consume_optional_semicolon();

        Ok(Statement::If(IfStatement {
            condition,
            then_branch,
            elsif_branches,
            else_branch,
        }))
    }

    fn parse_case(&mut self) -> StResult<Statement> {
        self.expect(TokenType::KeywordCase)?;
        let selector = self.parse_expression()?;
        self.expect(TokenType::KeywordOf)?;

        let mut branches = Vec::new();
        while self.at_case_label() {
            let labels = self.parse_case_labels()?;
            self.expect(TokenType::Colon)?;
            let statements = self.parse_case_branch_body()?;
            branches.push(CaseBranch { labels, statements });
        }

        let else_branch = if self.match_token(&TokenType::KeywordElse) {
            Some(self.parse_statement_list(&[TokenType::KeywordEndCase])?)
        } else {
            None
        };

        self.expect(TokenType::KeywordEndCase)?;
        self.consume_optional_semicolon();

        Ok(Statement::Case(CaseStatement {
            selector,
            branches,
            else_branch,
        }))
    }

    /// CASE labels are integer constants, optionally negative, single or ranged
    fn at_case_label(&self) -> bool {
        match self.current_type() {
            TokenType::IntegerLiteral(_) => true,
            TokenType::Minus => matches!(
                self.peek_type(),
                Some(TokenType::IntegerLiteral(_))
            ),
            _ => false,
        }
    }

    fn parse_case_labels(&mut self) -> StResult<Vec<CaseLabel>> {
        let mut labels = vec![self.parse_case_label()?];
        while self.match_token(&TokenType::Comma) {
            labels.push(self.parse_case_label()?);
        }
        Ok(labels)
    }

    fn parse_case_label(&mut self) -> StResult<CaseLabel> {
        let low = self.parse_case_constant()?;
        if self.match_token(&TokenType::DotDot) {
            let high = self.parse_case_constant()?;
            Ok(CaseLabel::Range(low, high))
        } else {
            Ok(CaseLabel::Value(low))
        }
    }

    fn parse_case_constant(&mut self) -> StResult<Spanned<Expression>> {
        let start = self.current_span();
        let negative = self.match_token(&TokenType::Minus);
        match self.current_type().clone() {
            TokenType::IntegerLiteral(value) => {
                self.advance();
                let value = if negative { -value } else { value };
                Ok(Spanned::new(
                    Expression::Literal(Literal::Int(value)),
                    start.combine(self.previous_span()),
                ))
            }
            other => Err(self.error_here(format!(
                "Expected integer CASE label, found '{}'",
                other
            ))),
        }
    }

    /// Branch statements run until the next label, ELSE or END_CASE
    fn parse_case_branch_body(&mut self) -> StResult<Vec<Spanned<Statement>>> {
        let mut statements = Vec::new();
        while !self.is_at_end()
            && !self.check(&TokenType::KeywordElse)
            && !self.check(&TokenType::KeywordEndCase)
            && !self.at_case_label()
        {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_for(&mut self) -> StResult<Statement> {
        self.expect(TokenType::KeywordFor)?;
        let variable = self.expect_identifier()?;
        self.expect(TokenType::Assign)?;
        let from = self.parse_expression()?;
        self.expect(TokenType::KeywordTo)?;
        let to = self.parse_expression()?;
        let by = if self.match_token(&TokenType::KeywordBy) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenType::KeywordDo)?;
        let body = self.parse_statement_list(&[TokenType::KeywordEndFor])?;
        self.expect(TokenType::KeywordEndFor)?;
        self.consume_optional_semicolon();

        Ok(Statement::For(ForStatement {
            variable,
            from,
            to,
            by,
            body,
        }))
    }

    fn parse_while(&mut self) -> StResult<Statement> {
        self.expect(TokenType::KeywordWhile)?;
        let condition = self.parse_expression()?;
        self.expect(TokenType::KeywordDo)?;
        let body = self.parse_statement_list(&[TokenType::KeywordEndWhile])?;
        self.expect(TokenType::KeywordEndWhile)?;
        self.consume_optional_semicolon();

        Ok(Statement::While(WhileStatement { condition, body }))
    }

    fn parse_repeat(&mut self) -> StResult<Statement> {
        self.expect(TokenType::KeywordRepeat)?;
        let body = self.parse_statement_list(&[TokenType::KeywordUntil])?;
        self.expect(TokenType::KeywordUntil)?;
        let until = self.parse_expression()?;
        self.expect(TokenType::KeywordEndRepeat)?;
        self.consume_optional_semicolon();

        Ok(Statement::Repeat(RepeatStatement { body, until }))
    }

    fn parse_call_arguments(&mut self) -> StResult<Vec<CallArgument>> {
        self.expect(TokenType::LeftParen)?;
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RightParen) {
            arguments.push(self.parse_call_argument()?);
            while self.match_token(&TokenType::Comma) {
                arguments.push(self.parse_call_argument()?);
            }
        }

        self.expect(TokenType::RightParen)?;
        Ok(arguments)
    }

    fn parse_call_argument(&mut self) -> StResult<CallArgument> {
        // Named argument: identifier := expression
        if let TokenType::Identifier(name) = self.current_type().clone() {
            if matches!(self.peek_type(), Some(TokenType::Assign)) {
                self.advance(); // identifier
                self.advance(); // :=
                let value = self.parse_expression()?;
                return Ok(CallArgument {
                    name: Some(name),
                    value,
                });
            }
        }
        let value = self.parse_expression()?;
        Ok(CallArgument { name: None, value })
    }

    // Expression precedence chain, loosest first: OR < XOR < AND <
    // comparison < additive < multiplicative < unary < ** < primary

    pub fn parse_expression(&mut self) -> StResult<Spanned<Expression>> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_xor_expression()?;
        while self.match_token(&TokenType::KeywordOr) {
            let right = self.parse_xor_expression()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_xor_expression(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_and_expression()?;
        while self.match_token(&TokenType::KeywordXor) {
            let right = self.parse_and_expression()?;
            left = binary(left, BinaryOp::Xor, right);
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&TokenType::KeywordAnd) {
            let right = self.parse_comparison()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_type() {
                TokenType::Equal => BinaryOp::Eq,
                TokenType::NotEqual => BinaryOp::Ne,
                TokenType::Less => BinaryOp::Lt,
                TokenType::LessEqual => BinaryOp::Le,
                TokenType::Greater => BinaryOp::Gt,
                TokenType::GreaterEqual => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current_type() {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> StResult<Spanned<Expression>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_type() {
                TokenType::Star => BinaryOp::Mul,
                TokenType::Slash => BinaryOp::Div,
                TokenType::KeywordMod => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> StResult<Spanned<Expression>> {
        let start = self.current_span();
        match self.current_type() {
            TokenType::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.combine(operand.span);
                Ok(Spanned::new(
                    Expression::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenType::KeywordNot => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.combine(operand.span);
                Ok(Spanned::new(
                    Expression::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenType::Plus => {
                // Unary plus is a no-op
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// `**` binds tightest of the binary operators and associates right
    fn parse_power(&mut self) -> StResult<Spanned<Expression>> {
        let left = self.parse_primary()?;
        if self.match_token(&TokenType::Power) {
            let right = self.parse_unary()?;
            return Ok(binary(left, BinaryOp::Pow, right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> StResult<Spanned<Expression>> {
        let start = self.current_span();
        match self.current_type().clone() {
            TokenType::IntegerLiteral(value) => {
                self.advance();
                Ok(Spanned::new(
                    Expression::Literal(Literal::Int(value)),
                    start,
                ))
            }
            TokenType::RealLiteral(text) => {
                self.advance();
                let value: f64 = text.parse().map_err(|_| {
                    StError::parse_error(format!("Invalid real literal '{}'", text))
                })?;
                Ok(Spanned::new(
                    Expression::Literal(Literal::Real(value)),
                    start,
                ))
            }
            TokenType::StringLiteral(text) => {
                self.advance();
                Ok(Spanned::new(
                    Expression::Literal(Literal::Str(text)),
                    start,
                ))
            }
            TokenType::BoolLiteral(value) => {
                self.advance();
                Ok(Spanned::new(
                    Expression::Literal(Literal::Bool(value)),
                    start,
                ))
            }
            TokenType::TimeLiteral(ms) => {
                self.advance();
                Ok(Spanned::new(
                    Expression::Literal(Literal::Time(ms)),
                    start,
                ))
            }
            TokenType::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::RightParen)?;
                Ok(Spanned::new(inner.value, start.combine(self.previous_span())))
            }
            TokenType::Identifier(name) => {
                self.advance();
                match self.current_type() {
                    TokenType::LeftParen => {
                        let arguments = self.parse_call_arguments()?;
                        let span = start.combine(self.previous_span());
                        Ok(Spanned::new(Expression::Call { name, arguments }, span))
                    }
                    TokenType::Dot => {
                        self.advance();
                        let field = self.expect_identifier()?;
                        let span = start.combine(self.previous_span());
                        Ok(Spanned::new(
                            Expression::FieldAccess {
                                instance: name,
                                field,
                            },
                            span,
                        ))
                    }
                    TokenType::LeftBracket => {
                        self.advance();
                        let index = self.parse_expression()?;
                        self.expect(TokenType::RightBracket)?;
                        let span = start.combine(self.previous_span());
                        Ok(Spanned::new(
                            Expression::ArrayAccess {
                                name,
                                index: Box::new(index),
                            },
                            span,
                        ))
                    }
                    _ => Ok(Spanned::new(Expression::Variable(name), start)),
                }
            }
            other => Err(self.error_here(format!(
                "Expected expression, found '{}'",
                other
            ))),
        }
    }

    // Token cursor helpers

    fn is_at_end(&self) -> bool {
        matches!(self.current_type(), TokenType::EndOfFile)
    }

    fn current_type(&self) -> &TokenType {
        &self.tokens[self.current.min(self.tokens.len() - 1)].value
    }

    fn peek_type(&self) -> Option<&TokenType> {
        self.tokens.get(self.current + 1).map(|t| &t.value)
    }

    fn current_span(&self) -> Span {
        self.tokens[self.current.min(self.tokens.len() - 1)].span
    }

    fn previous_span(&self) -> Span {
        if self.current == 0 {
            self.current_span()
        } else {
            self.tokens[self.current - 1].span
        }
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        self.current_type() == token_type
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: TokenType) -> StResult<()> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            let message = format!(
                "Expected '{}', found '{}'",
                token_type,
                self.current_type()
            );
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self) -> StResult<String> {
        match self.current_type().clone() {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_here(format!("Expected identifier, found '{}'", other))),
        }
    }

    /// Expect an identifier with a specific (case-insensitive) spelling;
    /// used for contextual words such as the OF in an ARRAY type
    fn expect_word(&mut self, word: &str) -> StResult<()> {
        match self.current_type() {
            TokenType::Identifier(name) if name.eq_ignore_ascii_case(word) => {
                self.advance();
                Ok(())
            }
            TokenType::KeywordOf if word.eq_ignore_ascii_case("OF") => {
                self.advance();
                Ok(())
            }
            other => {
                let message = format!("Expected '{}', found '{}'", word, other);
                Err(self.error_here(message))
            }
        }
    }

    fn consume_optional_semicolon(&mut self) {
        self.match_token(&TokenType::Semicolon);
    }

    fn error_here(&mut self, message: String) -> StError {
        let span = self.current_span();
        self.diagnostics.error(&message, span);
        StError::parse_error(format!("{} at {}", message, span))
    }
}

fn binary(
    left: Spanned<Expression>,
    op: BinaryOp,
    right: Spanned<Expression>,
) -> Spanned<Expression> {
    let span = left.span.combine(right.span);
    Spanned::new(
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
