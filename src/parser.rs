use crate::ast::{
    ArgDeclaration, ArrayLiteral, Expr, FunctionCall, JsonPath, JsonPathElement, Literal,
    LiteralOrArray, RadBlock, RadStmt, RslType, RslTypeKind, Stmt, SwitchBlock, SwitchStmt, Token,
    TokenType,
};
use crate::lexer::LexError;
use thiserror::Error;

/// A fatal parse error. Parsing is non-recovering: the first error aborts.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Error at L{line}/{col} on '{lexeme}': {message}")]
    Unexpected {
        line: usize,
        col: usize,
        lexeme: String,
        message: String,
    },
}

/// Recursive descent over the token stream, one token of lookahead plus a
/// two-token peek for array declarations and function-call statements.
pub struct Parser {
    tokens: Vec<Token>,
    next: usize,
}

const TYPE_NAMES: [&str; 4] = ["string", "int", "float", "bool"];

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, next: 0 }
    }

    /// Parse a whole script: optional file header, optional `args` block,
    /// then statements until EOF.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        self.consume_newlines();
        if let Some(header) = self.file_header_if_present() {
            statements.push(header);
        }
        self.consume_newlines();
        if let Some(args) = self.arg_block_if_present()? {
            statements.push(args);
        }
        self.consume_newlines();

        while !self.is_at_end() {
            statements.push(self.statement()?);
            self.consume_newlines();
        }
        Ok(statements)
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.next]
    }

    fn peek_two_ahead(&self) -> &Token {
        &self.tokens[(self.next + 1).min(self.tokens.len() - 1)]
    }

    fn peek_type(&self, token_type: TokenType) -> bool {
        self.peek().token_type == token_type
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.next - 1]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.next += 1;
        }
        self.previous()
    }

    fn rewind(&mut self) {
        self.next -= 1;
    }

    fn match_any(&mut self, token_types: &[TokenType]) -> bool {
        for t in token_types {
            if self.peek_type(*t) {
                self.advance();
                return true;
            }
        }
        false
    }

    /// Keywords are scoped: an identifier only acts as a keyword where the
    /// grammar calls for it, so `fields` or `string` stay usable as plain
    /// identifiers elsewhere.
    fn match_keyword(&mut self, lexeme: &str) -> bool {
        if self.peek_type(TokenType::Identifier) && self.peek().lexeme == lexeme {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self, lexeme: &str) -> bool {
        self.peek_type(TokenType::Identifier) && self.peek().lexeme == lexeme
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.peek_type(token_type) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        let token = self.peek();
        ParseError::Unexpected {
            line: token.line,
            col: token.col,
            lexeme: token.printable_lexeme(),
            message: message.to_string(),
        }
    }

    fn consume_newlines(&mut self) {
        while !self.is_at_end() && self.match_any(&[TokenType::Newline]) {}
    }

    fn consume_newlines_min_one(&mut self) -> Result<(), ParseError> {
        if !self.match_any(&[TokenType::Newline]) && !self.is_at_end() {
            return Err(self.error("Expected newline"));
        }
        self.consume_newlines();
        Ok(())
    }

    fn file_header_if_present(&mut self) -> Option<Stmt> {
        if self.match_any(&[TokenType::FileHeader]) {
            Some(Stmt::FileHeader {
                token: self.previous().clone(),
            })
        } else {
            None
        }
    }

    fn arg_block_if_present(&mut self) -> Result<Option<Stmt>, ParseError> {
        if !self.peek_keyword("args") || self.peek_two_ahead().token_type != TokenType::Colon {
            return Ok(None);
        }
        self.advance();
        let args_keyword = self.previous().clone();
        self.consume(TokenType::Colon, "Expected ':' after 'args'")?;
        self.consume_newlines();

        let mut stmts = Vec::new();
        if self.match_any(&[TokenType::Indent]) {
            self.consume_newlines();
            while !self.match_any(&[TokenType::Dedent]) {
                stmts.push(self.arg_declaration()?);
                self.consume_newlines();
            }
        }
        Ok(Some(Stmt::ArgBlock { args_keyword, stmts }))
    }

    /// `IDENTIFIER (STRING_LITERAL)? (IDENTIFIER)? TYPE ('?' | '=' DEFAULT)? ARG_COMMENT`
    fn arg_declaration(&mut self) -> Result<ArgDeclaration, ParseError> {
        let identifier = self.consume(TokenType::Identifier, "Expected argument name")?;

        let rename = if self.match_any(&[TokenType::StringLiteral]) {
            Some(self.previous().clone())
        } else {
            None
        };

        // A non-type identifier before the type is the short flag.
        let flag = if self.peek_type(TokenType::Identifier)
            && !TYPE_NAMES.contains(&self.peek().lexeme.as_str())
        {
            Some(self.consume(TokenType::Identifier, "Expected flag")?)
        } else {
            None
        };

        let arg_type = self.rsl_type()?;

        let mut is_optional = false;
        let mut default = None;
        if self.match_any(&[TokenType::Question]) {
            is_optional = true;
        } else if self.match_any(&[TokenType::Equal]) {
            is_optional = true;
            default = Some(self.literal_or_array(arg_type.kind)?);
        }

        let comment = self.consume(TokenType::ArgComment, "Expected arg comment")?;

        Ok(ArgDeclaration {
            identifier,
            rename,
            flag,
            arg_type,
            is_optional,
            default,
            comment,
        })
    }

    fn rsl_type(&mut self) -> Result<RslType, ParseError> {
        if !self.peek_type(TokenType::Identifier)
            || !TYPE_NAMES.contains(&self.peek().lexeme.as_str())
        {
            return Err(self.error("Expected arg type"));
        }
        let token = self.advance().clone();
        let scalar = match token.lexeme.as_str() {
            "string" => RslTypeKind::Str,
            "int" => RslTypeKind::Int,
            "float" => RslTypeKind::Float,
            "bool" => RslTypeKind::Bool,
            _ => unreachable!("internal error: unhandled type name"),
        };
        let kind = if self.match_any(&[TokenType::Brackets]) {
            match scalar {
                RslTypeKind::Str => RslTypeKind::StrArray,
                RslTypeKind::Int => RslTypeKind::IntArray,
                RslTypeKind::Float => RslTypeKind::FloatArray,
                RslTypeKind::Bool => RslTypeKind::BoolArray,
                _ => unreachable!("internal error: array of array type"),
            }
        } else {
            scalar
        };
        Ok(RslType { token, kind })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_keyword("rad") || self.peek_keyword("request") {
            self.advance();
            return self.rad_block();
        }

        if self.peek_type(TokenType::Identifier)
            && self.peek_two_ahead().token_type == TokenType::LeftParen
        {
            let call = self.function_call()?;
            return Ok(Stmt::FunctionStmt { call });
        }

        self.assignment()
    }

    fn assignment(&mut self) -> Result<Stmt, ParseError> {
        let mut identifiers = vec![self.consume(TokenType::Identifier, "Expected identifier")?];

        // `a int[] = ...` — two-token lookahead for a typed array declaration.
        if self.peek_type(TokenType::Identifier)
            && self.peek_two_ahead().token_type == TokenType::Brackets
        {
            let array_type = self.rsl_type()?;
            self.consume(TokenType::Equal, "Expected '=' after array type")?;
            let initializer = self.expression()?;
            return Ok(Stmt::ArrayAssign {
                name: identifiers.remove(0),
                array_type,
                initializer,
            });
        }

        // A lone identifier on a line is an expression statement.
        if matches!(
            self.peek().token_type,
            TokenType::Newline | TokenType::Eof
        ) && identifiers.len() == 1
        {
            return Ok(Stmt::Expression {
                expr: Expr::Variable {
                    name: identifiers.remove(0),
                },
            });
        }

        while !self.match_any(&[TokenType::Equal]) {
            self.consume(TokenType::Comma, "Expected ',' between identifiers")?;
            identifiers.push(self.consume(TokenType::Identifier, "Expected identifier")?);
        }

        if self.peek_keyword("switch") {
            self.advance();
            let block = self.switch_block(identifiers.len())?;
            return Ok(Stmt::SwitchAssign { identifiers, block });
        }

        if identifiers.len() > 1 {
            return Err(self.error("Multiple assignments are only allowed for switch blocks"));
        }

        let identifier = identifiers.remove(0);
        if self.peek_type(TokenType::JsonPathElement) {
            self.json_path_assignment(identifier)
        } else {
            let initializer = self.expression()?;
            Ok(Stmt::PrimaryAssign {
                name: identifier,
                initializer,
            })
        }
    }

    fn json_path_assignment(&mut self, identifier: Token) -> Result<Stmt, ParseError> {
        let root = self.consume(TokenType::JsonPathElement, "Expected root json path element")?;
        let is_array = self.match_any(&[TokenType::Brackets]);
        let mut elements = vec![JsonPathElement {
            token: root,
            is_array,
        }];

        while !self.match_any(&[TokenType::Newline]) {
            self.consume(TokenType::Dot, "Expected '.' to separate json path elements")?;
            let token =
                self.consume(TokenType::JsonPathElement, "Expected json path element after '.'")?;
            let is_array = self.match_any(&[TokenType::Brackets]);
            elements.push(JsonPathElement { token, is_array });
        }

        Ok(Stmt::JsonPathAssign {
            identifier,
            path: JsonPath { elements },
        })
    }

    fn switch_block(&mut self, expected_values: usize) -> Result<SwitchBlock, ParseError> {
        let switch_token = self.previous().clone();

        let discriminator = if self.match_any(&[TokenType::Colon]) {
            None
        } else {
            let token =
                self.consume(TokenType::Identifier, "Expected discriminator or ':' after switch")?;
            self.consume(TokenType::Colon, "Expected ':' after switch discriminator")?;
            Some(token)
        };

        self.consume_newlines_min_one()?;
        self.consume(TokenType::Indent, "Expected indented block after switch")?;
        self.consume_newlines();

        let mut stmts = Vec::new();
        while !self.match_any(&[TokenType::Dedent]) {
            stmts.push(self.switch_stmt(discriminator.is_some(), expected_values)?);
            self.consume_newlines();
        }

        Ok(SwitchBlock {
            switch_token,
            discriminator,
            stmts,
        })
    }

    fn switch_stmt(
        &mut self,
        has_discriminator: bool,
        expected_values: usize,
    ) -> Result<SwitchStmt, ParseError> {
        if self.match_keyword("case") {
            let case_keyword = self.previous().clone();
            let mut keys = Vec::new();
            if has_discriminator {
                keys.push(self.string_literal()?);
                while !self.match_any(&[TokenType::Colon]) {
                    self.consume(TokenType::Comma, "Expected ',' between case keys")?;
                    keys.push(self.string_literal()?);
                }
            } else {
                self.consume(TokenType::Colon, "Expected ':' after 'case' when no discriminator")?;
            }
            let values = self.switch_values(expected_values)?;
            return Ok(SwitchStmt::Case {
                case_keyword,
                keys,
                values,
            });
        }

        if self.match_keyword("default") {
            let default_keyword = self.previous().clone();
            self.consume(TokenType::Colon, "Expected ':' after 'default'")?;
            let values = self.switch_values(expected_values)?;
            return Ok(SwitchStmt::Default {
                default_keyword,
                values,
            });
        }

        Err(self.error("Expected 'case' or 'default' in switch block"))
    }

    fn switch_values(&mut self, expected_values: usize) -> Result<Vec<Expr>, ParseError> {
        let mut values = vec![self.expression()?];
        while !self.match_any(&[TokenType::Newline]) {
            self.consume(TokenType::Comma, "Expected ',' between values")?;
            values.push(self.expression()?);
        }
        if values.len() != expected_values {
            return Err(self.error(&format!(
                "Expected {} return values, got {}",
                expected_values,
                values.len()
            )));
        }
        Ok(values)
    }

    fn string_literal(&mut self) -> Result<Literal, ParseError> {
        let token = self.consume(TokenType::StringLiteral, "Expected string literal")?;
        Ok(Literal { token })
    }

    fn rad_block(&mut self) -> Result<Stmt, ParseError> {
        let rad_keyword = self.previous().clone();
        let url = self.expression()?;
        self.consume(TokenType::Colon, "Expected ':' to start rad block")?;
        self.consume_newlines();
        if !self.match_any(&[TokenType::Indent]) {
            return Err(self.error("Expected indented contents in rad block"));
        }
        self.consume_newlines();

        let mut stmts = Vec::new();
        while !self.match_any(&[TokenType::Dedent]) {
            stmts.push(self.rad_statement()?);
            self.consume_newlines();
        }

        let block = RadBlock {
            rad_keyword,
            url,
            stmts,
        };
        self.validate_rad_block(&block)?;
        Ok(Stmt::RadBlock(block))
    }

    fn rad_statement(&mut self) -> Result<RadStmt, ParseError> {
        if self.match_keyword("fields") {
            let mut identifiers = vec![self.consume(TokenType::Identifier, "Expected identifier")?];
            while !self.match_any(&[TokenType::Newline]) {
                self.consume(TokenType::Comma, "Expected ',' between identifiers")?;
                identifiers.push(self.consume(TokenType::Identifier, "Expected identifier")?);
            }
            return Ok(RadStmt::Fields { identifiers });
        }
        Err(self.error("Expected 'fields' statement in rad block"))
    }

    fn validate_rad_block(&self, block: &RadBlock) -> Result<(), ParseError> {
        let fields_count = block
            .stmts
            .iter()
            .filter(|s| matches!(s, RadStmt::Fields { .. }))
            .count();
        match fields_count {
            0 => Err(self.error("A rad block must contain a 'fields' statement")),
            1 => Ok(()),
            _ => Err(self.error("Only one 'fields' statement is allowed in a rad block")),
        }
    }

    // expression -> or -> and -> equality -> comparison -> term -> factor
    //            -> unary -> primary

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.match_keyword("or") {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_keyword("and") {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.match_any(&[TokenType::EqualEqual, TokenType::NotEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while self.match_any(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        while self.match_any(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_any(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenType::Exclamation, TokenType::Minus, TokenType::Plus])
            || self.match_keyword("not")
        {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expected ')' after expression")?;
            return Ok(self.index_chain(Expr::Grouping {
                value: Box::new(expr),
            })?);
        }

        if self.match_any(&[
            TokenType::StringLiteral,
            TokenType::IntLiteral,
            TokenType::FloatLiteral,
            TokenType::BoolLiteral,
        ]) {
            return Ok(Expr::Literal {
                token: self.previous().clone(),
            });
        }

        // `[]` lexes as a single Brackets token: the empty array.
        if self.match_any(&[TokenType::Brackets]) {
            return Ok(Expr::ArrayExpr {
                bracket: self.previous().clone(),
                values: Vec::new(),
            });
        }

        if self.match_any(&[TokenType::LeftBracket]) {
            let bracket = self.previous().clone();
            let mut values = Vec::new();
            while !self.match_any(&[TokenType::RightBracket]) {
                if !values.is_empty() {
                    self.consume(TokenType::Comma, "Expected ',' between array elements")?;
                }
                values.push(self.expression()?);
            }
            return Ok(Expr::ArrayExpr { bracket, values });
        }

        if self.match_any(&[TokenType::Identifier]) {
            let name = self.previous().clone();
            if self.peek_type(TokenType::LeftParen) {
                self.rewind();
                let call = self.function_call()?;
                return self.index_chain(Expr::Call(call));
            }
            return self.index_chain(Expr::Variable { name });
        }

        Err(self.error("Expected expression"))
    }

    /// Consume any number of `[index]` suffixes, so chains like
    /// `a[1][1][0]` nest left to right.
    fn index_chain(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        while self.peek_type(TokenType::LeftBracket) {
            let bracket = self.advance().clone();
            let index = self.expression()?;
            self.consume(TokenType::RightBracket, "Expected ']' after array index")?;
            expr = Expr::ArrayAccess {
                array: Box::new(expr),
                bracket,
                index: Box::new(index),
            };
        }
        Ok(expr)
    }

    fn function_call(&mut self) -> Result<FunctionCall, ParseError> {
        let function = self.consume(TokenType::Identifier, "Expected function name")?;
        self.consume(TokenType::LeftParen, "Expected '(' after function name")?;
        let mut args = Vec::new();
        if !self.match_any(&[TokenType::RightParen]) {
            args.push(self.expression()?);
            while !self.match_any(&[TokenType::RightParen]) {
                self.consume(TokenType::Comma, "Expected ',' between function arguments")?;
                args.push(self.expression()?);
            }
        }
        Ok(FunctionCall { function, args })
    }

    /// A literal, or a homogeneous array literal whose elements must match
    /// `expected`. Used for argument defaults, where the declared type is
    /// known.
    fn literal_or_array(&mut self, expected: RslTypeKind) -> Result<LiteralOrArray, ParseError> {
        if expected.is_array() {
            if self.match_any(&[TokenType::Brackets]) {
                return Ok(LiteralOrArray::Array(ArrayLiteral::Empty {
                    brackets: self.previous().clone(),
                }));
            }
            self.consume(TokenType::LeftBracket, "Expected default value")?;
            let mut literals = Vec::new();
            while !self.match_any(&[TokenType::RightBracket]) {
                if !literals.is_empty() {
                    self.consume(TokenType::Comma, "Expected ',' between array elements")?;
                }
                literals.push(self.typed_literal(expected.element_type())?);
            }
            let array = match expected.element_type() {
                RslTypeKind::Str => ArrayLiteral::Strings(literals),
                RslTypeKind::Int => ArrayLiteral::Ints(literals),
                RslTypeKind::Float => ArrayLiteral::Floats(literals),
                RslTypeKind::Bool => ArrayLiteral::Bools(literals),
                _ => unreachable!("internal error: nested array type"),
            };
            return Ok(LiteralOrArray::Array(array));
        }

        Ok(LiteralOrArray::Literal(self.typed_literal(expected)?))
    }

    fn typed_literal(&mut self, expected: RslTypeKind) -> Result<Literal, ParseError> {
        let (token_type, message) = match expected {
            RslTypeKind::Str => (TokenType::StringLiteral, "Expected string literal"),
            RslTypeKind::Int => (TokenType::IntLiteral, "Expected int literal"),
            RslTypeKind::Float => (TokenType::FloatLiteral, "Expected float literal"),
            RslTypeKind::Bool => (TokenType::BoolLiteral, "Expected bool literal"),
            _ => unreachable!("internal error: typed_literal on array type"),
        };
        let token = self.consume(token_type, message)?;
        Ok(Literal { token })
    }
}
