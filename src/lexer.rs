use crate::ast::tokens::{Token, TokenLiteral, TokenType};
use thiserror::Error;

/// A fatal lexing error, citing the offending lexeme's position.
#[derive(Debug, Clone, Error)]
#[error("Error at L{line}/{col} on '{lexeme}': {message}")]
pub struct LexError {
    pub line: usize,
    pub col: usize,
    pub lexeme: String,
    pub message: String,
}

/// Single forward pass over the source, producing the full token stream.
///
/// Indentation is resolved here, not in the parser: each line start is
/// measured against a width stack (space = 1 column, tab = 4) and emits
/// `Indent`/`Dedent` tokens, so the parser stays context-free. Blank and
/// comment-only lines leave the stack untouched.
pub struct Lexer {
    chars: Vec<char>,
    /// char index where the current lexeme starts
    start: usize,
    /// char index of the next character to read
    next: usize,
    /// byte offset of the current lexeme start
    start_offset: usize,
    /// byte offset of the next character
    next_offset: usize,
    start_line: usize,
    start_col: usize,
    line: usize,
    col: usize,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            start: 0,
            next: 0,
            start_offset: 0,
            next_offset: 0,
            start_line: 1,
            start_col: 1,
            line: 1,
            col: 1,
            indent_stack: vec![0],
            tokens: Vec::new(),
        }
    }

    /// Lex the whole source. The stream always ends with a `Newline` (real
    /// or synthesized), any outstanding `Dedent`s, and `Eof`.
    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        self.handle_line_start()?;
        while !self.is_at_end() {
            self.begin_lexeme();
            self.scan_token()?;
        }

        if !matches!(
            self.tokens.last().map(|t| t.token_type),
            None | Some(TokenType::Newline)
        ) {
            self.begin_lexeme();
            self.add_token(TokenType::Newline);
        }
        self.begin_lexeme();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.add_token(TokenType::Dedent);
        }
        self.add_token(TokenType::Eof);
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.next >= self.chars.len()
    }

    fn begin_lexeme(&mut self) {
        self.start = self.next;
        self.start_offset = self.next_offset;
        self.start_line = self.line;
        self.start_col = self.col;
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.next];
        self.next += 1;
        self.next_offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.next).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.next + offset).copied()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            ',' => self.add_token(TokenType::Comma),
            ':' => self.add_token(TokenType::Colon),
            '.' => self.add_token(TokenType::Dot),
            '|' => self.add_token(TokenType::Pipe),
            '?' => self.add_token(TokenType::Question),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            '*' => self.add_token(TokenType::Star),
            '@' => self.add_token(TokenType::At),
            '\n' => {
                self.add_token(TokenType::Newline);
                self.handle_line_start()?;
            }
            '=' => {
                if self.matches('=') {
                    self.add_token(TokenType::EqualEqual);
                } else {
                    self.add_token(TokenType::Equal);
                }
            }
            '!' => {
                if self.matches('=') {
                    self.add_token(TokenType::NotEqual);
                } else {
                    self.add_token(TokenType::Exclamation);
                }
            }
            '<' => {
                if self.matches('=') {
                    self.add_token(TokenType::LessEqual);
                } else {
                    self.add_token(TokenType::Less);
                }
            }
            '>' => {
                if self.matches('=') {
                    self.add_token(TokenType::GreaterEqual);
                } else {
                    self.add_token(TokenType::Greater);
                }
            }
            '[' => {
                if self.matches(']') {
                    self.add_token(TokenType::Brackets);
                } else {
                    self.add_token(TokenType::LeftBracket);
                }
            }
            ']' => self.add_token(TokenType::RightBracket),
            '/' => {
                if self.matches('/') {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '#' => self.lex_arg_comment(),
            '"' => self.lex_string_or_header()?,
            ' ' | '\t' | '\r' => {}
            c if c.is_ascii_digit() => self.lex_number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_identifier(),
            _ => return Err(self.error("Unexpected character")),
        }
        Ok(())
    }

    /// Measure the indentation of the upcoming line and emit
    /// `Indent`/`Dedent` tokens. Blank and comment-only lines are left
    /// alone; the main loop lexes their newline without touching the stack.
    fn handle_line_start(&mut self) -> Result<(), LexError> {
        let mut width = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width += 4,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None | Some('\n') => return Ok(()),
            Some('/') if self.peek_at(1) == Some('/') => return Ok(()),
            _ => {}
        }

        self.begin_lexeme();
        let current = *self
            .indent_stack
            .last()
            .expect("internal error: empty indent stack");
        if width > current {
            self.indent_stack.push(width);
            self.add_token(TokenType::Indent);
        } else if width < current {
            while *self.indent_stack.last().unwrap() > width {
                self.indent_stack.pop();
                self.add_token(TokenType::Dedent);
            }
            if *self.indent_stack.last().unwrap() != width {
                return Err(self.error("Inconsistent indentation"));
            }
        }
        Ok(())
    }

    fn lex_arg_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
        let text: String = self.chars[self.start + 1..self.next].iter().collect();
        self.add_literal_token(
            TokenType::ArgComment,
            TokenLiteral::Str(text.trim().to_string()),
        );
    }

    fn lex_string_or_header(&mut self) -> Result<(), LexError> {
        if self.matches('"') {
            if self.matches('"') {
                if !self.matches('\n') {
                    return Err(self.error("Expected newline after triple quote"));
                }
                self.lex_file_header()
            } else {
                // empty string literal
                self.add_literal_token(TokenType::StringLiteral, TokenLiteral::Str(String::new()));
                Ok(())
            }
        } else {
            self.lex_string_literal()
        }
    }

    fn lex_string_literal(&mut self) -> Result<(), LexError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("Unterminated string")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        _ => return Err(self.error("Invalid escape sequence")),
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        self.add_literal_token(TokenType::StringLiteral, TokenLiteral::Str(value));
        Ok(())
    }

    /// Body runs until a line consisting exactly of `"""`.
    fn lex_file_header(&mut self) -> Result<(), LexError> {
        // The first body line may itself be the closing delimiter.
        if self.peek() == Some('"')
            && self.peek_at(1) == Some('"')
            && self.peek_at(2) == Some('"')
            && matches!(self.peek_at(3), None | Some('\n'))
        {
            self.advance();
            self.advance();
            self.advance();
            self.add_literal_token(TokenType::FileHeader, TokenLiteral::Str(String::new()));
            return Ok(());
        }

        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.error("Unterminated file header"));
            }
            if self.peek() == Some('\n')
                && self.peek_at(1) == Some('"')
                && self.peek_at(2) == Some('"')
                && self.peek_at(3) == Some('"')
                && matches!(self.peek_at(4), None | Some('\n'))
            {
                self.advance(); // \n
                self.advance(); // "
                self.advance(); // "
                self.advance(); // "
                break;
            }
            value.push(self.advance());
        }
        // Closing """ on the first body line means an empty header.
        self.add_literal_token(TokenType::FileHeader, TokenLiteral::Str(value));
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme: String = self.chars[self.start..self.next].iter().collect();
        if is_float {
            let value: f64 = lexeme
                .parse()
                .map_err(|_| self.error("Invalid float"))?;
            self.add_literal_token(TokenType::FloatLiteral, TokenLiteral::Float(value));
        } else {
            let value: i64 = lexeme
                .parse()
                .map_err(|_| self.error("Invalid integer"))?;
            self.add_literal_token(TokenType::IntLiteral, TokenLiteral::Int(value));
        }
        Ok(())
    }

    fn lex_identifier(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let lexeme: String = self.chars[self.start..self.next].iter().collect();
        match lexeme.as_str() {
            "true" => self.add_literal_token(TokenType::BoolLiteral, TokenLiteral::Bool(true)),
            "false" => self.add_literal_token(TokenType::BoolLiteral, TokenLiteral::Bool(false)),
            "json" => {
                self.add_token(TokenType::JsonPathElement);
                self.lex_json_path();
            }
            _ => self.add_token(TokenType::Identifier),
        }
    }

    /// Continue lexing a JSON path after its `json` root marker: `[]` pairs
    /// become `Brackets` and each `.segment` becomes `Dot` followed by a
    /// `JsonPathElement` whose lexeme is the identifier or `*`.
    fn lex_json_path(&mut self) {
        self.lex_path_brackets();
        while self.peek() == Some('.')
            && self
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '*')
        {
            self.begin_lexeme();
            self.advance();
            self.add_token(TokenType::Dot);

            self.begin_lexeme();
            if self.peek() == Some('*') {
                self.advance();
            } else {
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    self.advance();
                }
            }
            self.add_token(TokenType::JsonPathElement);
            self.lex_path_brackets();
        }
    }

    fn lex_path_brackets(&mut self) {
        if self.peek() == Some('[') && self.peek_at(1) == Some(']') {
            self.begin_lexeme();
            self.advance();
            self.advance();
            self.add_token(TokenType::Brackets);
        }
    }

    fn add_token(&mut self, token_type: TokenType) {
        let lexeme: String = self.chars[self.start..self.next].iter().collect();
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            self.start_offset,
            self.start_line,
            self.start_col,
        ));
    }

    fn add_literal_token(&mut self, token_type: TokenType, literal: TokenLiteral) {
        let lexeme: String = self.chars[self.start..self.next].iter().collect();
        self.tokens.push(
            Token::new(
                token_type,
                lexeme,
                self.start_offset,
                self.start_line,
                self.start_col,
            )
            .with_literal(literal),
        );
    }

    fn error(&self, message: &str) -> LexError {
        let lexeme: String = self.chars[self.start..self.next].iter().collect();
        LexError {
            line: self.start_line,
            col: self.start_col,
            lexeme: lexeme.replace('\n', "\\n"),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        Lexer::new(source)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn lexes_two_char_operators() {
        assert_eq!(
            types("a == b != c <= d >= e"),
            vec![
                TokenType::Identifier,
                TokenType::EqualEqual,
                TokenType::Identifier,
                TokenType::NotEqual,
                TokenType::Identifier,
                TokenType::LessEqual,
                TokenType::Identifier,
                TokenType::GreaterEqual,
                TokenType::Identifier,
                TokenType::Newline,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn lexes_json_path_with_wildcard_and_brackets() {
        let tokens = Lexer::new("a = json.results.*[].name\n").lex().unwrap();
        let lexemes: Vec<(TokenType, String)> = tokens
            .into_iter()
            .map(|t| (t.token_type, t.lexeme))
            .collect();
        assert_eq!(
            lexemes,
            vec![
                (TokenType::Identifier, "a".to_string()),
                (TokenType::Equal, "=".to_string()),
                (TokenType::JsonPathElement, "json".to_string()),
                (TokenType::Dot, ".".to_string()),
                (TokenType::JsonPathElement, "results".to_string()),
                (TokenType::Dot, ".".to_string()),
                (TokenType::JsonPathElement, "*".to_string()),
                (TokenType::Brackets, "[]".to_string()),
                (TokenType::Dot, ".".to_string()),
                (TokenType::JsonPathElement, "name".to_string()),
                (TokenType::Newline, "\n".to_string()),
                (TokenType::Eof, "".to_string()),
            ]
        );
    }

    #[test]
    fn emits_indent_and_dedent_around_blocks() {
        let source = "rad url:\n    fields a, b\nprint(a)\n";
        assert_eq!(
            types(source),
            vec![
                TokenType::Identifier, // rad (keyword scoping is the parser's job)
                TokenType::Identifier,
                TokenType::Colon,
                TokenType::Newline,
                TokenType::Indent,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Comma,
                TokenType::Identifier,
                TokenType::Newline,
                TokenType::Dedent,
                TokenType::Identifier,
                TokenType::LeftParen,
                TokenType::Identifier,
                TokenType::RightParen,
                TokenType::Newline,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn blank_lines_do_not_dedent() {
        let source = "x = switch:\n    case: 1\n\n    default: 2\n";
        let token_types = types(source);
        let dedents = token_types
            .iter()
            .filter(|t| **t == TokenType::Dedent)
            .count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = Lexer::new("a = 1\nbb = 22\n").lex().unwrap();
        let bb = tokens
            .iter()
            .find(|t| t.lexeme == "bb")
            .expect("bb token");
        assert_eq!((bb.line, bb.col), (2, 1));
        let twenty_two = tokens
            .iter()
            .find(|t| t.lexeme == "22")
            .expect("22 token");
        assert_eq!((twenty_two.line, twenty_two.col), (2, 6));
    }

    #[test]
    fn plus_column_matches_error_contract() {
        // `print(a + ["4"])` — the `+` sits at column 9.
        let tokens = Lexer::new("print(a + [\"4\"])\n").lex().unwrap();
        let plus = tokens
            .iter()
            .find(|t| t.token_type == TokenType::Plus)
            .unwrap();
        assert_eq!((plus.line, plus.col), (1, 9));
    }

    #[test]
    fn file_header_payload_is_body_text() {
        let source = "\"\"\"\nGreets the user.\nMore detail.\n\"\"\"\nprint(\"hi\")\n";
        let tokens = Lexer::new(source).lex().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::FileHeader);
        assert_eq!(tokens[0].str_literal(), "Greets the user.\nMore detail.");
    }

    #[test]
    fn arg_comment_payload_is_trimmed() {
        let tokens = Lexer::new("name string #  the user's name  \n").lex().unwrap();
        let comment = tokens
            .iter()
            .find(|t| t.token_type == TokenType::ArgComment)
            .unwrap();
        assert_eq!(comment.str_literal(), "the user's name");
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = Lexer::new("a = \"oops\n").lex().unwrap_err();
        assert!(err.to_string().contains("Unterminated string"));
        assert!(err.to_string().contains("L1/5"));
    }

    #[test]
    fn floats_require_digits_after_dot() {
        let tokens = Lexer::new("a = 3.14\n").lex().unwrap();
        let float = tokens
            .iter()
            .find(|t| t.token_type == TokenType::FloatLiteral)
            .unwrap();
        assert_eq!(float.float_literal(), 3.14);
    }

    #[test]
    fn missing_trailing_newline_is_repaired() {
        let token_types = types("a = 1");
        assert_eq!(
            token_types[token_types.len() - 2..],
            [TokenType::Newline, TokenType::Eof]
        );
    }

    #[test]
    fn empty_file_header_terminates() {
        let tokens = Lexer::new("\"\"\"\n\"\"\"\nprint(\"hi\")\n").lex().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::FileHeader);
        assert_eq!(tokens[0].str_literal(), "");
    }

    #[test]
    fn lexeme_concatenation_reproduces_source_modulo_whitespace() {
        let source = "a int[] = [1, 2, 3]\nb = a[0] + 2.5 // trailing\nprint(b)\n";
        let tokens = Lexer::new(source).lex().unwrap();
        let rebuilt: String = tokens
            .iter()
            .filter(|t| {
                !matches!(
                    t.token_type,
                    TokenType::Indent | TokenType::Dedent | TokenType::Eof
                )
            })
            .map(|t| t.lexeme.as_str())
            .collect();
        let strip = |s: &str| {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        };
        // comments are discarded by the lexer
        let source_no_comment = "a int[] = [1, 2, 3]\nb = a[0] + 2.5 \nprint(b)\n";
        assert_eq!(strip(&rebuilt), strip(source_no_comment));
    }
}
