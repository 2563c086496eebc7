// src/frontend/lexer.rs

use crate::errors::LexerError;
use crate::frontend::{Span, Token, TokenType};

pub struct Lexer<'src> {
    source: &'src str,
    chars: std::iter::Peekable<std::str::CharIndices<'src>>,
    start: usize,
    current: usize,
    line: u32,
    column: u32,
    start_column: u32,
    start_line: u32,
    // Error collection
    errors: Vec<LexerError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
            start_line: 1,
            errors: Vec::new(),
        }
    }

    /// Take all collected errors, leaving the internal list empty.
    pub fn take_errors(&mut self) -> Vec<LexerError> {
        std::mem::take(&mut self.errors)
    }

    /// Check if any errors have been collected.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        self.start = self.current;
        self.start_column = self.column;
        self.start_line = self.line;

        let Some(c) = self.advance() else {
            return self.make_token(TokenType::Eof);
        };

        match c {
            '(' => self.make_token(TokenType::LParen),
            ')' => self.make_token(TokenType::RParen),
            '{' => self.make_token(TokenType::LBrace),
            '}' => self.make_token(TokenType::RBrace),
            '<' => self.make_token(TokenType::Lt),
            '>' => self.make_token(TokenType::Gt),
            ',' => self.make_token(TokenType::Comma),
            '.' => self.make_token(TokenType::Dot),
            '=' => self.make_token(TokenType::Eq),
            ';' => self.make_token(TokenType::Semicolon),
            ':' => {
                if self.match_char(':') {
                    self.make_token(TokenType::ColonColon)
                } else {
                    self.make_token(TokenType::Colon)
                }
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            c => {
                self.errors.push(LexerError::UnexpectedCharacter {
                    character: c,
                    span: self.current_span().into(),
                });
                self.make_token(TokenType::Error)
            }
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn string(&mut self) -> Token {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    self.errors.push(LexerError::UnterminatedString {
                        span: self.current_span().into(),
                    });
                    return self.make_token(TokenType::Error);
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => value.push(other),
                    None => {
                        self.errors.push(LexerError::UnterminatedString {
                            span: self.current_span().into(),
                        });
                        return self.make_token(TokenType::Error);
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Token::new(TokenType::StringLiteral, value, self.current_span())
    }

    fn number(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // A fractional part makes this a float literal. A lone '.' is left
        // for the postfix method-call syntax (e.g. 1.add(2)).
        let mut is_float = false;
        if self.peek() == Some('.') {
            if let Some(next) = self.peek_next() {
                if next.is_ascii_digit() {
                    is_float = true;
                    self.advance();
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                        self.advance();
                    }
                }
            }
        }

        let lexeme = &self.source[self.start..self.current];
        let ty = if is_float {
            TokenType::FloatLiteral
        } else {
            TokenType::IntLiteral
        };
        if (is_float && lexeme.parse::<f64>().is_err())
            || (!is_float && lexeme.parse::<i64>().is_err())
        {
            self.errors.push(LexerError::InvalidNumber {
                literal: lexeme.to_string(),
                span: self.current_span().into(),
            });
            return self.make_token(TokenType::Error);
        }
        self.make_token(ty)
    }

    fn identifier(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let lexeme = &self.source[self.start..self.current];
        let ty = match lexeme {
            "pub" => TokenType::KwPub,
            "class" => TokenType::KwClass,
            "struct" => TokenType::KwStruct,
            "impl" => TokenType::KwImpl,
            "enum" => TokenType::KwEnum,
            "type" => TokenType::KwType,
            "fn" => TokenType::KwFn,
            "const" => TokenType::KwConst,
            "static" => TokenType::KwStatic,
            "let" => TokenType::KwLet,
            "if" => TokenType::KwIf,
            "else" => TokenType::KwElse,
            "while" => TokenType::KwWhile,
            "return" => TokenType::KwReturn,
            "import" => TokenType::KwImport,
            "new" => TokenType::KwNew,
            "super" => TokenType::KwSuper,
            "true" => TokenType::KwTrue,
            "false" => TokenType::KwFalse,
            _ => TokenType::Identifier,
        };
        self.make_token(ty)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_next(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next().map(|(_, c)| c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::new(self.start, self.current, self.start_line, self.start_column)
    }

    fn make_token(&self, ty: TokenType) -> Token {
        let lexeme = &self.source[self.start..self.current];
        Token::new(ty, lexeme, self.current_span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            if tok.ty == TokenType::Eof {
                break;
            }
            out.push(tok.ty);
        }
        out
    }

    #[test]
    fn lexes_method_call_chain() {
        assert_eq!(
            token_types("true.add(false)"),
            vec![
                TokenType::KwTrue,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::LParen,
                TokenType::KwFalse,
                TokenType::RParen,
            ]
        );
    }

    #[test]
    fn int_dot_method_is_not_a_float() {
        assert_eq!(
            token_types("1.add(2)"),
            vec![
                TokenType::IntLiteral,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::LParen,
                TokenType::IntLiteral,
                TokenType::RParen,
            ]
        );
        assert_eq!(token_types("1.5"), vec![TokenType::FloatLiteral]);
    }

    #[test]
    fn lexes_turbofish() {
        assert_eq!(
            token_types("id::<i32>"),
            vec![
                TokenType::Identifier,
                TokenType::ColonColon,
                TokenType::Lt,
                TokenType::Identifier,
                TokenType::Gt,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            token_types("// a comment\nlet x"),
            vec![TokenType::KwLet, TokenType::Identifier]
        );
    }

    #[test]
    fn string_escapes() {
        let mut lexer = Lexer::new(r#""a\nb""#);
        let tok = lexer.next_token();
        assert_eq!(tok.ty, TokenType::StringLiteral);
        assert_eq!(tok.lexeme, "a\nb");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"oops");
        let tok = lexer.next_token();
        assert_eq!(tok.ty, TokenType::Error);
        assert!(lexer.has_errors());
    }
}
