// src/frontend/token.rs

/// All token types in the Snuggle language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Literals
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    Identifier,

    // Keywords
    KwPub,
    KwClass,
    KwStruct,
    KwImpl,
    KwEnum,
    KwType,
    KwFn,
    KwConst,
    KwStatic,
    KwLet,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwImport,
    KwNew,
    KwSuper,
    KwTrue,
    KwFalse,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Lt,
    Gt,
    Comma,
    Colon,
    ColonColon,
    Dot,
    Eq,
    Semicolon,

    // Special
    Eof,
    Error,
}

impl TokenType {
    /// Get string representation for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntLiteral => "integer",
            Self::FloatLiteral => "float",
            Self::StringLiteral => "string",
            Self::Identifier => "identifier",
            Self::KwPub => "pub",
            Self::KwClass => "class",
            Self::KwStruct => "struct",
            Self::KwImpl => "impl",
            Self::KwEnum => "enum",
            Self::KwType => "type",
            Self::KwFn => "fn",
            Self::KwConst => "const",
            Self::KwStatic => "static",
            Self::KwLet => "let",
            Self::KwIf => "if",
            Self::KwElse => "else",
            Self::KwWhile => "while",
            Self::KwReturn => "return",
            Self::KwImport => "import",
            Self::KwNew => "new",
            Self::KwSuper => "super",
            Self::KwTrue => "true",
            Self::KwFalse => "false",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::ColonColon => "::",
            Self::Dot => ".",
            Self::Eq => "=",
            Self::Semicolon => ";",
            Self::Eof => "end of file",
            Self::Error => "error",
        }
    }
}

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
    pub line: u32,    // Start line (1-indexed)
    pub column: u32,  // Start column (1-indexed)
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            line: self.line,
            column: self.column,
        }
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        // miette uses (offset, length)
        (span.start, span.end - span.start).into()
    }
}

impl From<&Span> for miette::SourceSpan {
    fn from(span: &Span) -> Self {
        (span.start, span.end - span.start).into()
    }
}

/// A token with its location in source code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(ty: TokenType, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            ty,
            lexeme: lexeme.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_takes_outer_extent() {
        let a = Span::new(0, 5, 1, 1);
        let b = Span::new(10, 15, 2, 3);
        let merged = a.merge(b);

        assert_eq!(merged.start, 0);
        assert_eq!(merged.end, 15);
        assert_eq!(merged.line, 1);
        assert_eq!(merged.column, 1);
    }

    #[test]
    fn span_to_source_span() {
        let span = Span::new(4, 9, 1, 5);
        let ss: miette::SourceSpan = span.into();
        assert_eq!(ss.offset(), 4);
        assert_eq!(ss.len(), 5);
    }
}
