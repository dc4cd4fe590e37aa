use weave_common::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every token of the schema language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // ── Keywords ───────────────────────────────────────────────────────
    Capability,
    Derive,
    Enum,
    False,
    For,
    Instance,
    Newtype,
    Object,
    Opaque,
    Requires,
    Struct,
    True,

    // ── Delimiters and punctuation ─────────────────────────────────────
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Comma,
    Colon,
    Eq,
    Star,
    Minus,

    // ── Literals and names ─────────────────────────────────────────────
    Ident,
    IntLiteral,
    FloatLiteral,
    /// Includes the surrounding quotes.
    StringLiteral,

    // ── Special ────────────────────────────────────────────────────────
    /// A string with no closing quote before end of line or input.
    UnterminatedString,
    /// A character that starts no token.
    Error,
    Eof,
}

impl TokenKind {
    /// How the token reads in "expected X, found Y" messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Capability => "`capability`",
            TokenKind::Derive => "`derive`",
            TokenKind::Enum => "`enum`",
            TokenKind::False => "`false`",
            TokenKind::For => "`for`",
            TokenKind::Instance => "`instance`",
            TokenKind::Newtype => "`newtype`",
            TokenKind::Object => "`object`",
            TokenKind::Opaque => "`opaque`",
            TokenKind::Requires => "`requires`",
            TokenKind::Struct => "`struct`",
            TokenKind::True => "`true`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Eq => "`=`",
            TokenKind::Star => "`*`",
            TokenKind::Minus => "`-`",
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer",
            TokenKind::FloatLiteral => "float",
            TokenKind::StringLiteral => "string",
            TokenKind::UnterminatedString => "unterminated string",
            TokenKind::Error => "unexpected character",
            TokenKind::Eof => "end of input",
        }
    }
}

pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "capability" => Some(TokenKind::Capability),
        "derive" => Some(TokenKind::Derive),
        "enum" => Some(TokenKind::Enum),
        "false" => Some(TokenKind::False),
        "for" => Some(TokenKind::For),
        "instance" => Some(TokenKind::Instance),
        "newtype" => Some(TokenKind::Newtype),
        "object" => Some(TokenKind::Object),
        "opaque" => Some(TokenKind::Opaque),
        "requires" => Some(TokenKind::Requires),
        "struct" => Some(TokenKind::Struct),
        "true" => Some(TokenKind::True),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(keyword_from_str("enum"), Some(TokenKind::Enum));
        assert_eq!(keyword_from_str("Enum"), None);
        assert_eq!(keyword_from_str("combine"), None);
    }
}
