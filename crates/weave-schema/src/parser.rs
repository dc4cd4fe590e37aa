//! Recursive-descent parser over the token stream. Stops at the first error.

use weave_common::Span;

use crate::ast::{Decl, FieldDecl, Literal, Name, ProductKind, SourceFile, TypeRef, VariantDecl};
use crate::error::SchemaError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub fn parse_source(source: &str) -> Result<SourceFile, SchemaError> {
    Parser::new(source).parse_file()
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        Parser {
            source,
            tokens: Lexer::tokenize(source),
            pos: 0,
        }
    }

    // ── Token helpers ──────────────────────────────────────────────────

    fn current(&self) -> &Token {
        // The lexer always ends the stream with Eof, and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.bump())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SchemaError> {
        match self.eat(kind) {
            Some(token) => Ok(token),
            None => Err(self.unexpected(kind.describe())),
        }
    }

    fn text(&self, span: Span) -> &'src str {
        &self.source[span.start as usize..span.end as usize]
    }

    /// Error for the current token, which is not `expected`.
    fn unexpected(&self, expected: &str) -> SchemaError {
        let token = self.current();
        match token.kind {
            TokenKind::Error => SchemaError::UnexpectedChar {
                found: self.text(token.span).to_string(),
                span: token.span,
            },
            TokenKind::UnterminatedString => SchemaError::UnterminatedString { span: token.span },
            kind => SchemaError::Expected {
                expected: expected.to_string(),
                found: kind.describe().to_string(),
                span: token.span,
            },
        }
    }

    fn name(&mut self) -> Result<Name, SchemaError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Name {
            text: self.text(token.span).to_string(),
            span: token.span,
        })
    }

    /// Comma-separated items up to `close`; the opener is already consumed.
    /// A trailing comma is allowed.
    fn delimited<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, SchemaError>,
    ) -> Result<(Vec<T>, Token), SchemaError> {
        let mut items = Vec::new();
        loop {
            if let Some(end) = self.eat(close) {
                return Ok((items, end));
            }
            items.push(item(self)?);
            if self.eat(TokenKind::Comma).is_none() {
                let end = self.expect(close)?;
                return Ok((items, end));
            }
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn parse_file(mut self) -> Result<SourceFile, SchemaError> {
        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            decls.push(self.decl()?);
        }
        Ok(SourceFile { decls })
    }

    fn decl(&mut self) -> Result<Decl, SchemaError> {
        let start = self.current().span;
        match self.current().kind {
            TokenKind::Opaque => {
                self.bump();
                let name = self.name()?;
                let (params, end) = self.params(name.span)?;
                Ok(Decl::Opaque {
                    name,
                    params,
                    span: start.cover(end),
                })
            }
            TokenKind::Struct | TokenKind::Newtype => {
                let kind = if self.bump().kind == TokenKind::Struct {
                    ProductKind::Struct
                } else {
                    ProductKind::Newtype
                };
                let name = self.name()?;
                let (params, _) = self.params(name.span)?;
                self.expect(TokenKind::LBrace)?;
                let (fields, end) = self.delimited(TokenKind::RBrace, Self::field)?;
                Ok(Decl::Product {
                    kind,
                    name,
                    params,
                    fields,
                    span: start.cover(end.span),
                })
            }
            TokenKind::Object => {
                self.bump();
                let name = self.name()?;
                let span = start.cover(name.span);
                Ok(Decl::Object { name, span })
            }
            TokenKind::Enum => {
                self.bump();
                let name = self.name()?;
                let (params, _) = self.params(name.span)?;
                self.expect(TokenKind::LBrace)?;
                let (variants, end) = self.delimited(TokenKind::RBrace, Self::variant)?;
                Ok(Decl::Enum {
                    name,
                    params,
                    variants,
                    span: start.cover(end.span),
                })
            }
            TokenKind::Capability => {
                self.bump();
                let name = self.name()?;
                self.expect(TokenKind::LParen)?;
                let (hooks, end) = self.delimited(TokenKind::RParen, Self::name)?;
                Ok(Decl::Capability {
                    name,
                    hooks,
                    span: start.cover(end.span),
                })
            }
            TokenKind::Instance => {
                self.bump();
                let capability = self.name()?;
                self.expect(TokenKind::For)?;
                let ty = self.type_ref()?;
                let mut span = start.cover(ty.span);
                let mut requires = Vec::new();
                if self.eat(TokenKind::Requires).is_some() {
                    loop {
                        let required = self.type_ref()?;
                        span = span.cover(required.span);
                        requires.push(required);
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                Ok(Decl::Instance {
                    capability,
                    ty,
                    requires,
                    span,
                })
            }
            TokenKind::Derive => {
                self.bump();
                let capability = self.name()?;
                self.expect(TokenKind::For)?;
                let ty = self.type_ref()?;
                let span = start.cover(ty.span);
                Ok(Decl::Derive {
                    capability,
                    ty,
                    span,
                })
            }
            _ => Err(self.unexpected("a declaration")),
        }
    }

    /// Optional `<A, B>` after a declared name. Returns the end span.
    fn params(&mut self, after: Span) -> Result<(Vec<Name>, Span), SchemaError> {
        if self.eat(TokenKind::Lt).is_none() {
            return Ok((Vec::new(), after));
        }
        let (params, end) = self.delimited(TokenKind::Gt, Self::name)?;
        Ok((params, end.span))
    }

    fn field(&mut self) -> Result<FieldDecl, SchemaError> {
        let name = self.name()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.type_ref()?;
        let mut span = name.span.cover(ty.span);
        let variadic = match self.eat(TokenKind::Star) {
            Some(star) => {
                span = span.cover(star.span);
                true
            }
            None => false,
        };
        let default = if self.eat(TokenKind::Eq).is_some() {
            let (literal, literal_span) = self.literal()?;
            span = span.cover(literal_span);
            Some(literal)
        } else {
            None
        };
        Ok(FieldDecl {
            name,
            ty,
            variadic,
            default,
            span,
        })
    }

    fn variant(&mut self) -> Result<VariantDecl, SchemaError> {
        let name = self.name()?;
        let mut span = name.span;
        let fields = if self.eat(TokenKind::LParen).is_some() {
            let (fields, end) = self.delimited(TokenKind::RParen, Self::field)?;
            span = span.cover(end.span);
            Some(fields)
        } else {
            None
        };
        let pinned = if self.eat(TokenKind::Colon).is_some() {
            let ty = self.type_ref()?;
            span = span.cover(ty.span);
            Some(ty)
        } else {
            None
        };
        Ok(VariantDecl {
            name,
            fields,
            pinned,
            span,
        })
    }

    fn type_ref(&mut self) -> Result<TypeRef, SchemaError> {
        let name = self.name()?;
        if self.eat(TokenKind::Lt).is_none() {
            let span = name.span;
            return Ok(TypeRef {
                name,
                args: Vec::new(),
                span,
            });
        }
        let (args, end) = self.delimited(TokenKind::Gt, Self::type_ref)?;
        Ok(TypeRef {
            span: name.span.cover(end.span),
            name,
            args,
        })
    }

    fn literal(&mut self) -> Result<(Literal, Span), SchemaError> {
        let start = self.current().span;
        let negative = self.eat(TokenKind::Minus).is_some();
        let token = self.current().clone();
        let span = start.cover(token.span);
        let literal = match token.kind {
            TokenKind::IntLiteral => {
                let digits = self.text(token.span).replace('_', "");
                let value = digits.parse::<i64>().map_err(|_| SchemaError::Expected {
                    expected: "an integer that fits in 64 bits".to_string(),
                    found: self.text(token.span).to_string(),
                    span: token.span,
                })?;
                Literal::Int(if negative { -value } else { value })
            }
            TokenKind::FloatLiteral => {
                let digits = self.text(token.span).replace('_', "");
                let value: f64 = digits.parse().map_err(|_| SchemaError::Expected {
                    expected: "a float".to_string(),
                    found: self.text(token.span).to_string(),
                    span: token.span,
                })?;
                Literal::Float(if negative { -value } else { value })
            }
            TokenKind::StringLiteral if !negative => Literal::Str(unescape(self.text(token.span))),
            TokenKind::True if !negative => Literal::Bool(true),
            TokenKind::False if !negative => Literal::Bool(false),
            TokenKind::LBracket if !negative => {
                self.bump();
                let end = self.expect(TokenKind::RBracket)?;
                return Ok((Literal::EmptyList, start.cover(end.span)));
            }
            _ if negative => return Err(self.unexpected("a number")),
            _ => return Err(self.unexpected("a default value")),
        };
        self.bump();
        Ok((literal, span))
    }
}

/// Contents of a string literal, quotes stripped and escapes applied.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Decl {
        let mut file = parse_source(source).unwrap();
        assert_eq!(file.decls.len(), 1);
        file.decls.remove(0)
    }

    #[test]
    fn struct_with_defaults_and_variadic() {
        let Decl::Product { kind, name, fields, .. } =
            parse_one(r#"struct Args { head: String = "x", count: Int = -3, rest: String* }"#)
        else {
            panic!("expected a product");
        };
        assert_eq!(kind, ProductKind::Struct);
        assert_eq!(name.text, "Args");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].default, Some(Literal::Str("x".to_string())));
        assert_eq!(fields[1].default, Some(Literal::Int(-3)));
        assert!(fields[2].variadic);
    }

    #[test]
    fn generic_enum_with_pinned_variant() {
        let Decl::Enum { params, variants, .. } =
            parse_one("enum Expr<T> { Lit(value: T), IntLit(value: Int): Expr<Int>, Nil }")
        else {
            panic!("expected an enum");
        };
        assert_eq!(params.len(), 1);
        assert_eq!(variants.len(), 3);
        assert!(variants[0].pinned.is_none());
        let pinned = variants[1].pinned.as_ref().unwrap();
        assert_eq!(pinned.name.text, "Expr");
        assert_eq!(pinned.args[0].name.text, "Int");
        assert!(variants[2].fields.is_none());
    }

    #[test]
    fn empty_parens_are_a_zero_field_variant() {
        let Decl::Enum { variants, .. } = parse_one("enum Unit { Only() }") else {
            panic!("expected an enum");
        };
        assert_eq!(variants[0].fields, Some(Vec::new()));
    }

    #[test]
    fn instance_with_requirements() {
        let Decl::Instance { ty, requires, .. } =
            parse_one("instance Show for Map<K, V> requires K, V")
        else {
            panic!("expected an instance");
        };
        assert_eq!(ty.args.len(), 2);
        assert_eq!(requires.len(), 2);
    }

    #[test]
    fn decl_span_covers_whole_declaration() {
        let source = "  derive Show for List<Int>  ";
        let decl = parse_one(source);
        let span = decl.span();
        assert_eq!(&source[span.start as usize..span.end as usize], "derive Show for List<Int>");
    }

    #[test]
    fn missing_colon_is_reported_at_the_offending_token() {
        let err = parse_source("struct P { x Int }").unwrap_err();
        match err {
            SchemaError::Expected { expected, found, span } => {
                assert_eq!(expected, "`:`");
                assert_eq!(found, "identifier");
                assert_eq!((span.start, span.end), (13, 16));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stray_character() {
        let err = parse_source("object A\n@").unwrap_err();
        assert!(matches!(err, SchemaError::UnexpectedChar { ref found, .. } if found == "@"));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(unescape(r#""a\"b\n""#), "a\"b\n");
    }
}
