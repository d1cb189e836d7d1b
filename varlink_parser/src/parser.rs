//! Recursive descent parser for the interface definition grammar.
//!
//! ```text
//! interface  = "interface" interface-name member*
//! member     = "type" name struct-or-enum
//!            | "method" name struct "->" struct
//!            | "error" name struct
//! type       = "?"? ( basic | "[]" type | "[string]" type | name | struct-or-enum )
//! ```

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Spanned, Token};
use crate::{Enum, Field, Interface, Method, Struct, Type, TypeKind, Typedef, VError};

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Spanned<'a>>,
}

fn syntax_error(at: &Spanned, expected: &str) -> Error {
    Error::Syntax {
        line: at.line,
        column: at.column,
        expected: expected.into(),
        found: at.token.to_string(),
    }
}

fn is_alnum(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn is_lower_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// `[a-z]([-]*[a-z0-9])*` for the first label, `[a-z0-9]([-]*[a-z0-9])*` for the
/// rest. At least two labels.
pub(crate) fn is_interface_name(s: &str) -> bool {
    let labels: Vec<&str> = s.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().enumerate().all(|(i, label)| {
        let mut chars = label.chars();
        let first_ok = match chars.next() {
            Some(c) if i == 0 => c.is_ascii_lowercase(),
            Some(c) => is_lower_alnum(c),
            None => false,
        };
        first_ok
            && !label.ends_with('-')
            && label.chars().all(|c| is_lower_alnum(c) || c == '-')
    })
}

/// `[A-Z][A-Za-z0-9]*`
pub(crate) fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase()) && chars.all(is_alnum)
}

/// `[A-Za-z](_?[A-Za-z0-9])*`
pub(crate) fn is_field_name(s: &str) -> bool {
    let mut chars = s.chars();
    if !matches!(chars.next(), Some(c) if c.is_ascii_alphabetic()) {
        return false;
    }
    let mut after_underscore = false;
    for c in chars {
        if c == '_' {
            if after_underscore {
                return false;
            }
            after_underscore = true;
        } else if is_alnum(c) {
            after_underscore = false;
        } else {
            return false;
        }
    }
    !after_underscore
}

fn basic_type(s: &str) -> Option<TypeKind> {
    match s {
        "bool" => Some(TypeKind::Bool),
        "int" => Some(TypeKind::Int),
        "float" => Some(TypeKind::Float),
        "string" => Some(TypeKind::String),
        "object" => Some(TypeKind::Object),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(src),
            peeked: None,
        }
    }

    fn next(&mut self) -> Result<Spanned<'a>> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<Spanned<'a>> {
        if let Some(t) = self.peeked {
            return Ok(t);
        }
        let t = self.lexer.next_token()?;
        self.peeked = Some(t);
        Ok(t)
    }

    fn expect(&mut self, want: Token, expected: &str) -> Result<Spanned<'a>> {
        let got = self.next()?;
        if got.token == want {
            Ok(got)
        } else {
            Err(syntax_error(&got, expected))
        }
    }

    fn ident_where(
        &mut self,
        valid: fn(&str) -> bool,
        expected: &str,
    ) -> Result<(&'a str, Spanned<'a>)> {
        let got = self.next()?;
        match got.token {
            Token::Ident(s) if valid(s) => Ok((s, got)),
            _ => Err(syntax_error(&got, expected)),
        }
    }

    pub fn parse_interface(mut self) -> Result<Interface> {
        self.expect(Token::Ident("interface"), "`interface`")?;
        let (name, _) = self.ident_where(is_interface_name, "interface name")?;

        let mut iface = Interface {
            name: name.into(),
            ..Default::default()
        };

        loop {
            let keyword = self.next()?;
            match keyword.token {
                Token::Eof => return Ok(iface),
                Token::Ident("type") => {
                    let (name, at) = self.ident_where(is_name, "type name")?;
                    let ty = self.parse_struct_or_enum()?;
                    if iface.typedefs.contains_key(name) {
                        return Err(duplicate(&at, "type", name));
                    }
                    iface.typedef_keys.push(name.into());
                    iface.typedefs.insert(
                        name.into(),
                        Typedef {
                            name: name.into(),
                            ty,
                        },
                    );
                }
                Token::Ident("method") => {
                    let (name, at) = self.ident_where(is_name, "method name")?;
                    let input = self.parse_struct()?;
                    self.expect(Token::Arrow, "`->`")?;
                    let output = self.parse_struct()?;
                    if iface.methods.contains_key(name) {
                        return Err(duplicate(&at, "method", name));
                    }
                    iface.method_keys.push(name.into());
                    iface.methods.insert(
                        name.into(),
                        Method {
                            name: name.into(),
                            input,
                            output,
                        },
                    );
                }
                Token::Ident("error") => {
                    let (name, at) = self.ident_where(is_name, "error name")?;
                    let parm = self.parse_struct()?;
                    if iface.errors.contains_key(name) {
                        return Err(duplicate(&at, "error", name));
                    }
                    iface.error_keys.push(name.into());
                    iface.errors.insert(
                        name.into(),
                        VError {
                            name: name.into(),
                            parm,
                        },
                    );
                }
                _ => {
                    return Err(syntax_error(
                        &keyword,
                        "one of `type`, `method`, `error`",
                    ))
                }
            }
        }
    }

    /// A parenthesized list that must turn out to be a struct.
    fn parse_struct(&mut self) -> Result<Struct> {
        let open = self.peek()?;
        let ty = self.parse_struct_or_enum()?;
        match ty.kind {
            TypeKind::Struct(s) => Ok(s),
            _ => Err(syntax_error(&open, "a struct, not an enum")),
        }
    }

    /// Parses `( ... )`. The token after the first identifier decides between
    /// enum (`,` or `)`) and struct (`:`); the rest of the list must follow suit.
    fn parse_struct_or_enum(&mut self) -> Result<Type> {
        self.expect(Token::LParen, "`(`")?;

        if self.peek()?.token == Token::RParen {
            self.next()?;
            return Ok(Type::new(TypeKind::Struct(Struct::new())));
        }

        let (first, _) = self.ident_where(is_field_name, "field name")?;
        let sep = self.next()?;
        let kind = match sep.token {
            Token::Comma => TypeKind::Enum(self.parse_enum_rest(first)?),
            Token::RParen => TypeKind::Enum(Enum {
                variants: vec![first.into()],
            }),
            Token::Colon => TypeKind::Struct(self.parse_struct_rest(first)?),
            _ => return Err(syntax_error(&sep, "one of `,`, `)`, `:`")),
        };
        Ok(Type::new(kind))
    }

    /// Remaining variants after `(first,`.
    fn parse_enum_rest(&mut self, first: &str) -> Result<Enum> {
        let mut e = Enum {
            variants: vec![first.into()],
        };
        loop {
            let (name, _) = self.ident_where(is_field_name, "enum value")?;
            e.variants.push(name.into());
            let sep = self.next()?;
            match sep.token {
                Token::RParen => return Ok(e),
                Token::Comma => {}
                _ => return Err(syntax_error(&sep, "`,` or `)`")),
            }
        }
    }

    /// Remaining fields after `(first:`.
    fn parse_struct_rest(&mut self, first: &str) -> Result<Struct> {
        let mut s = Struct::new();
        let mut name = first;
        loop {
            let ty = self.parse_type()?;
            s.fields.push(Field {
                name: name.into(),
                ty,
            });
            let end = self.next()?;
            match end.token {
                Token::RParen => return Ok(s),
                Token::Comma => {}
                _ => return Err(syntax_error(&end, "`,` or `)`")),
            }
            name = self.ident_where(is_field_name, "field name")?.0;
            self.expect(Token::Colon, "`:`")?;
        }
    }

    fn parse_type(&mut self) -> Result<Type> {
        let nullable = if self.peek()?.token == Token::Question {
            self.next()?;
            true
        } else {
            false
        };

        let at = self.peek()?;
        let kind = match at.token {
            Token::Array => {
                self.next()?;
                TypeKind::Array(Box::new(self.parse_type()?))
            }
            Token::Map => {
                self.next()?;
                TypeKind::Map(Box::new(self.parse_type()?))
            }
            Token::LParen => self.parse_struct_or_enum()?.kind,
            Token::Ident(s) => {
                self.next()?;
                match basic_type(s) {
                    Some(kind) => kind,
                    None if is_name(s) => TypeKind::Name(s.into()),
                    None => return Err(syntax_error(&at, "type")),
                }
            }
            _ => return Err(syntax_error(&at, "type")),
        };

        Ok(Type { kind, nullable })
    }
}

fn duplicate(at: &Spanned, kind: &'static str, name: &str) -> Error {
    Error::Duplicate {
        line: at.line,
        column: at.column,
        kind,
        name: name.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        assert!(is_interface_name("org.varlink.service"));
        assert!(is_interface_name("org.example.ftl"));
        assert!(is_interface_name("com.example.0foo"));
        assert!(is_interface_name("a-b.c"));
        assert!(!is_interface_name("org"));
        assert!(!is_interface_name("Org.example"));
        assert!(!is_interface_name("-org.example"));
        assert!(!is_interface_name("org-.example"));
        assert!(!is_interface_name("org..example"));
        assert!(!is_interface_name("org.example."));
    }

    #[test]
    fn test_names() {
        assert!(is_name("DriveCondition"));
        assert!(is_name("A1"));
        assert!(!is_name("driveCondition"));
        assert!(!is_name("Drive_Condition"));
        assert!(!is_name(""));
    }

    #[test]
    fn test_field_names() {
        assert!(is_field_name("tylium_level"));
        assert!(is_field_name("a1_b2"));
        assert!(is_field_name("Idle"));
        assert!(!is_field_name("_a"));
        assert!(!is_field_name("a__b"));
        assert!(!is_field_name("a_"));
        assert!(!is_field_name("1a"));
    }
}
