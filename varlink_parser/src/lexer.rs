use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    LParen,
    RParen,
    Comma,
    Colon,
    Question,
    Arrow,
    /// `[]`
    Array,
    /// `[string]`
    Map,
    Ident(&'a str),
    Eof,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Comma => f.write_str("`,`"),
            Token::Colon => f.write_str("`:`"),
            Token::Question => f.write_str("`?`"),
            Token::Arrow => f.write_str("`->`"),
            Token::Array => f.write_str("`[]`"),
            Token::Map => f.write_str("`[string]`"),
            Token::Ident(s) => write!(f, "`{}`", s),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Spanned<'a> {
    pub token: Token<'a>,
    pub line: usize,
    pub column: usize,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b',' | b':' | b'?' | b'[' | b'#' | b' ' | b'\t' | b'\r' | b'\n'
    )
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn column(&self) -> usize {
        self.src[self.line_start..self.pos].chars().count() + 1
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek_byte() {
            match b {
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                    self.line_start = self.pos;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    // The newline itself is left for the loop to count.
                    let rest = &self.src[self.pos..];
                    self.pos += rest.find('\n').unwrap_or(rest.len());
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned<'a>> {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column());
        let spanned = |token| Spanned {
            token,
            line,
            column,
        };

        let b = match self.peek_byte() {
            None => return Ok(spanned(Token::Eof)),
            Some(b) => b,
        };

        let single = match b {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            b':' => Some(Token::Colon),
            b'?' => Some(Token::Question),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(spanned(token));
        }

        let rest = &self.src[self.pos..];

        if rest.starts_with("->") {
            self.pos += 2;
            return Ok(spanned(Token::Arrow));
        }

        if b == b'[' {
            if rest.starts_with("[]") {
                self.pos += 2;
                return Ok(spanned(Token::Array));
            }
            if rest.starts_with("[string]") {
                self.pos += "[string]".len();
                return Ok(spanned(Token::Map));
            }
            let end = rest.find(']').map(|i| i + 1).unwrap_or(rest.len());
            return Err(Error::Syntax {
                line,
                column,
                expected: "`[]` or `[string]`".into(),
                found: format!("`{}`", &rest[..end]),
            });
        }

        let len = rest
            .bytes()
            .position(is_delimiter)
            .unwrap_or(rest.len());
        self.pos += len;
        Ok(spanned(Token::Ident(&rest[..len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(src);
        let mut v = Vec::new();
        loop {
            let t = lexer.next_token().unwrap().token;
            v.push(t);
            if t == Token::Eof {
                return v;
            }
        }
    }

    #[test]
    fn test_operators_and_composites() {
        assert_eq!(
            tokens("method F(a: []?int, b: [string]T) -> ()"),
            vec![
                Token::Ident("method"),
                Token::Ident("F"),
                Token::LParen,
                Token::Ident("a"),
                Token::Colon,
                Token::Array,
                Token::Question,
                Token::Ident("int"),
                Token::Comma,
                Token::Ident("b"),
                Token::Colon,
                Token::Map,
                Token::Ident("T"),
                Token::RParen,
                Token::Arrow,
                Token::LParen,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("# leading\ninterface org.example.foo # trailing\n#last"),
            vec![
                Token::Ident("interface"),
                Token::Ident("org.example.foo"),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_identifier_stops_at_comment() {
        assert_eq!(
            tokens("abc#def\nghi"),
            vec![Token::Ident("abc"), Token::Ident("ghi"), Token::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("interface\n  org.x");
        let first = lexer.next_token().unwrap();
        assert_eq!((first.line, first.column), (1, 1));
        let second = lexer.next_token().unwrap();
        assert_eq!((second.line, second.column), (2, 3));
    }

    #[test]
    fn test_bad_bracket() {
        let mut lexer = Lexer::new("[int]bool");
        match lexer.next_token() {
            Err(Error::Syntax { found, .. }) => assert_eq!(found, "`[int]`"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
