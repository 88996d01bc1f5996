//! Hand-rolled lexer for the FV-1 assembly language: numbers, identifiers,
//! operators, and caret/hash suffix fusion.
//!
//! The lexical rules need to fuse a trailing `^`/`#` onto an identifier only
//! when it directly abuts (no intervening whitespace), and need the `int`
//! keyword to act as an operator only in operator position — both easier to
//! express as a character-level scan than as a context-free grammar rule. The
//! lexer produces one flat `Vec<Token>` up front, tokenizing the whole source
//! before the driver walks it statement by statement.

use crate::error::{Error, Result};
use crate::token::{IdentSuffix, Op, Token, TokenKind};
use matches::debug_assert_matches;

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Lexer<'a> {
        // Tolerate a leading UTF-8 BOM; the CLI shell is responsible for
        // transcoding UTF-16 input before it ever reaches the core.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            match self.peek() {
                None => {
                    tokens.push(Token::new(TokenKind::Eof, self.line));
                    break;
                }
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.bump();
                }
                Some(b'\n') => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::Eol, self.line));
                    self.line += 1;
                }
                Some(b';') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(c) if c.is_ascii_digit() => {
                    tokens.push(self.lex_number()?);
                }
                Some(c) if c == b'$' || c == b'%' => {
                    tokens.push(self.lex_prefixed_number()?);
                }
                Some(c) if is_ident_start(c) => {
                    tokens.push(self.lex_ident()?);
                }
                Some(b',') => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::ArgSep, self.line));
                }
                Some(c) => {
                    tokens.push(self.lex_operator(c)?);
                }
            }
        }

        Ok(tokens)
    }

    fn lex_operator(&mut self, c: u8) -> Result<Token> {
        let line = self.line;
        self.bump();
        let op = match c {
            b'|' => Op::Pipe,
            b'^' => Op::Caret,
            b'&' => Op::Amp,
            b'~' | b'!' => Op::Tilde,
            b'+' => Op::Plus,
            b'-' => Op::Minus,
            b'(' => Op::LParen,
            b')' => Op::RParen,
            b'<' => {
                if self.peek() == Some(b'<') {
                    self.bump();
                    Op::Shl
                } else {
                    return Err(Error::lexical(line, "unexpected character '<'"));
                }
            }
            b'>' => {
                if self.peek() == Some(b'>') {
                    self.bump();
                    Op::Shr
                } else {
                    return Err(Error::lexical(line, "unexpected character '>'"));
                }
            }
            b'*' => {
                if self.peek() == Some(b'*') {
                    self.bump();
                    Op::Pow
                } else {
                    Op::Star
                }
            }
            b'/' => {
                if self.peek() == Some(b'/') {
                    self.bump();
                    Op::SlashSlash
                } else {
                    Op::Slash
                }
            }
            other => {
                return Err(Error::lexical(
                    line,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        Ok(Token::new(TokenKind::Op(op), line))
    }

    fn lex_ident(&mut self) -> Result<Token> {
        let line = self.line;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        let name = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap()
            .to_ascii_uppercase();

        match self.peek() {
            Some(b':') => {
                self.bump();
                Ok(Token::new(TokenKind::Label(name), line))
            }
            Some(b'^') => {
                self.bump();
                Ok(Token::new(
                    TokenKind::Ident(name, IdentSuffix::Caret),
                    line,
                ))
            }
            Some(b'#') => {
                self.bump();
                Ok(Token::new(TokenKind::Ident(name, IdentSuffix::Hash), line))
            }
            _ => Ok(Token::new(TokenKind::Ident(name, IdentSuffix::None), line)),
        }
    }

    /// `0x`/`0b` prefixed numbers, and bare decimal/float literals.
    fn lex_number(&mut self) -> Result<Token> {
        let line = self.line;
        if self.peek() == Some(b'0') {
            match self.peek_at(1) {
                Some(b'x') | Some(b'X') => {
                    self.pos += 2;
                    return self.lex_radix_digits(16, line, "hexadecimal");
                }
                Some(b'b') | Some(b'B') => {
                    self.pos += 2;
                    return self.lex_radix_digits(2, line, "binary");
                }
                _ => {}
            }
        }
        self.lex_decimal_or_float(line)
    }

    /// `$` (hex) / `%` (binary) prefixed numbers.
    fn lex_prefixed_number(&mut self) -> Result<Token> {
        debug_assert_matches!(self.peek(), Some(b'$') | Some(b'%'));
        let line = self.line;
        let radix = if self.peek() == Some(b'$') { 16 } else { 2 };
        self.bump();
        let kind = if radix == 16 { "hexadecimal" } else { "binary" };
        self.lex_radix_digits(radix, line, kind)
    }

    fn lex_radix_digits(&mut self, radix: u32, line: u32, kind: &str) -> Result<Token> {
        let start = self.pos;
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c == b'_' {
                self.bump();
                continue;
            }
            if (c as char).is_digit(radix) {
                digits.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(Error::lexical(
                line,
                format!("unterminated {} literal", kind),
            ));
        }
        let _ = start;
        let value = u64::from_str_radix(&digits, radix).map_err(|_| {
            Error::lexical(line, format!("bad digit for {} literal", kind))
        })?;
        Ok(Token::new(TokenKind::Integer(value as i64), line))
    }

    fn lex_decimal_or_float(&mut self, line: u32) -> Result<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }

        let mut is_float = false;

        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                // No digits after `e`: the `e` does not belong to this literal.
                self.pos = save;
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| Error::lexical(line, "unterminated numeric literal"))?;
            Ok(Token::new(TokenKind::Float(value), line))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| Error::lexical(line, "unterminated numeric literal"))?;
            Ok(Token::new(TokenKind::Integer(value), line))
        }
    }
}

/// Tokenizes a full source buffer. The returned stream always ends with exactly
/// one `Eof` token.
pub fn lex(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).tokenize()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::TokenKind::*;

    fn kinds(src: &str) -> Vec<crate::token::TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn decimal_vs_float() {
        assert_eq!(kinds("1"), vec![Integer(1), Eof]);
        assert_eq!(kinds("1."), vec![Float(1.0), Eof]);
        assert_eq!(kinds("1.0"), vec![Float(1.0), Eof]);
        assert_eq!(kinds("1e3"), vec![Float(1000.0), Eof]);
    }

    #[test]
    fn hex_and_binary_prefixes() {
        assert_eq!(kinds("0xFF"), vec![Integer(255), Eof]);
        assert_eq!(kinds("$ff"), vec![Integer(255), Eof]);
        assert_eq!(kinds("0b1010"), vec![Integer(10), Eof]);
        assert_eq!(kinds("%10_10"), vec![Integer(10), Eof]);
    }

    #[test]
    fn comment_is_discarded() {
        assert_eq!(kinds("1 ; comment\n2"), vec![Integer(1), Eol, Integer(2), Eof]);
    }

    #[test]
    fn caret_and_hash_fuse_onto_identifier() {
        assert_eq!(
            kinds("delay^"),
            vec![Ident("DELAY".into(), IdentSuffix::Caret), Eof]
        );
        assert_eq!(
            kinds("delay#"),
            vec![Ident("DELAY".into(), IdentSuffix::Hash), Eof]
        );
        // A standalone caret token follows a fused identifier (`delay^^0xff`).
        assert_eq!(
            kinds("delay^^0xff"),
            vec![
                Ident("DELAY".into(), IdentSuffix::Caret),
                Op(Op::Caret),
                Integer(0xff),
                Eof
            ]
        );
    }

    #[test]
    fn label_token_fuses_colon() {
        assert_eq!(kinds("start:"), vec![Label("START".into()), Eof]);
    }

    #[test]
    fn case_folding() {
        assert_eq!(
            kinds("PoT0"),
            vec![Ident("POT0".into(), IdentSuffix::None), Eof]
        );
    }

    #[test]
    fn bang_aliases_tilde() {
        assert_eq!(kinds("!"), vec![Op(Op::Tilde), Eof]);
    }
}
