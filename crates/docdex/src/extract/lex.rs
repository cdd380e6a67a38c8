// Copyright 2025 Docdex Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lexer for the indexed source language. Byte-offset spans are preserved on
//! every token so declaration annotations can point back into source text.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imag,
    Char,
    Str,
    Comment,
    Op,
    Semi,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub pos: usize,
    pub msg: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}: {}", self.pos, self.msg)
    }
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

const OPS3: &[&str] = &["<<=", ">>=", "&^=", "..."];
const OPS2: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<-", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", ":=", "<<", ">>", "&^",
];
const OPS1: &str = "+-*/%&|^<>=!:;,.()[]{}~";

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// Whether a newline at the current position inserts a semicolon.
    asi: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            asi: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn token(&self, kind: TokenKind, pos: usize) -> Token {
        Token {
            kind,
            text: self.src[pos..self.pos].to_string(),
            pos,
            end: self.pos,
        }
    }

    fn synthetic_semi(&self, pos: usize) -> Token {
        Token {
            kind: TokenKind::Semi,
            text: "\n".to_string(),
            pos,
            end: pos,
        }
    }

    /// Tokenizes the whole input. Comments are included in the stream.
    pub fn tokens(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            match self.next_token()? {
                Some(tok) => out.push(tok),
                None => break,
            }
        }
        if self.asi {
            out.push(self.synthetic_semi(self.pos));
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(None),
            };
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    let pos = self.pos;
                    self.bump();
                    if self.asi {
                        self.asi = false;
                        return Ok(Some(self.synthetic_semi(pos)));
                    }
                }
                '/' if self.peek2() == Some('/') => {
                    let pos = self.pos;
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    return Ok(Some(self.token(TokenKind::Comment, pos)));
                }
                '/' if self.peek2() == Some('*') => {
                    let pos = self.pos;
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(LexError {
                            pos,
                            msg: "unterminated block comment".to_string(),
                        });
                    }
                    let tok = self.token(TokenKind::Comment, pos);
                    // A block comment spanning lines acts like a newline.
                    if tok.text.contains('\n') && self.asi {
                        self.asi = false;
                        return Ok(Some(tok));
                    }
                    return Ok(Some(tok));
                }
                _ if is_ident_start(c) => return Ok(Some(self.ident())),
                _ if c.is_ascii_digit() => return Ok(Some(self.number()?)),
                '.' if self.peek2().map(|c| c.is_ascii_digit()) == Some(true) => {
                    return Ok(Some(self.number()?))
                }
                '"' => return Ok(Some(self.string_lit('"')?)),
                '`' => return Ok(Some(self.raw_string()?)),
                '\'' => return Ok(Some(self.string_lit('\'')?)),
                _ => return self.operator().map(Some),
            }
        }
    }

    fn ident(&mut self) -> Token {
        let pos = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            self.bump();
        }
        let text = &self.src[pos..self.pos];
        if KEYWORDS.contains(&text) {
            self.asi = matches!(text, "break" | "continue" | "fallthrough" | "return");
            self.token(TokenKind::Keyword, pos)
        } else {
            self.asi = true;
            self.token(TokenKind::Ident, pos)
        }
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let pos = self.pos;
        let mut kind = TokenKind::Int;
        if self.peek() == Some('0') && matches!(self.peek2(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            while self.peek().map(|c| c.is_ascii_hexdigit() || c == '_') == Some(true) {
                self.bump();
            }
        } else {
            while self.peek().map(|c| c.is_ascii_digit() || c == '_') == Some(true) {
                self.bump();
            }
            if self.peek() == Some('.') && self.peek2() != Some('.') {
                kind = TokenKind::Float;
                self.bump();
                while self.peek().map(|c| c.is_ascii_digit() || c == '_') == Some(true) {
                    self.bump();
                }
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                kind = TokenKind::Float;
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                while self.peek().map(|c| c.is_ascii_digit()) == Some(true) {
                    self.bump();
                }
            }
            if self.peek() == Some('i') {
                kind = TokenKind::Imag;
                self.bump();
            }
        }
        self.asi = true;
        Ok(self.token(kind, pos))
    }

    fn string_lit(&mut self, quote: char) -> Result<Token, LexError> {
        let pos = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(LexError {
                        pos,
                        msg: "unterminated string literal".to_string(),
                    })
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }
        self.asi = true;
        Ok(self.token(
            if quote == '\'' {
                TokenKind::Char
            } else {
                TokenKind::Str
            },
            pos,
        ))
    }

    fn raw_string(&mut self) -> Result<Token, LexError> {
        let pos = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError {
                        pos,
                        msg: "unterminated raw string literal".to_string(),
                    })
                }
                Some('`') => break,
                Some(_) => {}
            }
        }
        self.asi = true;
        Ok(self.token(TokenKind::Str, pos))
    }

    fn operator(&mut self) -> Result<Token, LexError> {
        let pos = self.pos;
        let rest = &self.src[self.pos..];
        for op in OPS3 {
            if rest.starts_with(op) {
                self.pos += op.len();
                self.asi = false;
                return Ok(self.token(TokenKind::Op, pos));
            }
        }
        for op in OPS2 {
            if rest.starts_with(op) {
                self.pos += op.len();
                self.asi = matches!(*op, "++" | "--");
                return Ok(self.token(TokenKind::Op, pos));
            }
        }
        let c = self.peek().unwrap_or('\0');
        if OPS1.contains(c) {
            self.bump();
            self.asi = matches!(c, ')' | ']' | '}');
            if c == ';' {
                return Ok(self.token(TokenKind::Semi, pos));
            }
            return Ok(self.token(TokenKind::Op, pos));
        }
        Err(LexError {
            pos,
            msg: format!("unexpected character {:?}", c),
        })
    }
}

/// Convenience used by annotation rendering: tokenize, tolerating trailing
/// lexical garbage by stopping at the first error.
pub fn scan_lossy(src: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut lexer = Lexer::new(src);
    while let Ok(Some(tok)) = lexer.next_token() {
        out.push(tok);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(src)
            .tokens()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn basic_tokens() {
        let toks = kinds("func Add(a, b int) int");
        assert_eq!(toks[0], (TokenKind::Keyword, "func".to_string()));
        assert_eq!(toks[1], (TokenKind::Ident, "Add".to_string()));
        assert!(toks.iter().any(|(k, t)| *k == TokenKind::Ident && t == "int"));
    }

    #[test]
    fn semicolon_insertion() {
        let toks = kinds("a := 1\nb := 2\n");
        let semis = toks.iter().filter(|(k, _)| *k == TokenKind::Semi).count();
        assert_eq!(semis, 2);
    }

    #[test]
    fn no_semi_after_operators() {
        let toks = kinds("a +\nb\n");
        let semis = toks.iter().filter(|(k, _)| *k == TokenKind::Semi).count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn comments_and_strings() {
        let toks = kinds("// line\n/* block */ \"str\\\"ing\" `raw`");
        assert_eq!(toks[0].0, TokenKind::Comment);
        assert_eq!(toks[1].0, TokenKind::Comment);
        assert_eq!(toks[2].0, TokenKind::Str);
        assert_eq!(toks[3].0, TokenKind::Str);
    }

    #[test]
    fn numbers() {
        let toks = kinds("0x1f 12 3.14 1e9 2i 'c'");
        let ks: Vec<TokenKind> = toks.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Imag,
                TokenKind::Char,
            ]
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let src = "x := `a`";
        let toks = Lexer::new(src).tokens().unwrap();
        for t in &toks {
            if t.kind != TokenKind::Semi {
                assert_eq!(&src[t.pos..t.end], t.text);
            }
        }
    }
}
