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

//! Recursive-descent parser for top-level declarations. Function bodies are
//! skipped as opaque brace-balanced spans; everything the documentation
//! extractor needs (signatures, types, doc comments, imports) is modelled.

use super::ast::*;
use super::lex::{Lexer, Token, TokenKind};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CommentTok {
    pub pos: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub name: String,
    pub src: String,
    pub package_name: String,
    pub package_doc: String,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub comments: Vec<CommentTok>,
    /// Raw build-constraint lines seen before the package clause.
    pub build_constraints: Vec<String>,
    lines: Vec<usize>,
}

impl ParsedFile {
    pub fn is_test(&self) -> bool {
        self.name.ends_with("_test.go")
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, pos: usize) -> usize {
        match self.lines.binary_search(&pos) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// Effective package names bound by this file's imports. Unaliased
    /// imports contribute the final path segment plus the common
    /// `go`-prefix/suffix spellings; explicit aliases win.
    pub fn import_aliases(&self) -> HashMap<String, String> {
        let mut m = HashMap::new();
        for spec in &self.imports {
            if spec.alias.is_none() {
                let seg = spec.path.rsplit('/').next().unwrap_or(&spec.path);
                m.insert(seg.to_string(), spec.path.clone());
            }
        }
        for spec in &self.imports {
            if spec.alias.is_none() {
                let seg = spec.path.rsplit('/').next().unwrap_or(&spec.path);
                let mut variants = Vec::new();
                if seg.len() > 2 && seg.starts_with("go") {
                    variants.push(&seg[2..]);
                }
                if seg.len() > 3 && (seg.ends_with("-go") || seg.ends_with(".go")) {
                    variants.push(&seg[..seg.len() - 3]);
                }
                for v in variants {
                    m.entry(v.to_string()).or_insert_with(|| spec.path.clone());
                }
            }
        }
        for spec in &self.imports {
            if let Some(alias) = &spec.alias {
                if alias != "." && alias != "_" {
                    m.insert(alias.clone(), spec.path.clone());
                }
            }
        }
        m
    }

    /// Comment group ending on the line directly above `pos`, cleaned of
    /// comment markers.
    pub fn doc_comment_before(&self, pos: usize) -> String {
        let line = self.line_of(pos);
        let mut group: Vec<&CommentTok> = Vec::new();
        let mut want_line = line.checked_sub(1).unwrap_or(0);
        for c in self.comments.iter().rev() {
            if c.pos >= pos {
                continue;
            }
            let end_line = self.line_of(c.end.saturating_sub(1).max(c.pos));
            if end_line == want_line && want_line > 0 {
                want_line = self.line_of(c.pos).checked_sub(1).unwrap_or(0);
                group.push(c);
            } else if end_line < want_line || want_line == 0 {
                break;
            }
        }
        group.reverse();
        let raw: Vec<&str> = group.iter().map(|c| c.text.as_str()).collect();
        clean_comment_group(&raw)
    }
}

/// Strips comment markers and directive lines, joining the group into prose.
pub fn clean_comment_group(comments: &[&str]) -> String {
    let mut out = Vec::new();
    for c in comments {
        if let Some(rest) = c.strip_prefix("//") {
            let line = rest.strip_prefix(' ').unwrap_or(rest);
            out.push(line.trim_end().to_string());
        } else if let Some(body) = c
            .strip_prefix("/*")
            .and_then(|s| s.strip_suffix("*/"))
        {
            for line in body.lines() {
                let line = line.trim_start_matches([' ', '\t']);
                let line = line.strip_prefix("* ").unwrap_or(line.strip_prefix('*').unwrap_or(line));
                out.push(line.trim_end().to_string());
            }
        }
    }
    while out.first().map(|l| l.is_empty()) == Some(true) {
        out.remove(0);
    }
    while out.last().map(|l| l.is_empty()) == Some(true) {
        out.pop();
    }
    out.join("\n")
}

struct Parser {
    toks: Vec<Token>,
    i: usize,
    src_len: usize,
}

type PResult<T> = Result<T, String>;

impl Parser {
    fn cur(&self) -> Option<&Token> {
        self.toks.get(self.i)
    }

    fn cur_text(&self) -> &str {
        self.cur().map(|t| t.text.as_str()).unwrap_or("")
    }

    fn cur_pos(&self) -> usize {
        self.cur().map(|t| t.pos).unwrap_or(self.src_len)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.toks.get(self.i).cloned();
        if t.is_some() {
            self.i += 1;
        }
        t
    }

    fn at_op(&self, op: &str) -> bool {
        self.cur()
            .map(|t| t.kind == TokenKind::Op && t.text == op)
            .unwrap_or(false)
    }

    fn at_kw(&self, kw: &str) -> bool {
        self.cur()
            .map(|t| t.kind == TokenKind::Keyword && t.text == kw)
            .unwrap_or(false)
    }

    fn at_semi(&self) -> bool {
        self.cur().map(|t| t.kind == TokenKind::Semi).unwrap_or(false)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<usize> {
        if self.at_op(op) {
            let pos = self.cur_pos();
            self.i += 1;
            Ok(pos)
        } else {
            Err(format!(
                "expected {:?}, found {:?} at offset {}",
                op,
                self.cur_text(),
                self.cur_pos()
            ))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> PResult<usize> {
        if self.at_kw(kw) {
            let pos = self.cur_pos();
            self.i += 1;
            Ok(pos)
        } else {
            Err(format!(
                "expected keyword {:?}, found {:?} at offset {}",
                kw,
                self.cur_text(),
                self.cur_pos()
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        match self.cur() {
            Some(t) if t.kind == TokenKind::Ident => {
                let id = Ident {
                    name: t.text.clone(),
                    pos: t.pos,
                };
                self.i += 1;
                Ok(id)
            }
            _ => Err(format!(
                "expected identifier, found {:?} at offset {}",
                self.cur_text(),
                self.cur_pos()
            )),
        }
    }

    fn skip_semis(&mut self) {
        while self.at_semi() {
            self.i += 1;
        }
    }

    fn expect_semi(&mut self) -> PResult<()> {
        // Closing delimiters terminate a statement without a semicolon.
        if self.at_op(")") || self.at_op("}") || self.cur().is_none() {
            return Ok(());
        }
        if self.at_semi() {
            self.i += 1;
            return Ok(());
        }
        Err(format!(
            "expected end of statement, found {:?} at offset {}",
            self.cur_text(),
            self.cur_pos()
        ))
    }

    /// True when the current token can begin a type.
    fn at_type_start(&self) -> bool {
        match self.cur() {
            Some(t) => match t.kind {
                TokenKind::Ident => true,
                TokenKind::Keyword => {
                    matches!(t.text.as_str(), "map" | "chan" | "func" | "interface" | "struct")
                }
                TokenKind::Op => matches!(t.text.as_str(), "*" | "[" | "(" | "<-" | "..."),
                _ => false,
            },
            None => false,
        }
    }

    fn parse_type(&mut self) -> PResult<Expr> {
        match self.cur().cloned() {
            Some(t) if t.kind == TokenKind::Ident => {
                let id = self.expect_ident()?;
                if self.at_op(".") {
                    self.i += 1;
                    let sel = self.expect_ident()?;
                    Ok(Expr::Selector {
                        x: Box::new(Expr::Ident(id)),
                        sel,
                    })
                } else {
                    Ok(Expr::Ident(id))
                }
            }
            Some(t) if t.kind == TokenKind::Op => match t.text.as_str() {
                "(" => {
                    self.i += 1;
                    let inner = self.parse_type()?;
                    self.expect_op(")")?;
                    Ok(Expr::Paren { x: Box::new(inner) })
                }
                "*" => {
                    self.i += 1;
                    let inner = self.parse_type()?;
                    Ok(Expr::Star { x: Box::new(inner) })
                }
                "[" => {
                    self.i += 1;
                    if self.eat_op("]") {
                        let elt = self.parse_type()?;
                        return Ok(Expr::ArrayType {
                            len: None,
                            elt: Box::new(elt),
                        });
                    }
                    let len = if self.at_op("...") {
                        let pos = self.cur_pos();
                        self.i += 1;
                        Expr::BasicLit {
                            pos,
                            value: "...".to_string(),
                        }
                    } else {
                        self.parse_expr()?
                    };
                    self.expect_op("]")?;
                    let elt = self.parse_type()?;
                    Ok(Expr::ArrayType {
                        len: Some(Box::new(len)),
                        elt: Box::new(elt),
                    })
                }
                "<-" => {
                    self.i += 1;
                    self.expect_kw("chan")?;
                    let value = self.parse_type()?;
                    Ok(Expr::ChanType {
                        dir: ChanDir::Recv,
                        value: Box::new(value),
                    })
                }
                "..." => {
                    self.i += 1;
                    let elt = if self.at_type_start() {
                        Some(Box::new(self.parse_type()?))
                    } else {
                        None
                    };
                    Ok(Expr::Ellipsis { elt })
                }
                other => Err(format!("unexpected {:?} in type at offset {}", other, t.pos)),
            },
            Some(t) if t.kind == TokenKind::Keyword => match t.text.as_str() {
                "map" => {
                    self.i += 1;
                    self.expect_op("[")?;
                    let key = self.parse_type()?;
                    self.expect_op("]")?;
                    let value = self.parse_type()?;
                    Ok(Expr::MapType {
                        key: Box::new(key),
                        value: Box::new(value),
                    })
                }
                "chan" => {
                    self.i += 1;
                    let dir = if self.eat_op("<-") {
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    };
                    let value = self.parse_type()?;
                    Ok(Expr::ChanType {
                        dir,
                        value: Box::new(value),
                    })
                }
                "func" => {
                    self.i += 1;
                    let typ = self.parse_signature()?;
                    Ok(Expr::FuncType(Box::new(typ)))
                }
                "interface" => {
                    self.i += 1;
                    self.parse_interface()
                }
                "struct" => {
                    self.i += 1;
                    self.parse_struct()
                }
                other => Err(format!(
                    "unexpected keyword {:?} in type at offset {}",
                    other, t.pos
                )),
            },
            _ => Err(format!(
                "unexpected {:?} in type at offset {}",
                self.cur_text(),
                self.cur_pos()
            )),
        }
    }

    fn parse_struct(&mut self) -> PResult<Expr> {
        self.expect_op("{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.eat_op("}") {
                break;
            }
            fields.push(self.parse_struct_field()?);
            self.expect_semi()?;
        }
        Ok(Expr::StructType { fields })
    }

    fn parse_struct_field(&mut self) -> PResult<Field> {
        if self.at_op("*") {
            // Embedded pointer field.
            let typ = self.parse_type()?;
            let tag = self.parse_tag();
            return Ok(Field {
                names: Vec::new(),
                typ,
                tag,
            });
        }
        let first = self.expect_ident()?;
        if self.at_op(".") {
            self.i += 1;
            let sel = self.expect_ident()?;
            let tag = self.parse_tag();
            return Ok(Field {
                names: Vec::new(),
                typ: Expr::Selector {
                    x: Box::new(Expr::Ident(first)),
                    sel,
                },
                tag,
            });
        }
        let mut names = vec![first];
        while self.eat_op(",") {
            names.push(self.expect_ident()?);
        }
        if names.len() == 1 && !self.at_type_start() {
            // Embedded field.
            let tag = self.parse_tag();
            let id = names.pop().unwrap();
            return Ok(Field {
                names: Vec::new(),
                typ: Expr::Ident(id),
                tag,
            });
        }
        let typ = self.parse_type()?;
        let tag = self.parse_tag();
        Ok(Field { names, typ, tag })
    }

    fn parse_tag(&mut self) -> Option<String> {
        match self.cur() {
            Some(t) if t.kind == TokenKind::Str => {
                let tag = t.text.clone();
                self.i += 1;
                Some(tag)
            }
            _ => None,
        }
    }

    fn parse_interface(&mut self) -> PResult<Expr> {
        self.expect_op("{")?;
        let mut methods = Vec::new();
        loop {
            self.skip_semis();
            if self.eat_op("}") {
                break;
            }
            let first = self.expect_ident()?;
            if self.at_op("(") {
                let sig = self.parse_signature()?;
                methods.push(Field {
                    names: vec![first],
                    typ: Expr::FuncType(Box::new(sig)),
                    tag: None,
                });
            } else if self.at_op(".") {
                self.i += 1;
                let sel = self.expect_ident()?;
                methods.push(Field {
                    names: Vec::new(),
                    typ: Expr::Selector {
                        x: Box::new(Expr::Ident(first)),
                        sel,
                    },
                    tag: None,
                });
            } else {
                methods.push(Field {
                    names: Vec::new(),
                    typ: Expr::Ident(first),
                    tag: None,
                });
            }
            self.expect_semi()?;
        }
        Ok(Expr::InterfaceType { methods })
    }

    fn parse_signature(&mut self) -> PResult<FuncType> {
        self.expect_op("(")?;
        let params = self.parse_param_list()?;
        let mut results = Vec::new();
        let mut parenthesized = false;
        if self.at_op("(") {
            self.i += 1;
            results = self.parse_param_list()?;
            parenthesized = true;
        } else if self.at_type_start() && !self.at_op("...") {
            let typ = self.parse_type()?;
            results.push(Field {
                names: Vec::new(),
                typ,
                tag: None,
            });
        }
        Ok(FuncType {
            params,
            results,
            results_parenthesized: parenthesized,
        })
    }

    /// Parses a comma-separated parameter list up to and including the
    /// closing parenthesis, resolving the named/unnamed ambiguity the way the
    /// language defines it: a bare identifier is a type unless a later
    /// element in the same list carries a type.
    fn parse_param_list(&mut self) -> PResult<Vec<Field>> {
        let mut groups: Vec<Field> = Vec::new();
        let mut pending: Vec<Ident> = Vec::new();
        loop {
            if self.eat_op(")") {
                break;
            }
            if self.at_op("...") {
                self.i += 1;
                let elt = if self.at_type_start() {
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                groups.push(Field {
                    names: Vec::new(),
                    typ: Expr::Ellipsis { elt },
                    tag: None,
                });
            } else {
                let typ = self.parse_type()?;
                if self.at_type_start() {
                    // The parsed "type" was really a parameter name.
                    let name = match typ {
                        Expr::Ident(id) => id,
                        other => {
                            return Err(format!(
                                "parameter name expected at offset {}",
                                other.pos()
                            ))
                        }
                    };
                    let field_typ = if self.at_op("...") {
                        self.i += 1;
                        let elt = Some(Box::new(self.parse_type()?));
                        Expr::Ellipsis { elt }
                    } else {
                        self.parse_type()?
                    };
                    let mut names = std::mem::take(&mut pending);
                    names.push(name);
                    groups.push(Field {
                        names,
                        typ: field_typ,
                        tag: None,
                    });
                } else {
                    match typ {
                        Expr::Ident(id) => pending.push(id),
                        other => {
                            // Flush any bare identifiers as unnamed types.
                            for id in pending.drain(..) {
                                groups.push(Field {
                                    names: Vec::new(),
                                    typ: Expr::Ident(id),
                                    tag: None,
                                });
                            }
                            groups.push(Field {
                                names: Vec::new(),
                                typ: other,
                                tag: None,
                            });
                        }
                    }
                }
            }
            if !self.eat_op(",") {
                self.expect_op(")")?;
                break;
            }
        }
        for id in pending {
            groups.push(Field {
                names: Vec::new(),
                typ: Expr::Ident(id),
                tag: None,
            });
        }
        Ok(groups)
    }

    // Expression parsing, used for const/var initializers and array lengths.

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    fn binary_prec(op: &str) -> u8 {
        match op {
            "||" => 1,
            "&&" => 2,
            "==" | "!=" | "<" | "<=" | ">" | ">=" => 3,
            "+" | "-" | "|" | "^" => 4,
            "*" | "/" | "%" | "<<" | ">>" | "&" | "&^" => 5,
            _ => 0,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut x = self.parse_unary()?;
        loop {
            let op = match self.cur() {
                Some(t) if t.kind == TokenKind::Op => t.text.clone(),
                _ => break,
            };
            let prec = Self::binary_prec(&op);
            if prec < min_prec || prec == 0 {
                break;
            }
            self.i += 1;
            let y = self.parse_binary(prec + 1)?;
            x = Expr::Binary {
                x: Box::new(x),
                op,
                y: Box::new(y),
            };
        }
        Ok(x)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if let Some(t) = self.cur() {
            if t.kind == TokenKind::Op && matches!(t.text.as_str(), "+" | "-" | "!" | "^" | "&" | "<-")
            {
                let op = t.text.clone();
                self.i += 1;
                let x = self.parse_unary()?;
                return Ok(Expr::Unary { op, x: Box::new(x) });
            }
            if t.kind == TokenKind::Op && t.text == "*" {
                self.i += 1;
                let x = self.parse_unary()?;
                return Ok(Expr::Star { x: Box::new(x) });
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let mut x = self.parse_operand()?;
        loop {
            if self.at_op(".") {
                self.i += 1;
                let sel = self.expect_ident()?;
                x = Expr::Selector {
                    x: Box::new(x),
                    sel,
                };
            } else if self.at_op("(") {
                self.i += 1;
                let mut args = Vec::new();
                while !self.at_op(")") {
                    if self.at_op("...") {
                        self.i += 1;
                        continue;
                    }
                    args.push(self.parse_expr()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op(")")?;
                x = Expr::Call {
                    func: Box::new(x),
                    args,
                };
            } else if self.at_op("[") {
                self.i += 1;
                let mut indices = Vec::new();
                while !self.at_op("]") {
                    if self.eat_op(":") {
                        continue;
                    }
                    indices.push(self.parse_expr()?);
                    if !self.at_op(":") && !self.at_op("]") {
                        break;
                    }
                }
                self.expect_op("]")?;
                x = Expr::Index {
                    x: Box::new(x),
                    indices,
                };
            } else if self.at_op("{") && composite_ok(&x) {
                x = self.parse_composite(Some(Box::new(x)))?;
            } else {
                break;
            }
        }
        Ok(x)
    }

    fn parse_composite(&mut self, typ: Option<Box<Expr>>) -> PResult<Expr> {
        self.expect_op("{")?;
        let mut elts = Vec::new();
        loop {
            self.skip_semis();
            if self.eat_op("}") {
                break;
            }
            let elt = if self.at_op("{") {
                self.parse_composite(None)?
            } else {
                self.parse_expr()?
            };
            let elt = if self.eat_op(":") {
                let value = if self.at_op("{") {
                    self.parse_composite(None)?
                } else {
                    self.parse_expr()?
                };
                Expr::KeyValue {
                    key: Box::new(elt),
                    value: Box::new(value),
                }
            } else {
                elt
            };
            elts.push(elt);
            if !self.eat_op(",") {
                self.skip_semis();
                self.expect_op("}")?;
                break;
            }
        }
        Ok(Expr::Composite { typ, elts })
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        match self.cur().cloned() {
            Some(t) if t.kind == TokenKind::Ident => {
                let id = self.expect_ident()?;
                Ok(Expr::Ident(id))
            }
            Some(t)
                if matches!(
                    t.kind,
                    TokenKind::Int | TokenKind::Float | TokenKind::Imag | TokenKind::Char | TokenKind::Str
                ) =>
            {
                self.i += 1;
                Ok(Expr::BasicLit {
                    pos: t.pos,
                    value: t.text,
                })
            }
            Some(t) if t.kind == TokenKind::Op && t.text == "(" => {
                self.i += 1;
                let x = self.parse_expr()?;
                self.expect_op(")")?;
                Ok(Expr::Paren { x: Box::new(x) })
            }
            Some(t) if t.kind == TokenKind::Keyword && t.text == "func" => {
                self.i += 1;
                let typ = self.parse_signature()?;
                if self.at_op("{") {
                    let body = self.skip_block()?;
                    Ok(Expr::FuncLit {
                        typ: Box::new(typ),
                        body,
                    })
                } else {
                    Ok(Expr::FuncType(Box::new(typ)))
                }
            }
            Some(t)
                if t.kind == TokenKind::Keyword
                    && matches!(t.text.as_str(), "map" | "chan" | "struct" | "interface") =>
            {
                let typ = self.parse_type()?;
                if self.at_op("{") {
                    self.parse_composite(Some(Box::new(typ)))
                } else {
                    Ok(typ)
                }
            }
            Some(t) if t.kind == TokenKind::Op && matches!(t.text.as_str(), "[" | "*" | "<-") => {
                let typ = self.parse_type()?;
                if self.at_op("{") {
                    self.parse_composite(Some(Box::new(typ)))
                } else {
                    Ok(typ)
                }
            }
            _ => Err(format!(
                "unexpected {:?} in expression at offset {}",
                self.cur_text(),
                self.cur_pos()
            )),
        }
    }

    /// Skips a brace-balanced block, returning its byte span.
    fn skip_block(&mut self) -> PResult<(usize, usize)> {
        let start = self.expect_op("{")?;
        let mut depth = 1usize;
        let mut end = start + 1;
        while depth > 0 {
            match self.bump() {
                Some(t) => {
                    end = t.end;
                    if t.kind == TokenKind::Op {
                        if t.text == "{" {
                            depth += 1;
                        } else if t.text == "}" {
                            depth -= 1;
                        }
                    }
                }
                None => return Err("unterminated block".to_string()),
            }
        }
        Ok((start, end))
    }

    // Declarations.

    fn parse_value_spec(&mut self) -> PResult<ValueSpec> {
        let mut names = vec![self.expect_ident()?];
        while self.eat_op(",") {
            names.push(self.expect_ident()?);
        }
        let typ = if self.at_type_start() && !self.at_op("...") {
            Some(self.parse_type()?)
        } else {
            None
        };
        let mut values = Vec::new();
        if self.eat_op("=") {
            values.push(self.parse_expr()?);
            while self.eat_op(",") {
                values.push(self.parse_expr()?);
            }
        }
        Ok(ValueSpec { names, typ, values })
    }

    fn parse_gen_decl(&mut self, kind: ValueKind, doc: String) -> PResult<GenDecl> {
        let start = self.cur_pos();
        self.i += 1; // const | var
        let mut specs = Vec::new();
        if self.eat_op("(") {
            loop {
                self.skip_semis();
                if self.eat_op(")") {
                    break;
                }
                specs.push(self.parse_value_spec()?);
                self.expect_semi()?;
            }
        } else {
            specs.push(self.parse_value_spec()?);
        }
        let end = self.prev_end(start);
        Ok(GenDecl {
            kind,
            specs,
            doc,
            span: (start, end),
        })
    }

    fn parse_type_decl(&mut self, doc: String) -> PResult<TypeDecl> {
        let start = self.cur_pos();
        self.i += 1; // type
        let mut specs = Vec::new();
        if self.eat_op("(") {
            loop {
                self.skip_semis();
                if self.eat_op(")") {
                    break;
                }
                specs.push(self.parse_type_spec()?);
                self.expect_semi()?;
            }
        } else {
            specs.push(self.parse_type_spec()?);
        }
        let end = self.prev_end(start);
        Ok(TypeDecl {
            specs,
            doc,
            span: (start, end),
        })
    }

    fn parse_type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.expect_ident()?;
        let start = name.pos;
        self.eat_op("="); // type alias
        let typ = self.parse_type()?;
        let end = self.prev_end(start);
        Ok(TypeSpec {
            name,
            typ,
            doc: String::new(),
            span: (start, end),
        })
    }

    fn parse_func_decl(&mut self, doc: String) -> PResult<FuncDecl> {
        let start = self.cur_pos();
        self.i += 1; // func
        let recv = if self.at_op("(") {
            self.i += 1;
            let fields = self.parse_param_list()?;
            fields.into_iter().next()
        } else {
            None
        };
        let name = self.expect_ident()?;
        let typ = self.parse_signature()?;
        let body = if self.at_op("{") {
            Some(self.skip_block()?)
        } else {
            None
        };
        let end = self.prev_end(start);
        Ok(FuncDecl {
            recv,
            name,
            typ,
            body,
            doc,
            span: (start, end),
        })
    }

    fn prev_end(&self, fallback: usize) -> usize {
        self.toks
            .get(self.i.wrapping_sub(1))
            .map(|t| t.end)
            .unwrap_or(fallback)
    }
}

fn composite_ok(x: &Expr) -> bool {
    matches!(
        x,
        Expr::Ident(_)
            | Expr::Selector { .. }
            | Expr::ArrayType { .. }
            | Expr::MapType { .. }
            | Expr::StructType { .. }
    )
}

pub fn parse_file(name: &str, src: &str) -> Result<ParsedFile, String> {
    let all_tokens = Lexer::new(src)
        .tokens()
        .map_err(|e| format!("{}: {}", name, e))?;

    let mut comments = Vec::new();
    let mut toks = Vec::new();
    for t in all_tokens {
        if t.kind == TokenKind::Comment {
            comments.push(CommentTok {
                pos: t.pos,
                end: t.end,
                text: t.text,
            });
        } else {
            toks.push(t);
        }
    }

    let mut lines = vec![0usize];
    for (i, b) in src.bytes().enumerate() {
        if b == b'\n' {
            lines.push(i + 1);
        }
    }

    let mut p = Parser {
        toks,
        i: 0,
        src_len: src.len(),
    };

    p.skip_semis();
    let package_pos = p.cur_pos();
    p.expect_kw("package").map_err(|e| format!("{}: {}", name, e))?;
    let package_name = p.expect_ident().map_err(|e| format!("{}: {}", name, e))?;
    p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;

    let mut file = ParsedFile {
        name: name.to_string(),
        src: src.to_string(),
        package_name: package_name.name,
        package_doc: String::new(),
        imports: Vec::new(),
        decls: Vec::new(),
        comments,
        build_constraints: Vec::new(),
        lines,
    };

    file.package_doc = file.doc_comment_before(package_pos);
    for c in &file.comments {
        if c.pos >= package_pos {
            break;
        }
        for line in c.text.lines() {
            let line = line.trim_start_matches('/').trim();
            if line.starts_with("+build") {
                file.build_constraints.push(line.to_string());
            }
        }
    }

    // Imports.
    loop {
        p.skip_semis();
        if !p.at_kw("import") {
            break;
        }
        p.i += 1;
        let specs = if p.eat_op("(") {
            let mut specs = Vec::new();
            loop {
                p.skip_semis();
                if p.eat_op(")") {
                    break;
                }
                specs.push(parse_import_spec(&mut p).map_err(|e| format!("{}: {}", name, e))?);
                p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;
            }
            specs
        } else {
            vec![parse_import_spec(&mut p).map_err(|e| format!("{}: {}", name, e))?]
        };
        file.imports.extend(specs);
        p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;
    }

    // Top-level declarations.
    loop {
        p.skip_semis();
        let doc_pos = p.cur_pos();
        let doc = file.doc_comment_before(doc_pos);
        let decl = if p.at_kw("const") {
            Decl::Gen(
                p.parse_gen_decl(ValueKind::Const, doc)
                    .map_err(|e| format!("{}: {}", name, e))?,
            )
        } else if p.at_kw("var") {
            Decl::Gen(
                p.parse_gen_decl(ValueKind::Var, doc)
                    .map_err(|e| format!("{}: {}", name, e))?,
            )
        } else if p.at_kw("type") {
            Decl::Type(
                p.parse_type_decl(doc)
                    .map_err(|e| format!("{}: {}", name, e))?,
            )
        } else if p.at_kw("func") {
            Decl::Func(
                p.parse_func_decl(doc)
                    .map_err(|e| format!("{}: {}", name, e))?,
            )
        } else if p.at_kw("import") {
            // Late import block, legal after other declarations.
            p.i += 1;
            if p.eat_op("(") {
                loop {
                    p.skip_semis();
                    if p.eat_op(")") {
                        break;
                    }
                    let spec =
                        parse_import_spec(&mut p).map_err(|e| format!("{}: {}", name, e))?;
                    file.imports.push(spec);
                    p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;
                }
            } else {
                let spec = parse_import_spec(&mut p).map_err(|e| format!("{}: {}", name, e))?;
                file.imports.push(spec);
            }
            p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;
            continue;
        } else if p.cur().is_none() {
            break;
        } else {
            return Err(format!(
                "{}: unexpected {:?} at top level, offset {}",
                name,
                p.cur_text(),
                p.cur_pos()
            ));
        };
        file.decls.push(decl);
        p.expect_semi().map_err(|e| format!("{}: {}", name, e))?;
    }

    Ok(file)
}

fn parse_import_spec(p: &mut Parser) -> PResult<ImportSpec> {
    let alias = match p.cur() {
        Some(t) if t.kind == TokenKind::Ident => {
            let a = t.text.clone();
            p.i += 1;
            Some(a)
        }
        Some(t) if t.kind == TokenKind::Op && t.text == "." => {
            p.i += 1;
            Some(".".to_string())
        }
        _ => None,
    };
    match p.bump() {
        Some(t) if t.kind == TokenKind::Str => {
            let path = unquote(&t.text);
            Ok(ImportSpec { alias, path })
        }
        other => Err(format!(
            "expected import path string, found {:?}",
            other.map(|t| t.text).unwrap_or_default()
        )),
    }
}

/// Strips the quotes from a string literal, resolving the common escapes.
pub fn unquote(lit: &str) -> String {
    if lit.len() >= 2 && lit.starts_with('`') && lit.ends_with('`') {
        return lit[1..lit.len() - 1].to_string();
    }
    if lit.len() < 2 || !lit.starts_with('"') || !lit.ends_with('"') {
        return lit.to_string();
    }
    let inner = &lit[1..lit.len() - 1];
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
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Tags assumed true when evaluating build constraints. Everything else is
/// treated as unsatisfied, matching the behavior of a default build context.
const ENABLED_TAGS: &[&str] = &["linux", "amd64", "cgo", "go1.1", "go1.2"];

/// Evaluates `+build` lines: within a line, space separates alternatives,
/// comma separates conjuncts and `!` negates. The file builds only when
/// every line is satisfied.
pub fn build_disabled(constraints: &[String]) -> bool {
    for line in constraints {
        let terms = line.trim_start_matches("+build").trim();
        if terms.is_empty() {
            continue;
        }
        let mut line_ok = false;
        for term in terms.split_whitespace() {
            let mut term_ok = true;
            for factor in term.split(',') {
                let (neg, tag) = match factor.strip_prefix('!') {
                    Some(t) => (true, t),
                    None => (false, factor),
                };
                let sat = ENABLED_TAGS.contains(&tag);
                if sat == neg {
                    term_ok = false;
                    break;
                }
            }
            if term_ok {
                line_ok = true;
                break;
            }
        }
        if !line_ok {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_and_imports() {
        let src = r#"// Package demo does demo things.
package demo

import (
    "fmt"
    x "example.com/pkg"
)

// Answer is the answer.
const Answer = 42
"#;
        let f = parse_file("demo.go", src).unwrap();
        assert_eq!(f.package_name, "demo");
        assert_eq!(f.package_doc, "Package demo does demo things.");
        assert_eq!(f.imports.len(), 2);
        assert_eq!(f.imports[1].alias.as_deref(), Some("x"));
        assert_eq!(f.imports[1].path, "example.com/pkg");
        assert_eq!(f.decls.len(), 1);
        match &f.decls[0] {
            Decl::Gen(d) => {
                assert_eq!(d.kind, ValueKind::Const);
                assert_eq!(d.doc, "Answer is the answer.");
                assert_eq!(&src[d.span.0..d.span.1], "const Answer = 42");
            }
            other => panic!("unexpected decl {:?}", other),
        }
    }

    #[test]
    fn parses_func_decls() {
        let src = "package p\n\nfunc (c *Config) Get(key string) (string, error) {\n\treturn \"\", nil\n}\n";
        let f = parse_file("p.go", src).unwrap();
        match &f.decls[0] {
            Decl::Func(d) => {
                assert_eq!(d.name.name, "Get");
                let recv = d.recv.as_ref().unwrap();
                assert_eq!(recv.names[0].name, "c");
                assert_eq!(d.typ.params.len(), 1);
                assert_eq!(d.typ.results.len(), 2);
                assert!(d.typ.results_parenthesized);
                assert!(d.body.is_some());
            }
            other => panic!("unexpected decl {:?}", other),
        }
    }

    #[test]
    fn parses_grouped_params() {
        let src = "package p\nfunc F(a, b int, c string) {}\n";
        let f = parse_file("p.go", src).unwrap();
        match &f.decls[0] {
            Decl::Func(d) => {
                assert_eq!(d.typ.params.len(), 2);
                assert_eq!(d.typ.params[0].names.len(), 2);
                assert_eq!(d.typ.params[1].names.len(), 1);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_types() {
        let src = r#"package p

type Reader interface {
    Read(p []byte) (n int, err error)
    Closer
}

type Pair struct {
    Key, Value string
    meta       map[string]interface{}
}
"#;
        let f = parse_file("p.go", src).unwrap();
        assert_eq!(f.decls.len(), 2);
        match &f.decls[0] {
            Decl::Type(d) => {
                assert_eq!(d.specs[0].name.name, "Reader");
                match &d.specs[0].typ {
                    Expr::InterfaceType { methods } => {
                        assert_eq!(methods.len(), 2);
                        assert_eq!(methods[0].names[0].name, "Read");
                        assert!(methods[1].names.is_empty());
                    }
                    _ => panic!("expected interface"),
                }
            }
            _ => panic!(),
        }
    }

    #[test]
    fn alias_map_variants() {
        let src = r#"package foobar
import (
    a "example.com/z"
    "exampel.com/a"
    "example.com/a.go"
    "example.com/go.a"
    "example.com/b"
    "example.com/b-go"
    "example.com/go-b"
    "example.com/goc"
    "example.com/d.go"
)
"#;
        let f = parse_file("doc.go", src).unwrap();
        let m = f.import_aliases();
        let expect = [
            ("a", "example.com/z"),
            ("b", "example.com/b"),
            ("c", "example.com/goc"),
            ("goc", "example.com/goc"),
            ("d", "example.com/d.go"),
            (".a", "example.com/go.a"),
            ("a.go", "example.com/a.go"),
            ("-b", "example.com/go-b"),
            ("b-go", "example.com/b-go"),
            ("go.a", "example.com/go.a"),
            ("go-b", "example.com/go-b"),
            ("d.go", "example.com/d.go"),
        ];
        for (alias, path) in expect {
            assert_eq!(m.get(alias).map(String::as_str), Some(path), "alias {}", alias);
        }
        assert_eq!(m.len(), expect.len());
    }

    #[test]
    fn build_constraint_detection() {
        let src = "// +build ignore\n\npackage p\n";
        let f = parse_file("p.go", src).unwrap();
        assert_eq!(f.build_constraints, vec!["+build ignore".to_string()]);
        assert!(build_disabled(&f.build_constraints));

        assert!(!build_disabled(&["+build linux darwin".to_string()]));
        assert!(build_disabled(&["+build windows".to_string()]));
        assert!(!build_disabled(&["+build !windows".to_string()]));
        assert!(build_disabled(&["+build linux,386".to_string()]));
    }

    #[test]
    fn var_with_func_literal_value() {
        let src = "package p\n\nvar Handler = func(w int) int { return w }\n";
        let f = parse_file("p.go", src).unwrap();
        match &f.decls[0] {
            Decl::Gen(d) => {
                assert_eq!(d.kind, ValueKind::Var);
                match &d.specs[0].values[0] {
                    Expr::FuncLit { .. } => {}
                    other => panic!("expected func literal, got {:?}", other),
                }
            }
            _ => panic!(),
        }
    }
}
