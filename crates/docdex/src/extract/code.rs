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

//! Declaration rendering with cross-reference annotations.
//!
//! Works in two passes, the second re-scanning the rendered text: an AST walk
//! decides what every identifier is (builtin, local export, imported
//! selector, plain name), then a token scan assigns byte offsets by pairing
//! identifiers in order. Comments are annotated during the scan.

use super::ast::*;
use super::lex::{scan_lossy, TokenKind};
use crate::{Annotation, AnnotationKind, Code};
use std::collections::HashMap;

/// Predeclared identifiers of the universal scope.
pub const PREDECLARED_TYPES: &[&str] = &[
    "bool", "byte", "complex128", "complex64", "error", "float32", "float64", "int", "int16",
    "int32", "int64", "int8", "rune", "string", "uint", "uint16", "uint32", "uint64", "uint8",
    "uintptr",
];

pub const PREDECLARED_CONSTANTS: &[&str] = &["true", "false", "iota", "nil"];

pub const PREDECLARED_FUNCTIONS: &[&str] = &[
    "append", "cap", "close", "complex", "copy", "delete", "imag", "len", "make", "new", "panic",
    "print", "println", "real", "recover",
];

pub fn is_predeclared(name: &str) -> bool {
    PREDECLARED_TYPES.contains(&name)
        || PREDECLARED_CONSTANTS.contains(&name)
        || PREDECLARED_FUNCTIONS.contains(&name)
}

pub fn is_predeclared_type(name: &str) -> bool {
    PREDECLARED_TYPES.contains(&name)
}

const KIND_IGNORE: i32 = -1;

struct Visitor<'a> {
    /// (kind, path_index); kind < 0 means the identifier gets no annotation.
    entries: Vec<(i32, i32)>,
    paths: Vec<String>,
    path_index: HashMap<String, i32>,
    aliases: &'a HashMap<String, String>,
    /// Byte offset past which identifiers are unannotated (first function
    /// literal body; its contents are not walked).
    stop_pos: usize,
}

fn kind_code(kind: AnnotationKind) -> i32 {
    match kind {
        AnnotationKind::ExportLink => 0,
        AnnotationKind::Anchor => 1,
        AnnotationKind::Comment => 2,
        AnnotationKind::PackageLink => 3,
        AnnotationKind::Builtin => 4,
    }
}

fn kind_from_code(code: i32) -> AnnotationKind {
    match code {
        0 => AnnotationKind::ExportLink,
        1 => AnnotationKind::Anchor,
        3 => AnnotationKind::PackageLink,
        4 => AnnotationKind::Builtin,
        _ => AnnotationKind::Comment,
    }
}

impl<'a> Visitor<'a> {
    fn add(&mut self, kind: AnnotationKind, import_path: Option<&str>) {
        let path_index = match import_path {
            Some(path) => match self.path_index.get(path) {
                Some(i) => *i,
                None => {
                    let i = self.paths.len() as i32;
                    self.paths.push(path.to_string());
                    self.path_index.insert(path.to_string(), i);
                    i
                }
            },
            None => -1,
        };
        self.entries.push((kind_code(kind), path_index));
    }

    fn ignore(&mut self) {
        self.entries.push((KIND_IGNORE, -1));
    }

    fn ident(&mut self, id: &Ident) {
        if is_predeclared(&id.name) {
            self.add(AnnotationKind::Builtin, None);
        } else if is_exported(&id.name) {
            self.add(AnnotationKind::ExportLink, None);
        } else {
            self.ignore();
        }
    }

    fn field(&mut self, f: &Field, anchor_names: bool) {
        for _ in &f.names {
            if anchor_names {
                self.add(AnnotationKind::Anchor, None);
            } else {
                self.ignore();
            }
        }
        self.expr(&f.typ);
    }

    fn func_type(&mut self, t: &FuncType) {
        for f in &t.params {
            self.field(f, false);
        }
        for f in &t.results {
            self.field(f, false);
        }
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Ident(id) => self.ident(id),
            Expr::BasicLit { .. } => {}
            Expr::Selector { x, sel } => {
                if let Expr::Ident(pkg) = x.as_ref() {
                    if let Some(path) = self.aliases.get(&pkg.name) {
                        let path = path.clone();
                        self.add(AnnotationKind::PackageLink, Some(&path));
                        if path == "C" {
                            self.ignore();
                        } else {
                            self.add(AnnotationKind::ExportLink, Some(&path));
                        }
                        return;
                    }
                }
                self.expr(x);
                let _ = sel;
                self.ignore();
            }
            Expr::Star { x } | Expr::Paren { x } | Expr::Unary { x, .. } => self.expr(x),
            Expr::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            Expr::Call { func, args } => {
                self.expr(func);
                for a in args {
                    self.expr(a);
                }
            }
            Expr::Index { x, indices } => {
                self.expr(x);
                for i in indices {
                    self.expr(i);
                }
            }
            Expr::Composite { typ, elts } => {
                if let Some(t) = typ {
                    self.expr(t);
                }
                for e in elts {
                    self.expr(e);
                }
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::Ellipsis { elt } => {
                if let Some(e) = elt {
                    self.expr(e);
                }
            }
            Expr::ArrayType { len, elt } => {
                if let Some(l) = len {
                    self.expr(l);
                }
                self.expr(elt);
            }
            Expr::MapType { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::ChanType { value, .. } => self.expr(value),
            Expr::FuncType(t) => self.func_type(t),
            Expr::StructType { fields } => {
                for f in fields {
                    self.field(f, false);
                }
            }
            Expr::InterfaceType { methods } => {
                for f in methods {
                    self.field(f, false);
                }
            }
            Expr::FuncLit { typ, body } => {
                self.func_type(typ);
                if self.stop_pos > body.0 {
                    self.stop_pos = body.0;
                }
            }
        }
    }

    fn decl(&mut self, d: &Decl) {
        match d {
            Decl::Gen(d) => {
                for spec in &d.specs {
                    for _ in &spec.names {
                        self.add(AnnotationKind::Anchor, None);
                    }
                    if let Some(t) = &spec.typ {
                        self.expr(t);
                    }
                    for v in &spec.values {
                        self.expr(v);
                    }
                }
            }
            Decl::Type(d) => {
                for spec in &d.specs {
                    self.ignore(); // the type name itself
                    match &spec.typ {
                        Expr::StructType { fields } => {
                            for f in fields {
                                self.field(f, true);
                            }
                        }
                        Expr::InterfaceType { methods } => {
                            for f in methods {
                                self.field(f, true);
                            }
                        }
                        other => self.expr(other),
                    }
                }
            }
            Decl::Func(d) => {
                if let Some(recv) = &d.recv {
                    self.field(recv, false);
                }
                self.ignore(); // the function name
                self.func_type(&d.typ);
                if let Some(body) = d.body {
                    if self.stop_pos > body.0 {
                        self.stop_pos = body.0;
                    }
                }
            }
        }
    }
}

/// Renders a declaration slice into annotated [`Code`]. `text` must be the
/// declaration's source text and `base` its byte offset in the file, so that
/// body spans recorded on the AST line up.
pub fn print_decl(
    decl: &Decl,
    text: &str,
    base: usize,
    aliases: &HashMap<String, String>,
) -> Code {
    let mut v = Visitor {
        entries: Vec::new(),
        paths: Vec::new(),
        path_index: HashMap::new(),
        aliases,
        stop_pos: usize::MAX,
    };
    v.decl(decl);

    let stop = v.stop_pos.saturating_sub(base.min(v.stop_pos));
    let mut entries = v.entries.into_iter();
    let mut annotations: Vec<Annotation> = Vec::new();

    'scan: for tok in scan_lossy(text) {
        match tok.kind {
            TokenKind::Comment => {
                annotations.push(Annotation {
                    pos: tok.pos as u32,
                    end: tok.end as u32,
                    kind: AnnotationKind::Comment,
                    path_index: -1,
                });
            }
            TokenKind::Ident => {
                if tok.pos >= stop {
                    continue;
                }
                let (kind, path_index) = match entries.next() {
                    Some(e) => e,
                    None => break 'scan,
                };
                if kind == KIND_IGNORE {
                    continue;
                }
                let kind = kind_from_code(kind);
                let mut ann = Annotation {
                    pos: tok.pos as u32,
                    end: tok.end as u32,
                    kind,
                    path_index,
                };
                if kind == AnnotationKind::ExportLink {
                    if let Some(prev) = annotations.last() {
                        if prev.kind == AnnotationKind::PackageLink
                            && prev.path_index == ann.path_index
                            && prev.end + 1 == ann.pos
                        {
                            ann.pos = prev.pos;
                            *annotations.last_mut().unwrap() = ann;
                            continue;
                        }
                    }
                }
                annotations.push(ann);
            }
            _ => {}
        }
    }

    Code {
        text: text.to_string(),
        annotations,
        paths: v.paths,
    }
}

/// Annotates the comments of a plain source snippet, used for example code.
pub fn comment_annotations(src: &str) -> Vec<Annotation> {
    scan_lossy(src)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Comment)
        .map(|t| Annotation {
            pos: t.pos as u32,
            end: t.end as u32,
            kind: AnnotationKind::Comment,
            path_index: -1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse::parse_file;

    fn render(src: &str) -> Code {
        let f = parse_file("t.go", src).unwrap();
        let aliases = f.import_aliases();
        let d = f.decls.last().unwrap();
        let (start, end) = d.span();
        print_decl(d, &f.src[start..end], start, &aliases)
    }

    fn spans(code: &Code) -> Vec<(AnnotationKind, &str, i32)> {
        code.annotations
            .iter()
            .map(|a| (a.kind, &code.text[a.pos as usize..a.end as usize], a.path_index))
            .collect()
    }

    #[test]
    fn builtin_and_export_links() {
        let code = render("package p\ntype Pair struct {\n\tKey string\n\tNext *Pair\n}\n");
        let got = spans(&code);
        assert!(got.contains(&(AnnotationKind::Anchor, "Key", -1)));
        assert!(got.contains(&(AnnotationKind::Builtin, "string", -1)));
        assert!(got.contains(&(AnnotationKind::ExportLink, "Pair", -1)));
    }

    #[test]
    fn package_and_export_links_merge() {
        let code = render(
            "package p\nimport \"example.com/other\"\nfunc F(r other.Reader) {}\n",
        );
        let got = spans(&code);
        // The adjacent package and export links collapse into one span
        // covering the whole selector.
        assert!(
            got.contains(&(AnnotationKind::ExportLink, "other.Reader", 0)),
            "got {:?}",
            got
        );
        assert_eq!(code.paths, vec!["example.com/other".to_string()]);
    }

    #[test]
    fn comments_are_annotated() {
        let code = render("package p\nconst (\n\t// A is documented.\n\tA = 1\n)\n");
        let got = spans(&code);
        assert!(got
            .iter()
            .any(|(k, t, _)| *k == AnnotationKind::Comment && t.contains("A is documented")));
        assert!(got.contains(&(AnnotationKind::Anchor, "A", -1)));
    }

    #[test]
    fn annotations_are_sorted_and_disjoint() {
        let code = render(
            "package p\nimport \"example.com/x\"\nvar Table = map[string]x.Thing{\n\t\"k\": x.Make(1),\n}\n",
        );
        let mut last_end = 0;
        for a in &code.annotations {
            assert!(a.pos >= last_end, "overlap at {:?}", a);
            assert!(a.end > a.pos);
            last_end = a.end;
        }
    }

    #[test]
    fn func_literal_bodies_stop_annotation() {
        let code = render("package p\nvar F = func(x int) int { return Undocumented(x) }\n");
        let got = spans(&code);
        assert!(!got
            .iter()
            .any(|(_, t, _)| *t == "Undocumented"), "got {:?}", got);
    }
}
