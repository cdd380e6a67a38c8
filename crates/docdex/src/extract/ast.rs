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

//! Syntax tree for top-level declarations. Function bodies are kept as raw
//! spans; only declaration structure is modelled.

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Recv,
    Send,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    /// None only for interface embeds folded into `typ`.
    pub typ: Expr,
    /// Raw tag literal, quotes included.
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    /// Whether the result list was written with parentheses.
    pub results_parenthesized: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(Ident),
    BasicLit {
        pos: usize,
        value: String,
    },
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    Star {
        x: Box<Expr>,
    },
    Unary {
        op: String,
        x: Box<Expr>,
    },
    Binary {
        x: Box<Expr>,
        op: String,
        y: Box<Expr>,
    },
    Paren {
        x: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        x: Box<Expr>,
        indices: Vec<Expr>,
    },
    Composite {
        typ: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Ellipsis {
        elt: Option<Box<Expr>>,
    },
    ArrayType {
        len: Option<Box<Expr>>,
        elt: Box<Expr>,
    },
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ChanType {
        dir: ChanDir,
        value: Box<Expr>,
    },
    FuncType(Box<FuncType>),
    StructType {
        fields: Vec<Field>,
    },
    InterfaceType {
        methods: Vec<Field>,
    },
    /// Function literal; the body is an opaque source span.
    FuncLit {
        typ: Box<FuncType>,
        body: (usize, usize),
    },
}

impl Expr {
    pub fn pos(&self) -> usize {
        match self {
            Expr::Ident(id) => id.pos,
            Expr::BasicLit { pos, .. } => *pos,
            Expr::Selector { x, .. }
            | Expr::Star { x }
            | Expr::Binary { x, .. }
            | Expr::Paren { x }
            | Expr::Unary { x, .. } => x.pos(),
            Expr::Call { func, .. } => func.pos(),
            Expr::Index { x, .. } => x.pos(),
            Expr::Composite { typ, elts } => typ
                .as_ref()
                .map(|t| t.pos())
                .or_else(|| elts.first().map(|e| e.pos()))
                .unwrap_or(0),
            Expr::KeyValue { key, .. } => key.pos(),
            Expr::Ellipsis { elt } => elt.as_ref().map(|e| e.pos()).unwrap_or(0),
            Expr::ArrayType { elt, .. } => elt.pos(),
            Expr::MapType { key, .. } => key.pos(),
            Expr::ChanType { value, .. } => value.pos(),
            Expr::FuncType(_) | Expr::StructType { .. } | Expr::InterfaceType { .. } => 0,
            Expr::FuncLit { body, .. } => body.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub typ: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct GenDecl {
    pub kind: ValueKind,
    pub specs: Vec<ValueSpec>,
    pub doc: String,
    pub span: (usize, usize),
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub typ: Expr,
    pub doc: String,
    pub span: (usize, usize),
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub specs: Vec<TypeSpec>,
    pub doc: String,
    pub span: (usize, usize),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub recv: Option<Field>,
    pub name: Ident,
    pub typ: FuncType,
    /// Source span of the body block, braces included.
    pub body: Option<(usize, usize)>,
    pub doc: String,
    pub span: (usize, usize),
}

#[derive(Debug, Clone)]
pub enum Decl {
    Gen(GenDecl),
    Type(TypeDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn span(&self) -> (usize, usize) {
        match self {
            Decl::Gen(d) => d.span,
            Decl::Type(d) => d.span,
            Decl::Func(d) => d.span,
        }
    }

    pub fn doc(&self) -> &str {
        match self {
            Decl::Gen(d) => &d.doc,
            Decl::Type(d) => &d.doc,
            Decl::Func(d) => &d.doc,
        }
    }
}

/// Reports whether a name is exported (starts with an upper-case letter).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()) == Some(true)
}
