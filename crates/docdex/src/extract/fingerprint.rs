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

//! Method fingerprints: canonical signature strings hashed to a stable
//! 128-bit digest, used to detect interface satisfaction across packages.
//!
//! Known limitations, kept for hash stability:
//! - Embedded interfaces are not expanded to their member methods.
//! - Inline interface methods are not sorted to a canonical order.
//! - Array size expressions are not evaluated.
//! - Redundant parentheses are preserved as written.

use super::ast::*;
use super::code::is_predeclared_type;
use super::parse::ParsedFile;
use crate::{EmbeddedField, Fingerprint, Method, MethodSet};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

fn digest(bytes: &[u8], exported: bool, embedded_interface: bool) -> Fingerprint {
    let hash = Sha256::digest(bytes);
    let mut fp = [0u8; 16];
    fp.copy_from_slice(&hash[..16]);
    fp[0] = (fp[0] & !3) | u8::from(exported) | (u8::from(embedded_interface) << 1);
    Fingerprint(fp)
}

/// Writes the canonical byte form of signatures: local identifiers become
/// `"<import path>".Name`, selectors are rewritten through the file's import
/// aliases, predeclared type names stay bare and parameter names are dropped.
struct SigWriter<'a> {
    quoted_path: &'a str,
    aliases: &'a HashMap<String, String>,
    buf: String,
}

type SigResult = Result<(), String>;

impl<'a> SigWriter<'a> {
    fn new(quoted_path: &'a str, aliases: &'a HashMap<String, String>) -> Self {
        SigWriter {
            quoted_path,
            aliases,
            buf: String::new(),
        }
    }

    fn write_func(&mut self, t: &FuncType) -> SigResult {
        self.write_params(&t.params, true)?;
        let result_count: usize = t
            .results
            .iter()
            .map(|f| f.names.len().max(1))
            .sum();
        self.write_params(&t.results, result_count > 1)
    }

    fn write_params(&mut self, list: &[Field], paren: bool) -> SigResult {
        if paren {
            self.buf.push('(');
        }
        let mut sep = false;
        for field in list {
            let m = field.names.len().max(1);
            for _ in 0..m {
                if sep {
                    self.buf.push(',');
                } else {
                    sep = true;
                }
                self.write_node(&field.typ)?;
            }
        }
        if paren {
            self.buf.push(')');
        }
        Ok(())
    }

    fn write_struct(&mut self, fields: &[Field]) -> SigResult {
        self.buf.push_str("struct{");
        let mut sep = false;
        for field in fields {
            let names: Vec<Option<&Ident>> = if field.names.is_empty() {
                vec![None]
            } else {
                field.names.iter().map(Some).collect()
            };
            for name in names {
                if sep {
                    self.buf.push(';');
                } else {
                    sep = true;
                }
                if let Some(name) = name {
                    self.buf.push_str(&name.name);
                    self.buf.push(' ');
                }
                self.write_node(&field.typ)?;
                if let Some(tag) = &field.tag {
                    self.buf.push(' ');
                    self.buf.push_str(tag);
                }
            }
        }
        self.buf.push('}');
        Ok(())
    }

    fn write_interface(&mut self, methods: &[Field]) -> SigResult {
        self.buf.push_str("interface{");
        let mut sep = false;
        for field in methods {
            if sep {
                self.buf.push(';');
            } else {
                sep = true;
            }
            match (&field.names[..], &field.typ) {
                ([], Expr::Ident(_)) | ([], Expr::Selector { .. }) => {
                    self.write_node(&field.typ)?
                }
                ([name], Expr::FuncType(t)) => {
                    self.buf.push_str(&name.name);
                    self.write_func(t)?;
                }
                _ => return Err("unexpected interface member".to_string()),
            }
        }
        self.buf.push('}');
        Ok(())
    }

    fn write_node(&mut self, e: &Expr) -> SigResult {
        match e {
            Expr::Ellipsis { elt } => {
                self.buf.push_str("...");
                match elt {
                    Some(elt) => self.write_node(elt),
                    None => Err("ellipsis without element type".to_string()),
                }
            }
            Expr::MapType { key, value } => {
                self.buf.push_str("map[");
                self.write_node(key)?;
                self.buf.push(']');
                self.write_node(value)
            }
            Expr::ArrayType { len, elt } => {
                self.buf.push('[');
                if let Some(len) = len {
                    self.write_node(len)?;
                }
                self.buf.push(']');
                self.write_node(elt)
            }
            Expr::ChanType { dir, value } => {
                match dir {
                    ChanDir::Recv => self.buf.push_str("<-chan"),
                    ChanDir::Send => self.buf.push_str("chan<-"),
                    ChanDir::Both => self.buf.push_str("chan"),
                }
                self.buf.push(' ');
                self.write_node(value)
            }
            Expr::Paren { x } => {
                self.buf.push('(');
                self.write_node(x)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::Binary { x, op, y } => {
                self.write_node(x)?;
                self.buf.push_str(op);
                self.write_node(y)
            }
            Expr::Unary { op, x } => {
                self.buf.push_str(op);
                self.write_node(x)
            }
            Expr::BasicLit { value, .. } => {
                self.buf.push_str(value);
                Ok(())
            }
            Expr::Star { x } => {
                self.buf.push('*');
                self.write_node(x)
            }
            Expr::FuncType(t) => {
                self.buf.push_str("func");
                self.write_func(t)
            }
            Expr::InterfaceType { methods } => self.write_interface(methods),
            Expr::StructType { fields } => self.write_struct(fields),
            Expr::Selector { x, sel } => {
                let pkg = match x.as_ref() {
                    Expr::Ident(id) => id,
                    _ => return Err("unexpected selector base".to_string()),
                };
                let path = self
                    .aliases
                    .get(&pkg.name)
                    .ok_or_else(|| format!("{} not resolved", pkg.name))?;
                self.buf.push('"');
                self.buf.push_str(path);
                self.buf.push_str("\".");
                self.buf.push_str(&sel.name);
                Ok(())
            }
            Expr::Ident(id) => {
                if !is_predeclared_type(&id.name) {
                    self.buf.push_str(self.quoted_path);
                    self.buf.push('.');
                }
                self.buf.push_str(&id.name);
                Ok(())
            }
            other => Err(format!("unexpected node in signature: {:?}", other)),
        }
    }
}

/// Canonical signature string of a function type, exposed for testing and
/// for embedding in diagnostics.
pub fn canonical_signature(
    typ: &FuncType,
    import_path: &str,
    aliases: &HashMap<String, String>,
) -> Result<String, String> {
    let quoted = format!("\"{}\"", import_path);
    let mut w = SigWriter::new(&quoted, aliases);
    w.write_func(typ)?;
    Ok(w.buf)
}

#[derive(Clone)]
struct FuncDeclRef {
    name: String,
    typ: FuncType,
    is_ptr: bool,
    file: usize,
}

struct Fingerprinter<'a> {
    path: &'a str,
    quoted_path: String,
    aliases: Vec<HashMap<String, String>>,
    func_decls: HashMap<String, Vec<FuncDeclRef>>,
    type_specs: HashMap<String, (usize, TypeSpec)>,
    visited: HashMap<String, bool>,
    include: HashMap<String, Vec<Fingerprint>>,
    method_sets: BTreeMap<String, MethodSet>,
    exported_interface_mode: bool,
}

impl<'a> Fingerprinter<'a> {
    fn method(&self, fd: &FuncDeclRef) -> Result<Method, String> {
        let aliases = &self.aliases[fd.file];
        let mut w = SigWriter::new(&self.quoted_path, aliases);
        w.write_func(&fd.typ)?;
        Ok(Method {
            name: fd.name.clone(),
            fingerprint: digest(w.buf.as_bytes(), is_exported(&fd.name), false),
            is_ptr: fd.is_ptr,
        })
    }

    fn embedded(&self, name: &str, path: &str, is_ptr: bool) -> EmbeddedField {
        let canonical = format!("\"{}\".{}", path, name);
        EmbeddedField {
            name: name.to_string(),
            path: path.to_string(),
            is_ptr,
            fingerprint: digest(canonical.as_bytes(), is_exported(name), true),
        }
    }

    fn visit_exported_types(&mut self) {
        let mut names: Vec<String> = self.type_specs.keys().cloned().collect();
        names.sort();
        for name in names {
            if !(is_exported(&name) || self.path == "builtin") {
                continue;
            }
            let is_interface = matches!(
                self.type_specs[&name].1.typ,
                Expr::InterfaceType { .. }
            );
            if is_interface == self.exported_interface_mode {
                self.visit_type(&name);
            }
        }
    }

    fn visit_type(&mut self, name: &str) -> bool {
        if self.visited.contains_key(name) {
            return self.method_sets.contains_key(name);
        }
        self.visited.insert(name.to_string(), true);

        let (file_idx, spec) = match self.type_specs.get(name) {
            Some((i, s)) => (*i, s.clone()),
            None => return false,
        };

        let mut errors: Vec<String> = Vec::new();
        let mut embedded_fields: Vec<EmbeddedField> = Vec::new();
        let mut is_interface = false;

        let (fields, mut func_decls): (Vec<Field>, Vec<FuncDeclRef>) = match &spec.typ {
            Expr::StructType { fields } => (
                fields.clone(),
                self.func_decls.get(name).cloned().unwrap_or_default(),
            ),
            Expr::InterfaceType { methods } => {
                is_interface = true;
                (methods.clone(), Vec::new())
            }
            _ => (
                Vec::new(),
                self.func_decls.get(name).cloned().unwrap_or_default(),
            ),
        };

        for field in &fields {
            match field.names.len() {
                1 => {
                    if is_interface {
                        if let Expr::FuncType(t) = &field.typ {
                            func_decls.push(FuncDeclRef {
                                name: field.names[0].name.clone(),
                                typ: (**t).clone(),
                                is_ptr: false,
                                file: file_idx,
                            });
                        }
                    }
                }
                0 => {
                    // Embedded field or interface.
                    let mut is_ptr = false;
                    let mut typ = &field.typ;
                    if !is_interface {
                        if let Expr::Star { x } = typ {
                            is_ptr = true;
                            typ = x;
                        }
                    }
                    match typ {
                        Expr::Selector { x, sel } => {
                            let pkg = match x.as_ref() {
                                Expr::Ident(id) => Some(&id.name),
                                _ => None,
                            };
                            match pkg.and_then(|p| self.aliases[file_idx].get(p)) {
                                Some(path) => {
                                    let path = path.clone();
                                    embedded_fields.push(self.embedded(&sel.name, &path, is_ptr));
                                }
                                None => errors.push(format!(
                                    "embedded field {} not resolved",
                                    sel.name
                                )),
                            }
                        }
                        Expr::Ident(id) => {
                            if self.type_specs.contains_key(&id.name) {
                                if self.visit_type(&id.name) {
                                    let path = self.path.to_string();
                                    embedded_fields.push(self.embedded(&id.name, &path, is_ptr));
                                }
                                // A local embed with no interesting methods is
                                // dropped entirely.
                            } else {
                                let path = if id.name == "error" {
                                    "builtin".to_string()
                                } else {
                                    self.path.to_string()
                                };
                                embedded_fields.push(self.embedded(&id.name, &path, is_ptr));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let mut methods: Vec<Method> = Vec::new();
        for fd in &func_decls {
            let included = self.include.contains_key(&fd.name);
            if !(is_exported(&fd.name) || self.exported_interface_mode || included) {
                continue;
            }
            let method = match self.method(fd) {
                Ok(m) => m,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            if is_exported(&fd.name) {
                methods.push(method);
            } else if self.exported_interface_mode {
                self.include
                    .entry(fd.name.clone())
                    .or_default()
                    .push(method.fingerprint);
                methods.push(method);
            } else if self
                .include
                .get(&fd.name)
                .map(|fps| fps.contains(&method.fingerprint))
                .unwrap_or(false)
            {
                methods.push(method);
            }
        }

        if methods.is_empty() && embedded_fields.is_empty() && errors.is_empty() {
            return false;
        }

        methods.sort_by(|a, b| a.name.cmp(&b.name));
        embedded_fields.sort_by(|a, b| a.name.cmp(&b.name));
        self.method_sets.insert(
            name.to_string(),
            MethodSet {
                methods,
                embedded_fields,
                errors,
                is_interface,
            },
        );
        true
    }
}

/// Computes per-type method sets for the package formed by `files`. A type
/// with no methods, no embedded fields and no diagnostics contributes
/// nothing.
pub fn method_sets(files: &[&ParsedFile], import_path: &str) -> BTreeMap<String, MethodSet> {
    let aliases: Vec<HashMap<String, String>> =
        files.iter().map(|f| f.import_aliases()).collect();

    let mut func_decls: HashMap<String, Vec<FuncDeclRef>> = HashMap::new();
    let mut type_specs: HashMap<String, (usize, TypeSpec)> = HashMap::new();
    for (file_idx, file) in files.iter().enumerate() {
        for decl in &file.decls {
            match decl {
                Decl::Func(d) => {
                    let recv = match &d.recv {
                        Some(r) => r,
                        None => continue,
                    };
                    let (recv_name, is_ptr) = match &recv.typ {
                        Expr::Ident(id) => (id.name.clone(), false),
                        Expr::Star { x } => match x.as_ref() {
                            Expr::Ident(id) => (id.name.clone(), true),
                            _ => continue,
                        },
                        _ => continue,
                    };
                    func_decls.entry(recv_name).or_default().push(FuncDeclRef {
                        name: d.name.name.clone(),
                        typ: d.typ.clone(),
                        is_ptr,
                        file: file_idx,
                    });
                }
                Decl::Type(d) => {
                    for spec in &d.specs {
                        type_specs
                            .entry(spec.name.name.clone())
                            .or_insert((file_idx, spec.clone()));
                    }
                }
                Decl::Gen(_) => {}
            }
        }
    }

    let mut p = Fingerprinter {
        path: import_path,
        quoted_path: format!("\"{}\"", import_path),
        aliases,
        func_decls,
        type_specs,
        visited: HashMap::new(),
        include: HashMap::new(),
        method_sets: BTreeMap::new(),
        exported_interface_mode: false,
    };
    // Interfaces go first so that unexported methods they require are
    // remembered and matched on implementing types in the second pass.
    p.exported_interface_mode = true;
    p.visit_exported_types();
    p.exported_interface_mode = false;
    p.visit_exported_types();
    p.method_sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse::parse_file;

    const METHOD_PREFIX: &str = "\npackage foo\nimport (\n    \"io\"\n    \"code.google.com/p/pkg\"\n)\nfunc Example";

    fn canon(sig_src: &str) -> String {
        let src = format!("{}{}", METHOD_PREFIX, sig_src);
        let f = parse_file("file.go", &src).expect("parse");
        let decl = match f.decls.last().unwrap() {
            Decl::Func(d) => d.clone(),
            other => panic!("unexpected decl {:?}", other),
        };
        let aliases = f.import_aliases();
        canonical_signature(&decl.typ, "github.com/owner/repo", &aliases).expect("canonical")
    }

    #[test]
    fn canonical_method_signatures() {
        let cases = [
            ("(args ...interface{}) error", "(...interface{})error"),
            (
                "(a []byte, b [3]int, c map[string]interface{})",
                "([]byte,[3]int,map[string]interface{})",
            ),
            (
                "(a [2+pkg.Const]byte)",
                "([2+\"code.google.com/p/pkg\".Const]byte)",
            ),
            (
                "(c *Config) (d *Config, err error)",
                "(*\"github.com/owner/repo\".Config)(*\"github.com/owner/repo\".Config,error)",
            ),
            (
                "(a chan int, b <-chan int, c chan<- int)",
                "(chan int,<-chan int,chan<- int)",
            ),
            (
                "(a interface {\n    io.Reader \n}, b interface {\n    Hello() string \n})",
                "(interface{\"io\".Reader},interface{Hello()string})",
            ),
            (
                "(a struct {\n    pkg.Config\n    Section\n    a int\n    b int \"tag\"\n})",
                "(struct{\"code.google.com/p/pkg\".Config;\"github.com/owner/repo\".Section;a int;b int \"tag\"})",
            ),
            (
                "(a struct {\n    *Section\n})",
                "(struct{*\"github.com/owner/repo\".Section})",
            ),
            (
                "(functions ...func(A)int) func(B)(int)",
                "(...func(\"github.com/owner/repo\".A)int)func(\"github.com/owner/repo\".B)int",
            ),
            ("() string", "()string"),
        ];
        for (src, want) in cases {
            assert_eq!(canon(src), want, "signature: {}", src);
        }
    }

    #[test]
    fn canonicalization_is_deterministic() {
        let a = canon("(c *Config) (d *Config, err error)");
        let b = canon("(x *Config) (y *Config, z error)");
        assert_eq!(a, b, "alpha renaming must not change the canonical form");
    }

    #[test]
    fn method_sets_for_struct_and_interface() {
        let src = r#"package foo

type Greeter interface {
    Greet() string
}

type Impl struct{}

func (i *Impl) Greet() string { return "" }

func (i *Impl) helper() {}

type Boring struct{}
"#;
        let f = parse_file("file.go", src).unwrap();
        let sets = method_sets(&[&f], "example.com/foo");

        let greeter = sets.get("Greeter").expect("interface set");
        assert!(greeter.is_interface);
        assert_eq!(greeter.methods.len(), 1);
        assert_eq!(greeter.methods[0].name, "Greet");
        assert!(greeter.methods[0].fingerprint.exported());

        let imp = sets.get("Impl").expect("struct set");
        assert!(!imp.is_interface);
        assert_eq!(imp.methods.len(), 1);
        assert!(imp.methods[0].is_ptr);
        // Identical declarations hash identically across types.
        assert_eq!(
            imp.methods[0].fingerprint.0[2..],
            greeter.methods[0].fingerprint.0[2..]
        );
        assert_eq!(imp.methods[0].fingerprint, greeter.methods[0].fingerprint);

        // No methods, no embeds, no diagnostics: no method set at all.
        assert!(!sets.contains_key("Boring"));
    }

    #[test]
    fn unexported_interface_methods_included_on_implementors() {
        let src = r#"package foo

type Sealed interface {
    Public()
    internal()
}

type A struct{}

func (A) Public() {}
func (A) internal() {}

type B struct{}

func (B) internal(extra int) {}
"#;
        let f = parse_file("file.go", src).unwrap();
        let sets = method_sets(&[&f], "example.com/foo");

        let a = sets.get("A").expect("A set");
        let names: Vec<&str> = a.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Public", "internal"]);

        // B's internal has a different signature and is not part of any
        // exported interface contract.
        assert!(!sets.contains_key("B"));
    }

    #[test]
    fn embedded_interfaces_are_not_expanded() {
        let src = r#"package foo

import "io"

type Wrapper interface {
    io.Reader
    Extra()
}
"#;
        let f = parse_file("file.go", src).unwrap();
        let sets = method_sets(&[&f], "example.com/foo");
        let w = sets.get("Wrapper").unwrap();
        assert_eq!(w.methods.len(), 1);
        assert_eq!(w.embedded_fields.len(), 1);
        assert_eq!(w.embedded_fields[0].name, "Reader");
        assert_eq!(w.embedded_fields[0].path, "io");
        assert!(w.embedded_fields[0].fingerprint.embedded_interface());
    }

    #[test]
    fn error_embed_resolves_to_builtin() {
        let src = "package foo\n\ntype Failing interface {\n\terror\n\tCode() int\n}\n";
        let f = parse_file("file.go", src).unwrap();
        let sets = method_sets(&[&f], "example.com/foo");
        let set = sets.get("Failing").unwrap();
        assert_eq!(set.embedded_fields[0].path, "builtin");
    }
}
