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

//! Assembles a [`Package`] document from fetched source files.

use super::ast::*;
use super::code::print_decl;
use super::fingerprint::method_sets;
use super::parse::{build_disabled, parse_file, ParsedFile};
use crate::error::Error;
use crate::fetch::Source;
use crate::path::is_valid_remote_path;
use crate::{is_readme_file, Example, Func, Package, Type, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

pub struct Builder {
    /// Per-line fragment template appended to a file's browse URL, with
    /// `{line}` standing for the 1-based line number.
    pub line_fmt: &'static str,
    pub pkg: Package,
}

/// First sentence of a doc comment, or empty when the candidate trips one of
/// the rejection heuristics (directives, copyright lines, editor modelines,
/// markup headings).
pub fn synopsis(doc: &str) -> String {
    let s = first_sentence(doc);
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("###") || trimmed.starts_with("-*-") || trimmed.starts_with("vim:") {
        return String::new();
    }
    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    const BLACKLIST: &[&str] = &["+build", "copyright", "author", "authors", "todo:"];
    if BLACKLIST.contains(&first_word.as_str()) {
        return String::new();
    }
    trimmed.to_string()
}

fn first_sentence(doc: &str) -> String {
    let flat: String = doc
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let bytes = flat.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'.' {
            continue;
        }
        let at_end = i + 1 == bytes.len();
        let followed_by_space = bytes.get(i + 1) == Some(&b' ');
        if !(at_end || followed_by_space) {
            continue;
        }
        // Skip single-letter abbreviations like "E. Nough".
        if i >= 1 && bytes[i - 1].is_ascii_uppercase() {
            if i == 1 || bytes[i - 2] == b' ' {
                continue;
            }
        }
        return flat[..=i].to_string();
    }
    flat
}

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"import\s+"([^"]+)""#).unwrap());
static BARE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(?:^|[\s('"\[])([a-z0-9\-]+(?:\.[a-z0-9\-]+)+(?:/[-A-Za-z0-9~+_.]+)+)"#)
        .unwrap()
});

/// Extracts import paths referenced from free-form text: documentation-site
/// URLs, `import "…"` quotes, and bare `host/user/repo` mentions.
pub fn add_references(references: &mut BTreeSet<String>, text: &str) {
    let mut blanked = text.to_string();

    for m in URL_RE.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(|c: char| ")>\"',.".contains(c));
        let url = url.split(['#', '?']).next().unwrap_or(url);
        if let Some(rest) = url.split_once("://").map(|(_, r)| r) {
            let segments: Vec<&str> = rest.split('/').collect();
            for i in 1..segments.len() {
                let candidate = segments[i..].join("/");
                if candidate.contains('/') && is_valid_remote_path(&candidate) {
                    references.insert(candidate);
                    break;
                }
            }
        }
        blanked.replace_range(m.range(), &" ".repeat(m.len()));
    }

    for caps in IMPORT_RE.captures_iter(text) {
        let path = &caps[1];
        if path.contains('/') && is_valid_remote_path(path) {
            references.insert(path.to_string());
        }
    }

    for caps in BARE_PATH_RE.captures_iter(&blanked) {
        let candidate = caps[1].trim_end_matches(|c: char| ".,'".contains(c));
        if candidate.contains('/') && is_valid_remote_path(candidate) {
            references.insert(candidate.to_string());
        }
    }
}

struct DocFile {
    parsed: ParsedFile,
    browse_url: String,
}

impl Builder {
    fn file_url(&self, file: &DocFile, line: usize) -> String {
        if file.browse_url.is_empty() {
            return String::new();
        }
        format!(
            "{}{}",
            file.browse_url,
            self.line_fmt.replace("{line}", &line.to_string())
        )
    }

    pub fn build(mut self, files: &[Source]) -> Result<Package, Error> {
        let mut readmes: Vec<&Source> = Vec::new();
        let mut parsed: Vec<DocFile> = Vec::new();

        for f in files {
            if is_readme_file(&f.name) {
                readmes.push(f);
                continue;
            }
            if !f.name.ends_with(".go") {
                continue;
            }
            let src = String::from_utf8_lossy(&f.data).into_owned();
            match parse_file(&f.name, &src) {
                Ok(pf) => {
                    if build_disabled(&pf.build_constraints) {
                        continue;
                    }
                    parsed.push(DocFile {
                        parsed: pf,
                        browse_url: f.browse_url.clone(),
                    });
                }
                Err(e) => self.pkg.errors.push(e),
            }
        }
        parsed.sort_by(|a, b| a.parsed.name.cmp(&b.parsed.name));

        // Vote on the package name over non-test files; a *_test package may
        // contribute only examples.
        let mut votes: HashMap<&str, usize> = HashMap::new();
        for f in parsed.iter().filter(|f| !f.parsed.is_test()) {
            *votes.entry(f.parsed.package_name.as_str()).or_default() += 1;
        }
        let mut name = String::new();
        let mut best = 0usize;
        for (n, count) in &votes {
            if *count > best || (*count == best && *n < name.as_str()) {
                name = n.to_string();
                best = *count;
            }
        }

        self.pkg.name = name.clone();
        self.pkg.is_command = name == "main";
        self.pkg.updated = chrono::Utc::now().timestamp();
        for f in files {
            if f.name.ends_with(".go") || is_readme_file(&f.name) {
                self.pkg.files.push(crate::File {
                    name: f.name.clone(),
                    browse_url: f.browse_url.clone(),
                });
            }
        }
        if name.is_empty() {
            return Ok(self.pkg);
        }

        let test_name = format!("{}_test", name);
        let sources: Vec<&DocFile> = parsed
            .iter()
            .filter(|f| !f.parsed.is_test() && f.parsed.package_name == name)
            .collect();
        let tests: Vec<&DocFile> = parsed
            .iter()
            .filter(|f| {
                f.parsed.is_test()
                    && (f.parsed.package_name == name || f.parsed.package_name == test_name)
            })
            .collect();

        let mut imports = BTreeSet::new();
        for f in &sources {
            for spec in &f.parsed.imports {
                imports.insert(spec.path.clone());
            }
        }
        self.pkg.imports = imports.into_iter().collect();

        let mut test_imports = BTreeSet::new();
        for f in &tests {
            for spec in &f.parsed.imports {
                test_imports.insert(spec.path.clone());
            }
        }
        self.pkg.test_imports = test_imports.into_iter().collect();

        let docs: Vec<&str> = sources
            .iter()
            .map(|f| f.parsed.package_doc.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        self.pkg.doc = docs.join("\n\n");
        self.pkg.synopsis = synopsis(&self.pkg.doc);

        let mut references = BTreeSet::new();
        add_references(&mut references, &self.pkg.doc);
        for r in &readmes {
            add_references(&mut references, &String::from_utf8_lossy(&r.data));
        }
        self.pkg.references = references.into_iter().collect();

        self.collect_declarations(&sources);
        self.collect_examples(&tests);

        let parsed_sources: Vec<&ParsedFile> = sources.iter().map(|f| &f.parsed).collect();
        self.pkg.method_sets = method_sets(&parsed_sources, &self.pkg.import_path);

        Ok(self.pkg)
    }

    fn collect_declarations(&mut self, sources: &[&DocFile]) {
        let mut types: Vec<Type> = Vec::new();
        let mut funcs: Vec<Func> = Vec::new();
        let mut methods: Vec<(String, Func)> = Vec::new();
        let mut consts: Vec<(Option<String>, Value)> = Vec::new();
        let mut vars: Vec<(Option<String>, Value)> = Vec::new();

        for file in sources {
            let aliases = file.parsed.import_aliases();
            for decl in &file.parsed.decls {
                match decl {
                    Decl::Gen(d) => {
                        if !d.specs.iter().any(|s| s.names.iter().any(|n| is_exported(&n.name))) {
                            continue;
                        }
                        let (start, end) = d.span;
                        let code =
                            print_decl(decl, &file.parsed.src[start..end], start, &aliases);
                        let value = Value {
                            decl: code,
                            url: self.file_url(file, file.parsed.line_of(start)),
                            doc: d.doc.clone(),
                        };
                        let owner = gen_decl_owner(d);
                        match d.kind {
                            ValueKind::Const => consts.push((owner, value)),
                            ValueKind::Var => vars.push((owner, value)),
                        }
                    }
                    Decl::Type(d) => {
                        for spec in &d.specs {
                            if !is_exported(&spec.name.name) {
                                continue;
                            }
                            let text =
                                format!("type {}", &file.parsed.src[spec.span.0..spec.span.1]);
                            let single = Decl::Type(TypeDecl {
                                specs: vec![spec.clone()],
                                doc: String::new(),
                                span: spec.span,
                            });
                            let code = print_decl(&single, &text, spec.span.0, &aliases);
                            let doc = {
                                let d2 = file.parsed.doc_comment_before(spec.span.0);
                                if d2.is_empty() { d.doc.clone() } else { d2 }
                            };
                            types.push(Type {
                                doc,
                                name: spec.name.name.clone(),
                                decl: code,
                                url: self.file_url(file, file.parsed.line_of(spec.span.0)),
                                ..Default::default()
                            });
                        }
                    }
                    Decl::Func(d) => {
                        if !is_exported(&d.name.name) {
                            continue;
                        }
                        // Render the declaration without its body.
                        let (start, _) = d.span;
                        let end = d.body.map(|(b, _)| b).unwrap_or(d.span.1);
                        let text = file.parsed.src[start..end].trim_end();
                        let code = print_decl(decl, text, start, &aliases);
                        let recv = d
                            .recv
                            .as_ref()
                            .map(|r| receiver_display(&r.typ))
                            .unwrap_or_default();
                        let func = Func {
                            decl: code,
                            url: self.file_url(file, file.parsed.line_of(start)),
                            doc: d.doc.clone(),
                            name: d.name.name.clone(),
                            recv: recv.clone(),
                            examples: Vec::new(),
                        };
                        match d.recv.as_ref().map(|r| receiver_base(&r.typ)) {
                            Some(base) => methods.push((base, func)),
                            None => funcs.push(func),
                        }
                    }
                }
            }
        }

        // Attach methods, factory functions and typed value groups to their
        // owning type; everything else stays at package level.
        types.sort_by(|a, b| a.name.cmp(&b.name));
        for (base, func) in methods {
            if let Some(t) = types.iter_mut().find(|t| t.name == base) {
                t.methods.push(func);
            }
        }
        let mut top_funcs = Vec::new();
        for func in funcs {
            let target = factory_target(&func).and_then(|base| {
                types.iter_mut().find(|t| t.name == base)
            });
            match target {
                Some(t) => t.funcs.push(func),
                None => top_funcs.push(func),
            }
        }
        for (owner, value) in consts {
            match owner.and_then(|o| types.iter_mut().find(|t| t.name == o)) {
                Some(t) => t.consts.push(value),
                None => self.pkg.consts.push(value),
            }
        }
        for (owner, value) in vars {
            match owner.and_then(|o| types.iter_mut().find(|t| t.name == o)) {
                Some(t) => t.vars.push(value),
                None => self.pkg.vars.push(value),
            }
        }

        top_funcs.sort_by(|a, b| a.name.cmp(&b.name));
        for t in types.iter_mut() {
            t.funcs.sort_by(|a, b| a.name.cmp(&b.name));
            t.methods.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.pkg.funcs = top_funcs;
        self.pkg.types = types;
    }

    fn collect_examples(&mut self, tests: &[&DocFile]) {
        for file in tests {
            let decl_count = file.parsed.decls.len();
            for decl in &file.parsed.decls {
                let d = match decl {
                    Decl::Func(d) if d.recv.is_none() => d,
                    _ => continue,
                };
                let rest = match d.name.name.strip_prefix("Example") {
                    Some(rest) => rest,
                    None => continue,
                };
                let body = match d.body {
                    Some(b) => b,
                    None => continue,
                };
                let (code, output) = example_body(&file.parsed, body);
                let play = if decl_count == 1 {
                    file.parsed.src.clone()
                } else {
                    String::new()
                };
                let (target, label) = split_example_name(rest);
                let example = Example {
                    name: label,
                    doc: d.doc.clone(),
                    code,
                    output,
                    play,
                };
                self.attach_example(&target, example);
            }
        }
    }

    fn attach_example(&mut self, target: &str, example: Example) {
        if target.is_empty() {
            self.pkg.examples.push(example);
            return;
        }
        let (type_name, method) = match target.split_once('.') {
            Some((t, m)) => (t, Some(m)),
            None => (target, None),
        };
        if let Some(m) = method {
            if let Some(t) = self.pkg.types.iter_mut().find(|t| t.name == type_name) {
                if let Some(f) = t.methods.iter_mut().find(|f| f.name == m) {
                    f.examples.push(example);
                    return;
                }
            }
            return;
        }
        if let Some(f) = self.pkg.funcs.iter_mut().find(|f| f.name == type_name) {
            f.examples.push(example);
            return;
        }
        // Factory functions are displayed under their type.
        for t in self.pkg.types.iter_mut() {
            if let Some(f) = t.funcs.iter_mut().find(|f| f.name == type_name) {
                f.examples.push(example);
                return;
            }
        }
        if let Some(t) = self.pkg.types.iter_mut().find(|t| t.name == type_name) {
            t.examples.push(example);
        }
    }
}

/// Maps the tail of an example function name to `(target, display label)`.
/// `FooBar` targets `FooBar`, `Foo_Bar` targets method `Bar` of `Foo`, and a
/// lower-case suffix is a display label, not a target segment.
fn split_example_name(rest: &str) -> (String, String) {
    if rest.is_empty() {
        return (String::new(), String::new());
    }
    match rest.split_once('_') {
        None => (rest.to_string(), rest.to_string()),
        Some((target, suffix)) => {
            if suffix.chars().next().map(|c| c.is_lowercase()) == Some(true) {
                (target.to_string(), format!("{} ({})", target, suffix))
            } else {
                (
                    format!("{}.{}", target, suffix),
                    format!("{}.{}", target, suffix),
                )
            }
        }
    }
}

fn example_body(file: &ParsedFile, body: (usize, usize)) -> (String, String) {
    let inner = &file.src[body.0 + 1..body.1.saturating_sub(1).max(body.0 + 1)];

    let mut output = String::new();
    let mut code_end = inner.len();
    for c in &file.comments {
        if c.pos <= body.0 || c.end >= body.1 {
            continue;
        }
        let text = super::parse::clean_comment_group(&[c.text.as_str()]);
        let lower = text.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("output:") {
            let start = text.len() - rest.len();
            output = text[start..].trim().to_string();
            code_end = c.pos - body.0 - 1;
            break;
        }
    }

    let code = dedent(inner[..code_end.min(inner.len())].trim_matches('\n'));
    (code, output)
}

fn dedent(s: &str) -> String {
    let indent = s
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(['\t', ' ']).len())
        .min()
        .unwrap_or(0);
    s.lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l })
        .collect::<Vec<_>>()
        .join("\n")
}

fn receiver_base(typ: &Expr) -> String {
    match typ {
        Expr::Ident(id) => id.name.clone(),
        Expr::Star { x } => receiver_base(x),
        Expr::Paren { x } => receiver_base(x),
        _ => String::new(),
    }
}

fn receiver_display(typ: &Expr) -> String {
    match typ {
        Expr::Ident(id) => id.name.clone(),
        Expr::Star { x } => format!("*{}", receiver_display(x)),
        Expr::Paren { x } => receiver_display(x),
        _ => String::new(),
    }
}

/// A function whose first result is `T` or `*T` for an exported local type
/// is displayed with that type.
fn factory_target(func: &Func) -> Option<String> {
    let text = &func.decl.text;
    let close = text.rfind(')')?;
    let rest = text[close + 1..].trim();
    let candidate = rest.trim_start_matches(['(', '*']);
    let name: String = candidate
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if !name.is_empty() && is_exported(&name) {
        Some(name)
    } else {
        None
    }
}

/// A const/var group whose every spec is explicitly typed with the same
/// exported local type belongs to that type's display section.
fn gen_decl_owner(d: &GenDecl) -> Option<String> {
    let mut owner: Option<String> = None;
    for spec in &d.specs {
        let name = match &spec.typ {
            Some(Expr::Ident(id)) if is_exported(&id.name) => id.name.clone(),
            _ => return None,
        };
        match &owner {
            Some(o) if *o != name => return None,
            _ => owner = Some(name),
        }
    }
    owner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_synopses_are_rejected() {
        for s in [
            "+build !release",
            "COPYRIGHT Jimmy Bob",
            "### Markdown heading",
            "-*- indent-tabs-mode: nil -*-",
            "vim:set ts=2 sw=2 et ai ft=go:",
        ] {
            assert_eq!(synopsis(s), "", "synopsis({:?})", s);
        }
    }

    #[test]
    fn good_synopses_pass() {
        assert_eq!(
            synopsis("Package json implements encoding of JSON. It conforms to RFC 4627."),
            "Package json implements encoding of JSON."
        );
        assert_eq!(synopsis("No trailing period here"), "No trailing period here");
        assert_eq!(
            synopsis("Package demo\nspans lines. More detail."),
            "Package demo spans lines."
        );
    }

    #[test]
    fn reference_extraction() {
        let readme = r#"
    $ get example.com/user/repo/pkg1
    [foo](http://docs.example/pkg/example.com/user/repo/pkg2)
    import "example.org/package3"
"#;
        let mut refs = BTreeSet::new();
        add_references(&mut refs, readme);
        let got: Vec<&str> = refs.iter().map(String::as_str).collect();
        assert_eq!(
            got,
            vec![
                "example.com/user/repo/pkg1",
                "example.com/user/repo/pkg2",
                "example.org/package3",
            ]
        );
    }

    #[test]
    fn example_name_splitting() {
        assert_eq!(split_example_name(""), ("".into(), "".into()));
        assert_eq!(split_example_name("Foo"), ("Foo".into(), "Foo".into()));
        assert_eq!(
            split_example_name("Foo_Bar"),
            ("Foo.Bar".into(), "Foo.Bar".into())
        );
        assert_eq!(
            split_example_name("Foo_suffix"),
            ("Foo".into(), "Foo (suffix)".into())
        );
    }

    #[test]
    fn dedent_strips_common_indent() {
        assert_eq!(dedent("\tx := 1\n\ty := 2"), "x := 1\ny := 2");
    }
}
