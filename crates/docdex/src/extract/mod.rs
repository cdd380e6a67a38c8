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

//! The documentation extractor: parses fetched source files and derives the
//! canonical package document with synopsis, annotated declarations,
//! examples and method fingerprints.

pub mod ast;
pub mod builder;
pub mod code;
pub mod fingerprint;
pub mod lex;
pub mod parse;

pub use builder::{add_references, synopsis, Builder};
pub use code::{comment_annotations, print_decl};
pub use fingerprint::{canonical_signature, method_sets};
pub use parse::{parse_file, ParsedFile};

#[cfg(test)]
mod tests {
    use super::builder::Builder;
    use crate::fetch::Source;
    use crate::Package;

    fn source(name: &str, text: &str) -> Source {
        Source {
            name: name.to_string(),
            browse_url: format!("https://example.com/browse/{}", name),
            raw_url: None,
            data: text.as_bytes().to_vec(),
        }
    }

    fn build(files: &[Source]) -> Package {
        Builder {
            line_fmt: "#L{line}",
            pkg: Package {
                import_path: "example.com/project/widget".to_string(),
                project_root: "example.com/project".to_string(),
                project_name: "project".to_string(),
                etag: "etag-1".to_string(),
                ..Default::default()
            },
        }
        .build(files)
        .expect("build")
    }

    #[test]
    fn builds_a_package_document() {
        let files = [
            source(
                "widget.go",
                r#"// Package widget assembles widgets. It is a demo.
package widget

import (
    "errors"
    "example.com/dep"
)

// ErrClosed reports use of a closed widget.
var ErrClosed = errors.New("widget: closed")

// A Widget does widget things.
type Widget struct {
    Name string
}

// New returns a ready Widget.
func New(name string) *Widget {
    return &Widget{Name: name}
}

// Run runs the widget against a dependency.
func (w *Widget) Run(d dep.Thing) error {
    return nil
}
"#,
            ),
            source(
                "widget_test.go",
                r#"package widget

func ExampleNew() {
    w := New("demo")
    _ = w
    // Output: ok
}
"#,
            ),
        ];
        let pkg = build(&files);

        assert_eq!(pkg.name, "widget");
        assert!(!pkg.is_command);
        assert_eq!(pkg.synopsis, "Package widget assembles widgets.");
        assert_eq!(
            pkg.imports,
            vec!["errors".to_string(), "example.com/dep".to_string()]
        );
        assert_eq!(pkg.vars.len(), 1);
        assert_eq!(pkg.types.len(), 1);
        assert_eq!(pkg.types[0].name, "Widget");
        // New returns *Widget, so it is displayed with the type.
        assert_eq!(pkg.types[0].funcs.len(), 1);
        assert_eq!(pkg.types[0].funcs[0].name, "New");
        assert_eq!(pkg.types[0].methods.len(), 1);
        assert_eq!(pkg.types[0].methods[0].name, "Run");
        assert_eq!(pkg.types[0].methods[0].recv, "*Widget");
        assert!(pkg.funcs.is_empty());

        let example = &pkg.types[0].funcs[0].examples[0];
        assert!(example.code.contains("New(\"demo\")"));
        assert_eq!(example.output, "ok");

        assert!(pkg.method_sets.contains_key("Widget"));
        assert!(pkg.errors.is_empty());
        assert!(pkg.has_exports());
        let urls: Vec<&str> = pkg.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(urls, vec!["widget.go", "widget_test.go"]);
    }

    #[test]
    fn command_detection_and_directory() {
        let files = [source(
            "main.go",
            "// Command tool does things.\npackage main\n\nfunc main() {}\n",
        )];
        let pkg = build(&files);
        assert!(pkg.is_command);
        assert_eq!(pkg.name, "main");
        assert!(!pkg.has_exports());
    }

    #[test]
    fn parse_failures_become_diagnostics() {
        let files = [
            source("good.go", "package p\n\nconst Answer = 42\n"),
            source("bad.go", "package p\n\nfunc {{{\n"),
        ];
        let pkg = build(&files);
        assert_eq!(pkg.name, "p");
        assert_eq!(pkg.consts.len(), 1);
        assert_eq!(pkg.errors.len(), 1);
    }

    #[test]
    fn disabled_files_are_skipped() {
        let files = [
            source("a.go", "package a\n\nconst A = 1\n"),
            source(
                "ignore.go",
                "// +build ignore\n\npackage b\n\nconst B = 2\n",
            ),
        ];
        let pkg = build(&files);
        assert_eq!(pkg.name, "a");
        assert_eq!(pkg.consts.len(), 1);
    }

    #[test]
    fn readme_contributes_references_only() {
        let files = [
            source("p.go", "package p\n\nconst A = 1\n"),
            source("README.md", "Install with `get example.com/user/repo`.\n"),
        ];
        let pkg = build(&files);
        assert_eq!(pkg.references, vec!["example.com/user/repo".to_string()]);
    }
}
