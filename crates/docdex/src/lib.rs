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

//! Core of the docdex documentation indexing service.
//!
//! Given an import path shaped like `host/user/repo/subpath`, this crate
//! resolves the path to a source hosting service, fetches the package's
//! source files and extracts a structured [`Package`] document: synopsis,
//! imports, annotated declarations, examples and method fingerprints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod path;

pub use dispatch::resolve;
pub use error::Error;
pub use http::RemoteClient;

/// Version prefix carried on every externally visible ETag. Bumping it
/// invalidates all stored ETags and forces a full refetch on next crawl.
pub const PACKAGE_VERSION: &str = "1";

/// Annotation kinds attached to declaration text. Spans are half-open byte
/// offsets into [`Code::text`], non-overlapping and sorted by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    /// Link to an export in the package given by `paths[path_index]`, or in
    /// the local package when `path_index` is negative.
    ExportLink,
    /// Anchor with the name at the annotated span.
    Anchor,
    Comment,
    /// Link to the package given by `paths[path_index]`.
    PackageLink,
    /// Link to a predeclared entity.
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub pos: u32,
    pub end: u32,
    pub kind: AnnotationKind,
    pub path_index: i32,
}

/// A declaration rendered for display: its source text plus cross-reference
/// annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Code {
    pub text: String,
    pub annotations: Vec<Annotation>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub doc: String,
    pub code: String,
    pub output: String,
    /// Runnable source for the playground, when the example is
    /// self-contained; empty otherwise.
    pub play: String,
}

/// A grouped const or var declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Value {
    pub decl: Code,
    pub url: String,
    pub doc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Func {
    pub decl: Code,
    pub url: String,
    pub doc: String,
    pub name: String,
    /// Receiver type with any leading `*`, empty for package functions.
    pub recv: String,
    pub examples: Vec<Example>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Type {
    pub doc: String,
    pub name: String,
    pub decl: Code,
    pub url: String,
    pub consts: Vec<Value>,
    pub vars: Vec<Value>,
    pub funcs: Vec<Func>,
    pub methods: Vec<Func>,
    pub examples: Vec<Example>,
}

/// A 128-bit digest of a canonical method signature. Two tag bits are folded
/// into the low bits of the first byte: bit 0 is `exported`, bit 1 is
/// `embedded interface`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Fingerprint(pub [u8; 16]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Fingerprint {
    pub fn exported(&self) -> bool {
        self.0[0] & 1 != 0
    }

    pub fn embedded_interface(&self) -> bool {
        self.0[0] & 2 != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub fingerprint: Fingerprint,
    pub is_ptr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedField {
    pub name: String,
    pub path: String,
    pub is_ptr: bool,
    /// Digest of the canonical `"path".Name` reference. Embedded interfaces
    /// are not expanded to their member methods.
    pub fingerprint: Fingerprint,
}

/// Per-type method information used to detect interface satisfaction across
/// packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodSet {
    pub methods: Vec<Method>,
    pub embedded_fields: Vec<EmbeddedField>,
    pub errors: Vec<String>,
    pub is_interface: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    pub browse_url: String,
}

/// The extracted package document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    pub import_path: String,
    /// Prefix of the import path identifying the owning project. Empty for
    /// standard-library packages.
    pub project_root: String,
    pub project_name: String,
    pub project_url: String,
    pub browse_url: String,
    /// Versioned ETag, `"<PACKAGE_VERSION>-" + raw`.
    pub etag: String,
    pub vcs: String,
    /// Unix seconds of the last successful fetch.
    pub updated: i64,
    /// Package name; empty for directories with no buildable source.
    pub name: String,
    pub synopsis: String,
    pub doc: String,
    pub is_command: bool,
    pub imports: Vec<String>,
    pub test_imports: Vec<String>,
    /// Import paths referenced from prose documentation and README files.
    pub references: Vec<String>,
    pub files: Vec<File>,
    pub consts: Vec<Value>,
    pub vars: Vec<Value>,
    pub funcs: Vec<Func>,
    pub types: Vec<Type>,
    pub examples: Vec<Example>,
    pub method_sets: BTreeMap<String, MethodSet>,
    /// Extractor diagnostics. Never fatal.
    pub errors: Vec<String>,
    /// Set when the stored form dropped declarations to fit the blob cap.
    pub truncated: bool,
}

impl Package {
    /// True when the package has at least one exported declaration.
    pub fn has_exports(&self) -> bool {
        !self.consts.is_empty()
            || !self.vars.is_empty()
            || !self.funcs.is_empty()
            || !self.types.is_empty()
    }
}

/// Reports whether a fetched file takes part in documentation extraction.
/// Source files and README files qualify; hidden and generated-output style
/// names do not.
pub fn is_doc_file(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.starts_with('_') {
        return false;
    }
    name.ends_with(".go") || is_readme_file(name)
}

pub fn is_readme_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "readme" || lower.starts_with("readme.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_file_predicate() {
        assert!(is_doc_file("doc.go"));
        assert!(is_doc_file("doc_test.go"));
        assert!(is_doc_file("README.md"));
        assert!(is_doc_file("README"));
        assert!(!is_doc_file(".hidden.go"));
        assert!(!is_doc_file("_generated.go"));
        assert!(!is_doc_file("main.c"));
        assert!(!is_doc_file(""));
    }

    #[test]
    fn fingerprint_tag_bits() {
        let mut fp = Fingerprint::default();
        fp.0[0] = 0b11;
        assert!(fp.exported());
        assert!(fp.embedded_interface());
        assert_eq!(fp.to_string().len(), 32);
    }
}
