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

//! Search-term extraction and encoding.

use docdex::Package;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Terms longer than this are replaced by a salted digest. The salt is
/// process-local, so the inverted index must be rebuilt after a restart
/// (`docdex-reindex`); in exchange package authors cannot craft colliding
/// terms.
const MAX_RAW_TERM: usize = 16;

static TERM_SALT: Lazy<[u8; 16]> = Lazy::new(rand::random);

/// Encodes a raw term for use in an index set key: short terms lowercase
/// as-is, long terms as a keyed 128-bit digest.
pub fn encode_term(term: &str) -> String {
    let term = term.to_lowercase();
    if term.len() <= MAX_RAW_TERM {
        return term;
    }
    let mut hasher = Sha256::new();
    hasher.update(*TERM_SALT);
    hasher.update(term.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Effective project root for index grouping: standard-library packages
/// share the distinguished `go` root.
pub fn project_root_or_std(pkg: &Package) -> &str {
    if pkg.project_root.is_empty() {
        "go"
    } else {
        &pkg.project_root
    }
}

/// Raw search terms for a package. Directories contribute nothing; commands
/// need a synopsis and more than one sentence of documentation before they
/// are findable by name; library packages need at least one export.
pub fn document_terms(pkg: &Package) -> Vec<String> {
    let mut terms = BTreeSet::new();
    if pkg.name.is_empty() {
        return Vec::new();
    }

    terms.insert("all:".to_string());
    terms.insert(format!("project:{}", project_root_or_std(pkg)));

    if pkg.is_command {
        let extra_prose = pkg
            .doc
            .find('.')
            .map(|i| i + 1 < pkg.doc.len())
            .unwrap_or(false);
        if pkg.synopsis.is_empty() || !extra_prose {
            return terms.into_iter().collect();
        }
    } else if !pkg.has_exports() {
        return terms.into_iter().collect();
    }

    for import in &pkg.imports {
        terms.insert(format!("import:{}", import));
    }
    terms.insert(pkg.name.to_lowercase());
    if let Some(last) = pkg.import_path.rsplit('/').next() {
        terms.insert(last.to_lowercase());
    }

    terms.into_iter().collect()
}

/// Document rank, stored once at put time.
pub fn document_rank(pkg: &Package) -> i64 {
    if pkg.project_root.is_empty() {
        3
    } else if !pkg.errors.is_empty() {
        0
    } else if pkg.synopsis.is_empty() {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_pkg() -> Package {
        Package {
            import_path: "example.com/user/repo/widget".to_string(),
            project_root: "example.com/user/repo".to_string(),
            name: "widget".to_string(),
            synopsis: "Package widget assembles widgets.".to_string(),
            imports: vec!["errors".to_string()],
            consts: vec![docdex::Value::default()],
            ..Default::default()
        }
    }

    #[test]
    fn short_terms_stay_readable() {
        assert_eq!(encode_term("JSON"), "json");
        assert_eq!(encode_term("all:"), "all:");
    }

    #[test]
    fn long_terms_are_digested() {
        let t = encode_term("project:example.com/user/repo");
        assert_eq!(t.len(), 32);
        assert!(t.bytes().all(|b| b.is_ascii_hexdigit()));
        // Deterministic within the process.
        assert_eq!(t, encode_term("PROJECT:example.com/user/repo"));
    }

    #[test]
    fn terms_for_package() {
        let pkg = named_pkg();
        let terms = document_terms(&pkg);
        assert!(terms.contains(&"all:".to_string()));
        assert!(terms.contains(&"project:example.com/user/repo".to_string()));
        assert!(terms.contains(&"import:errors".to_string()));
        assert!(terms.contains(&"widget".to_string()));
    }

    #[test]
    fn directories_have_no_terms() {
        let pkg = Package::default();
        assert!(document_terms(&pkg).is_empty());
    }

    #[test]
    fn export_less_packages_keep_only_grouping_terms() {
        let mut pkg = named_pkg();
        pkg.consts.clear();
        let terms = document_terms(&pkg);
        assert_eq!(
            terms,
            vec![
                "all:".to_string(),
                "project:example.com/user/repo".to_string()
            ]
        );
    }

    #[test]
    fn commands_need_prose() {
        let mut pkg = named_pkg();
        pkg.name = "main".to_string();
        pkg.is_command = true;
        pkg.consts.clear();
        pkg.doc = "Command widget.".to_string();
        let terms = document_terms(&pkg);
        assert_eq!(terms.len(), 2, "one sentence is not enough: {:?}", terms);

        pkg.doc = "Command widget does things. It has options.".to_string();
        let terms = document_terms(&pkg);
        assert!(terms.contains(&"main".to_string()));
        assert!(terms.contains(&"widget".to_string()));
    }

    #[test]
    fn rank_levels() {
        let mut pkg = named_pkg();
        assert_eq!(document_rank(&pkg), 2);
        pkg.synopsis.clear();
        assert_eq!(document_rank(&pkg), 1);
        pkg.errors.push("boom".to_string());
        assert_eq!(document_rank(&pkg), 0);
        pkg.project_root.clear();
        assert_eq!(document_rank(&pkg), 3);
    }
}
