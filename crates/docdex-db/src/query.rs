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

//! Query parsing: whitespace tokens, `project:` and `import:` operators kept
//! verbatim, everything else lowercased. Each distinct term participates in
//! the intersection exactly once.

pub fn parse_query(q: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for token in q.split_whitespace() {
        let term = if token.starts_with("project:") || token.starts_with("import:") {
            token.to_string()
        } else {
            token.to_lowercase()
        };
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_and_operators() {
        assert_eq!(
            parse_query("JSON Decoder"),
            vec!["json".to_string(), "decoder".to_string()]
        );
        assert_eq!(
            parse_query("project:github.com/User/Repo json"),
            vec!["project:github.com/User/Repo".to_string(), "json".to_string()]
        );
        assert_eq!(parse_query("import:errors"), vec!["import:errors".to_string()]);
        assert_eq!(parse_query("all:"), vec!["all:".to_string()]);
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(parse_query("json json JSON"), vec!["json".to_string()]);
    }

    #[test]
    fn empty_query() {
        assert!(parse_query("   ").is_empty());
    }
}
