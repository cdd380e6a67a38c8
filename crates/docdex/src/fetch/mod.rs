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

//! Per-service source fetchers. Each fetcher receives the captures of its
//! service pattern plus the raw (unprefixed) saved ETag and produces the
//! package's source files and a fresh ETag, or not-modified / not-found.

use std::collections::HashMap;

pub mod bitbucket;
pub mod github;
pub mod google;
pub mod launchpad;
pub mod std_lib;
pub mod vcs;

/// One fetched (or to-be-fetched) source file.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub name: String,
    pub browse_url: String,
    /// When set, `data` is filled by a follow-up raw fetch.
    pub raw_url: Option<String>,
    pub data: Vec<u8>,
}

/// The capture map handed to a fetcher: named sub-matches of the service
/// pattern plus the full `importPath`.
pub type MatchMap = HashMap<String, String>;

/// Expands `{name}` placeholders from the match map; `{0}` expands to the
/// extra argument.
pub fn expand(template: &str, m: &MatchMap, extra: Option<&str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(i) = rest.find('{') {
        out.push_str(&rest[..i]);
        rest = &rest[i + 1..];
        match rest.find('}') {
            Some(j) => {
                let name = &rest[..j];
                if name == "0" {
                    out.push_str(extra.unwrap_or(""));
                } else {
                    out.push_str(m.get(name).map(String::as_str).unwrap_or(""));
                }
                rest = &rest[j + 1..];
            }
            None => {
                out.push('{');
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builds the match map from a regex match, named groups only.
pub fn capture_map(re: &regex::Regex, import_path: &str) -> Option<MatchMap> {
    let caps = re.captures(import_path)?;
    let mut m = MatchMap::new();
    m.insert("importPath".to_string(), import_path.to_string());
    for name in re.capture_names().flatten() {
        let value = caps
            .name(name)
            .map(|g| g.as_str().to_string())
            .unwrap_or_default();
        m.insert(name.to_string(), value);
    }
    Some(m)
}

/// Picks the revision to fetch: a `go1` tag when present, otherwise the
/// default branch.
pub fn best_tag(tags: &HashMap<String, String>, default_tag: &str) -> Option<(String, String)> {
    if let Some(commit) = tags.get("go1") {
        return Some(("go1".to_string(), commit.clone()));
    }
    tags.get(default_tag)
        .map(|commit| (default_tag.to_string(), commit.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_placeholders() {
        let mut m = MatchMap::new();
        m.insert("owner".into(), "alice".into());
        m.insert("repo".into(), "widget".into());
        assert_eq!(
            expand("https://github.com/{owner}/{repo}/blob/master/{0}", &m, Some("doc.go")),
            "https://github.com/alice/widget/blob/master/doc.go"
        );
        assert_eq!(expand("{missing}-x", &m, None), "-x");
    }

    #[test]
    fn best_tag_prefers_release() {
        let mut tags = HashMap::new();
        tags.insert("master".to_string(), "abc".to_string());
        assert_eq!(
            best_tag(&tags, "master"),
            Some(("master".to_string(), "abc".to_string()))
        );
        tags.insert("go1".to_string(), "def".to_string());
        assert_eq!(
            best_tag(&tags, "master"),
            Some(("go1".to_string(), "def".to_string()))
        );
        assert_eq!(best_tag(&HashMap::new(), "master"), None);
    }
}
