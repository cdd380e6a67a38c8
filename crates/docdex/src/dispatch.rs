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

//! The source-resolution dispatcher: routes an import path to a fetcher
//! through the ordered service table, with dynamic meta discovery as the
//! fallback for paths on hosts we do not know statically.

use crate::error::Error;
use crate::fetch::{self, capture_map};
use crate::http::RemoteClient;
use crate::path::{is_standard_package, is_valid_remote_path};
use crate::{Package, PACKAGE_VERSION};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceKind {
    Github,
    Google,
    Bitbucket,
    Launchpad,
    General,
}

struct Service {
    prefix: &'static str,
    pattern: Regex,
    kind: ServiceKind,
}

// Dispatch order matters: the catch-all general service must come last.
static SERVICES: Lazy<Vec<Service>> = Lazy::new(|| {
    vec![
    Service {
        prefix: "github.com/",
        pattern:
            Regex::new(
                r"^github\.com/(?P<owner>[a-z0-9A-Z_.\-]+)/(?P<repo>[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]*)?$",
            )
            .unwrap(),
        kind: ServiceKind::Github,
    },
    Service {
        prefix: "code.google.com/",
        pattern:
            Regex::new(
                r"^code\.google\.com/p/(?P<repo>[a-z0-9\-]+)(?:\.(?P<subrepo>[a-z0-9\-]+))?(?P<dir>/[a-z0-9A-Z_.\-/]+)?$",
            )
            .unwrap(),
        kind: ServiceKind::Google,
    },
    Service {
        prefix: "bitbucket.org/",
        pattern:
            Regex::new(
                r"^bitbucket\.org/(?P<owner>[a-z0-9A-Z_.\-]+)/(?P<repo>[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]*)?$",
            )
            .unwrap(),
        kind: ServiceKind::Bitbucket,
    },
    Service {
        prefix: "launchpad.net/",
        pattern:
            Regex::new(
                r"^launchpad\.net/(?P<repo>(?P<project>[a-z0-9A-Z_.\-]+)(?P<series>/[a-z0-9A-Z_.\-]+)?|~[a-z0-9A-Z_.\-]+/(?:\+junk|[a-z0-9A-Z_.\-]+)/[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]+)*$",
            )
            .unwrap(),
        kind: ServiceKind::Launchpad,
    },
    Service {
        prefix: "",
        pattern:
            Regex::new(
                r"^(?P<repo>(?:[a-z0-9.\-]+\.)+[a-z0-9.\-]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?)\.(?P<vcs>bzr|git|hg|svn)(?P<dir>/[A-Za-z0-9_.\-/]*)?$",
            )
            .unwrap(),
        kind: ServiceKind::General,
    },
    ]
});

/// Routes through the static service table. Returns `Ok(None)` when no
/// service matched; a prefix hit with a pattern miss is a hard not-found.
async fn get_static(
    client: &RemoteClient,
    import_path: &str,
    etag: &str,
) -> Result<Option<Package>, Error> {
    for s in SERVICES.iter() {
        if !import_path.starts_with(s.prefix) {
            continue;
        }
        let m = match capture_map(&s.pattern, import_path) {
            Some(m) => m,
            None => {
                if s.prefix.is_empty() {
                    continue;
                }
                return Err(Error::not_found(
                    "import path prefix matches known service, but pattern does not",
                ));
            }
        };
        let pkg = match s.kind {
            ServiceKind::Github => fetch::github::get(client, &m, etag).await?,
            ServiceKind::Google => fetch::google::get(client, &m, etag).await?,
            ServiceKind::Bitbucket => fetch::bitbucket::get(client, &m, etag).await?,
            ServiceKind::Launchpad => fetch::launchpad::get(client, &m, etag).await?,
            ServiceKind::General => {
                fetch::vcs::get(client, &m["vcs"], "", &m["repo"], &m["dir"], etag).await?
            }
        };
        return Ok(Some(pkg));
    }
    Ok(None)
}

#[derive(Debug)]
struct Meta {
    project_root: String,
    project_name: String,
    project_url: String,
    repo: String,
    vcs: String,
}

static META_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\s([^>]*)>").unwrap());
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(name|content)\s*=\s*"([^"]*)""#).unwrap());
static HEAD_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head|<body").unwrap());

/// Fetches `https://<path>?module-resolve=1` (falling back to plain HTTP) and
/// scans the document head for a `module-import` meta element whose root is a
/// prefix of the path.
async fn fetch_meta(client: &RemoteClient, import_path: &str) -> Result<Meta, Error> {
    let mut uri = import_path.to_string();
    if !uri.contains('/') {
        // Add slash for the root of a domain.
        uri.push('/');
    }
    let host = import_path.split('/').next().unwrap_or(import_path).to_string();

    let mut scheme = "https";
    let body = match client.try_get(&format!("https://{}?module-resolve=1", uri)).await {
        Some(b) => b,
        None => {
            scheme = "http";
            client
                .get_bytes(&format!("http://{}?module-resolve=1", uri))
                .await
                .map_err(|e| match e {
                    Error::NotFound(_) => Error::not_found("module-import meta not found"),
                    other => Error::remote(host.clone(), other),
                })?
        }
    };

    let text = String::from_utf8_lossy(&body);
    let head = match HEAD_END_RE.find(&text) {
        Some(m) => &text[..m.start()],
        None => &text,
    };

    let mut found: Option<Meta> = None;
    for caps in META_RE.captures_iter(head) {
        let mut name = None;
        let mut content = None;
        for attr in ATTR_RE.captures_iter(&caps[1]) {
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = Some(attr[2].to_string()),
                "content" => content = Some(attr[2].to_string()),
                _ => {}
            }
        }
        if name.as_deref() != Some("module-import") {
            continue;
        }
        let content = content.unwrap_or_default();
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() != 3 {
            continue;
        }
        let (root, vcs, repo) = (fields[0], fields[1], fields[2]);
        if !(import_path == root
            || (import_path.starts_with(root)
                && import_path.as_bytes().get(root.len()) == Some(&b'/')))
        {
            continue;
        }
        if found.is_some() {
            return Err(Error::not_found(format!(
                "more than one module-import meta found at {}://{}",
                scheme, uri
            )));
        }
        found = Some(Meta {
            project_root: root.to_string(),
            project_name: root.rsplit('/').next().unwrap_or(root).to_string(),
            project_url: format!("{}://{}", scheme, root),
            repo: repo.to_string(),
            vcs: vcs.to_string(),
        });
    }

    found.ok_or_else(|| Error::not_found("module-import meta not found"))
}

/// Resolves a path on a host with no static service entry by discovering the
/// repository through the page's meta element.
async fn get_dynamic(
    client: &RemoteClient,
    import_path: &str,
    etag: &str,
) -> Result<Package, Error> {
    let meta = fetch_meta(client, import_path).await?;

    if meta.project_root != import_path {
        // Validate the claimed root by asking the root itself.
        let root_meta = fetch_meta(client, &meta.project_root).await?;
        if root_meta.project_root != meta.project_root {
            return Err(Error::not_found("project root mismatch"));
        }
    }

    let (scheme, repo) = match meta.repo.split_once("://") {
        Some((s, r)) => (s, r),
        None => return Err(Error::not_found("bad repo URL in module-import meta")),
    };
    let dir = &import_path[meta.project_root.len()..];

    let combined = format!("{}{}", repo, dir);
    let mut pkg = match get_static(client, &combined, etag).await? {
        Some(pkg) => pkg,
        None => fetch::vcs::get(client, &meta.vcs, scheme, repo, dir, etag).await?,
    };

    pkg.import_path = import_path.to_string();
    pkg.project_root = meta.project_root;
    pkg.project_name = meta.project_name;
    pkg.project_url = meta.project_url;
    Ok(pkg)
}

/// Resolves an import path to a freshly extracted [`Package`].
///
/// The saved ETag must carry the current [`PACKAGE_VERSION`] prefix; any
/// other prefix is treated as no prior state. The returned package's ETag is
/// prefixed the same way.
pub async fn resolve(
    client: &RemoteClient,
    import_path: &str,
    saved_etag: &str,
) -> Result<Package, Error> {
    let version_prefix = format!("{}-", PACKAGE_VERSION);
    let etag = saved_etag.strip_prefix(&version_prefix).unwrap_or("");

    let mut pkg = if is_standard_package(import_path) {
        fetch::std_lib::get(client, import_path, etag).await?
    } else if is_valid_remote_path(import_path) {
        match get_static(client, import_path, etag).await? {
            Some(pkg) => pkg,
            None => get_dynamic(client, import_path, etag).await?,
        }
    } else {
        return Err(Error::not_found("import path not valid"));
    };

    pkg.etag = format!("{}{}", version_prefix, pkg.etag);
    Ok(pkg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_patterns() {
        let cases = [
            ("github.com/user/repo", Some(ServiceKind::Github)),
            ("github.com/user/repo/sub/dir", Some(ServiceKind::Github)),
            ("bitbucket.org/user/repo", Some(ServiceKind::Bitbucket)),
            ("code.google.com/p/project", Some(ServiceKind::Google)),
            ("code.google.com/p/project/sub", Some(ServiceKind::Google)),
            ("launchpad.net/project", Some(ServiceKind::Launchpad)),
            ("launchpad.net/~user/project/branch", Some(ServiceKind::Launchpad)),
            ("example.org/repo.git/dir", Some(ServiceKind::General)),
            ("example.org/repo.hg", Some(ServiceKind::General)),
            ("example.org/plain/path", None),
        ];
        for (path, want) in cases {
            let got = SERVICES
                .iter()
                .find(|s| path.starts_with(s.prefix) && s.pattern.is_match(path))
                .map(|s| s.kind);
            assert_eq!(got, want, "path: {}", path);
        }
    }

    #[test]
    fn github_captures() {
        let m = capture_map(&SERVICES[0].pattern, "github.com/user/repo/a/b").unwrap();
        assert_eq!(m["owner"], "user");
        assert_eq!(m["repo"], "repo");
        assert_eq!(m["dir"], "/a/b");
        assert_eq!(m["importPath"], "github.com/user/repo/a/b");

        let m = capture_map(&SERVICES[0].pattern, "github.com/user/repo").unwrap();
        assert_eq!(m["dir"], "");
    }

    #[test]
    fn general_captures() {
        let re = &SERVICES[SERVICES.len() - 1].pattern;
        let m = capture_map(re, "example.org/x/repo.git/sub").unwrap();
        assert_eq!(m["repo"], "example.org/x/repo");
        assert_eq!(m["vcs"], "git");
        assert_eq!(m["dir"], "/sub");
    }
}
