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

//! GitHub fetcher, API/list style: one metadata request for the head commit
//! (the ETag), one tree listing, then bounded-concurrency raw fetches.

use super::{expand, MatchMap, Source};
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};

fn with_credentials(client: &RemoteClient, url: String) -> String {
    match &client.github_credentials {
        Some((id, secret)) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}client_id={}&client_secret={}", url, sep, id, secret)
        }
        None => url,
    }
}

pub async fn get(
    client: &RemoteClient,
    m: &MatchMap,
    saved_etag: &str,
) -> Result<Package, Error> {
    let commits_url = with_credentials(
        client,
        expand(
            "https://api.github.com/repos/{owner}/{repo}/commits?per_page=1",
            m,
            None,
        ),
    );
    let body = client.get_bytes(&commits_url).await?;
    let commits: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::remote("github.com", format!("bad commits response: {}", e)))?;
    let sha = commits
        .get(0)
        .and_then(|c| c.get("sha"))
        .and_then(|s| s.as_str())
        .ok_or_else(|| Error::not_found("repository has no commits"))?
        .to_string();

    if sha == saved_etag {
        return Err(Error::NotModified);
    }

    let tree_url = with_credentials(
        client,
        expand(
            &format!(
                "https://api.github.com/repos/{{owner}}/{{repo}}/git/trees/{}?recursive=1",
                sha
            ),
            m,
            None,
        ),
    );
    let body = client.get_bytes(&tree_url).await?;
    let tree: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::remote("github.com", format!("bad tree response: {}", e)))?;
    let entries = tree
        .get("tree")
        .and_then(|t| t.as_array())
        .ok_or_else(|| Error::not_found("repository tree is empty"))?;

    // The dir capture keeps its leading slash; the tree API paths do not.
    let dir = m.get("dir").map(String::as_str).unwrap_or("");
    let prefix = dir.trim_start_matches('/');

    let mut files = Vec::new();
    for entry in entries {
        if entry.get("type").and_then(|t| t.as_str()) != Some("blob") {
            continue;
        }
        let path = match entry.get("path").and_then(|p| p.as_str()) {
            Some(p) => p,
            None => continue,
        };
        let rest = if prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                Some(r) => r,
                None => continue,
            }
        };
        if rest.contains('/') || !is_doc_file(rest) {
            continue;
        }
        files.push(Source {
            name: rest.to_string(),
            browse_url: expand(
                &format!("https://github.com/{{owner}}/{{repo}}/blob/{}/{}", sha, path),
                m,
                None,
            ),
            raw_url: Some(expand(
                &format!(
                    "https://raw.githubusercontent.com/{{owner}}/{{repo}}/{}/{}",
                    sha, path
                ),
                m,
                None,
            )),
            data: Vec::new(),
        });
    }

    if !files.iter().any(|f| f.name.ends_with(".go")) {
        return Err(Error::not_found("directory tree contains no source files"));
    }

    client.fetch_files(&mut files).await?;

    let browse_dir = if prefix.is_empty() {
        String::new()
    } else {
        format!("/tree/{}/{}", sha, prefix)
    };
    Builder {
        line_fmt: "#L{line}",
        pkg: Package {
            import_path: m["importPath"].clone(),
            project_root: expand("github.com/{owner}/{repo}", m, None),
            project_name: m["repo"].clone(),
            project_url: expand("https://github.com/{owner}/{repo}", m, None),
            browse_url: expand(
                &format!("https://github.com/{{owner}}/{{repo}}{}", browse_dir),
                m,
                None,
            ),
            etag: sha,
            vcs: "git".to_string(),
            ..Default::default()
        },
    }
    .build(&files)
}
