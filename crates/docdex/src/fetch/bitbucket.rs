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

//! Bitbucket fetcher. The ETag is `<scm>-<tip node>`, so a refresh can skip
//! the repository metadata request when the saved ETag already names the VCS.

use super::{expand, MatchMap, Source};
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};
use once_cell::sync::Lazy;
use regex::Regex;

static ETAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(hg|git)-").unwrap());

pub async fn get(
    client: &RemoteClient,
    m: &MatchMap,
    saved_etag: &str,
) -> Result<Package, Error> {
    let mut m = m.clone();

    match ETAG_RE.captures(saved_etag) {
        Some(caps) => {
            m.insert("vcs".to_string(), caps[1].to_string());
        }
        None => {
            let body = client
                .get_bytes(&expand(
                    "https://api.bitbucket.org/1.0/repositories/{owner}/{repo}",
                    &m,
                    None,
                ))
                .await?;
            let repo: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|e| Error::remote("bitbucket.org", format!("bad repository response: {}", e)))?;
            let scm = repo
                .get("scm")
                .and_then(|s| s.as_str())
                .ok_or_else(|| Error::not_found("could not determine repository VCS"))?;
            m.insert("vcs".to_string(), scm.to_string());
        }
    }

    let body = client
        .get_bytes(&expand(
            "https://api.bitbucket.org/1.0/repositories/{owner}/{repo}/changesets?limit=1",
            &m,
            None,
        ))
        .await?;
    let changesets: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::remote("bitbucket.org", format!("bad changesets response: {}", e)))?;
    let node = changesets
        .get("changesets")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("node"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| Error::not_found("repository has no changesets"))?
        .to_string();

    let etag = format!("{}-{}", m["vcs"], node);
    if etag == saved_etag {
        return Err(Error::NotModified);
    }
    m.insert("tag".to_string(), node);

    let body = client
        .get_bytes(&expand(
            "https://api.bitbucket.org/1.0/repositories/{owner}/{repo}/src/{tag}{dir}/",
            &m,
            None,
        ))
        .await?;
    let listing: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::remote("bitbucket.org", format!("bad src listing: {}", e)))?;
    let entries = listing
        .get("files")
        .and_then(|f| f.as_array())
        .ok_or_else(|| Error::not_found("directory does not exist in repository"))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry.get("path").and_then(|p| p.as_str()) {
            Some(p) => p,
            None => continue,
        };
        let name = path.rsplit('/').next().unwrap_or(path);
        if !is_doc_file(name) {
            continue;
        }
        files.push(Source {
            name: name.to_string(),
            browse_url: expand(
                "https://bitbucket.org/{owner}/{repo}/src/{tag}{dir}/{0}",
                &m,
                Some(name),
            ),
            raw_url: Some(expand(
                &format!("https://api.bitbucket.org/1.0/repositories/{{owner}}/{{repo}}/raw/{{tag}}/{}", path),
                &m,
                None,
            )),
            data: Vec::new(),
        });
    }

    if !files.iter().any(|f| f.name.ends_with(".go")) {
        return Err(Error::not_found("directory tree contains no source files"));
    }

    client.fetch_files(&mut files).await?;

    Builder {
        line_fmt: "#cl-{line}",
        pkg: Package {
            import_path: m["importPath"].clone(),
            project_root: expand("bitbucket.org/{owner}/{repo}", &m, None),
            project_name: m["repo"].clone(),
            project_url: expand("https://bitbucket.org/{owner}/{repo}/", &m, None),
            browse_url: expand("https://bitbucket.org/{owner}/{repo}/src/{tag}{dir}", &m, None),
            etag,
            vcs: m["vcs"].clone(),
            ..Default::default()
        },
    }
    .build(&files)
}
