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

//! Launchpad fetcher, tarball style: one compressed tar of the branch,
//! filtered in-stream to the package directory.

use super::{expand, MatchMap, Source};
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};
use flate2::read::GzDecoder;
use std::io::Read;

pub async fn get(
    client: &RemoteClient,
    m: &MatchMap,
    saved_etag: &str,
) -> Result<Package, Error> {
    let mut m = m.clone();

    // A path like launchpad.net/{project}/{series}/... may name either a
    // branch or a directory inside the project branch. Probe the branch
    // metadata to disambiguate.
    if !m.get("project").map(String::is_empty).unwrap_or(true)
        && !m.get("series").map(String::is_empty).unwrap_or(true)
    {
        let probe = expand(
            "https://code.launchpad.net/{project}{series}/.bzr/branch-format",
            &m,
            None,
        );
        if client.try_get(&probe).await.is_none() {
            // No branch at {project}{series}: the series segment is really a
            // directory inside the project branch.
            let dir = expand("{series}{dir}", &m, None);
            let project = m["project"].clone();
            m.insert("repo".to_string(), project);
            m.insert("dir".to_string(), dir);
        }
    }

    let (body, etag) = client
        .get_bytes_compare(
            &expand("https://bazaar.launchpad.net/+branch/{repo}/tarball", &m, None),
            saved_etag,
        )
        .await?;

    let mut archive = tar::Archive::new(GzDecoder::new(body.as_slice()));
    let dir_prefix = expand("+branch/{repo}{dir}/", &m, None);

    let mut in_tree = false;
    let mut files = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| Error::remote("bazaar.launchpad.net", format!("bad tarball: {}", e)))?;
    for entry in entries {
        let mut entry = entry
            .map_err(|e| Error::remote("bazaar.launchpad.net", format!("bad tarball: {}", e)))?;
        let path = match entry.path() {
            Ok(p) => p.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        if !path.starts_with(&dir_prefix) {
            continue;
        }
        in_tree = true;
        let rest = &path[dir_prefix.len()..];
        if rest.is_empty() || rest.contains('/') || !is_doc_file(rest) {
            continue;
        }
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::remote("bazaar.launchpad.net", format!("bad tarball: {}", e)))?;
        files.push(Source {
            name: rest.to_string(),
            browse_url: expand(
                "https://bazaar.launchpad.net/+branch/{repo}/view/head:{dir}/{0}",
                &m,
                Some(rest),
            ),
            raw_url: None,
            data,
        });
    }

    if !in_tree {
        return Err(Error::not_found("directory does not exist in branch"));
    }
    if !files.iter().any(|f| f.name.ends_with(".go")) {
        return Err(Error::not_found("directory tree contains no source files"));
    }

    Builder {
        line_fmt: "#L{line}",
        pkg: Package {
            import_path: m["importPath"].clone(),
            project_root: expand("launchpad.net/{repo}", &m, None),
            project_name: m["repo"].clone(),
            project_url: expand("https://launchpad.net/{repo}/", &m, None),
            browse_url: expand(
                "https://bazaar.launchpad.net/+branch/{repo}/view/head:{dir}/",
                &m,
                None,
            ),
            etag,
            vcs: "bzr".to_string(),
            ..Default::default()
        },
    }
    .build(&files)
}
