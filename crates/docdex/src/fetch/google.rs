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

//! Project-host fetcher for code.google.com repositories. The VCS is scraped
//! from the checkout page once and then remembered in the ETag prefix.

use super::{expand, MatchMap, Source};
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};
use once_cell::sync::Lazy;
use regex::Regex;

static REPO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="checkoutcmd">(hg|git|svn)"#).unwrap());
static REVISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<h2>(?:[^ ]+ - )?Revision *([^:]+):").unwrap());
static ETAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(hg|git|svn)-").unwrap());
static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<li><a href="([^"/]+)""#).unwrap());

pub async fn get(
    client: &RemoteClient,
    m: &MatchMap,
    saved_etag: &str,
) -> Result<Package, Error> {
    let mut m = m.clone();

    if m.get("subrepo").map(String::is_empty) == Some(false) {
        let query = format!("?repo={}", m["subrepo"]);
        m.insert("dot".to_string(), ".".to_string());
        m.insert("query".to_string(), query);
    } else {
        m.insert("dot".to_string(), String::new());
        m.insert("query".to_string(), String::new());
    }

    match ETAG_RE.captures(saved_etag) {
        Some(caps) => {
            m.insert("vcs".to_string(), caps[1].to_string());
        }
        None => {
            // Scrape the project page once to learn the VCS.
            let page = client
                .get_bytes(&expand(
                    "http://code.google.com/p/{repo}/source/checkout",
                    &m,
                    None,
                ))
                .await?;
            let page = String::from_utf8_lossy(&page);
            match REPO_RE.captures(&page) {
                Some(caps) => {
                    m.insert("vcs".to_string(), caps[1].to_string());
                }
                None => {
                    return Err(Error::not_found("could not find VCS on project page"));
                }
            }
        }
    }

    // The repository browser carries the revision and the file list.
    let page = client
        .get_bytes(&expand(
            "http://{subrepo}{dot}{repo}.googlecode.com/{vcs}{dir}/",
            &m,
            None,
        ))
        .await?;
    let page = String::from_utf8_lossy(&page).into_owned();

    let etag = match REVISION_RE.captures(&page) {
        Some(caps) => expand("{vcs}-{0}", &m, Some(&caps[1])),
        None => {
            return Err(Error::remote(
                "code.google.com",
                format!("no revision found for {}", m["importPath"]),
            ))
        }
    };
    if etag == saved_etag {
        return Err(Error::NotModified);
    }

    let mut files = Vec::new();
    for caps in FILE_RE.captures_iter(&page) {
        let name = caps[1].to_string();
        if !is_doc_file(&name) {
            continue;
        }
        files.push(Source {
            browse_url: expand(
                "http://code.google.com/p/{repo}/source/browse{dir}/{0}{query}",
                &m,
                Some(&name),
            ),
            raw_url: Some(expand(
                "http://{subrepo}{dot}{repo}.googlecode.com/{vcs}{dir}/{0}",
                &m,
                Some(&name),
            )),
            name,
            data: Vec::new(),
        });
    }

    if !files.iter().any(|f| f.name.ends_with(".go")) {
        return Err(Error::not_found("directory tree contains no source files"));
    }

    client.fetch_files(&mut files).await?;

    Builder {
        line_fmt: "#{line}",
        pkg: Package {
            import_path: m["importPath"].clone(),
            project_root: expand("code.google.com/p/{repo}{dot}{subrepo}", &m, None),
            project_name: expand("{repo}{dot}{subrepo}", &m, None),
            project_url: expand("https://code.google.com/p/{repo}/", &m, None),
            browse_url: expand("http://code.google.com/p/{repo}/source/browse{dir}/{query}", &m, None),
            etag,
            vcs: m["vcs"].clone(),
            ..Default::default()
        },
    }
    .build(&files)
}
