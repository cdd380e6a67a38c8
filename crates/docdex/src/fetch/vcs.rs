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

//! Generic VCS fetcher for paths of the form `host/path.vcs/dir`. The remote
//! revision is read over the smart-HTTP protocol, the working tree is kept in
//! a local checkout under the configured checkout root.

use super::{best_tag, expand, MatchMap, Source};
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

static LSREMOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[0-9a-f]{4}([0-9a-f]{40}) refs/(?:tags|heads)/(.+)$").unwrap());

/// Browse/line URL templates for repositories whose host is known but not
/// served by a dedicated fetcher.
struct UrlTemplate {
    re: Regex,
    template: &'static str,
    line_fmt: &'static str,
}

static URL_TEMPLATES: Lazy<Vec<UrlTemplate>> = Lazy::new(|| {
    vec![
    UrlTemplate {
        re: Regex::new(r"^git\.gitorious\.org/(?P<repo>[^/]+/[^/]+)$").unwrap(),
        template: "https://gitorious.org/{repo}/blobs/{tag}/{dir}{0}",
        line_fmt: "#line{line}",
    },
    UrlTemplate {
        re: Regex::new(r"^camlistore\.org/r/p/(?P<repo>[^/]+)$").unwrap(),
        template: "http://camlistore.org/code/?p={repo}.git;hb={tag};f={dir}{0}",
        line_fmt: "#l{line}",
    },
    ]
});

fn lookup_url_template(repo: &str, dir: &str, tag: &str) -> (Option<&'static str>, MatchMap, &'static str) {
    let dir = dir.strip_prefix('/').map(|d| format!("{}/", d)).unwrap_or_default();
    for t in URL_TEMPLATES.iter() {
        if let Some(caps) = t.re.captures(repo) {
            let mut m = MatchMap::new();
            m.insert("dir".to_string(), dir.clone());
            m.insert("tag".to_string(), tag.to_string());
            for name in t.re.capture_names().flatten() {
                if let Some(g) = caps.name(name) {
                    m.insert(name.to_string(), g.as_str().to_string());
                }
            }
            return (Some(t.template), m, t.line_fmt);
        }
    }
    (None, MatchMap::new(), "")
}

async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<(), Error> {
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let status = cmd
        .status()
        .await
        .map_err(|e| Error::Other(format!("failed to run git: {}", e)))?;
    if !status.success() {
        return Err(Error::Other(format!("git {:?} exited with {}", args, status)));
    }
    Ok(())
}

/// Resolves the remote head over smart HTTP and brings the local checkout to
/// that revision. Returns `(tag, commit)`.
async fn download_git(
    client: &RemoteClient,
    scheme: &str,
    repo: &str,
    saved_etag: &str,
) -> Result<Option<(String, String)>, Error> {
    let refs_url = format!("{}://{}.git/info/refs?service=git-upload-pack", scheme, repo);
    let body = match client.try_get(&refs_url).await {
        Some(b) => b,
        None => return Ok(None),
    };
    let text = String::from_utf8_lossy(&body);

    let mut tags = HashMap::new();
    for caps in LSREMOTE_RE.captures_iter(&text) {
        tags.insert(caps[2].to_string(), caps[1].to_string());
    }
    let (tag, commit) =
        best_tag(&tags, "master").ok_or_else(|| Error::not_found("repository has no usable branch"))?;

    if commit == saved_etag {
        return Err(Error::NotModified);
    }

    let dir = client.checkout_root.join(format!("{}.git", repo));
    let head = std::fs::read_to_string(dir.join(".git/HEAD"))
        .map(|s| s.trim_end().to_string())
        .ok();
    match head {
        None => {
            std::fs::create_dir_all(&dir)?;
            tracing::info!(repo = %repo, scheme = %scheme, "git clone");
            run_git(
                None,
                &[
                    "clone",
                    &format!("{}://{}", scheme, repo),
                    dir.to_str().unwrap_or_default(),
                ],
            )
            .await?;
        }
        Some(h) if h == commit => return Ok(Some((tag, commit))),
        Some(_) => {
            tracing::info!(repo = %repo, "git fetch");
            run_git(Some(&dir), &["fetch"]).await?;
        }
    }

    run_git(Some(&dir), &["checkout", "--detach", "--force", &commit]).await?;
    Ok(Some((tag, commit)))
}

pub async fn get(
    client: &RemoteClient,
    vcs: &str,
    scheme: &str,
    repo: &str,
    dir: &str,
    saved_etag: &str,
) -> Result<Package, Error> {
    if vcs != "git" {
        return Err(Error::not_found(format!("VCS not supported: {}", vcs)));
    }

    let schemes: Vec<&str> = if scheme.is_empty() {
        vec!["https", "http"]
    } else {
        vec![scheme]
    };

    let mut downloaded = None;
    for s in schemes {
        match download_git(client, s, repo, saved_etag).await? {
            Some(found) => {
                downloaded = Some(found);
                break;
            }
            None => continue,
        }
    }
    let (tag, commit) = match downloaded {
        Some(d) => d,
        None => return Err(Error::not_found("repository not found")),
    };

    let (url_template, url_match, line_fmt) = lookup_url_template(repo, dir, &tag);

    let local_dir: PathBuf = client
        .checkout_root
        .join(format!("{}.{}", repo, vcs))
        .join(dir.trim_start_matches('/'));
    let entries = match std::fs::read_dir(&local_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() || !is_doc_file(&name) {
            continue;
        }
        let browse_url = url_template
            .map(|t| expand(t, &url_match, Some(&name)))
            .unwrap_or_default();
        files.push(Source {
            name,
            browse_url,
            raw_url: None,
            data: std::fs::read(entry.path())?,
        });
    }

    if !files.iter().any(|f| f.name.ends_with(".go")) {
        return Err(Error::not_found("directory tree contains no source files"));
    }

    Builder {
        line_fmt,
        pkg: Package {
            import_path: format!("{}.{}{}", repo, vcs, dir),
            project_root: format!("{}.{}", repo, vcs),
            project_name: repo.rsplit('/').next().unwrap_or(repo).to_string(),
            project_url: String::new(),
            browse_url: String::new(),
            etag: commit,
            vcs: vcs.to_string(),
            ..Default::default()
        },
    }
    .build(&files)
}
