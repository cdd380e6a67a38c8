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

//! Standard-library fetcher: scrapes the upstream release source browser for
//! the revision and the file list, then raw-fetches each file.

use super::Source;
use crate::error::Error;
use crate::extract::Builder;
use crate::http::RemoteClient;
use crate::{is_doc_file, Package};
use once_cell::sync::Lazy;
use regex::Regex;

const RAW_BASE: &str = "http://go.googlecode.com/hg-history/release/src/pkg";
const BROWSE_BASE: &str = "http://code.google.com/p/go/source/browse/src/pkg";

static REVISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<h2>(?:[^ ]+ - )?Revision *([^:]+):").unwrap());
static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<li><a href="([^"/]+)""#).unwrap());

pub async fn get(
    client: &RemoteClient,
    import_path: &str,
    saved_etag: &str,
) -> Result<Package, Error> {
    let listing = client
        .get_bytes(&format!("{}/{}/", RAW_BASE, import_path))
        .await?;
    let listing = String::from_utf8_lossy(&listing).into_owned();

    let etag = REVISION_RE
        .captures(&listing)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            Error::remote("go.googlecode.com", format!("no revision found for {}", import_path))
        })?;
    if etag == saved_etag {
        return Err(Error::NotModified);
    }

    let mut files = Vec::new();
    for caps in FILE_RE.captures_iter(&listing) {
        let name = caps[1].split('?').next().unwrap_or(&caps[1]).to_string();
        if !is_doc_file(&name) {
            continue;
        }
        files.push(Source {
            browse_url: format!("{}/{}/{}?name=release", BROWSE_BASE, import_path, name),
            raw_url: Some(format!("{}/{}/{}", RAW_BASE, import_path, name)),
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
            import_path: import_path.to_string(),
            project_root: String::new(),
            project_name: "Go".to_string(),
            project_url: "https://golang.org/".to_string(),
            browse_url: format!("{}/{}?name=release", BROWSE_BASE, import_path),
            etag,
            vcs: "hg".to_string(),
            ..Default::default()
        },
    }
    .build(&files)
}
