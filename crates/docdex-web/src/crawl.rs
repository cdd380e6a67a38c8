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

//! Crawl scheduling: the background refresh loop plus request-driven crawls
//! raced against a deadline.

use crate::state::App;
use docdex::error::Error;
use docdex::path::is_standard_package;
use docdex::{resolve, Package};
use docdex_db::PackageSummary;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Paths that nest another hosting service's repository are copies of that
/// project, not projects of their own.
static NESTED_PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:github\.com|launchpad\.net|code\.google\.com/p|bitbucket\.org|labix\.org)/")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Human,
    Robot,
    Query,
    Refresh,
}

enum Action {
    Put,
    Touch,
    Delete,
}

fn mirrors_standard_tree(path: &str) -> bool {
    for marker in ["/src/pkg/", "/libgo/go/"] {
        if let Some(i) = path.find(marker) {
            if i > 0 && is_standard_package(&path[i + marker.len()..]) {
                return true;
            }
        }
    }
    false
}

/// Fetches the package and applies the outcome to the store: `put` on fresh
/// content, `touch` on not-modified, `delete` on not-found, blocked paths,
/// standard-tree mirrors and nested project copies. Transport errors
/// propagate with no store mutation.
pub async fn crawl_doc(
    app: &App,
    source: &str,
    path: &str,
    pdoc: Option<Package>,
    has_subdirs: bool,
) -> Result<Option<Package>, Error> {
    let _ = has_subdirs;
    let etag = pdoc.as_ref().map(|p| p.etag.clone()).unwrap_or_default();
    let started = std::time::Instant::now();

    let nested_copy = match NESTED_PROJECT_RE.find(path) {
        Some(m) => app
            .db
            .exists(&path[m.start() + 1..])
            .await
            .unwrap_or(false),
        None => false,
    };

    let mut action = Action::Put;
    let mut pdoc = pdoc;

    if mirrors_standard_tree(path)
        || nested_copy
        || app.db.is_blocked(path).await.unwrap_or(false)
    {
        action = Action::Delete;
        pdoc = None;
    } else {
        match resolve(&app.client, path, &etag).await {
            Ok(new_doc) => {
                pdoc = Some(new_doc);
            }
            Err(Error::NotModified) => {
                action = Action::Touch;
            }
            Err(e) if e.is_not_found() => {
                action = Action::Delete;
                pdoc = None;
            }
            Err(e) => {
                tracing::warn!(source = source, path = path, error = %e, "crawl error");
                return Err(e);
            }
        }
    }

    let ms = started.elapsed().as_millis() as u64;
    match action {
        Action::Put => {
            let doc = pdoc.as_ref().expect("fetched package");
            tracing::info!(source = source, path = path, etag = %doc.etag, ms = ms, "put");
            if let Err(e) = app.db.put(doc).await {
                tracing::error!(path = path, error = %e, "store put failed");
            }
            Ok(pdoc)
        }
        Action::Touch => {
            if let Some(doc) = &pdoc {
                tracing::info!(source = source, path = path, ms = ms, "touch");
                if let Err(e) = app
                    .db
                    .touch(&doc.project_root, &doc.import_path, &doc.etag)
                    .await
                {
                    tracing::error!(path = path, error = %e, "store touch failed");
                }
            }
            Ok(pdoc)
        }
        Action::Delete => {
            tracing::info!(source = source, path = path, ms = ms, "delete");
            if let Err(e) = app.db.delete(path).await {
                tracing::error!(path = path, error = %e, "store delete failed");
            }
            Ok(None)
        }
    }
}

/// Decides whether a request should trigger a crawl, per request class.
pub fn needs_crawl(req: RequestType, last_crawl: i64, subdir_count: usize) -> bool {
    match req {
        RequestType::Query => last_crawl == 0 && subdir_count == 0,
        RequestType::Human => chrono::Utc::now().timestamp() - last_crawl > 24 * 60 * 60,
        RequestType::Robot => last_crawl == 0 && subdir_count > 0,
        RequestType::Refresh => true,
    }
}

/// Store lookup with a request-driven crawl when the record is stale or
/// missing. The crawl runs in its own task; when the deadline elapses, a
/// stale record is served as-is and a never-seen path reports not-found. The
/// in-flight fetch is left to finish and store its result.
pub async fn get_doc(
    app: &Arc<App>,
    path: &str,
    req: RequestType,
) -> Result<(Option<Package>, Vec<PackageSummary>), Error> {
    let (pdoc, last_crawl) = match app
        .db
        .get(path)
        .await
        .map_err(|e| Error::Other(e.to_string()))?
    {
        Some((pkg, crawl)) => (Some(pkg), crawl),
        None => (None, 0),
    };
    let subdirs = app
        .db
        .subdirs(path, pdoc.as_ref())
        .await
        .map_err(|e| Error::Other(e.to_string()))?;

    if !needs_crawl(req, last_crawl, subdirs.len()) {
        return Ok((pdoc, subdirs));
    }

    let timeout = if pdoc.is_none() {
        app.cfg.first_get_timeout
    } else {
        app.cfg.get_timeout
    };

    let (tx, rx) = oneshot::channel();
    {
        let app = app.clone();
        let path = path.to_string();
        let prior = pdoc.clone();
        let has_subdirs = !subdirs.is_empty();
        tokio::spawn(async move {
            let result = crawl_doc(&app, "web", &path, prior, has_subdirs).await;
            let _ = tx.send(result);
        });
    }

    let outcome: Result<Option<Package>, Error> = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_closed)) => Err(Error::UpdateTimeout),
        Err(_elapsed) => Err(Error::UpdateTimeout),
    };

    match outcome {
        Ok(new_doc) => Ok((new_doc, subdirs)),
        Err(e) => {
            if pdoc.is_some() {
                // Serve the stale record and drop the error.
                tracing::info!(path = path, error = %e, "serving stale record after crawl failure");
                Ok((pdoc, subdirs))
            } else {
                Err(e)
            }
        }
    }
}

/// Background loop: sleeps the crawl interval, takes the least recently
/// crawled record, waits out its remaining freshness and refreshes it. All
/// non-fatal errors advance the record's crawl time so one poison record
/// cannot wedge the queue.
pub async fn background(app: Arc<App>) {
    let interval = app.cfg.crawl_interval;
    loop {
        tokio::time::sleep(interval).await;

        let (pdoc, last_crawl) = match app.db.get("-").await {
            Ok(Some((pkg, crawl))) => (pkg, crawl),
            Ok(None) => {
                tokio::time::sleep(app.cfg.max_age).await;
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "background crawl store error");
                continue;
            }
        };

        let age = chrono::Utc::now().timestamp() - last_crawl;
        let remaining = app.cfg.max_age.as_secs() as i64 - age;
        if remaining > 0 {
            tokio::time::sleep(Duration::from_secs(remaining as u64)).await;
        }

        let path = pdoc.import_path.clone();
        let root = pdoc.project_root.clone();
        let etag = pdoc.etag.clone();
        let subdirs = app
            .db
            .subdirs(&path, Some(&pdoc))
            .await
            .unwrap_or_default();
        if crawl_doc(&app, "crawl", &path, Some(pdoc), !subdirs.is_empty())
            .await
            .is_err()
        {
            // Advance past the failing record.
            if let Err(e) = app.db.touch(&root, &path, &etag).await {
                tracing::error!(path = %path, error = %e, "touch after crawl error failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tree_mirrors() {
        assert!(mirrors_standard_tree(
            "github.com/u/go-mirror/src/pkg/encoding/json"
        ));
        assert!(mirrors_standard_tree("example.org/gcc/libgo/go/errors"));
        assert!(!mirrors_standard_tree("github.com/u/r/src/pkg/notstd"));
        assert!(!mirrors_standard_tree("github.com/u/r"));
    }

    #[test]
    fn needs_crawl_per_request_class() {
        let now = chrono::Utc::now().timestamp();
        assert!(needs_crawl(RequestType::Query, 0, 0));
        assert!(!needs_crawl(RequestType::Query, 0, 2));
        assert!(!needs_crawl(RequestType::Query, now, 0));

        assert!(needs_crawl(RequestType::Human, now - 2 * 24 * 60 * 60, 0));
        assert!(!needs_crawl(RequestType::Human, now, 0));

        assert!(needs_crawl(RequestType::Robot, 0, 1));
        assert!(!needs_crawl(RequestType::Robot, 0, 0));
        assert!(!needs_crawl(RequestType::Robot, now, 1));

        assert!(needs_crawl(RequestType::Refresh, now, 3));
    }

    #[test]
    fn nested_project_pattern() {
        assert!(NESTED_PROJECT_RE.is_match("example.org/vendor/github.com/u/r"));
        assert!(!NESTED_PROJECT_RE.is_match("github.com/u/r"));
    }
}
