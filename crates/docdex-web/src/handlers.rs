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

//! HTTP facade. Responses are JSON documents; rendering them to HTML is a
//! separate front end's concern.

use crate::crawl::{self, RequestType};
use crate::state::App;
use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use docdex::error::Error;
use docdex::path::{is_browse_url, is_valid_remote_path};
use docdex::Package;
use docdex_db::PackageSummary;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

static ROBOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+https?://)|(?:\Wbot\W)").unwrap());

pub struct HttpError(Error);

impl From<Error> for HttpError {
    fn from(e: Error) -> Self {
        HttpError(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            Error::UpdateTimeout => (
                StatusCode::NOT_FOUND,
                "timeout getting package files from the version control system".to_string(),
            )
                .into_response(),
            Error::Remote { host, .. } => (
                StatusCode::BAD_GATEWAY,
                format!("error getting package files from {}", host),
            )
                .into_response(),
            Error::NotModified => StatusCode::NOT_MODIFIED.into_response(),
            Error::Other(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

fn is_robot(app: &App, headers: &HeaderMap) -> bool {
    if app.cfg.robot {
        return true;
    }
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ROBOT_RE.is_match(ua))
        .unwrap_or(false)
}

/// Lexical path cleanup: collapses empty, `.` and `..` segments. Requests
/// for non-canonical paths redirect to the canonical form.
fn clean_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            seg => out.push(seg),
        }
    }
    out.join("/")
}

#[derive(Deserialize)]
pub struct PackageParams {
    #[serde(default)]
    view: String,
}

#[derive(Serialize)]
struct PackageView {
    #[serde(rename = "package", skip_serializing_if = "Option::is_none")]
    pkg: Option<Package>,
    subdirs: Vec<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    importer_count: Option<i64>,
}

#[derive(Serialize)]
struct Summary {
    path: String,
    synopsis: String,
}

impl From<PackageSummary> for Summary {
    fn from(p: PackageSummary) -> Self {
        Summary {
            path: p.path,
            synopsis: p.synopsis,
        }
    }
}

#[derive(Serialize)]
struct GraphView {
    nodes: Vec<Summary>,
    edges: Vec<(usize, usize)>,
}

async fn serve_package(
    State(app): State<Arc<App>>,
    Path(path): Path<String>,
    Query(params): Query<PackageParams>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let cleaned = clean_path(&path);
    if cleaned != path {
        return Ok(Redirect::permanent(&format!("/{}", cleaned)).into_response());
    }

    let req = if is_robot(&app, &headers) {
        RequestType::Robot
    } else {
        RequestType::Human
    };
    let (pdoc, subdirs) = crawl::get_doc(&app, &path, req).await?;

    let pdoc = match pdoc {
        Some(pdoc) => Some(pdoc),
        None if subdirs.is_empty() => {
            return Err(Error::not_found(format!("no package at {}", path)).into())
        }
        None => None,
    };

    match params.view.as_str() {
        "" => {
            let importer_count = match &pdoc {
                Some(_) => Some(
                    app.db
                        .importer_count(&path)
                        .await
                        .map_err(|e| Error::Other(e.to_string()))?,
                ),
                None => None,
            };
            Ok(Json(PackageView {
                pkg: pdoc,
                subdirs: subdirs.into_iter().map(Summary::from).collect(),
                importer_count,
            })
            .into_response())
        }
        "imports" => {
            let pdoc = named_package(pdoc, &path)?;
            let pkgs = app
                .db
                .packages(&pdoc.imports)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(Json(pkgs.into_iter().map(Summary::from).collect::<Vec<_>>()).into_response())
        }
        "importers" => {
            let _ = named_package(pdoc, &path)?;
            let pkgs = app
                .db
                .importers(&path)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(Json(pkgs.into_iter().map(Summary::from).collect::<Vec<_>>()).into_response())
        }
        "import-graph" => {
            let pdoc = named_package(pdoc, &path)?;
            let (nodes, edges) = app
                .db
                .import_graph(&pdoc)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(Json(GraphView {
                nodes: nodes.into_iter().map(Summary::from).collect(),
                edges,
            })
            .into_response())
        }
        other => Err(Error::not_found(format!("unknown view {:?}", other)).into()),
    }
}

fn named_package(pdoc: Option<Package>, path: &str) -> Result<Package, HttpError> {
    match pdoc {
        Some(p) if !p.name.is_empty() => Ok(p),
        _ => Err(Error::not_found(format!("no package at {}", path)).into()),
    }
}

#[derive(Deserialize)]
pub struct HomeParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResults {
    q: String,
    results: Vec<Summary>,
}

#[derive(Serialize)]
struct Home {
    popular: Vec<Summary>,
}

async fn serve_home(
    State(app): State<Arc<App>>,
    Query(params): Query<HomeParams>,
) -> Result<Response, HttpError> {
    let mut q = params.q.trim().to_string();
    if q.is_empty() {
        let popular = app
            .popular_packages()
            .iter()
            .cloned()
            .map(Summary::from)
            .collect();
        return Ok(Json(Home { popular }).into_response());
    }

    if let Some(path) = is_browse_url(&q) {
        q = path;
    }

    if is_valid_remote_path(&q) {
        if let Ok((pdoc, subdirs)) = crawl::get_doc(&app, &q, RequestType::Query).await {
            if pdoc.is_some() || !subdirs.is_empty() {
                return Ok(Redirect::temporary(&format!("/{}", q)).into_response());
            }
        }
    }

    let results = app
        .db
        .query(&q)
        .await
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(Json(SearchResults {
        q,
        results: results.into_iter().map(Summary::from).collect(),
    })
    .into_response())
}

async fn serve_index(State(app): State<Arc<App>>) -> Result<Response, HttpError> {
    let pkgs = app
        .db
        .index()
        .await
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(Json(pkgs.into_iter().map(Summary::from).collect::<Vec<_>>()).into_response())
}

async fn serve_std_index(State(app): State<Arc<App>>) -> Result<Response, HttpError> {
    let pkgs = app
        .db
        .std_index()
        .await
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(Json(pkgs.into_iter().map(Summary::from).collect::<Vec<_>>()).into_response())
}

async fn serve_about() -> &'static str {
    concat!(
        "docdex indexes documentation for packages identified by ",
        "repository-style import paths."
    )
}

async fn serve_bot() -> &'static str {
    concat!(
        "The docdex crawler fetches package source files from their hosting ",
        "service to extract documentation. Blocked or removed paths stay gone."
    )
}

#[derive(Deserialize)]
pub struct RefreshForm {
    path: String,
}

async fn serve_refresh(
    State(app): State<Arc<App>>,
    Form(form): Form<RefreshForm>,
) -> Result<Response, HttpError> {
    let path = form.path;
    let (pdoc, subdirs) = match app.db.get(&path).await {
        Ok(Some((pkg, _))) => {
            let subdirs = app
                .db
                .subdirs(&path, Some(&pkg))
                .await
                .unwrap_or_default();
            (Some(pkg), subdirs)
        }
        _ => (None, Vec::new()),
    };

    let (tx, rx) = tokio::sync::oneshot::channel();
    {
        let app = app.clone();
        let path = path.clone();
        let has_subdirs = !subdirs.is_empty();
        tokio::spawn(async move {
            let result = crawl::crawl_doc(&app, "rfrsh", &path, None, has_subdirs).await;
            let _ = tx.send(result);
        });
    }
    match tokio::time::timeout(app.cfg.get_timeout, rx).await {
        Ok(Ok(Ok(_))) => {}
        Ok(Ok(Err(e))) => {
            if pdoc.is_none() {
                return Err(e.into());
            }
        }
        Ok(Err(_)) | Err(_) => {
            if pdoc.is_none() {
                return Err(Error::UpdateTimeout.into());
            }
        }
    }
    Ok(Redirect::temporary(&format!("/{}", path)).into_response())
}

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(serve_home))
        .route("/-/about", get(serve_about))
        .route("/-/bot", get(serve_bot))
        .route("/-/go", get(serve_std_index))
        .route("/-/index", get(serve_index))
        .route("/-/refresh", post(serve_refresh))
        .route("/*path", get(serve_package))
        .with_state(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_cleaning() {
        assert_eq!(clean_path("github.com/u/r"), "github.com/u/r");
        assert_eq!(clean_path("github.com//u/r/"), "github.com/u/r");
        assert_eq!(clean_path("github.com/u/./r"), "github.com/u/r");
        assert_eq!(clean_path("github.com/u/x/../r"), "github.com/u/r");
    }

    #[test]
    fn robot_user_agents() {
        assert!(ROBOT_RE.is_match("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"));
        assert!(ROBOT_RE.is_match("some bot agent"));
        assert!(!ROBOT_RE.is_match("Mozilla/5.0 (X11; Linux x86_64)"));
    }
}
