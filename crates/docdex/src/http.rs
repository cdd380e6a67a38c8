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

//! ETag-aware HTTP fetching shared by all source fetchers.

use crate::error::Error;
use crate::fetch::Source;
use futures_util::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Duration;

/// Cap on concurrent raw-file GETs within one package fetch.
const MAX_FILE_FETCHES: usize = 10;

const DEFAULT_USER_AGENT: &str = concat!("docdex/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client plus the credentials and local state fetchers need.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    user_agent: String,
    /// GitHub client id/secret appended to API requests to raise the rate
    /// limit.
    pub github_credentials: Option<(String, String)>,
    /// Root directory for generic-VCS checkouts.
    pub checkout_root: PathBuf,
}

fn host_of(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest).to_string()
}

impl RemoteClient {
    pub fn new(user_agent: Option<String>, checkout_root: PathBuf) -> Self {
        // No idle connections are kept between crawls; a hung socket must
        // not be able to stall later requests.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(1))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("reqwest client");
        RemoteClient {
            http,
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            github_credentials: None,
            checkout_root,
        }
    }

    async fn do_get(&self, url: &str, etag: Option<&str>) -> Result<reqwest::Response, Error> {
        let mut req = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        if let Some(etag) = etag {
            req = req.header(reqwest::header::IF_NONE_MATCH, format!("\"{}\"", etag));
        }
        req.send()
            .await
            .map_err(|e| Error::remote(host_of(url), e))
    }

    /// GET returning the response body, classifying 404/410 as not-found and
    /// other non-success statuses as remote errors.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Error> {
        let resp = self.do_get(url, None).await?;
        match resp.status().as_u16() {
            200..=299 => resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| Error::remote(host_of(url), e)),
            404 | 410 => Err(Error::not_found(format!("resource not found: {}", url))),
            s => Err(Error::remote(
                host_of(url),
                format!("unexpected status {} from {}", s, url),
            )),
        }
    }

    /// Conditional GET. Sends `If-None-Match` with the saved ETag and maps a
    /// 304 to [`Error::NotModified`]. Returns the body and the new ETag.
    pub async fn get_bytes_compare(
        &self,
        url: &str,
        saved_etag: &str,
    ) -> Result<(Vec<u8>, String), Error> {
        let etag = if saved_etag.is_empty() {
            None
        } else {
            Some(saved_etag)
        };
        let resp = self.do_get(url, etag).await?;
        match resp.status().as_u16() {
            304 => Err(Error::NotModified),
            200..=299 => {
                let new_etag = resp
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim_matches('"').to_string())
                    .unwrap_or_default();
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::remote(host_of(url), e))?;
                Ok((body.to_vec(), new_etag))
            }
            404 | 410 => Err(Error::not_found(format!("resource not found: {}", url))),
            s => Err(Error::remote(
                host_of(url),
                format!("unexpected status {} from {}", s, url),
            )),
        }
    }

    /// GET without status classification, for probes where any reachable
    /// response counts. Returns the body only on 200.
    pub async fn try_get(&self, url: &str) -> Option<Vec<u8>> {
        let resp = self.do_get(url, None).await.ok()?;
        if resp.status() != reqwest::StatusCode::OK {
            return None;
        }
        resp.bytes().await.ok().map(|b| b.to_vec())
    }

    /// Fills in `data` for every source that carries a raw URL. At most
    /// [`MAX_FILE_FETCHES`] GETs are outstanding at a time; the first error
    /// aborts the whole fetch.
    pub async fn fetch_files(&self, files: &mut [Source]) -> Result<(), Error> {
        let fetches = files
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.raw_url.clone().map(|url| (i, url)))
            .collect::<Vec<_>>();
        let mut results = stream::iter(fetches.into_iter().map(|(i, url)| {
            let client = self.clone();
            async move { (i, client.get_bytes(&url).await) }
        }))
        .buffer_unordered(MAX_FILE_FETCHES);

        while let Some((i, result)) = results.next().await {
            files[i].data = result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://github.com/u/r"), "github.com");
        assert_eq!(host_of("example.org/x?a=1"), "example.org");
        assert_eq!(host_of("plainhost"), "plainhost");
    }
}
