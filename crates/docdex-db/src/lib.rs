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

//! Redis-backed document store for package documents. Every multi-key
//! mutation runs as one server-side script so index memberships and records
//! stay consistent; blobs are gzip-compressed JSON.

use anyhow::{anyhow, Result};
use deadpool_redis::redis::{self, cmd};
use deadpool_redis::{Config as RedisConfig, Connection, Pool, PoolConfig, Runtime};
use docdex::path::is_standard_package;
use docdex::Package;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;

pub mod query;
pub mod scripts;
pub mod terms;

pub use query::parse_query;
pub use terms::{document_rank, document_terms, encode_term};

/// Records whose serialized form exceeds this many bytes are stored with
/// declarations dropped and the `truncated` flag set.
const MAX_BLOB: usize = 700_000;

/// A path/synopsis pair, the projection used by listings and search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub path: String,
    pub synopsis: String,
}

#[derive(Clone)]
pub struct Database {
    pool: Pool,
    log: bool,
}

fn project_set_key(root: &str) -> String {
    format!("index:{}", encode_term(&format!("project:{}", root)))
}

fn importers_set_key(path: &str) -> String {
    format!("index:{}", encode_term(&format!("import:{}", path)))
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn summaries(flat: Vec<Option<String>>) -> Vec<PackageSummary> {
    flat.chunks(2)
        .filter_map(|pair| match pair {
            [Some(path), synopsis] => Some(PackageSummary {
                path: path.clone(),
                synopsis: synopsis.clone().unwrap_or_default(),
            }),
            _ => None,
        })
        .collect()
}

impl Database {
    /// Connects to the store and verifies the connection with a PING.
    pub async fn new(server: &str, idle_timeout: Duration, log: bool) -> Result<Self> {
        let mut cfg = RedisConfig::from_url(server);
        let mut pool_cfg = PoolConfig::new(10);
        pool_cfg.timeouts.wait = Some(Duration::from_secs(5));
        pool_cfg.timeouts.create = Some(Duration::from_secs(5));
        pool_cfg.timeouts.recycle = Some(idle_timeout);
        cfg.pool = Some(pool_cfg);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow!(e.to_string()))?;

        let db = Database { pool, log };
        let mut conn = db.conn().await?;
        let _: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow!("store handshake failed: {}", e))?;
        Ok(db)
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| anyhow!(e.to_string()))
    }

    fn trace(&self, op: &str, detail: &str) {
        if self.log {
            tracing::debug!(op = op, detail = detail, "store command");
        }
    }

    /// True when a record exists for the import path.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let n: i64 = cmd("EXISTS")
            .arg(format!("id:{}", path))
            .query_async(&mut conn)
            .await?;
        Ok(n > 0)
    }

    /// Adds or replaces the package document, maintaining index memberships
    /// from the diff of old and new term sets.
    pub async fn put(&self, pkg: &Package) -> Result<()> {
        self.trace("put", &pkg.import_path);
        let rank = document_rank(pkg);
        let raw_terms = document_terms(pkg);
        let encoded: Vec<String> = raw_terms.iter().map(|t| encode_term(t)).collect();
        let terms_joined = encoded.join(" ");
        let imports_joined = pkg.imports.join(" ");

        let mut json = serde_json::to_vec(pkg)?;
        if json.len() > MAX_BLOB {
            let mut small = pkg.clone();
            small.truncated = true;
            small.consts.clear();
            small.vars.clear();
            small.funcs.clear();
            small.types.clear();
            small.examples.clear();
            json = serde_json::to_vec(&small)?;
        }
        let blob = compress(&json)?;

        let crawl = if pkg.updated > 0 {
            pkg.updated
        } else {
            chrono::Utc::now().timestamp()
        };

        let mut conn = self.conn().await?;
        let _: redis::Value = cmd("EVAL")
            .arg(scripts::PUT)
            .arg(0)
            .arg(&pkg.import_path)
            .arg(&pkg.synopsis)
            .arg(rank)
            .arg(&blob[..])
            .arg(&terms_joined)
            .arg(&imports_joined)
            .arg(&pkg.etag)
            .arg(crawl)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Advances the crawl time for the path, and for every package in the
    /// same project whose stored ETag equals `etag`.
    pub async fn touch(&self, project_root: &str, path: &str, etag: &str) -> Result<()> {
        self.trace("touch", path);
        let root = if project_root.is_empty() {
            "go"
        } else {
            project_root
        };
        let mut conn = self.conn().await?;
        let _: redis::Value = cmd("EVAL")
            .arg(scripts::TOUCH)
            .arg(0)
            .arg(project_set_key(root))
            .arg(path)
            .arg(etag)
            .arg(chrono::Utc::now().timestamp())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Returns the package document and its last crawl time. The pseudo-path
    /// `-` selects the least recently crawled record.
    pub async fn get(&self, path: &str) -> Result<Option<(Package, i64)>> {
        self.trace("get", path);
        let mut conn = self.conn().await?;
        let r: Option<(Vec<u8>, i64)> = cmd("EVAL")
            .arg(scripts::GET_DOC)
            .arg(0)
            .arg(path)
            .query_async(&mut conn)
            .await?;
        match r {
            None => Ok(None),
            Some((blob, crawl)) => {
                let pkg: Package = serde_json::from_slice(&decompress(&blob)?)?;
                Ok(Some((pkg, crawl)))
            }
        }
    }

    /// Removes the record, its index memberships and its crawl entry.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.trace("delete", path);
        let mut conn = self.conn().await?;
        let _: redis::Value = cmd("EVAL")
            .arg(scripts::DELETE)
            .arg(0)
            .arg(path)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Child packages of the path, drawn from the owning project's set. When
    /// the project is unknown, up to five ancestor roots are probed.
    pub async fn subdirs(&self, path: &str, pkg: Option<&Package>) -> Result<Vec<PackageSummary>> {
        let keys: Vec<String> = if is_standard_package(path) {
            vec![project_set_key("go")]
        } else if let Some(pkg) = pkg {
            vec![project_set_key(terms::project_root_or_std(pkg))]
        } else {
            let mut roots = Vec::new();
            let mut root = path;
            for _ in 0..5 {
                roots.push(project_set_key(root));
                match root.rfind('/') {
                    Some(i) => root = &root[..i],
                    None => break,
                }
            }
            roots
        };

        let mut conn = self.conn().await?;
        let mut c = cmd("EVAL");
        c.arg(scripts::SUBDIRS).arg(0);
        for key in &keys {
            c.arg(key);
        }
        let flat: Vec<Option<String>> = c.query_async(&mut conn).await?;

        let prefix = format!("{}/", path);
        Ok(summaries(flat)
            .into_iter()
            .filter(|p| p.path.starts_with(&prefix))
            .collect())
    }

    /// Bulk path to synopsis projection, in input order.
    pub async fn packages(&self, paths: &[String]) -> Result<Vec<PackageSummary>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut c = cmd("EVAL");
        c.arg(scripts::PACKAGES).arg(0);
        for p in paths {
            c.arg(p);
        }
        let flat: Vec<Option<String>> = c.query_async(&mut conn).await?;
        let mut pkgs = summaries(flat);
        pkgs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(pkgs)
    }

    pub async fn importers(&self, path: &str) -> Result<Vec<PackageSummary>> {
        let mut conn = self.conn().await?;
        let flat: Vec<Option<String>> = cmd("SORT")
            .arg(importers_set_key(path))
            .arg("ALPHA")
            .arg("BY")
            .arg("pkg:*->path")
            .arg("GET")
            .arg("pkg:*->path")
            .arg("GET")
            .arg("pkg:*->synopsis")
            .query_async(&mut conn)
            .await?;
        Ok(summaries(flat))
    }

    pub async fn importer_count(&self, path: &str) -> Result<i64> {
        let mut conn = self.conn().await?;
        let n: i64 = cmd("SCARD")
            .arg(importers_set_key(path))
            .query_async(&mut conn)
            .await?;
        Ok(n)
    }

    /// Intersects the query's term sets and returns matches ordered by rank,
    /// ties broken by ingest id. An exact name match on a standard package
    /// moves to the front.
    pub async fn query(&self, q: &str) -> Result<Vec<PackageSummary>> {
        let terms = parse_query(q);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.trace("query", q);

        let mut conn = self.conn().await?;
        let n: i64 = cmd("INCR").arg("maxQueryId").query_async(&mut conn).await?;
        let tmp = format!("tmp:query-{}", n);

        let mut c = cmd("EVAL");
        c.arg(scripts::QUERY).arg(0).arg(&tmp);
        for term in &terms {
            c.arg(format!("index:{}", encode_term(term)));
        }
        let flat: Vec<Option<String>> = c.query_async(&mut conn).await?;

        let mut rows: Vec<(i64, PackageSummary)> = flat
            .chunks(4)
            .filter_map(|row| match row {
                [Some(id), Some(path), synopsis, rank] => {
                    let id = id.parse::<i64>().ok()?;
                    let rank = rank.as_deref().and_then(|r| r.parse::<i64>().ok())?;
                    Some((
                        rank,
                        id,
                        PackageSummary {
                            path: path.clone(),
                            synopsis: synopsis.clone().unwrap_or_default(),
                        },
                    ))
                }
                _ => None,
            })
            .map(|(rank, id, summary)| ((rank << 32) - id, summary))
            .collect();
        rows.sort_by_key(|(key, _)| std::cmp::Reverse(*key));
        let mut pkgs: Vec<PackageSummary> = rows.into_iter().map(|(_, s)| s).collect();

        for i in 0..pkgs.len() {
            if !is_standard_package(&pkgs[i].path) {
                break;
            }
            if pkgs[i].path.ends_with(q) {
                pkgs.swap(0, i);
                break;
            }
        }
        Ok(pkgs)
    }

    /// Blocks a path prefix and deletes every record at or under it.
    pub async fn block(&self, root: &str) -> Result<()> {
        self.trace("block", root);
        let mut conn = self.conn().await?;
        let _: i64 = cmd("SADD")
            .arg("block")
            .arg(root)
            .query_async(&mut conn)
            .await?;
        let keys: Vec<String> = cmd("KEYS")
            .arg(format!("id:{}*", root))
            .query_async(&mut conn)
            .await?;
        drop(conn);
        for key in keys {
            let path = &key["id:".len()..];
            if path == root || path.starts_with(&format!("{}/", root)) {
                self.delete(path).await?;
            }
        }
        Ok(())
    }

    /// True when any `/`-bounded prefix of the path is blocked.
    pub async fn is_blocked(&self, path: &str) -> Result<bool> {
        let mut prefixes = Vec::new();
        let mut end = 0usize;
        let bytes = path.as_bytes();
        while end < bytes.len() {
            match path[end..].find('/') {
                Some(i) => {
                    prefixes.push(&path[..end + i]);
                    end += i + 1;
                }
                None => {
                    prefixes.push(path);
                    break;
                }
            }
        }
        if prefixes.is_empty() {
            return Ok(false);
        }
        let mut conn = self.conn().await?;
        let mut c = cmd("EVAL");
        c.arg(scripts::IS_BLOCKED).arg(0);
        for p in &prefixes {
            c.arg(*p);
        }
        let n: i64 = c.query_async(&mut conn).await?;
        Ok(n == 1)
    }

    /// Breadth-first import graph, one pipelined batch of lookups per level.
    pub async fn import_graph(
        &self,
        pkg: &Package,
    ) -> Result<(Vec<PackageSummary>, Vec<(usize, usize)>)> {
        let mut nodes = vec![PackageSummary {
            path: pkg.import_path.clone(),
            synopsis: pkg.synopsis.clone(),
        }];
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        index.insert(pkg.import_path.clone(), 0);

        let mut frontier: Vec<usize> = Vec::new();
        for path in &pkg.imports {
            let j = nodes.len();
            index.insert(path.clone(), j);
            nodes.push(PackageSummary {
                path: path.clone(),
                synopsis: String::new(),
            });
            edges.push((0, j));
            frontier.push(j);
        }

        let mut conn = self.conn().await?;
        while !frontier.is_empty() {
            let mut pipe = redis::pipe();
            for j in &frontier {
                pipe.cmd("EVAL")
                    .arg(scripts::GRAPH_NODE)
                    .arg(0)
                    .arg(&nodes[*j].path);
            }
            let results: Vec<Option<(Option<String>, Option<String>)>> =
                pipe.query_async(&mut conn).await?;

            let mut next = Vec::new();
            for (j, result) in frontier.iter().zip(results) {
                let (synopsis, imports) = match result {
                    Some(r) => r,
                    None => continue,
                };
                nodes[*j].synopsis = synopsis.unwrap_or_default();
                for path in imports.unwrap_or_default().split_whitespace() {
                    let k = match index.get(path) {
                        Some(k) => *k,
                        None => {
                            let k = nodes.len();
                            index.insert(path.to_string(), k);
                            nodes.push(PackageSummary {
                                path: path.to_string(),
                                synopsis: String::new(),
                            });
                            next.push(k);
                            k
                        }
                    };
                    edges.push((*j, k));
                }
            }
            frontier = next;
        }
        Ok((nodes, edges))
    }

    async fn sorted_listing(&self, key: &str) -> Result<Vec<PackageSummary>> {
        let mut conn = self.conn().await?;
        let flat: Vec<Option<String>> = cmd("SORT")
            .arg(key)
            .arg("ALPHA")
            .arg("BY")
            .arg("pkg:*->path")
            .arg("GET")
            .arg("pkg:*->path")
            .arg("GET")
            .arg("pkg:*->synopsis")
            .query_async(&mut conn)
            .await?;
        Ok(summaries(flat))
    }

    /// Every named package, ascending by path.
    pub async fn index(&self) -> Result<Vec<PackageSummary>> {
        self.sorted_listing("index:all:").await
    }

    /// Standard-library packages, ascending by path.
    pub async fn std_index(&self) -> Result<Vec<PackageSummary>> {
        self.sorted_listing(&project_set_key("go")).await
    }

    /// Packages in a project, ascending by path.
    pub async fn project(&self, root: &str) -> Result<Vec<PackageSummary>> {
        let root = if root.is_empty() { "go" } else { root };
        self.sorted_listing(&project_set_key(root)).await
    }

    /// Loads every stored document. For offline maintenance only; the
    /// reindexer uses it to rebuild term sets after a restart.
    pub async fn all_packages(&self) -> Result<Vec<Package>> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = cmd("KEYS").arg("pkg:*").query_async(&mut conn).await?;
        let mut out = Vec::new();
        for key in keys {
            let blob: Option<Vec<u8>> = cmd("HGET")
                .arg(&key)
                .arg("blob")
                .query_async(&mut conn)
                .await?;
            if let Some(blob) = blob {
                let pkg: Package = serde_json::from_slice(&decompress(&blob)?)?;
                out.push(pkg);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip() {
        let data = b"package document bytes".repeat(100);
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn summary_pairing() {
        let flat = vec![
            Some("a/b".to_string()),
            Some("Synopsis.".to_string()),
            Some("c/d".to_string()),
            None,
        ];
        let got = summaries(flat);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].path, "a/b");
        assert_eq!(got[1].synopsis, "");
    }

    #[test]
    fn set_keys_are_stable() {
        assert_eq!(project_set_key("go"), "index:project:go");
        // Long roots digest to a fixed-width key.
        assert_eq!(project_set_key("github.com/user/repo").len(), "index:".len() + 32);
    }
}
