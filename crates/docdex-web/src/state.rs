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

use docdex::RemoteClient;
use docdex_db::{Database, PackageSummary};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Treat every request as coming from a robot.
    pub robot: bool,
    /// Deadline for request-driven crawls of known packages.
    pub get_timeout: Duration,
    /// Deadline for the first fetch of a never-seen package.
    pub first_get_timeout: Duration,
    /// Records older than this are due for a background crawl.
    pub max_age: Duration,
    /// Sleep between background crawls; zero disables the loop.
    pub crawl_interval: Duration,
    /// Sleep between popular-package recomputations; zero disables.
    pub popular_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            robot: false,
            get_timeout: Duration::from_secs(8),
            first_get_timeout: Duration::from_secs(5),
            max_age: Duration::from_secs(24 * 60 * 60),
            crawl_interval: Duration::ZERO,
            popular_interval: Duration::ZERO,
        }
    }
}

/// Shared server state. The popular list is swapped whole under its lock;
/// recomputation runs unlocked.
pub struct App {
    pub db: Database,
    pub client: RemoteClient,
    pub cfg: ServerConfig,
    pub popular: RwLock<Arc<Vec<PackageSummary>>>,
}

impl App {
    pub fn new(db: Database, client: RemoteClient, cfg: ServerConfig) -> Arc<Self> {
        Arc::new(App {
            db,
            client,
            cfg,
            popular: RwLock::new(Arc::new(Vec::new())),
        })
    }

    pub fn popular_packages(&self) -> Arc<Vec<PackageSummary>> {
        self.popular.read().clone()
    }

    pub fn set_popular_packages(&self, pkgs: Vec<PackageSummary>) {
        *self.popular.write() = Arc::new(pkgs);
    }
}
