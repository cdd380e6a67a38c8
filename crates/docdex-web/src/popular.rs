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

//! Popular-packages list, recomputed on an interval from importer counts.
//! The lock on the shared list is held only for the pointer swap;
//! recomputation runs unlocked.

use crate::state::App;
use docdex_db::PackageSummary;
use std::sync::Arc;

const POPULAR_COUNT: usize = 25;
const CANDIDATE_COUNT: usize = 200;

async fn compute(app: &App) -> anyhow::Result<Vec<PackageSummary>> {
    let candidates = app.db.query("all:").await?;
    let mut scored: Vec<(i64, PackageSummary)> = Vec::new();
    for pkg in candidates.into_iter().take(CANDIDATE_COUNT) {
        let importers = app.db.importer_count(&pkg.path).await?;
        if importers > 0 {
            scored.push((importers, pkg));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.path.cmp(&b.1.path)));
    Ok(scored
        .into_iter()
        .take(POPULAR_COUNT)
        .map(|(_, pkg)| pkg)
        .collect())
}

pub async fn update_once(app: &App) {
    match compute(app).await {
        Ok(pkgs) => app.set_popular_packages(pkgs),
        Err(e) => tracing::warn!(error = %e, "popular package update failed"),
    }
}

/// Update loop; the first computation runs after one interval so startup
/// stays fast.
pub async fn background(app: Arc<App>) {
    let interval = app.cfg.popular_interval;
    loop {
        tokio::time::sleep(interval).await;
        update_once(&app).await;
    }
}
