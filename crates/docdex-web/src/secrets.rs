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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Credentials for other services, loaded from a JSON file at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub github_id: Option<String>,
    #[serde(default)]
    pub github_secret: Option<String>,
}

pub fn read_secrets(path: &Path) -> Result<Secrets> {
    let data = std::fs::read(path)
        .with_context(|| format!("reading secrets file {}", path.display()))?;
    let secrets: Secrets = serde_json::from_slice(&data)
        .with_context(|| format!("parsing secrets file {}", path.display()))?;
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_secrets_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        std::fs::write(
            &path,
            r#"{"user_agent": "docdex-test", "github_id": "id", "github_secret": "secret"}"#,
        )
        .unwrap();
        let s = read_secrets(&path).unwrap();
        assert_eq!(s.user_agent.as_deref(), Some("docdex-test"));
        assert_eq!(s.github_id.as_deref(), Some("id"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_secrets(Path::new("/does/not/exist.json")).is_err());
    }
}
