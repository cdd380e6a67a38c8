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

use std::fmt::{self, Display};

/// Errors produced while resolving and fetching a package.
#[derive(Debug)]
pub enum Error {
    /// The path does not correspond to anything fetchable. Maps to a delete
    /// when a prior record existed.
    NotFound(String),
    /// The fetcher confirmed the remote revision equals the saved ETag.
    NotModified,
    /// The upstream host failed or answered unexpectedly. Carries the host
    /// so users can tell which upstream misbehaved. No store mutation.
    Remote { host: String, detail: String },
    /// A request-driven crawl exceeded its deadline with no stored fallback.
    UpdateTimeout,
    /// Anything else.
    Other(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn remote(host: impl Into<String>, detail: impl Display) -> Self {
        Error::Remote {
            host: host.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Error::NotModified)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::NotModified => write!(f, "package not modified"),
            Error::Remote { host, detail } => write!(f, "error from {}: {}", host, detail),
            Error::UpdateTimeout => write!(f, "update timeout"),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Other(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(e.to_string())
    }
}
