//! Build manifest
//!
//! The manifest lists the static assets of one deploy:
//!
//! ```json
//! { "version": "1760600000", "assets": ["/_app/immutable/start.js", "/favicon.png"] }
//! ```
//!
//! `version` is optional. Without it the version is derived from a SHA-256
//! digest of the asset list, so a new deploy with different assets gets new
//! cache names and the previous deploy's caches are removed on activation.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::OfflineError;

const BUILD_CACHE_PREFIX: &str = "linkvault-build-";
const RUNTIME_CACHE_PREFIX: &str = "linkvault-runtime-";

/// Hex characters of the digest kept in derived versions
const DERIVED_VERSION_LEN: usize = 16;

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    assets: Vec<String>,
}

/// Static assets and version of the current deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildManifest {
    version: String,
    assets: Vec<String>,
    lookup: HashSet<String>,
}

impl BuildManifest {
    /// Creates a manifest; a missing or blank version is derived from `assets`
    pub fn new(version: Option<String>, assets: Vec<String>) -> Self {
        let version = version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| derive_version(&assets));
        let lookup = assets.iter().cloned().collect();
        Self {
            version,
            assets,
            lookup,
        }
    }

    /// Parses the JSON form
    pub fn from_json(json: &str) -> Result<Self, OfflineError> {
        let raw: RawManifest =
            serde_json::from_str(json).map_err(|e| OfflineError::Manifest(e.to_string()))?;
        Ok(Self::new(raw.version, raw.assets))
    }

    /// Reads and parses a manifest file
    pub fn load(path: &Path) -> Result<Self, OfflineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OfflineError::Manifest(format!("cannot read {}: {e}", path.display()))
        })?;
        let manifest = Self::from_json(&contents)?;
        debug!(
            path = %path.display(),
            version = %manifest.version,
            assets = manifest.assets.len(),
            "Loaded build manifest"
        );
        Ok(manifest)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Whether `path` is one of the precached assets
    pub fn contains(&self, path: &str) -> bool {
        self.lookup.contains(path)
    }

    /// Name of the immutable cache holding this deploy's assets
    pub fn build_cache_name(&self) -> String {
        format!("{BUILD_CACHE_PREFIX}{}", self.version)
    }

    /// Name of the bounded runtime cache of this deploy
    pub fn runtime_cache_name(&self) -> String {
        format!("{RUNTIME_CACHE_PREFIX}{}", self.version)
    }
}

fn derive_version(assets: &[String]) -> String {
    let mut hasher = Sha256::new();
    for asset in assets {
        hasher.update(asset.as_bytes());
        hasher.update(b"\n");
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    hex[..DERIVED_VERSION_LEN].to_string()
}
