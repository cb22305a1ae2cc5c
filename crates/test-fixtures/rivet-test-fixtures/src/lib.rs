//! Shared fixture documents for the workspace's tests and demos.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    documents: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn lookup<'a>(kind: &str, map: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Engine documents, fed to `File::import` as raw bytes.
pub mod documents {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.documents.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup("document", &MANIFEST.documents, name)?;
        Ok(resolve_path(rel))
    }

    pub fn bytes(name: &str) -> Result<Vec<u8>> {
        let path = path(name)?;
        fs::read(&path).with_context(|| format!("failed to read fixture at {}", path.display()))
    }

    pub fn json(name: &str) -> Result<serde_json::Value> {
        let bytes = bytes(name)?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse JSON fixture {name}"))
    }
}
