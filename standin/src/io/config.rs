//! Server configuration stored in `standin.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::generator::GeneratorKind;

/// Server configuration (TOML).
///
/// Missing fields default to values suitable for local use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StandinConfig {
    /// Address to bind the HTTP server to.
    pub bind: String,

    pub port: u16,

    /// Path under which the fulfiller API is mounted.
    pub admin_prefix: String,

    /// Give up on a generated response after this many seconds. `0` waits
    /// until the client disconnects.
    pub request_timeout_secs: u64,

    pub generator: GeneratorConfig,

    pub ollama: OllamaConfig,

    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
}

/// Connection settings for an Ollama server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    /// Kept low so output sticks to the expected structure.
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.2,
            timeout_secs: 2 * 60,
        }
    }
}

/// A route whose responses are generated instead of served.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// HTTP method, or `ANY`.
    pub method: String,
    pub path_prefix: String,
    /// Sample response document.
    pub schema: Value,
    /// Per-field instructions keyed by field path (e.g. `items[*].sku`).
    #[serde(default)]
    pub hints: BTreeMap<String, String>,
}

impl Default for StandinConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            admin_prefix: "/_standin".to_string(),
            request_timeout_secs: 0,
            generator: GeneratorConfig::default(),
            ollama: OllamaConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl StandinConfig {
    /// Default configuration plus one illustrative route.
    pub fn example() -> Self {
        Self {
            routes: vec![RouteConfig {
                method: "GET".to_string(),
                path_prefix: "/api/greet".to_string(),
                schema: json!({"message": "", "status": 0}),
                hints: BTreeMap::from([
                    ("message".to_string(), "A fun greeting".to_string()),
                    ("status".to_string(), "Always 200".to_string()),
                ]),
            }],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port must be > 0"));
        }
        if !self.admin_prefix.starts_with('/') || self.admin_prefix.len() < 2 {
            return Err(anyhow!(
                "admin_prefix must start with '/' and name a path segment"
            ));
        }
        if self.admin_prefix.ends_with('/') {
            return Err(anyhow!("admin_prefix must not end with '/'"));
        }
        if self.generator.kind == GeneratorKind::Ollama {
            if self.ollama.model.trim().is_empty() {
                return Err(anyhow!("ollama.model must be set when generator.kind = \"ollama\""));
            }
            if self.ollama.url.trim().is_empty() {
                return Err(anyhow!("ollama.url must be set when generator.kind = \"ollama\""));
            }
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(anyhow!("ollama.temperature must be within 0.0..=2.0"));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(anyhow!("ollama.timeout_secs must be > 0"));
        }
        for (idx, route) in self.routes.iter().enumerate() {
            if route.method.trim().is_empty() {
                return Err(anyhow!("routes[{idx}].method must be non-empty"));
            }
            if route.path_prefix.trim().is_empty() {
                return Err(anyhow!("routes[{idx}].path_prefix must be non-empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StandinConfig::default()`.
pub fn load_config(path: &Path) -> Result<StandinConfig> {
    if !path.exists() {
        let cfg = StandinConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StandinConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StandinConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
