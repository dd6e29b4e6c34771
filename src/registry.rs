// src/registry.rs
//! Source registry: the static catalog of upstream city-data services.
//!
//! Loaded once from TOML at startup and shared read-only behind an `Arc`.
//! Each entry carries the keyword/capability vocabulary the router scores
//! against plus a declarative operation rule table, so adding a source is a
//! config change, not a router change.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REGISTRY_PATH: &str = "config/registry.toml";
pub const ENV_REGISTRY_PATH: &str = "CITYPULSE_REGISTRY_PATH";

const DEFAULT_CALL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LIMIT: u32 = 50;

/// One keyword rule of a source's operation table. The first rule whose
/// keywords match the query wins; otherwise the source's default operation
/// is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRule {
    pub operation: String,
    pub keywords: Vec<String>,
}

/// A single upstream source as declared in the registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub address: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationRule>,
    pub default_operation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    /// Source consulted when nothing scores above zero.
    pub default_source: String,
    #[serde(default)]
    pub default_limit: Option<u32>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub sources: Vec<SourceDescriptor>,
}

impl Registry {
    /// Load and validate the registry from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading registry from {}", path.display()))?;
        let registry: Registry = toml::from_str(&content)
            .with_context(|| format!("parsing registry {}", path.display()))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load using `$CITYPULSE_REGISTRY_PATH` with fallback to
    /// `config/registry.toml`. Failure here is fatal at startup: the service
    /// must not answer queries without a registry.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_REGISTRY_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REGISTRY_PATH));
        Self::load_from(&path)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("registry declares no sources");
        }
        let mut seen = HashSet::new();
        for src in &self.sources {
            if src.name.trim().is_empty() {
                bail!("registry contains a source with an empty name");
            }
            if !seen.insert(src.name.as_str()) {
                bail!("duplicate source name '{}'", src.name);
            }
            if src.default_operation.trim().is_empty() {
                bail!("source '{}' has no default operation", src.name);
            }
            for rule in &src.operations {
                if rule.keywords.is_empty() {
                    bail!(
                        "source '{}': operation rule '{}' has no keywords",
                        src.name,
                        rule.operation
                    );
                }
            }
        }
        if self.get(&self.default_source).is_none() {
            bail!(
                "default source '{}' is not in the registry",
                self.default_source
            );
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn call_timeout_secs(&self) -> u64 {
        self.dispatch
            .call_timeout_secs
            .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS)
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
default_source = "nyc-311"

[[sources]]
name = "nyc-311"
address = "http://mcp-311:3000"
description = "NYC 311 service requests"
capabilities = ["complaints"]
keywords = ["311", "complaint"]
default_operation = "search_complaints"

[[sources.operations]]
operation = "analyze_trends"
keywords = ["trend"]
"#
    }

    #[test]
    fn parses_minimal_registry() {
        let reg: Registry = toml::from_str(minimal_toml()).unwrap();
        reg.validate().unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("nyc-311").unwrap().default_operation, "search_complaints");
        assert_eq!(reg.call_timeout_secs(), 5);
        assert_eq!(reg.default_limit(), 50);
    }

    #[test]
    fn rejects_unknown_default_source() {
        let toml_str = minimal_toml().replace("default_source = \"nyc-311\"", "default_source = \"nope\"");
        let reg: Registry = toml::from_str(&toml_str).unwrap();
        assert!(reg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_source_names() {
        let mut doubled = minimal_toml().to_string();
        doubled.push_str(
            r#"
[[sources]]
name = "nyc-311"
address = "http://other:3000"
description = "duplicate"
default_operation = "search"
"#,
        );
        let reg: Registry = toml::from_str(&doubled).unwrap();
        assert!(reg.validate().is_err());
    }

    #[test]
    fn rejects_operation_rule_without_keywords() {
        let toml_str = minimal_toml().replace("keywords = [\"trend\"]", "keywords = []");
        let reg: Registry = toml::from_str(&toml_str).unwrap();
        assert!(reg.validate().is_err());
    }
}
