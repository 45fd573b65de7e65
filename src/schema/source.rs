use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::schema::info::{builtin_provider, ProviderInfo};

// ─── Provider info source ───────────────────────────────────────────────────

/// Where provider schemas come from. The pipeline consumes providers only
/// through this operation; results are treated as immutable.
pub trait ProviderInfoSource {
    /// Resolve a provider by its Terraform name. Returns the info plus the
    /// canonical plugin name (usually the provider name itself).
    fn get_provider_info(&self, name: &str) -> Result<(Arc<ProviderInfo>, String)>;
}

/// Fetches provider info by launching the bridge plugin as a subprocess and
/// reading its JSON description from stdout. The subprocess lives for exactly
/// one request.
pub struct PluginSource {
    prefix: String,
}

/// The wire shape the plugin prints.
#[derive(serde::Deserialize)]
struct PluginPayload {
    #[serde(default)]
    plugin: Option<String>,
    #[serde(flatten)]
    info: ProviderInfo,
}

impl PluginSource {
    pub fn new() -> PluginSource {
        PluginSource {
            prefix: "pulumi-tfbridge".to_string(),
        }
    }

    pub fn with_prefix(prefix: &str) -> PluginSource {
        PluginSource {
            prefix: prefix.to_string(),
        }
    }
}

impl Default for PluginSource {
    fn default() -> Self {
        PluginSource::new()
    }
}

impl ProviderInfoSource for PluginSource {
    fn get_provider_info(&self, name: &str) -> Result<(Arc<ProviderInfo>, String)> {
        let binary = format!("{}-{}", self.prefix, name);
        tracing::debug!("Fetching provider schema via {}", binary);

        let output = Command::new(&binary)
            .arg("schema")
            .output()
            .with_context(|| format!("Failed to launch provider plugin: {}", binary))?;
        if !output.status.success() {
            bail!(
                "Provider plugin {} exited with {}: {}",
                binary,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let payload: PluginPayload = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Invalid schema JSON from {}", binary))?;
        let plugin = payload.plugin.unwrap_or_else(|| name.to_string());
        Ok((Arc::new(payload.info), plugin))
    }
}

/// A fixed in-memory source, used by tests and available for embedding.
#[derive(Default)]
pub struct StaticSource {
    providers: BTreeMap<String, Arc<ProviderInfo>>,
}

impl StaticSource {
    pub fn new() -> StaticSource {
        StaticSource::default()
    }

    pub fn insert(&mut self, info: ProviderInfo) {
        self.providers.insert(info.name.clone(), Arc::new(info));
    }
}

impl ProviderInfoSource for StaticSource {
    fn get_provider_info(&self, name: &str) -> Result<(Arc<ProviderInfo>, String)> {
        match self.providers.get(name) {
            Some(info) => Ok((Arc::clone(info), name.to_string())),
            None => bail!("No provider info registered for {:?}", name),
        }
    }
}

// ─── Per-process cache ──────────────────────────────────────────────────────

/// Caches `get_provider_info` results for the life of the process. The
/// built-in `archive`/`http` pseudo-providers are always served from here
/// without consulting the underlying source.
pub struct SchemaRegistry {
    source: Box<dyn ProviderInfoSource>,
    cache: BTreeMap<String, (Arc<ProviderInfo>, String)>,
}

impl SchemaRegistry {
    pub fn new(source: Box<dyn ProviderInfoSource>) -> SchemaRegistry {
        SchemaRegistry {
            source,
            cache: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, name: &str) -> Result<(Arc<ProviderInfo>, String)> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(hit.clone());
        }
        let entry = match builtin_provider(name) {
            Some(info) => (info, name.to_string()),
            None => self.source.get_provider_info(name)?,
        };
        self.cache.insert(name.to_string(), entry.clone());
        Ok(entry)
    }
}
