use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

// ─── Terraform-side schema ──────────────────────────────────────────────────

/// The value kind a Terraform property schema declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    List,
    Set,
    Map,
}

/// A single Terraform property schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TfSchema {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default)]
    pub elem: Option<Elem>,
    #[serde(default)]
    pub max_items: usize,
    #[serde(default)]
    pub min_items: usize,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub computed: bool,
}

/// The element of a list/set/map schema: either a scalar schema or a nested
/// resource (block).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Elem {
    Schema {
        #[serde(flatten)]
        schema: Arc<TfSchema>,
    },
    Resource {
        #[serde(flatten)]
        resource: Arc<TfResource>,
    },
}

/// A Terraform resource schema: a named bag of property schemas.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TfResource {
    #[serde(default)]
    pub schema: BTreeMap<String, Arc<TfSchema>>,
}

// ─── Pulumi-side mapping info ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Asset,
    Archive,
}

/// Marks a string-typed property as holding an asset or archive, with the
/// name of the companion hash field the rewrite removes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetInfo {
    pub kind: AssetKind,
    #[serde(default)]
    pub hash_field: Option<String>,
}

/// Pulumi-side info for a single property: rename, asset marker, projection
/// override, and nested field infos.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FieldInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset: Option<AssetInfo>,
    #[serde(default)]
    pub max_items_one: Option<bool>,
    #[serde(default)]
    pub elem: Option<Arc<FieldInfo>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Arc<FieldInfo>>,
}

/// A resource or data-source mapping: the Pulumi token, the Terraform schema,
/// and per-field info.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceInfo {
    /// Pulumi type token, e.g. `aws:ec2/vpc:Vpc` or `aws:index/getAmi:getAmi`.
    pub tok: String,
    #[serde(default)]
    pub schema: Arc<TfResource>,
    #[serde(default)]
    pub info: Arc<FieldInfo>,
}

/// Everything a provider exports: managed resources and data sources.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(default)]
    pub resources: BTreeMap<String, Arc<ResourceInfo>>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, Arc<ResourceInfo>>,
}

impl ProviderInfo {
    /// Look up a managed resource or data source by its Terraform type name.
    pub fn resource(&self, type_name: &str, data: bool) -> Option<&Arc<ResourceInfo>> {
        if data {
            self.data_sources.get(type_name)
        } else {
            self.resources.get(type_name)
        }
    }
}

impl ResourceInfo {
    /// The Pulumi type name, e.g. `Vpc` from `aws:ec2/vpc:Vpc`.
    pub fn type_name(&self) -> &str {
        self.tok.rsplit(':').next().unwrap_or(&self.tok)
    }

    /// The Pulumi module, e.g. `ec2` from `aws:ec2/vpc:Vpc`.
    pub fn module(&self) -> &str {
        self.tok
            .split(':')
            .nth(1)
            .map(|m| m.split('/').next().unwrap_or(m))
            .unwrap_or("")
    }

    /// The Pulumi package, e.g. `aws` from `aws:ec2/vpc:Vpc`.
    pub fn package(&self) -> &str {
        self.tok.split(':').next().unwrap_or(&self.tok)
    }
}

// ─── Built-in pseudo-providers ──────────────────────────────────────────────

fn attr(kind: ValueKind, required: bool) -> Arc<TfSchema> {
    Arc::new(TfSchema {
        kind,
        elem: None,
        max_items: 0,
        min_items: 0,
        optional: !required,
        required,
        computed: false,
    })
}

fn computed(kind: ValueKind) -> Arc<TfSchema> {
    Arc::new(TfSchema {
        kind,
        elem: None,
        max_items: 0,
        min_items: 0,
        optional: false,
        required: false,
        computed: true,
    })
}

fn archive_file_schema() -> Arc<TfResource> {
    let mut schema = BTreeMap::new();
    schema.insert("type".to_string(), attr(ValueKind::String, true));
    schema.insert("source_file".to_string(), attr(ValueKind::String, false));
    schema.insert("source_dir".to_string(), attr(ValueKind::String, false));
    schema.insert("source_content".to_string(), attr(ValueKind::String, false));
    schema.insert(
        "source_content_filename".to_string(),
        attr(ValueKind::String, false),
    );
    schema.insert("output_path".to_string(), attr(ValueKind::String, true));
    schema.insert(
        "output_base64sha256".to_string(),
        computed(ValueKind::String),
    );
    schema.insert("output_size".to_string(), computed(ValueKind::Int));
    Arc::new(TfResource { schema })
}

fn http_schema() -> Arc<TfResource> {
    let mut schema = BTreeMap::new();
    schema.insert("url".to_string(), attr(ValueKind::String, true));
    schema.insert("request_headers".to_string(), attr(ValueKind::Map, false));
    schema.insert("body".to_string(), computed(ValueKind::String));
    Arc::new(TfResource { schema })
}

/// Info for the `archive` and `http` pseudo-providers, always available
/// without an out-of-process fetch. Archive resources are emitted as assets;
/// http data sources become HTTP-client calls.
pub fn builtin_provider(name: &str) -> Option<Arc<ProviderInfo>> {
    match name {
        "archive" => {
            let file = Arc::new(ResourceInfo {
                tok: "archive:index/getFile:getFile".to_string(),
                schema: archive_file_schema(),
                info: Arc::new(FieldInfo::default()),
            });
            let mut resources = BTreeMap::new();
            resources.insert(
                "archive_file".to_string(),
                Arc::new(ResourceInfo {
                    tok: "archive:index/file:File".to_string(),
                    schema: archive_file_schema(),
                    info: Arc::new(FieldInfo::default()),
                }),
            );
            let mut data_sources = BTreeMap::new();
            data_sources.insert("archive_file".to_string(), file);
            Some(Arc::new(ProviderInfo {
                name: "archive".to_string(),
                resources,
                data_sources,
            }))
        }
        "http" => {
            let mut data_sources = BTreeMap::new();
            data_sources.insert(
                "http".to_string(),
                Arc::new(ResourceInfo {
                    tok: "http:index/getHttp:getHttp".to_string(),
                    schema: http_schema(),
                    info: Arc::new(FieldInfo::default()),
                }),
            );
            Some(Arc::new(ProviderInfo {
                name: "http".to_string(),
                resources: BTreeMap::new(),
                data_sources,
            }))
        }
        _ => None,
    }
}
