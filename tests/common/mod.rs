#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use terracast::bind::{build_graph, BuildOptions};
use terracast::config::load_module_tree;
use terracast::emit::emit_program;
use terracast::il::node::Graph;
use terracast::rewrite::rewrite_graph;
use terracast::schema::{
    AssetInfo, AssetKind, Elem, FieldInfo, ProviderInfo, ResourceInfo, SchemaRegistry,
    StaticSource, TfResource, TfSchema, ValueKind,
};

// ─── Schema fixture ──────────────────────────────────────────────────────────

fn attr(kind: ValueKind) -> Arc<TfSchema> {
    Arc::new(TfSchema {
        kind,
        elem: None,
        max_items: 0,
        min_items: 0,
        optional: true,
        required: false,
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

fn string_list() -> Arc<TfSchema> {
    Arc::new(TfSchema {
        kind: ValueKind::List,
        elem: Some(Elem::Schema {
            schema: attr(ValueKind::String),
        }),
        max_items: 0,
        min_items: 0,
        optional: true,
        required: false,
        computed: false,
    })
}

fn block(fields: Vec<(&str, Arc<TfSchema>)>, max_items: usize) -> Arc<TfSchema> {
    Arc::new(TfSchema {
        kind: ValueKind::List,
        elem: Some(Elem::Resource {
            resource: resource_schema(fields),
        }),
        max_items,
        min_items: 0,
        optional: true,
        required: false,
        computed: false,
    })
}

fn resource_schema(fields: Vec<(&str, Arc<TfSchema>)>) -> Arc<TfResource> {
    Arc::new(TfResource {
        schema: fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    })
}

fn resource_info(tok: &str, schema: Arc<TfResource>, info: FieldInfo) -> Arc<ResourceInfo> {
    Arc::new(ResourceInfo {
        tok: tok.to_string(),
        schema,
        info: Arc::new(info),
    })
}

/// An aws-like provider with the handful of resource shapes the suites need.
pub fn aws_provider() -> ProviderInfo {
    let vpc = resource_info(
        "aws:ec2/vpc:Vpc",
        resource_schema(vec![
            ("id", computed(ValueKind::String)),
            ("cidr_block", attr(ValueKind::String)),
            ("enable_dns_support", attr(ValueKind::Bool)),
            ("tags", attr(ValueKind::Map)),
        ]),
        FieldInfo::default(),
    );

    let subnet = resource_info(
        "aws:ec2/subnet:Subnet",
        resource_schema(vec![
            ("id", computed(ValueKind::String)),
            ("vpc_id", attr(ValueKind::String)),
            ("cidr_block", attr(ValueKind::String)),
        ]),
        FieldInfo::default(),
    );

    let instance = resource_info(
        "aws:ec2/instance:Instance",
        resource_schema(vec![
            ("id", computed(ValueKind::String)),
            ("ami", attr(ValueKind::String)),
            ("instance_type", attr(ValueKind::String)),
            ("user_data", attr(ValueKind::String)),
            ("tags", attr(ValueKind::Map)),
            ("security_groups", string_list()),
            (
                "root_block_device",
                block(
                    vec![
                        ("volume_size", attr(ValueKind::Int)),
                        ("volume_type", attr(ValueKind::String)),
                    ],
                    1,
                ),
            ),
        ]),
        FieldInfo::default(),
    );

    let mut lambda_fields = BTreeMap::new();
    lambda_fields.insert(
        "filename".to_string(),
        Arc::new(FieldInfo {
            asset: Some(AssetInfo {
                kind: AssetKind::Archive,
                hash_field: Some("source_code_hash".to_string()),
            }),
            ..FieldInfo::default()
        }),
    );
    let lambda = resource_info(
        "aws:lambda/function:Function",
        resource_schema(vec![
            ("id", computed(ValueKind::String)),
            ("function_name", attr(ValueKind::String)),
            ("filename", attr(ValueKind::String)),
            ("source_code_hash", attr(ValueKind::String)),
            ("runtime", attr(ValueKind::String)),
        ]),
        FieldInfo {
            fields: lambda_fields,
            ..FieldInfo::default()
        },
    );

    let ami = resource_info(
        "aws:index/getAmi:getAmi",
        resource_schema(vec![
            ("id", computed(ValueKind::String)),
            ("most_recent", attr(ValueKind::Bool)),
            ("owners", string_list()),
            ("name_regex", attr(ValueKind::String)),
        ]),
        FieldInfo::default(),
    );

    let mut resources = BTreeMap::new();
    resources.insert("aws_vpc".to_string(), vpc);
    resources.insert("aws_subnet".to_string(), subnet);
    resources.insert("aws_instance".to_string(), instance);
    resources.insert("aws_lambda_function".to_string(), lambda);

    let mut data_sources = BTreeMap::new();
    data_sources.insert("aws_ami".to_string(), ami);

    ProviderInfo {
        name: "aws".to_string(),
        resources,
        data_sources,
    }
}

pub fn registry() -> SchemaRegistry {
    let mut source = StaticSource::new();
    source.insert(aws_provider());
    SchemaRegistry::new(Box::new(source))
}

// ─── Pipeline helpers ────────────────────────────────────────────────────────

pub fn write_config(dir: &Path, hcl: &str) {
    std::fs::write(dir.join("main.tf"), hcl).expect("write main.tf");
}

pub fn bind_str(hcl: &str) -> Graph {
    bind_str_with(hcl, &BuildOptions {
        allow_missing_comments: true,
        ..BuildOptions::default()
    })
}

pub fn bind_str_with(hcl: &str, options: &BuildOptions) -> Graph {
    try_bind_str_with(hcl, options).expect("graph should bind")
}

pub fn try_bind_str(hcl: &str) -> anyhow::Result<Graph> {
    try_bind_str_with(
        hcl,
        &BuildOptions {
            allow_missing_comments: true,
            ..BuildOptions::default()
        },
    )
}

pub fn try_bind_str_with(hcl: &str, options: &BuildOptions) -> anyhow::Result<Graph> {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(dir.path(), hcl);
    let tree = load_module_tree(dir.path())?;
    let mut registry = registry();
    build_graph(&tree, options, &mut registry)
}

/// Bind, rewrite, and emit in one go.
pub fn convert(hcl: &str) -> String {
    let mut graph = bind_str(hcl);
    rewrite_graph(&mut graph).expect("rewrites should succeed");
    emit_program(&graph).expect("emission should succeed")
}

pub fn rewritten(hcl: &str) -> Graph {
    let mut graph = bind_str(hcl);
    rewrite_graph(&mut graph).expect("rewrites should succeed");
    graph
}
