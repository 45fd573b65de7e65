use anyhow::Result;

use crate::il::expr::{Expr, IrNode};
use crate::il::intrinsics;
use crate::il::node::{Graph, Node};
use crate::schema::AssetKind;

/// Replace string-typed properties that the target-language schema marks as
/// assets or archives with explicit asset intrinsics. A reference into an
/// `archive` built-in resource is stripped to the bare reference (the archive
/// resource itself is emitted as an asset); anything else is wrapped in
/// `__asset` or `__archive`. The declared hash companion field, if any, is
/// removed afterwards.
pub fn lift_assets(graph: &mut Graph) -> Result<()> {
    let resource_ids: Vec<_> = graph
        .node_ids()
        .filter(|&id| graph.node(id).as_resource().is_some())
        .collect();

    for id in resource_ids {
        let mut properties = match graph.node_mut(id) {
            Node::Resource(resource) => std::mem::take(&mut resource.properties),
            _ => continue,
        };

        let keys: Vec<String> = properties.entries.keys().cloned().collect();
        let mut hash_fields = Vec::new();

        for key in keys {
            let view = properties.schemas.property_schemas(&key);
            let Some(asset) = view.info.as_ref().and_then(|i| i.asset.clone()) else {
                continue;
            };

            let Some(value) = properties.entries.remove(&key) else {
                continue;
            };
            let rewritten = match value {
                IrNode::Expr(expr) => IrNode::Expr(rewrite_asset_value(graph, expr, asset.kind)),
                other => other,
            };
            properties.entries.insert(key, rewritten);

            if let Some(hash_field) = asset.hash_field {
                hash_fields.push(hash_field);
            }
        }

        for hash_field in hash_fields {
            properties.entries.remove(&hash_field);
        }

        if let Node::Resource(resource) = graph.node_mut(id) {
            resource.properties = properties;
        }
    }
    Ok(())
}

fn rewrite_asset_value(graph: &Graph, expr: Expr, kind: AssetKind) -> Expr {
    // Already lifted on a previous pass.
    if let Expr::Call(call) = &expr {
        if call.name == intrinsics::ASSET || call.name == intrinsics::ARCHIVE {
            return expr;
        }
    }

    if let Expr::Access(access) = &expr {
        let archive_target = access
            .target
            .and_then(|t| graph.node(t).as_resource())
            .map(|r| r.type_name.starts_with("archive_"))
            .unwrap_or(false);
        if archive_target {
            // The archive resource emits as an asset already; drop the field
            // path so the property references it directly.
            let mut stripped = access.clone();
            stripped.path = Vec::new();
            stripped.ty = stripped.ty.strip_output().element_type();
            return Expr::Access(stripped);
        }
    }

    match kind {
        AssetKind::Asset => intrinsics::asset(expr),
        AssetKind::Archive => intrinsics::archive(expr),
    }
}
