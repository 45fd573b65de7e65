use std::path::Path;

use anyhow::Result;

use crate::il::expr::{AccessKind, Expr, IrNode, PathKind};
use crate::il::node::{Graph, ModuleId, Node};
use crate::il::visitor::rewrite_node_irs;

/// Lower `path.module` and `path.root` accesses to literal strings: the
/// module's directory relative to the root module, and `"."` respectively.
/// `path.cwd` stays an access for the emitter. Applying the pass twice is a
/// no-op because the produced literals are no longer accesses.
pub fn lower_path_literals(graph: &mut Graph) -> Result<()> {
    let root_dir = graph.root().dir.clone();

    for module_id in graph.module_ids().collect::<Vec<_>>() {
        let module_path = relative_path(&root_dir, &graph.module(module_id).dir);
        for id in module_node_ids(graph, module_id) {
            let mut node = take_node(graph, id);
            rewrite_node_irs(
                &mut node,
                &mut |n| Ok(Some(n)),
                &mut |n| {
                    if let IrNode::Expr(Expr::Access(access)) = &n {
                        match access.kind {
                            AccessKind::Path(PathKind::Module) => {
                                return Ok(Some(IrNode::Expr(Expr::string(module_path.clone()))));
                            }
                            AccessKind::Path(PathKind::Root) => {
                                return Ok(Some(IrNode::Expr(Expr::string("."))));
                            }
                            _ => {}
                        }
                    }
                    Ok(Some(n))
                },
            )?;
            *graph.node_mut(id) = node;
        }
    }
    Ok(())
}

fn relative_path(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => format!("./{}", rel.display()),
        Err(_) => dir.display().to_string(),
    }
}

pub(crate) fn module_node_ids(graph: &Graph, module_id: ModuleId) -> Vec<crate::il::node::NodeId> {
    graph.module(module_id).node_ids()
}

/// Swap a node out of the arena for in-place rewriting.
pub(crate) fn take_node(graph: &mut Graph, id: crate::il::node::NodeId) -> Node {
    std::mem::replace(
        graph.node_mut(id),
        Node::Local(crate::il::node::LocalNode {
            name: String::new(),
            value: None,
            deps: Vec::new(),
            comments: None,
        }),
    )
}
