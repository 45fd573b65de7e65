use std::collections::BTreeSet;

use anyhow::Result;

use crate::il::expr::{AccessKind, Expr, IrNode, ResourceMode};
use crate::il::node::{Graph, Node, NodeId};
use crate::il::visitor::{rewrite_node_irs, visit_node_exprs};
use crate::rewrite::paths::take_node;

/// Mark data sources whose inputs carry no outputs as prompt, and drop the
/// output flag from accesses rooted at them. Iterates to a fixed point; each
/// round only removes output flags, so the iteration converges.
pub fn mark_prompt_data_sources(graph: &mut Graph) -> Result<()> {
    loop {
        let mut changed = false;

        // Newly prompt data sources this round.
        let mut promoted: Vec<NodeId> = Vec::new();
        for id in graph.node_ids().collect::<Vec<_>>() {
            let node = graph.node(id);
            let Node::Resource(resource) = node else {
                continue;
            };
            if resource.mode != ResourceMode::Data || resource.is_prompt {
                continue;
            }
            let mut has_outputs = false;
            visit_node_exprs(node, &mut |e| {
                if e.ty().is_output() {
                    has_outputs = true;
                }
            });
            if !has_outputs {
                promoted.push(id);
            }
        }
        for &id in &promoted {
            if let Some(resource) = graph.node_mut(id).as_resource_mut() {
                resource.is_prompt = true;
                changed = true;
            }
        }

        // Every prompt data source seen so far re-types accesses to it.
        let prompt: BTreeSet<NodeId> = graph
            .node_ids()
            .filter(|&id| {
                graph
                    .node(id)
                    .as_resource()
                    .map(|r| r.is_prompt)
                    .unwrap_or(false)
            })
            .collect();

        for id in graph.node_ids().collect::<Vec<_>>() {
            let mut node = take_node(graph, id);
            let mut retyped = false;
            rewrite_node_irs(
                &mut node,
                &mut |n| Ok(Some(n)),
                &mut |n| match n {
                    IrNode::Expr(Expr::Access(mut access)) => {
                        let is_prompt_target = matches!(
                            access.kind,
                            AccessKind::Resource {
                                mode: ResourceMode::Data,
                                ..
                            }
                        ) && access
                            .target
                            .map(|t| prompt.contains(&t))
                            .unwrap_or(false);
                        if is_prompt_target && access.ty.is_output() {
                            access.ty = access.ty.strip_output();
                            retyped = true;
                        }
                        Ok(Some(IrNode::Expr(Expr::Access(access))))
                    }
                    other => Ok(Some(other)),
                },
            )?;
            *graph.node_mut(id) = node;
            changed |= retyped;
        }

        if !changed {
            return Ok(());
        }
    }
}
