use anyhow::Result;

use crate::il::expr::{
    AccessExpr, AccessKind, CondExpr, Expr, IndexExpr, Instancing, IrNode, ListProp, MapProp,
    ResourceMode,
};
use crate::il::intrinsics;
use crate::il::node::{Graph, Node};
use crate::rewrite::paths::take_node;

/// Lift output-bearing expression trees into `__apply` intrinsics so the
/// emitted program can consume them synchronously inside one continuation.
///
/// Every expression root (a property value, a local or output value, a count,
/// or an argument of an asset intrinsic) is rewritten independently: its
/// output-typed accesses are collected as apply arguments and replaced by
/// `__applyArg(i)` placeholders, and the root is wrapped in
/// `__apply(args…, root)` when at least one argument was collected.
pub fn lift_applies(graph: &mut Graph) -> Result<()> {
    for id in graph.node_ids().collect::<Vec<_>>() {
        let mut node = take_node(graph, id);
        match &mut node {
            Node::Provider(n) => rewrite_map(&mut n.properties)?,
            Node::Resource(n) => {
                rewrite_map(&mut n.properties)?;
                if let Some(count) = n.count.take() {
                    n.count = Some(rewrite_root(count)?);
                }
            }
            Node::Module(n) => rewrite_map(&mut n.properties)?,
            Node::Variable(n) => rewrite_value(&mut n.default)?,
            Node::Local(n) => rewrite_value(&mut n.value)?,
            Node::Output(n) => rewrite_value(&mut n.value)?,
        }
        *graph.node_mut(id) = node;
    }
    Ok(())
}

fn rewrite_value(slot: &mut Option<IrNode>) -> Result<()> {
    if let Some(value) = slot.take() {
        *slot = Some(rewrite_ir(value)?);
    }
    Ok(())
}

fn rewrite_map(map: &mut MapProp) -> Result<()> {
    let entries = std::mem::take(&mut map.entries);
    for (key, value) in entries {
        map.entries.insert(key, rewrite_ir(value)?);
    }
    Ok(())
}

fn rewrite_list(list: &mut ListProp) -> Result<()> {
    let elems = std::mem::take(&mut list.elems);
    for value in elems {
        list.elems.push(rewrite_ir(value)?);
    }
    Ok(())
}

/// Each expression directly under a property is a root; nested properties
/// recurse.
fn rewrite_ir(node: IrNode) -> Result<IrNode> {
    match node {
        IrNode::Expr(e) => Ok(IrNode::Expr(rewrite_root(e)?)),
        IrNode::List(mut list) => {
            rewrite_list(&mut list)?;
            Ok(IrNode::List(list))
        }
        IrNode::Map(mut map) => {
            rewrite_map(&mut map)?;
            Ok(IrNode::Map(map))
        }
    }
}

/// Rewrite one root expression.
fn rewrite_root(expr: Expr) -> Result<Expr> {
    if !contains_outputs(&expr) {
        return Ok(expr);
    }

    // A bare access at the root: plain top-level fields of managed resources
    // (and splats) are consumed directly; data-source fields and nested
    // managed fields synthesise a wrapping apply so the continuation walks
    // the resolved value.
    if let Expr::Access(access) = &expr {
        if access.ty.is_output() && needs_root_apply(access) {
            let stripped_ty = access.ty.strip_output();
            let arg = (**access).clone();
            return Ok(intrinsics::apply(
                vec![Expr::Access(Box::new(arg))],
                intrinsics::apply_arg(0, stripped_ty),
            ));
        }
        return Ok(expr);
    }

    let mut args: Vec<AccessExpr> = Vec::new();
    let body = collect(expr, &mut args)?;
    if args.is_empty() {
        return Ok(body);
    }
    Ok(intrinsics::apply(
        args.into_iter()
            .map(|a| Expr::Access(Box::new(a)))
            .collect(),
        body,
    ))
}

fn needs_root_apply(access: &AccessExpr) -> bool {
    match &access.kind {
        AccessKind::Resource {
            mode: ResourceMode::Data,
            ..
        } => true,
        AccessKind::Resource {
            mode: ResourceMode::Managed,
            instancing,
        } => access.path.len() > 1 && *instancing != Instancing::Splat,
        _ => false,
    }
}

/// Post-order argument collection: output-typed accesses below the root are
/// appended to the argument list (deduplicated structurally) and replaced by
/// placeholders typed with the output stripped. Asset intrinsic arguments are
/// independent roots; error nodes are opaque.
fn collect(expr: Expr, args: &mut Vec<AccessExpr>) -> Result<Expr> {
    match expr {
        Expr::Access(access) => {
            if access.ty.is_output() {
                let stripped = access.ty.strip_output();
                let index = match args.iter().position(|a| a.same_target(&access)) {
                    Some(index) => index,
                    None => {
                        args.push(*access);
                        args.len() - 1
                    }
                };
                Ok(intrinsics::apply_arg(index, stripped))
            } else {
                Ok(Expr::Access(access))
            }
        }
        Expr::Call(mut call) => {
            if call.name == intrinsics::ASSET || call.name == intrinsics::ARCHIVE {
                let mut rewritten = Vec::with_capacity(call.args.len());
                for arg in call.args {
                    rewritten.push(rewrite_root(arg)?);
                }
                call.args = rewritten;
                return Ok(Expr::Call(call));
            }
            let mut rewritten = Vec::with_capacity(call.args.len());
            for arg in call.args {
                rewritten.push(collect(arg, args)?);
            }
            call.args = rewritten;
            Ok(Expr::Call(call))
        }
        Expr::Arith(mut e) => {
            let operands = std::mem::take(&mut e.operands);
            for operand in operands {
                e.operands.push(collect(operand, args)?);
            }
            Ok(Expr::Arith(e))
        }
        Expr::Cond(e) => {
            let CondExpr {
                ty,
                comments,
                cond,
                true_expr,
                false_expr,
            } = *e;
            Ok(Expr::Cond(Box::new(CondExpr {
                ty,
                comments,
                cond: collect(cond, args)?,
                true_expr: collect(true_expr, args)?,
                false_expr: collect(false_expr, args)?,
            })))
        }
        Expr::Index(e) => {
            let IndexExpr {
                ty,
                comments,
                target,
                key,
            } = *e;
            Ok(Expr::Index(Box::new(IndexExpr {
                ty,
                comments,
                target: collect(target, args)?,
                key: collect(key, args)?,
            })))
        }
        Expr::Template(mut e) => {
            let parts = std::mem::take(&mut e.parts);
            for part in parts {
                e.parts.push(collect(part, args)?);
            }
            Ok(Expr::Template(e))
        }
        Expr::PropValue(e) => {
            let crate::il::expr::PropValueExpr { ty, comments, value } = *e;
            Ok(Expr::PropValue(Box::new(crate::il::expr::PropValueExpr {
                ty,
                comments,
                value: collect_ir(value, args)?,
            })))
        }
        e @ (Expr::Lit(_) | Expr::Error(_)) => Ok(e),
    }
}

fn collect_ir(node: IrNode, args: &mut Vec<AccessExpr>) -> Result<IrNode> {
    match node {
        IrNode::Expr(e) => Ok(IrNode::Expr(collect(e, args)?)),
        IrNode::List(mut list) => {
            let elems = std::mem::take(&mut list.elems);
            for elem in elems {
                list.elems.push(collect_ir(elem, args)?);
            }
            Ok(IrNode::List(list))
        }
        IrNode::Map(mut map) => {
            let entries = std::mem::take(&mut map.entries);
            for (key, value) in entries {
                map.entries.insert(key, collect_ir(value, args)?);
            }
            Ok(IrNode::Map(map))
        }
    }
}

/// An expression is output-bearing when any access in it is output-typed.
pub fn contains_outputs(expr: &Expr) -> bool {
    match expr {
        Expr::Access(access) => access.ty.is_output(),
        Expr::Arith(e) => e.operands.iter().any(contains_outputs),
        Expr::Call(e) => e.args.iter().any(contains_outputs),
        Expr::Cond(e) => {
            contains_outputs(&e.cond)
                || contains_outputs(&e.true_expr)
                || contains_outputs(&e.false_expr)
        }
        Expr::Index(e) => contains_outputs(&e.target) || contains_outputs(&e.key),
        Expr::Template(e) => e.parts.iter().any(contains_outputs),
        Expr::PropValue(e) => ir_contains_outputs(&e.value),
        Expr::Lit(_) | Expr::Error(_) => false,
    }
}

fn ir_contains_outputs(node: &IrNode) -> bool {
    match node {
        IrNode::Expr(e) => contains_outputs(e),
        IrNode::List(l) => l.elems.iter().any(ir_contains_outputs),
        IrNode::Map(m) => m.entries.values().any(ir_contains_outputs),
    }
}
