use anyhow::{bail, Result};

use crate::il::expr::{Expr, IrNode};
use crate::il::node::Node;

// ─── Rewriting traversal ────────────────────────────────────────────────────

/// Walk an IR subtree, applying `pre` on the way down and `post` on the way
/// up. Callbacks that return their input unchanged preserve the tree; a
/// callback returning `None` deletes that child from its list, map, or
/// template parent, and a parent whose children were all deleted reports
/// `None` itself. For scalar child positions (a conditional's legs, an index
/// target, a call argument) a deleted child deletes the whole parent. Errors
/// short-circuit the walk. Error nodes are opaque: their preserved subtree is
/// not visited.
pub fn rewrite<Pre, Post>(node: IrNode, pre: &mut Pre, post: &mut Post) -> Result<Option<IrNode>>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    let node = match pre(node)? {
        Some(n) => n,
        None => return Ok(None),
    };
    let node = match rewrite_children(node, pre, post)? {
        Some(n) => n,
        None => return Ok(None),
    };
    post(node)
}

/// Expression-typed wrapper around `rewrite`.
pub fn rewrite_expr<Pre, Post>(expr: Expr, pre: &mut Pre, post: &mut Post) -> Result<Option<Expr>>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    match rewrite(IrNode::Expr(expr), pre, post)? {
        Some(IrNode::Expr(e)) => Ok(Some(e)),
        Some(_) => bail!("rewrite produced a property in expression position"),
        None => Ok(None),
    }
}

fn rewrite_children<Pre, Post>(
    node: IrNode,
    pre: &mut Pre,
    post: &mut Post,
) -> Result<Option<IrNode>>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    match node {
        IrNode::List(mut list) => {
            let had_elems = !list.elems.is_empty();
            let mut elems = Vec::with_capacity(list.elems.len());
            for child in std::mem::take(&mut list.elems) {
                if let Some(child) = rewrite(child, pre, post)? {
                    elems.push(child);
                }
            }
            if had_elems && elems.is_empty() {
                return Ok(None);
            }
            list.elems = elems;
            Ok(Some(IrNode::List(list)))
        }
        IrNode::Map(mut map) => {
            let had_entries = !map.entries.is_empty();
            let mut entries = std::collections::BTreeMap::new();
            for (key, child) in std::mem::take(&mut map.entries) {
                if let Some(child) = rewrite(child, pre, post)? {
                    entries.insert(key, child);
                }
            }
            if had_entries && entries.is_empty() {
                return Ok(None);
            }
            map.entries = entries;
            Ok(Some(IrNode::Map(map)))
        }
        IrNode::Expr(expr) => Ok(rewrite_expr_children(expr, pre, post)?.map(IrNode::Expr)),
    }
}

fn rewrite_expr_children<Pre, Post>(
    expr: Expr,
    pre: &mut Pre,
    post: &mut Post,
) -> Result<Option<Expr>>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    match expr {
        Expr::Arith(mut e) => {
            for slot in &mut e.operands {
                match rewrite_expr(std::mem::replace(slot, Expr::bool(false)), pre, post)? {
                    Some(child) => *slot = child,
                    None => return Ok(None),
                }
            }
            Ok(Some(Expr::Arith(e)))
        }
        Expr::Call(mut e) => {
            for slot in &mut e.args {
                match rewrite_expr(std::mem::replace(slot, Expr::bool(false)), pre, post)? {
                    Some(child) => *slot = child,
                    None => return Ok(None),
                }
            }
            Ok(Some(Expr::Call(e)))
        }
        Expr::Cond(mut e) => {
            let cond = rewrite_expr(std::mem::replace(&mut e.cond, Expr::bool(false)), pre, post)?;
            let t = rewrite_expr(
                std::mem::replace(&mut e.true_expr, Expr::bool(false)),
                pre,
                post,
            )?;
            let f = rewrite_expr(
                std::mem::replace(&mut e.false_expr, Expr::bool(false)),
                pre,
                post,
            )?;
            match (cond, t, f) {
                (Some(cond), Some(t), Some(f)) => {
                    e.cond = cond;
                    e.true_expr = t;
                    e.false_expr = f;
                    Ok(Some(Expr::Cond(e)))
                }
                _ => Ok(None),
            }
        }
        Expr::Index(mut e) => {
            let target =
                rewrite_expr(std::mem::replace(&mut e.target, Expr::bool(false)), pre, post)?;
            let key = rewrite_expr(std::mem::replace(&mut e.key, Expr::bool(false)), pre, post)?;
            match (target, key) {
                (Some(target), Some(key)) => {
                    e.target = target;
                    e.key = key;
                    Ok(Some(Expr::Index(e)))
                }
                _ => Ok(None),
            }
        }
        Expr::Template(mut e) => {
            let had_parts = !e.parts.is_empty();
            let mut parts = Vec::with_capacity(e.parts.len());
            for part in std::mem::take(&mut e.parts) {
                if let Some(part) = rewrite_expr(part, pre, post)? {
                    parts.push(part);
                }
            }
            if had_parts && parts.is_empty() {
                return Ok(None);
            }
            e.parts = parts;
            Ok(Some(Expr::Template(e)))
        }
        Expr::PropValue(mut e) => {
            match rewrite(
                std::mem::replace(&mut e.value, IrNode::Expr(Expr::bool(false))),
                pre,
                post,
            )? {
                Some(value) => {
                    e.value = value;
                    Ok(Some(Expr::PropValue(e)))
                }
                None => Ok(None),
            }
        }
        // Leaves, and error nodes whose preserved subtree stays untouched.
        e @ (Expr::Lit(_) | Expr::Access(_) | Expr::Error(_)) => Ok(Some(e)),
    }
}

// ─── Read-only traversal ────────────────────────────────────────────────────

/// Invoke `f` on every expression in the subtree, in pre-order. Map children
/// are visited in sorted key order. Error nodes are opaque.
pub fn visit_exprs(node: &IrNode, f: &mut dyn FnMut(&Expr)) {
    match node {
        IrNode::Expr(e) => visit_expr(e, f),
        IrNode::List(l) => {
            for child in &l.elems {
                visit_exprs(child, f);
            }
        }
        IrNode::Map(m) => {
            for child in m.entries.values() {
                visit_exprs(child, f);
            }
        }
    }
}

fn visit_expr(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Arith(e) => {
            for operand in &e.operands {
                visit_expr(operand, f);
            }
        }
        Expr::Call(e) => {
            for arg in &e.args {
                visit_expr(arg, f);
            }
        }
        Expr::Cond(e) => {
            visit_expr(&e.cond, f);
            visit_expr(&e.true_expr, f);
            visit_expr(&e.false_expr, f);
        }
        Expr::Index(e) => {
            visit_expr(&e.target, f);
            visit_expr(&e.key, f);
        }
        Expr::Template(e) => {
            for part in &e.parts {
                visit_expr(part, f);
            }
        }
        Expr::PropValue(e) => visit_exprs(&e.value, f),
        Expr::Lit(_) | Expr::Access(_) | Expr::Error(_) => {}
    }
}

// ─── Per-node slot traversal ────────────────────────────────────────────────

/// Apply a rewrite to every bound IR slot of a top-level node: properties,
/// count, default, and value. Used by the graph-wide rewrites.
pub fn rewrite_node_irs<Pre, Post>(node: &mut Node, pre: &mut Pre, post: &mut Post) -> Result<()>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    match node {
        Node::Provider(n) => rewrite_map_slot(&mut n.properties, pre, post),
        Node::Resource(n) => {
            rewrite_map_slot(&mut n.properties, pre, post)?;
            if let Some(count) = n.count.take() {
                n.count = rewrite_expr(count, pre, post)?;
            }
            Ok(())
        }
        Node::Module(n) => rewrite_map_slot(&mut n.properties, pre, post),
        Node::Variable(n) => rewrite_value_slot(&mut n.default, pre, post),
        Node::Local(n) => rewrite_value_slot(&mut n.value, pre, post),
        Node::Output(n) => rewrite_value_slot(&mut n.value, pre, post),
    }
}

fn rewrite_map_slot<Pre, Post>(
    slot: &mut crate::il::expr::MapProp,
    pre: &mut Pre,
    post: &mut Post,
) -> Result<()>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    let map = std::mem::take(slot);
    match rewrite(IrNode::Map(map), pre, post)? {
        Some(IrNode::Map(map)) => {
            *slot = map;
            Ok(())
        }
        Some(_) => bail!("property rewrite changed node shape"),
        None => Ok(()),
    }
}

fn rewrite_value_slot<Pre, Post>(
    slot: &mut Option<IrNode>,
    pre: &mut Pre,
    post: &mut Post,
) -> Result<()>
where
    Pre: FnMut(IrNode) -> Result<Option<IrNode>>,
    Post: FnMut(IrNode) -> Result<Option<IrNode>>,
{
    if let Some(value) = slot.take() {
        *slot = rewrite(value, pre, post)?;
    }
    Ok(())
}

/// Invoke `f` on every expression bound anywhere in a node.
pub fn visit_node_exprs(node: &Node, f: &mut dyn FnMut(&Expr)) {
    let visit_map = |map: &crate::il::expr::MapProp, f: &mut dyn FnMut(&Expr)| {
        for child in map.entries.values() {
            visit_exprs(child, f);
        }
    };
    match node {
        Node::Provider(n) => visit_map(&n.properties, f),
        Node::Resource(n) => {
            visit_map(&n.properties, f);
            if let Some(count) = &n.count {
                visit_expr(count, f);
            }
        }
        Node::Module(n) => visit_map(&n.properties, f),
        Node::Variable(n) => {
            if let Some(v) = &n.default {
                visit_exprs(v, f);
            }
        }
        Node::Local(n) => {
            if let Some(v) = &n.value {
                visit_exprs(v, f);
            }
        }
        Node::Output(n) => {
            if let Some(v) = &n.value {
                visit_exprs(v, f);
            }
        }
    }
}
