use anyhow::Result;

use crate::il::expr::{Expr, IrNode, LitValue};
use crate::il::intrinsics;
use crate::il::node::Graph;
use crate::il::ty::Type;
use crate::il::visitor::rewrite_node_irs;
use crate::rewrite::paths::take_node;

/// Insert explicit coercions where a list or map child's type disagrees with
/// the schema's expected element type. Literals are converted statically;
/// everything else is wrapped in a `__coerce` intrinsic carrying the
/// destination type. Only the bool/number/string triple participates, so a
/// re-run finds every child already at its context type and inserts nothing.
pub fn insert_coercions(graph: &mut Graph) -> Result<()> {
    for id in graph.node_ids().collect::<Vec<_>>() {
        let mut node = take_node(graph, id);
        rewrite_node_irs(
            &mut node,
            &mut |n| Ok(Some(n)),
            &mut |n| Ok(Some(coerce_children(n))),
        )?;
        *graph.node_mut(id) = node;
    }
    Ok(())
}

fn coerce_children(node: IrNode) -> IrNode {
    match node {
        IrNode::List(mut list) => {
            let expected = list.schemas.elem_schemas().type_();
            if expected.is_scalar() {
                list.elems = list
                    .elems
                    .into_iter()
                    .map(|child| coerce_child(child, expected))
                    .collect();
            }
            IrNode::List(list)
        }
        IrNode::Map(mut map) => {
            let schemas = map.schemas.clone();
            map.entries = map
                .entries
                .into_iter()
                .map(|(key, child)| {
                    let expected = schemas.property_schemas(&key).type_();
                    let child = if expected.is_scalar() {
                        coerce_child(child, expected)
                    } else {
                        child
                    };
                    (key, child)
                })
                .collect();
            IrNode::Map(map)
        }
        other => other,
    }
}

fn coerce_child(child: IrNode, expected: Type) -> IrNode {
    let IrNode::Expr(expr) = child else {
        return child;
    };
    if !expr.ty().is_scalar() || expr.ty() == expected {
        return IrNode::Expr(expr);
    }
    IrNode::Expr(coerce_expr(expr, expected))
}

/// Convert a literal statically when its canonical form is known; otherwise
/// defer to a runtime coercion.
fn coerce_expr(expr: Expr, expected: Type) -> Expr {
    if let Expr::Lit(lit) = &expr {
        if let Some(converted) = static_coerce(&lit.value, expected) {
            return converted;
        }
    }
    intrinsics::coerce(expr, expected)
}

fn static_coerce(value: &LitValue, expected: Type) -> Option<Expr> {
    match (value, expected) {
        (LitValue::Bool(b), Type::STRING) => Some(Expr::string(if *b { "true" } else { "false" })),
        (LitValue::Bool(b), Type::NUMBER) => Some(Expr::number(if *b { 1.0 } else { 0.0 })),
        (LitValue::Number(n), Type::STRING) => Some(Expr::string(format_number(*n))),
        (LitValue::Number(n), Type::BOOL) => Some(Expr::bool(*n != 0.0)),
        (LitValue::String(s), Type::NUMBER) => {
            s.trim().parse::<f64>().ok().map(Expr::number)
        }
        (LitValue::String(s), Type::BOOL) => match s.trim() {
            "true" | "1" => Some(Expr::bool(true)),
            "false" | "0" => Some(Expr::bool(false)),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bool_to_string_uses_canonical_forms() {
        assert_eq!(
            static_coerce(&LitValue::Bool(true), Type::STRING),
            Some(Expr::string("true"))
        );
        assert_eq!(
            static_coerce(&LitValue::Bool(false), Type::STRING),
            Some(Expr::string("false"))
        );
    }

    #[test]
    fn static_number_to_string_is_integral_when_exact() {
        assert_eq!(
            static_coerce(&LitValue::Number(3.0), Type::STRING),
            Some(Expr::string("3"))
        );
        assert_eq!(
            static_coerce(&LitValue::Number(2.5), Type::STRING),
            Some(Expr::string("2.5"))
        );
    }

    #[test]
    fn unparseable_string_to_number_stays_dynamic() {
        assert_eq!(static_coerce(&LitValue::String("abc".into()), Type::NUMBER), None);
    }
}
