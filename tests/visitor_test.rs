mod common;

use std::collections::BTreeMap;

use terracast::il::expr::{Expr, IrNode, ListProp, MapProp, TemplateExpr};
use terracast::il::ty::Type;
use terracast::il::visitor::{rewrite, visit_exprs};

fn sample_map() -> IrNode {
    let mut entries = BTreeMap::new();
    entries.insert("b".to_string(), IrNode::Expr(Expr::string("two")));
    entries.insert("a".to_string(), IrNode::Expr(Expr::number(1.0)));
    entries.insert(
        "c".to_string(),
        IrNode::List(ListProp {
            elems: vec![
                IrNode::Expr(Expr::bool(true)),
                IrNode::Expr(Expr::string("x")),
            ],
            ..ListProp::default()
        }),
    );
    IrNode::Map(MapProp {
        entries,
        ..MapProp::default()
    })
}

#[test]
fn identity_callbacks_preserve_the_tree() {
    let tree = sample_map();
    let copy = tree.clone();
    let result = rewrite(tree, &mut |n| Ok(Some(n)), &mut |n| Ok(Some(n)))
        .unwrap()
        .unwrap();
    assert_eq!(result, copy);
}

#[test]
fn returning_none_deletes_a_map_child() {
    let tree = sample_map();
    let result = rewrite(
        tree,
        &mut |n| Ok(Some(n)),
        &mut |n| match &n {
            IrNode::Expr(e) if e.ty() == Type::NUMBER => Ok(None),
            _ => Ok(Some(n)),
        },
    )
    .unwrap()
    .unwrap();

    let IrNode::Map(map) = result else {
        panic!("expected map");
    };
    assert!(!map.entries.contains_key("a"));
    assert!(map.entries.contains_key("b"));
}

#[test]
fn empty_all_nil_subtree_reports_nil_upward() {
    let list = IrNode::List(ListProp {
        elems: vec![
            IrNode::Expr(Expr::number(1.0)),
            IrNode::Expr(Expr::number(2.0)),
        ],
        ..ListProp::default()
    });
    let result = rewrite(
        list,
        &mut |n| Ok(Some(n)),
        &mut |n| match &n {
            IrNode::Expr(e) if e.ty() == Type::NUMBER => Ok(None),
            _ => Ok(Some(n)),
        },
    )
    .unwrap();
    assert!(result.is_none());
}

#[test]
fn template_drops_deleted_parts() {
    let template = IrNode::Expr(Expr::Template(TemplateExpr {
        ty: Type::STRING,
        comments: None,
        parts: vec![Expr::string("keep"), Expr::number(9.0)],
    }));
    let result = rewrite(
        template,
        &mut |n| Ok(Some(n)),
        &mut |n| match &n {
            IrNode::Expr(e) if e.ty() == Type::NUMBER => Ok(None),
            _ => Ok(Some(n)),
        },
    )
    .unwrap()
    .unwrap();

    let IrNode::Expr(Expr::Template(t)) = result else {
        panic!("expected template");
    };
    assert_eq!(t.parts.len(), 1);
}

#[test]
fn map_children_visit_in_sorted_key_order() {
    let tree = sample_map();
    let mut seen = Vec::new();
    let _ = rewrite(
        tree,
        &mut |n| {
            if let IrNode::Expr(e) = &n {
                seen.push(e.ty());
            }
            Ok(Some(n))
        },
        &mut |n| Ok(Some(n)),
    )
    .unwrap();
    // a (number) before b (string) before c's children.
    assert_eq!(
        seen,
        vec![Type::NUMBER, Type::STRING, Type::BOOL, Type::STRING]
    );
}

#[test]
fn errors_short_circuit_the_walk() {
    let tree = sample_map();
    let mut visited = 0;
    let result = rewrite(
        tree,
        &mut |n| {
            visited += 1;
            if visited == 2 {
                anyhow::bail!("stop");
            }
            Ok(Some(n))
        },
        &mut |n| Ok(Some(n)),
    );
    assert!(result.is_err());
    assert_eq!(visited, 2);
}

#[test]
fn visit_exprs_reaches_nested_expressions() {
    let tree = sample_map();
    let mut count = 0;
    visit_exprs(&tree, &mut |_| count += 1);
    assert_eq!(count, 4);
}
