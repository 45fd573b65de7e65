mod common;

use common::rewritten;
use terracast::il::expr::{Expr, IrNode};
use terracast::il::intrinsics;
use terracast::il::node::{Graph, Node};
use terracast::il::visitor::visit_node_exprs;

fn output_expr<'g>(graph: &'g Graph, name: &str) -> &'g Expr {
    let id = graph.root().outputs[name];
    match graph.node(id) {
        Node::Output(output) => output
            .value
            .as_ref()
            .and_then(IrNode::as_expr)
            .expect("expression output"),
        _ => panic!("not an output"),
    }
}

/// No output-typed access may survive anywhere but as an immediate argument
/// of an apply (or as a whole root access, which emits directly).
fn assert_no_stray_outputs(graph: &Graph) {
    for id in graph.node_ids() {
        let node = graph.node(id);
        let mut stack_ok = Vec::new();
        visit_node_exprs(node, &mut |e| {
            if let Expr::Call(call) = e {
                if let Some((args, _)) = intrinsics::match_apply(call) {
                    for arg in args {
                        if let Expr::Access(access) = arg {
                            stack_ok.push(access.clone());
                        }
                    }
                }
            }
        });
        visit_node_exprs(node, &mut |e| {
            if let Expr::Call(call) = e {
                for arg in &call.args {
                    check_no_nested_outputs(arg, &stack_ok, call.name == "__apply");
                }
            }
        });
    }
}

fn check_no_nested_outputs(
    expr: &Expr,
    allowed: &[Box<terracast::il::expr::AccessExpr>],
    in_apply_args: bool,
) {
    if let Expr::Access(access) = expr {
        if access.ty.is_output() && !in_apply_args {
            let permitted = allowed.iter().any(|a| a.same_target(access));
            assert!(
                permitted,
                "stray output-typed access inside an expression: {:?}",
                access.path
            );
        }
    }
}

#[test]
fn multi_output_template_lifts_into_all_apply() {
    let graph = rewritten(
        r#"
resource "aws_vpc" "default" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "main" {
  vpc_id = "${aws_vpc.default.id}"
}

output "value" {
  value = "${aws_vpc.default.id} ${aws_subnet.main.id}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "value") else {
        panic!("expected apply call");
    };
    let (args, then) = intrinsics::match_apply(call).expect("apply intrinsic");
    assert_eq!(args.len(), 2);
    assert!(call.ty.is_output());

    // The continuation is the original template with placeholders.
    let Expr::Template(template) = then else {
        panic!("expected template continuation");
    };
    let placeholder_count = template
        .parts
        .iter()
        .filter(|p| matches!(p, Expr::Call(c) if intrinsics::match_apply_arg(c).is_some()))
        .count();
    assert_eq!(placeholder_count, 2);
    assert_no_stray_outputs(&graph);
}

#[test]
fn plain_top_level_field_access_stays_direct() {
    let graph = rewritten(
        r#"
resource "aws_vpc" "default" {
  cidr_block = "10.0.0.0/16"
}

output "name" {
  value = "${aws_vpc.default.id}"
}
"#,
    );
    assert!(matches!(output_expr(&graph, "name"), Expr::Access(_)));
}

#[test]
fn nested_managed_field_root_synthesises_an_apply() {
    let graph = rewritten(
        r#"
resource "aws_instance" "web" {
  ami = "ami-123"

  root_block_device {
    volume_size = 40
  }
}

output "size" {
  value = "${aws_instance.web.root_block_device.0.volume_size}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "size") else {
        panic!("expected synthesised apply");
    };
    let (args, then) = intrinsics::match_apply(call).expect("apply intrinsic");
    assert_eq!(args.len(), 1);
    assert!(matches!(then, Expr::Call(c) if intrinsics::match_apply_arg(c).is_some()));
}

#[test]
fn data_source_field_root_synthesises_an_apply() {
    let graph = rewritten(
        r#"
resource "aws_instance" "web" {
  ami = "ami-123"
}

data "aws_ami" "linked" {
  name_regex = "${aws_instance.web.id}"
}

output "ami_id" {
  value = "${data.aws_ami.linked.id}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "ami_id") else {
        panic!("expected synthesised apply");
    };
    assert!(intrinsics::match_apply(call).is_some());
}

#[test]
fn identical_accesses_deduplicate_into_one_argument() {
    let graph = rewritten(
        r#"
resource "aws_vpc" "default" {
  cidr_block = "10.0.0.0/16"
}

output "twice" {
  value = "${aws_vpc.default.id}-${aws_vpc.default.id}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "twice") else {
        panic!("expected apply call");
    };
    let (args, _) = intrinsics::match_apply(call).expect("apply intrinsic");
    assert_eq!(args.len(), 1);
}

#[test]
fn splat_arguments_pass_through_unchanged() {
    let graph = rewritten(
        r#"
resource "aws_instance" "n" {
  count = 3
  ami   = "ami-123"
}

output "joined" {
  value = "${join(",", aws_instance.n.*.id)}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "joined") else {
        panic!("expected apply call");
    };
    let (args, _) = intrinsics::match_apply(call).expect("apply intrinsic");
    assert_eq!(args.len(), 1);
    let Expr::Access(access) = &args[0] else {
        panic!("expected splat access argument");
    };
    assert!(access.ty.is_list());
    assert!(access.ty.is_output());
}

#[test]
fn splat_root_stays_direct() {
    let graph = rewritten(
        r#"
resource "aws_instance" "n" {
  count = 2
  ami   = "ami-123"
}

output "ids" {
  value = "${aws_instance.n.*.id}"
}
"#,
    );
    assert!(matches!(output_expr(&graph, "ids"), Expr::Access(_)));
}

#[test]
fn count_expressions_are_roots_too() {
    let graph = rewritten(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_instance" "per_vpc" {
  count = "${length(aws_vpc.main.id)}"
  ami   = "ami-123"
}
"#,
    );

    let id = graph.root().resources["aws_instance.per_vpc"];
    let resource = graph.node(id).as_resource().unwrap();
    let Some(Expr::Call(call)) = &resource.count else {
        panic!("expected lifted count");
    };
    assert!(intrinsics::match_apply(call).is_some());
}
