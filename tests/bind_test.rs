mod common;

use common::{bind_str, bind_str_with, try_bind_str};
use terracast::bind::BuildOptions;
use terracast::il::expr::{AccessKind, Expr, Instancing, IrNode, ResourceMode};
use terracast::il::node::{Graph, Node};
use terracast::il::ty::Type;

fn output_value<'g>(graph: &'g Graph, name: &str) -> &'g IrNode {
    let id = graph.root().outputs[name];
    match graph.node(id) {
        Node::Output(output) => output.value.as_ref().expect("output bound"),
        _ => panic!("not an output"),
    }
}

fn output_expr<'g>(graph: &'g Graph, name: &str) -> &'g Expr {
    output_value(graph, name).as_expr().expect("expression value")
}

// ─── Access typing ───────────────────────────────────────────────────────────

#[test]
fn managed_field_access_is_output_typed() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

output "vpc_id" {
  value = "${aws_vpc.main.id}"
}
"#,
    );

    let Expr::Access(access) = output_expr(&graph, "vpc_id") else {
        panic!("expected access");
    };
    assert_eq!(access.ty, Type::STRING.output_of());
    assert_eq!(access.path, vec!["id".to_string()]);
    assert!(access.target.is_some());
    assert!(matches!(
        access.kind,
        AccessKind::Resource {
            mode: ResourceMode::Managed,
            instancing: Instancing::Single,
        }
    ));
}

#[test]
fn splat_access_is_list_of_output() {
    let graph = bind_str(
        r#"
resource "aws_instance" "n" {
  count = 3
  ami   = "ami-123"
}

output "ids" {
  value = "${aws_instance.n.*.id}"
}
"#,
    );

    let Expr::Access(access) = output_expr(&graph, "ids") else {
        panic!("expected access");
    };
    assert!(access.ty.is_list());
    assert!(access.ty.is_output());
    assert_eq!(access.ty.element_type(), Type::STRING);
    assert!(matches!(
        access.kind,
        AccessKind::Resource {
            instancing: Instancing::Splat,
            ..
        }
    ));
}

#[test]
fn variable_type_comes_from_default() {
    let graph = bind_str(
        r#"
variable "region" {
  default = "us-east-1"
}

variable "no_default" {}

output "r" {
  value = "${var.region}"
}

output "n" {
  value = "${var.no_default}"
}
"#,
    );

    assert_eq!(output_expr(&graph, "r").ty(), Type::STRING);
    assert_eq!(output_expr(&graph, "n").ty(), Type::STRING);
}

#[test]
fn module_access_is_output_of_unknown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("vpc")).unwrap();
    std::fs::write(
        dir.path().join("vpc/main.tf"),
        r#"
variable "cidr" {
  default = "10.0.0.0/16"
}

output "vpc_cidr" {
  value = "${var.cidr}"
}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("main.tf"),
        r#"
module "vpc" {
  source = "./vpc"
  cidr   = "10.1.0.0/16"
}

output "cidr" {
  value = "${module.vpc.vpc_cidr}"
}
"#,
    )
    .unwrap();

    let tree = terracast::config::load_module_tree(dir.path()).unwrap();
    let mut registry = common::registry();
    let graph = terracast::bind::build_graph(
        &tree,
        &BuildOptions {
            allow_missing_comments: true,
            ..BuildOptions::default()
        },
        &mut registry,
    )
    .unwrap();

    let expr = output_expr(&graph, "cidr");
    assert_eq!(expr.ty(), Type::UNKNOWN.output_of());
}

#[test]
fn terraform_workspace_binds_to_get_stack() {
    let graph = bind_str(
        r#"
output "ws" {
  value = "${terraform.workspace}"
}
"#,
    );

    let Expr::Call(call) = output_expr(&graph, "ws") else {
        panic!("expected call");
    };
    assert_eq!(call.name, "__getStack");
    assert_eq!(call.ty, Type::STRING);
}

// ─── Property binding boundaries ─────────────────────────────────────────────

#[test]
fn max_items_one_list_projects_to_sole_child() {
    let graph = bind_str(
        r#"
resource "aws_instance" "web" {
  ami = "ami-123"

  root_block_device {
    volume_size = 40
  }
}
"#,
    );

    let id = graph.root().resources["aws_instance.web"];
    let Node::Resource(resource) = graph.node(id) else {
        panic!("not a resource");
    };
    // Projected to the single nested map, not a one-element list.
    assert!(matches!(
        resource.properties.entries["root_block_device"],
        IrNode::Map(_)
    ));
}

#[test]
fn nested_list_elements_flatten_into_parent() {
    let graph = bind_str(
        r#"
resource "aws_instance" "web" {
  ami             = "ami-123"
  security_groups = [["sg-1", "sg-2"], "sg-3"]
}
"#,
    );

    let id = graph.root().resources["aws_instance.web"];
    let Node::Resource(resource) = graph.node(id) else {
        panic!("not a resource");
    };
    let IrNode::List(list) = &resource.properties.entries["security_groups"] else {
        panic!("expected list");
    };
    assert_eq!(list.elems.len(), 3);
}

#[test]
fn count_of_one_normalises_to_single_instance() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  count      = 1
  cidr_block = "10.0.0.0/16"
}

output "a" {
  value = "${aws_vpc.main.id}"
}

output "b" {
  value = "${aws_vpc.main.0.id}"
}
"#,
    );

    let id = graph.root().resources["aws_vpc.main"];
    assert!(graph.node(id).as_resource().unwrap().count.is_none());

    // Both the bare and the indexed reference resolve to a plain access.
    for name in ["a", "b"] {
        let Expr::Access(access) = output_expr(&graph, name) else {
            panic!("expected access");
        };
        assert!(matches!(
            access.kind,
            AccessKind::Resource {
                instancing: Instancing::Single,
                ..
            }
        ));
    }
}

#[test]
fn counted_resource_reference_promotes_to_zeroth_element() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  count      = 2
  cidr_block = "10.0.0.0/16"
}

output "id" {
  value = "${aws_vpc.main.id}"
}
"#,
    );

    let Expr::Access(access) = output_expr(&graph, "id") else {
        panic!("expected access");
    };
    assert!(matches!(
        access.kind,
        AccessKind::Resource {
            instancing: Instancing::Indexed(0),
            ..
        }
    ));
}

#[test]
fn conditional_count_flags_resource() {
    let graph = bind_str(
        r#"
variable "create" {
  default = "true"
}

resource "aws_vpc" "opt" {
  count      = "${var.create ? 1 : 0}"
  cidr_block = "10.0.0.0/16"
}
"#,
    );

    let id = graph.root().resources["aws_vpc.opt"];
    let resource = graph.node(id).as_resource().unwrap();
    assert!(resource.is_conditional);
    assert!(resource.count.is_some());
}

#[test]
fn unknown_function_binds_to_error_preserving_call() {
    let graph = bind_str(
        r#"
output "x" {
  value = "${frobnicate("a", 1)}"
}
"#,
    );

    let Expr::Error(error) = output_expr(&graph, "x") else {
        panic!("expected error node");
    };
    assert!(error.diagnostic.contains("frobnicate"));
    let IrNode::Expr(Expr::Call(call)) = &error.node else {
        panic!("expected preserved call");
    };
    assert_eq!(call.name, "frobnicate");
    assert_eq!(call.args.len(), 2);
}

#[test]
fn call_result_types_follow_arguments() {
    let graph = bind_str(
        r#"
variable "list" {
  default = ["a", "b"]
}

output "len" {
  value = "${length(var.list)}"
}

output "joined" {
  value = "${join(",", var.list)}"
}

output "parts" {
  value = "${split(",", "a,b")}"
}
"#,
    );

    assert_eq!(output_expr(&graph, "len").ty(), Type::NUMBER);
    assert_eq!(output_expr(&graph, "joined").ty(), Type::STRING);
    assert_eq!(output_expr(&graph, "parts").ty(), Type::STRING.list_of());
}

// ─── Dependencies ────────────────────────────────────────────────────────────

#[test]
fn dependencies_are_sorted_by_kind_and_identifier() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "a" {
  vpc_id = "${aws_vpc.main.id}"
}

output "both" {
  value = "${aws_subnet.a.id}-${aws_vpc.main.id}"
}
"#,
    );

    let out_id = graph.root().outputs["both"];
    let deps = graph.node(out_id).deps();
    let keys: Vec<String> = deps.iter().map(|&d| graph.sort_key(d)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(deps.len(), 2);

    let subnet_id = graph.root().resources["aws_subnet.a"];
    let vpc_id = graph.root().resources["aws_vpc.main"];
    assert_eq!(graph.node(subnet_id).deps(), &[vpc_id]);
}

#[test]
fn explicit_depends_on_joins_dependency_set() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_instance" "web" {
  ami        = "ami-123"
  depends_on = ["aws_vpc.main"]
}
"#,
    );

    let web = graph.root().resources["aws_instance.web"];
    let vpc = graph.root().resources["aws_vpc.main"];
    assert_eq!(graph.node(web).deps(), &[vpc]);
    let Node::Resource(resource) = graph.node(web) else {
        panic!();
    };
    assert_eq!(resource.explicit_deps, vec![vpc]);
}

#[test]
fn module_reference_in_depends_on_is_a_hard_error() {
    let result = try_bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
  depends_on = ["module.vpc"]
}
"#,
    );
    assert!(result.is_err());
}

// ─── Cycles and hard errors ──────────────────────────────────────────────────

#[test]
fn cyclic_locals_abort_binding() {
    let result = try_bind_str(
        r#"
locals {
  a = "${local.b}"
  b = "${local.a}"
}
"#,
    );
    let err = format!("{:#}", result.unwrap_err());
    assert!(err.contains("cyclic"), "unexpected error: {}", err);
}

#[test]
fn forward_local_references_bind_on_demand() {
    let graph = bind_str(
        r#"
locals {
  a = "${local.b}"
  b = "10.0.0.0/16"
}

output "a" {
  value = "${local.a}"
}
"#,
    );
    assert_eq!(output_expr(&graph, "a").ty(), Type::STRING);
}

#[test]
fn count_index_outside_counted_resource_is_rejected() {
    let result = try_bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.${count.index}.0/24"
}
"#,
    );
    assert!(result.is_err());
}

// ─── Permissive mode ─────────────────────────────────────────────────────────

#[test]
fn missing_references_error_without_permissive_mode() {
    assert!(try_bind_str(r#"
output "x" {
  value = "${var.missing}"
}
"#)
    .is_err());
}

#[test]
fn permissive_mode_binds_dangling_references() {
    let options = BuildOptions {
        allow_missing_variables: true,
        allow_missing_comments: true,
        ..BuildOptions::default()
    };
    let graph = bind_str_with(
        r#"
output "v" {
  value = "${var.missing}"
}

output "r" {
  value = "${aws_vpc.absent.id}"
}
"#,
        &options,
    );

    let Expr::Access(var_access) = output_expr(&graph, "v") else {
        panic!("expected access");
    };
    assert_eq!(var_access.ty, Type::STRING);
    assert!(var_access.target.is_none());

    let Expr::Access(res_access) = output_expr(&graph, "r") else {
        panic!("expected access");
    };
    assert_eq!(res_access.ty, Type::UNKNOWN);
    assert!(res_access.target.is_none());
}

#[test]
fn self_reference_binds_to_soft_error() {
    let graph = bind_str(
        r#"
output "s" {
  value = "${self.private_ip}"
}
"#,
    );
    assert!(matches!(output_expr(&graph, "s"), Expr::Error(_)));
}
