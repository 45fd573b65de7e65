mod common;

use common::{bind_str, rewritten};
use terracast::il::expr::{Expr, IrNode, LitValue};
use terracast::il::node::{Graph, Node};
use terracast::il::ty::Type;
use terracast::rewrite::{assets, coerce, paths, prompt};

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

// ─── Literal lowering ────────────────────────────────────────────────────────

#[test]
fn path_root_lowers_to_dot() {
    let mut graph = bind_str(
        r#"
output "root" {
  value = "${path.root}"
}

output "mod" {
  value = "${path.module}"
}
"#,
    );
    paths::lower_path_literals(&mut graph).unwrap();

    for name in ["root", "mod"] {
        let Expr::Lit(lit) = output_expr(&graph, name) else {
            panic!("expected literal for {}", name);
        };
        assert_eq!(lit.value, LitValue::String(".".to_string()));
    }
}

#[test]
fn literal_lowering_is_idempotent() {
    let mut graph = bind_str(
        r#"
output "root" {
  value = "${path.root}"
}
"#,
    );
    paths::lower_path_literals(&mut graph).unwrap();
    let once = output_expr(&graph, "root").clone();
    paths::lower_path_literals(&mut graph).unwrap();
    assert_eq!(*output_expr(&graph, "root"), once);
}

// ─── Coercion insertion ──────────────────────────────────────────────────────

#[test]
fn literal_coercions_are_static() {
    let mut graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block         = 10
  enable_dns_support = "true"
}
"#,
    );
    coerce::insert_coercions(&mut graph).unwrap();

    let id = graph.root().resources["aws_vpc.main"];
    let resource = graph.node(id).as_resource().unwrap();

    let IrNode::Expr(Expr::Lit(cidr)) = &resource.properties.entries["cidr_block"] else {
        panic!("expected literal");
    };
    assert_eq!(cidr.value, LitValue::String("10".to_string()));

    let IrNode::Expr(Expr::Lit(dns)) = &resource.properties.entries["enable_dns_support"] else {
        panic!("expected literal");
    };
    assert_eq!(dns.value, LitValue::Bool(true));
}

#[test]
fn dynamic_coercions_wrap_in_the_intrinsic() {
    let mut graph = bind_str(
        r#"
variable "flag" {
  default = "true"
}

resource "aws_vpc" "main" {
  enable_dns_support = "${var.flag}"
}
"#,
    );
    coerce::insert_coercions(&mut graph).unwrap();

    let id = graph.root().resources["aws_vpc.main"];
    let resource = graph.node(id).as_resource().unwrap();
    let IrNode::Expr(Expr::Call(call)) = &resource.properties.entries["enable_dns_support"] else {
        panic!("expected coerce call");
    };
    assert_eq!(call.name, "__coerce");
    assert_eq!(call.ty, Type::BOOL);
}

#[test]
fn coercion_insertion_is_idempotent() {
    let mut graph = bind_str(
        r#"
variable "flag" {
  default = "true"
}

resource "aws_vpc" "main" {
  cidr_block         = 10
  enable_dns_support = "${var.flag}"
}
"#,
    );
    coerce::insert_coercions(&mut graph).unwrap();
    let id = graph.root().resources["aws_vpc.main"];
    let once = graph.node(id).as_resource().unwrap().properties.clone();
    coerce::insert_coercions(&mut graph).unwrap();
    let twice = graph.node(id).as_resource().unwrap().properties.clone();
    assert_eq!(once, twice);
}

// ─── Asset lifting ───────────────────────────────────────────────────────────

#[test]
fn asset_fields_wrap_and_drop_the_hash_companion() {
    let mut graph = bind_str(
        r#"
resource "aws_lambda_function" "f" {
  function_name    = "worker"
  filename         = "code.zip"
  source_code_hash = "abc123"
}
"#,
    );
    assets::lift_assets(&mut graph).unwrap();

    let id = graph.root().resources["aws_lambda_function.f"];
    let resource = graph.node(id).as_resource().unwrap();

    let IrNode::Expr(Expr::Call(call)) = &resource.properties.entries["filename"] else {
        panic!("expected archive intrinsic");
    };
    assert_eq!(call.name, "__archive");
    assert!(!resource.properties.entries.contains_key("source_code_hash"));
}

#[test]
fn archive_resource_references_strip_their_path() {
    let mut graph = bind_str(
        r#"
data "archive_file" "src" {
  type        = "zip"
  source_file = "a.txt"
  output_path = "src.zip"
}

resource "aws_lambda_function" "f" {
  function_name = "worker"
  filename      = "${archive_file.src.output_path}"
}
"#,
    );
    prompt::mark_prompt_data_sources(&mut graph).unwrap();
    assets::lift_assets(&mut graph).unwrap();

    let id = graph.root().resources["aws_lambda_function.f"];
    let resource = graph.node(id).as_resource().unwrap();
    let IrNode::Expr(Expr::Access(access)) = &resource.properties.entries["filename"] else {
        panic!("expected stripped reference");
    };
    assert!(access.path.is_empty());
    assert_eq!(access.target, Some(graph.root().resources["data.archive_file.src"]));
}

// ─── Prompt data sources ─────────────────────────────────────────────────────

#[test]
fn literal_input_data_sources_become_prompt() {
    let mut graph = bind_str(
        r#"
data "aws_ami" "linux" {
  most_recent = true
}

output "ami" {
  value = "${data.aws_ami.linux.id}"
}
"#,
    );
    prompt::mark_prompt_data_sources(&mut graph).unwrap();

    let id = graph.root().resources["data.aws_ami.linux"];
    assert!(graph.node(id).as_resource().unwrap().is_prompt);
    assert_eq!(output_expr(&graph, "ami").ty(), Type::STRING);
}

#[test]
fn output_typed_inputs_keep_data_sources_deferred() {
    let mut graph = bind_str(
        r#"
resource "aws_instance" "web" {
  ami = "ami-123"
}

data "aws_ami" "from_instance" {
  name_regex = "${aws_instance.web.id}"
}

output "ami" {
  value = "${data.aws_ami.from_instance.id}"
}
"#,
    );
    prompt::mark_prompt_data_sources(&mut graph).unwrap();

    let id = graph.root().resources["data.aws_ami.from_instance"];
    assert!(!graph.node(id).as_resource().unwrap().is_prompt);
    assert!(output_expr(&graph, "ami").ty().is_output());
}

// ─── Full pipeline sanity ────────────────────────────────────────────────────

#[test]
fn rewrites_preserve_dependency_targets() {
    let graph = rewritten(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "a" {
  vpc_id = "${aws_vpc.main.id}"
}
"#,
    );
    let subnet = graph.root().resources["aws_subnet.a"];
    let vpc = graph.root().resources["aws_vpc.main"];
    assert_eq!(graph.node(subnet).deps(), &[vpc]);
}
