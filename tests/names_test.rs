mod common;

use std::collections::BTreeSet;

use common::bind_str;
use terracast::emit::names::NameTable;
use terracast::il::node::ROOT_MODULE;

#[test]
fn outputs_win_conflicts_at_the_root_module() {
    let graph = bind_str(
        r#"
variable "vpc" {
  default = "a"
}

locals {
  vpc = "b"
}

resource "aws_vpc" "vpc" {
  cidr_block = "10.0.0.0/16"
}

output "vpc" {
  value = "c"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);

    let output = graph.root().outputs["vpc"];
    let local = graph.root().locals["vpc"];
    let variable = graph.root().variables["vpc"];
    let resource = graph.root().resources["aws_vpc.vpc"];

    assert_eq!(names.name(output), "vpc");
    assert_eq!(names.name(local), "myVpc");
    assert_eq!(names.name(variable), "vpcInput");
    assert_eq!(names.name(resource), "vpcVpc");
}

#[test]
fn name_table_is_injective() {
    let graph = bind_str(
        r#"
variable "main" {
  default = "a"
}

locals {
  main = "b"
}

resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "main" {
  cidr_block = "10.0.1.0/24"
}

resource "aws_instance" "main" {
  ami = "ami-123"
}

output "main" {
  value = "c"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);

    let module = graph.root();
    let mut assigned = BTreeSet::new();
    for id in module.node_ids() {
        let name = names.name(id).to_string();
        assert!(assigned.insert(name.clone()), "duplicate name {:?}", name);
    }
}

#[test]
fn resource_groups_force_type_disambiguation() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "main" {
  cidr_block = "10.0.1.0/24"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);

    let vpc = graph.root().resources["aws_vpc.main"];
    let subnet = graph.root().resources["aws_subnet.main"];
    assert_eq!(names.name(subnet), "mainSubnet");
    assert_eq!(names.name(vpc), "mainVpc");
}

#[test]
fn lone_resources_keep_their_base_name() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);
    assert_eq!(names.name(graph.root().resources["aws_vpc.main"]), "main");
}

#[test]
fn reserved_words_are_never_assigned() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "default" {
  cidr_block = "10.0.0.0/16"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);
    assert_eq!(
        names.name(graph.root().resources["aws_vpc.default"]),
        "defaultVpc"
    );
}

#[test]
fn data_source_type_suffix_strips_get() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "linux" {
  cidr_block = "10.0.0.0/16"
}

data "aws_ami" "linux" {
  most_recent = true
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &[]);
    assert_eq!(
        names.name(graph.root().resources["data.aws_ami.linux"]),
        "linuxAmi"
    );
    assert_eq!(
        names.name(graph.root().resources["aws_vpc.linux"]),
        "linuxVpc"
    );
}

#[test]
fn seeded_names_are_respected() {
    let graph = bind_str(
        r#"
resource "aws_vpc" "pulumi" {
  cidr_block = "10.0.0.0/16"
}
"#,
    );
    let names = NameTable::build(&graph, ROOT_MODULE, &["pulumi"]);
    assert_eq!(
        names.name(graph.root().resources["aws_vpc.pulumi"]),
        "pulumiVpc"
    );
}

#[test]
fn rebuilding_the_table_is_idempotent() {
    let graph = bind_str(
        r#"
variable "main" {
  default = "a"
}

resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
}

resource "aws_subnet" "main" {
  cidr_block = "10.0.1.0/24"
}

output "main" {
  value = "b"
}
"#,
    );
    let first = NameTable::build(&graph, ROOT_MODULE, &[]);
    let second = NameTable::build(&graph, ROOT_MODULE, &[]);
    for id in graph.root().node_ids() {
        assert_eq!(first.name(id), second.name(id));
    }
}
