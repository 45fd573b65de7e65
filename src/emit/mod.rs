pub mod expr;
pub mod names;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::emit::expr::{emit_count_condition, object_key, quote, uses_function, ExprEmitter};
use crate::emit::names::{pascal, NameTable};
use crate::il::expr::{Comments, Expr, IrNode, LitExpr, LitValue, ResourceMode};
use crate::il::intrinsics;
use crate::il::node::{Graph, ModuleId, Node, NodeId, ResourceNode, ROOT_MODULE};
use crate::schema::view::camel_case;

// ─── Emitter driver ─────────────────────────────────────────────────────────

const INDENT: &str = "    ";

/// Emit the whole graph as one TypeScript program: preamble imports, child
/// module factories, then the root module in dependency order, with root
/// outputs exported.
pub fn emit_program(graph: &Graph) -> Result<String> {
    let mut out = String::new();

    // Factory names for child modules, globally unique.
    let mut factory_names: BTreeMap<ModuleId, String> = BTreeMap::new();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    for module_id in graph.module_ids() {
        if module_id == ROOT_MODULE {
            continue;
        }
        let base = format!("new{}Module", pascal(&graph.module(module_id).name));
        let mut candidate = base.clone();
        let mut n = 1usize;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        factory_names.insert(module_id, candidate);
    }

    emit_preamble(graph, &mut out);

    // Children before the root. Module ids are allocated leaves-first during
    // binding, so arena order already puts every factory ahead of its caller.
    for module_id in graph.module_ids() {
        if module_id == ROOT_MODULE {
            continue;
        }
        emit_module(graph, module_id, &factory_names, &mut out)?;
        out.push('\n');
    }

    emit_module(graph, ROOT_MODULE, &factory_names, &mut out)?;
    Ok(out)
}

fn emit_preamble(graph: &Graph, out: &mut String) {
    out.push_str("import * as pulumi from \"@pulumi/pulumi\";\n");

    let mut packages: BTreeSet<String> = BTreeSet::new();
    let mut needs_fs = false;
    let mut needs_util = false;
    for id in graph.node_ids() {
        let node = graph.node(id);
        if let Node::Resource(resource) = node {
            if let Some(info) = &resource.info {
                let package = info.package().to_string();
                if package != "archive" && package != "http" {
                    packages.insert(package);
                }
            }
        }
        needs_fs = needs_fs || uses_function(node, "file");
        needs_util = needs_util || uses_function(node, "format") || uses_function(node, "formatlist");
    }

    for package in &packages {
        out.push_str(&format!(
            "import * as {} from \"@pulumi/{}\";\n",
            package, package
        ));
    }
    if needs_fs {
        out.push_str("import * as fs from \"fs\";\n");
    }
    if needs_util {
        out.push_str("import * as util from \"util\";\n");
    }
    out.push('\n');
}

// ─── Per-module emission ────────────────────────────────────────────────────

fn emit_module(
    graph: &Graph,
    module_id: ModuleId,
    factory_names: &BTreeMap<ModuleId, String>,
    out: &mut String,
) -> Result<()> {
    let is_root = module_id == ROOT_MODULE;
    let module = graph.module(module_id);

    let mut seed: Vec<&str> = vec!["pulumi", "config", "fs", "util", "args", "exports"];
    let packages: Vec<String> = collect_packages(graph);
    for package in &packages {
        seed.push(package.as_str());
    }
    let factory_name_values: Vec<String> = factory_names.values().cloned().collect();
    for name in &factory_name_values {
        seed.push(name.as_str());
    }
    let names = NameTable::build(graph, module_id, &seed);

    let base_indent = if is_root {
        0
    } else {
        let factory = &factory_names[&module_id];
        out.push_str(&format!("function {}(args: {{", factory));
        let mut first = true;
        for tf_name in module.variables.keys() {
            if !first {
                out.push(',');
            }
            out.push_str(&format!(" {}?: any", camel_case(tf_name)));
            first = false;
        }
        out.push_str(" }) {\n");
        1
    };

    let order = dependency_order(graph, module_id)?;

    let mut emitter = ExprEmitter::new(graph, &names);
    let mut child_outputs: Vec<(String, String)> = Vec::new();
    let mut config_emitted = false;

    for id in order {
        let node = graph.node(id);
        match node {
            Node::Variable(_) if is_root && !config_emitted => {
                indent_line(out, base_indent, "const config = new pulumi.Config();");
                config_emitted = true;
            }
            _ => {}
        }

        match node {
            Node::Provider(provider) => {
                if provider.synthesised || provider.alias.is_none() {
                    continue;
                }
                emit_comments(out, base_indent, provider.comments.as_ref());
                let mut line = format!(
                    "const {} = new {}.Provider(\"{}\", ",
                    names.name(id),
                    provider.plugin_name,
                    provider.alias.as_deref().unwrap_or(&provider.name),
                );
                emitter.indent = base_indent;
                emitter.emit_map(&mut line, &provider.properties)?;
                line.push_str(");");
                indent_line(out, base_indent, &line);
            }
            Node::Variable(variable) => {
                emit_comments(out, base_indent, variable.comments.as_ref());
                let key = camel_case(&variable.name);
                let mut line = format!("const {} = ", names.name(id));
                emitter.indent = base_indent;
                match (&variable.default, is_root) {
                    (Some(default), true) => {
                        line.push_str(&format!("config.get(\"{}\") || ", key));
                        emitter.emit_ir(&mut line, default)?;
                    }
                    (None, true) => {
                        line.push_str(&format!("config.require(\"{}\")", key));
                    }
                    (Some(default), false) => {
                        line.push_str(&format!("args.{} !== undefined ? args.{} : ", key, key));
                        emitter.emit_ir(&mut line, default)?;
                    }
                    (None, false) => {
                        line.push_str(&format!("args.{}", key));
                    }
                }
                line.push(';');
                indent_line(out, base_indent, &line);
            }
            Node::Local(local) => {
                emit_comments(out, base_indent, local.comments.as_ref());
                let mut line = format!("const {} = ", names.name(id));
                emitter.indent = base_indent;
                if let Some(value) = &local.value {
                    emitter.emit_ir(&mut line, value)?;
                } else {
                    line.push_str("undefined");
                }
                line.push(';');
                indent_line(out, base_indent, &line);
            }
            Node::Module(module_node) => {
                emit_comments(out, base_indent, module_node.comments.as_ref());
                let factory = &factory_names[&module_node.child];
                let mut line = format!("const {} = {}({{", names.name(id), factory);
                emitter.indent = base_indent + 1;
                for (key, value) in &module_node.properties.entries {
                    line.push('\n');
                    line.push_str(&INDENT.repeat(base_indent + 1));
                    line.push_str(&object_key(&camel_case(key)));
                    line.push_str(": ");
                    emitter.emit_ir(&mut line, value)?;
                    line.push(',');
                }
                if !module_node.properties.entries.is_empty() {
                    line.push('\n');
                    line.push_str(&INDENT.repeat(base_indent));
                }
                line.push_str("});");
                indent_line(out, base_indent, &line);
            }
            Node::Resource(resource) => {
                emit_comments(out, base_indent, resource.comments.as_ref());
                emit_resource(graph, &names, &mut emitter, resource, id, base_indent, out)?;
            }
            Node::Output(output) => {
                emit_comments(out, base_indent, output.comments.as_ref());
                let mut value = String::new();
                emitter.indent = base_indent;
                match &output.value {
                    Some(v) => emitter.emit_ir(&mut value, v)?,
                    None => value.push_str("undefined"),
                }
                if is_root {
                    indent_line(
                        out,
                        base_indent,
                        &format!("export const {} = {};", names.name(id), value),
                    );
                } else {
                    child_outputs.push((camel_case(&output.name), value));
                }
            }
        }
    }

    if !is_root {
        out.push_str(&INDENT.repeat(1));
        out.push_str("return {\n");
        for (key, value) in &child_outputs {
            out.push_str(&INDENT.repeat(2));
            out.push_str(&object_key(key));
            out.push_str(": ");
            out.push_str(value);
            out.push_str(",\n");
        }
        out.push_str(&INDENT.repeat(1));
        out.push_str("};\n");
        out.push_str("}\n");
    }
    Ok(())
}

fn collect_packages(graph: &Graph) -> Vec<String> {
    let mut packages = BTreeSet::new();
    for id in graph.node_ids() {
        if let Node::Resource(resource) = graph.node(id) {
            if let Some(info) = &resource.info {
                packages.insert(info.package().to_string());
            }
        }
    }
    packages.into_iter().collect()
}

/// Kahn's algorithm over the module's nodes, popping the smallest sort key
/// first so emission order is deterministic.
fn dependency_order(graph: &Graph, module_id: ModuleId) -> Result<Vec<NodeId>> {
    let ids = graph.module(module_id).node_ids();
    let in_module: BTreeSet<NodeId> = ids.iter().copied().collect();

    let mut dep_graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index_of: BTreeMap<NodeId, NodeIndex> = BTreeMap::new();
    for &id in &ids {
        index_of.insert(id, dep_graph.add_node(id));
    }
    for &id in &ids {
        for &dep in graph.node(id).deps() {
            if in_module.contains(&dep) && dep != id {
                dep_graph.add_edge(index_of[&dep], index_of[&id], ());
            }
        }
    }

    let mut indegree: BTreeMap<NodeIndex, usize> = index_of
        .values()
        .map(|&ix| (ix, dep_graph.neighbors_directed(ix, petgraph::Incoming).count()))
        .collect();

    let mut ready: BTreeSet<(String, NodeIndex)> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&ix, _)| (graph.sort_key(dep_graph[ix]), ix))
        .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(entry) = ready.iter().next().cloned() {
        ready.remove(&entry);
        let (_, ix) = entry;
        order.push(dep_graph[ix]);
        for next in dep_graph.neighbors_directed(ix, petgraph::Outgoing) {
            if let Some(deg) = indegree.get_mut(&next) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert((graph.sort_key(dep_graph[next]), next));
                }
            }
        }
    }

    if order.len() != ids.len() {
        bail!("Circular dependency detected in module emission order");
    }
    Ok(order)
}

// ─── Resources ──────────────────────────────────────────────────────────────

fn emit_resource(
    graph: &Graph,
    names: &NameTable,
    emitter: &mut ExprEmitter<'_>,
    resource: &ResourceNode,
    id: NodeId,
    base_indent: usize,
    out: &mut String,
) -> Result<()> {
    if resource.type_name.starts_with("archive_") {
        return emit_archive_resource(names, emitter, resource, id, base_indent, out);
    }
    if resource.type_name == "http" && resource.mode == ResourceMode::Data {
        return emit_http_data_source(names, emitter, resource, id, base_indent, out);
    }
    if resource.mode == ResourceMode::Data {
        return emit_data_source(graph, names, emitter, resource, id, base_indent, out);
    }

    let ctor = constructor_path(resource);
    let name = names.name(id);
    let options = render_options(graph, names, resource)?;

    if resource.is_conditional {
        let Some(count) = resource.count.as_ref() else {
            bail!("conditional resource {} has no count", resource.address());
        };
        indent_line(
            out,
            base_indent,
            &format!("let {}: {} | undefined;", name, ctor),
        );
        let mut cond = String::new();
        emitter.indent = base_indent;
        emit_count_condition(emitter, &mut cond, count)?;
        indent_line(out, base_indent, &format!("if ({}) {{", trim_parens(&cond)));
        let mut line = format!("{} = new {}(\"{}\", ", name, ctor, resource.name);
        emitter.indent = base_indent + 1;
        emitter.emit_map(&mut line, &resource.properties)?;
        if let Some(options) = &options {
            line.push_str(", ");
            line.push_str(options);
        }
        line.push_str(");");
        indent_line(out, base_indent + 1, &line);
        indent_line(out, base_indent, "}");
        return Ok(());
    }

    if let Some(count) = &resource.count {
        // Array allocation plus an index loop; the loop variable is in scope
        // for count.index references in the body.
        let count_var = pick_count_var(names);
        indent_line(out, base_indent, &format!("const {}: {}[] = [];", name, ctor));
        let mut bound = String::new();
        emitter.indent = base_indent;
        emitter.emit_expr(&mut bound, count)?;
        indent_line(
            out,
            base_indent,
            &format!(
                "for (let {v} = 0; {v} < {bound}; {v}++) {{",
                v = count_var,
                bound = bound
            ),
        );
        emitter.count_var = Some(count_var.clone());
        let mut line = format!(
            "{}.push(new {}(`{}-${{{}}}`, ",
            name, ctor, resource.name, count_var
        );
        emitter.indent = base_indent + 1;
        emitter.emit_map(&mut line, &resource.properties)?;
        if let Some(options) = &options {
            line.push_str(", ");
            line.push_str(options);
        }
        line.push_str("));");
        indent_line(out, base_indent + 1, &line);
        emitter.count_var = None;
        indent_line(out, base_indent, "}");
        return Ok(());
    }

    let mut line = format!("const {} = new {}(\"{}\", ", name, ctor, resource.name);
    emitter.indent = base_indent;
    emitter.emit_map(&mut line, &resource.properties)?;
    if let Some(options) = &options {
        line.push_str(", ");
        line.push_str(options);
    }
    line.push_str(");");
    indent_line(out, base_indent, &line);
    Ok(())
}

/// Data sources invoke their function token; results are wrapped in
/// `pulumi.output` unless the source is prompt.
fn emit_data_source(
    graph: &Graph,
    names: &NameTable,
    emitter: &mut ExprEmitter<'_>,
    resource: &ResourceNode,
    id: NodeId,
    base_indent: usize,
    out: &mut String,
) -> Result<()> {
    let function = invoke_path(resource);
    let options = invoke_options(graph, names, resource);
    let call = intrinsics::data_source(&function, resource.properties.clone(), options);

    let mut line = format!("const {} = ", names.name(id));
    emitter.indent = base_indent;
    if resource.is_prompt {
        emitter.emit_expr(&mut line, &call)?;
    } else {
        line.push_str("pulumi.output(");
        emitter.emit_expr(&mut line, &call)?;
        line.push(')');
    }
    line.push(';');
    indent_line(out, base_indent, &line);
    Ok(())
}

/// Archive resources become asset constructors: a source file maps to a
/// FileAsset entry, a directory to a FileArchive, and inline content to a
/// StringAsset under its declared file name.
fn emit_archive_resource(
    names: &NameTable,
    emitter: &mut ExprEmitter<'_>,
    resource: &ResourceNode,
    id: NodeId,
    base_indent: usize,
    out: &mut String,
) -> Result<()> {
    emitter.indent = base_indent;
    let entries = &resource.properties.entries;
    let mut line = format!("const {} = ", names.name(id));

    if let Some(dir) = entries.get("source_dir") {
        line.push_str("new pulumi.asset.FileArchive(");
        emitter.emit_ir(&mut line, dir)?;
        line.push_str(");");
        indent_line(out, base_indent, &line);
        return Ok(());
    }

    line.push_str("new pulumi.asset.AssetArchive({");
    if let Some(file) = entries.get("source_file") {
        line.push('\n');
        line.push_str(&INDENT.repeat(base_indent + 1));
        let key = match file {
            IrNode::Expr(Expr::Lit(LitExpr {
                value: LitValue::String(s),
                ..
            })) => quote(s),
            _ => "\"file\"".to_string(),
        };
        line.push_str(&key);
        line.push_str(": new pulumi.asset.FileAsset(");
        emitter.indent = base_indent + 1;
        emitter.emit_ir(&mut line, file)?;
        line.push_str("),");
    }
    if let Some(content) = entries.get("source_content") {
        let file_name = match entries.get("source_content_filename") {
            Some(IrNode::Expr(Expr::Lit(LitExpr {
                value: LitValue::String(s),
                ..
            }))) => quote(s),
            _ => "\"content\"".to_string(),
        };
        line.push('\n');
        line.push_str(&INDENT.repeat(base_indent + 1));
        line.push_str(&file_name);
        line.push_str(": new pulumi.asset.StringAsset(");
        emitter.indent = base_indent + 1;
        emitter.emit_ir(&mut line, content)?;
        line.push_str("),");
    }
    line.push('\n');
    line.push_str(&INDENT.repeat(base_indent));
    line.push_str("});");
    indent_line(out, base_indent, &line);
    Ok(())
}

/// The http pseudo-provider turns into an HTTP client call.
fn emit_http_data_source(
    names: &NameTable,
    emitter: &mut ExprEmitter<'_>,
    resource: &ResourceNode,
    id: NodeId,
    base_indent: usize,
    out: &mut String,
) -> Result<()> {
    let mut url = String::new();
    emitter.indent = base_indent;
    match resource.properties.entries.get("url") {
        Some(value) => emitter.emit_ir(&mut url, value)?,
        None => url.push_str("\"\""),
    }
    indent_line(
        out,
        base_indent,
        &format!(
            "const {} = pulumi.output(fetch({}).then(r => r.text()).then(body => ({{ body: body }})));",
            names.name(id),
            url
        ),
    );
    Ok(())
}

// ─── Options bags ───────────────────────────────────────────────────────────

fn render_options(
    graph: &Graph,
    names: &NameTable,
    resource: &ResourceNode,
) -> Result<Option<String>> {
    let mut fields: Vec<String> = Vec::new();

    if !resource.explicit_deps.is_empty() {
        let mut deps: Vec<NodeId> = resource.explicit_deps.clone();
        deps.sort_by_key(|&d| graph.sort_key(d));
        deps.dedup();
        let mut rendered = Vec::new();
        for dep in deps {
            let dep_name = names.name(dep);
            let counted = graph
                .node(dep)
                .as_resource()
                .map(|r| r.count.is_some() && !r.is_conditional)
                .unwrap_or(false);
            if counted {
                // A counted dependency is an array of resources.
                rendered.push(format!("...{}", dep_name));
            } else {
                rendered.push(dep_name.to_string());
            }
        }
        fields.push(format!("dependsOn: [{}]", rendered.join(", ")));
    }

    if !resource.ignore_changes.is_empty() {
        let mapped = map_ignore_changes(resource);
        let quoted: Vec<String> = mapped.iter().map(|s| quote(s)).collect();
        fields.push(format!("ignoreChanges: [{}]", quoted.join(", ")));
    }

    if !resource.timeouts.is_empty() {
        let entries: Vec<String> = resource
            .timeouts
            .iter()
            .map(|(k, v)| format!("{}: {}", object_key(k), quote(v)))
            .collect();
        fields.push(format!("customTimeouts: {{ {} }}", entries.join(", ")));
    }

    if let Some(provider_id) = resource.provider {
        if let Node::Provider(provider) = graph.node(provider_id) {
            if provider.alias.is_some() && !provider.synthesised {
                fields.push(format!("provider: {}", names.name(provider_id)));
            }
        }
    }

    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("{{ {} }}", fields.join(", "))))
}

fn invoke_options(graph: &Graph, names: &NameTable, resource: &ResourceNode) -> Option<Expr> {
    let provider_id = resource.provider?;
    if let Node::Provider(provider) = graph.node(provider_id) {
        if provider.alias.is_some() && !provider.synthesised {
            return Some(Expr::string(format!(
                "{{ provider: {} }}",
                names.name(provider_id)
            )));
        }
    }
    None
}

/// Map ignore-changes entries to their idiomatic field names. A wildcard
/// expands to every top-level field of the resource schema; dotted entries
/// map their first segment and keep the rest verbatim.
fn map_ignore_changes(resource: &ResourceNode) -> Vec<String> {
    let view = &resource.properties.schemas;
    let mut mapped = Vec::new();
    for entry in &resource.ignore_changes {
        if entry == "*" {
            if let Some(info) = &resource.info {
                for key in info.schema.schema.keys() {
                    mapped.push(view.pulumi_name(key));
                }
            }
            continue;
        }
        match entry.split_once('.') {
            Some((head, rest)) => mapped.push(format!("{}.{}", view.pulumi_name(head), rest)),
            None => mapped.push(view.pulumi_name(entry)),
        }
    }
    mapped
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// `aws:ec2/vpc:Vpc` → `aws.ec2.Vpc`; the index module collapses onto the
/// package.
fn constructor_path(resource: &ResourceNode) -> String {
    match &resource.info {
        Some(info) => {
            let package = info.package();
            let module = info.module();
            if module.is_empty() || module == "index" {
                format!("{}.{}", package, info.type_name())
            } else {
                format!("{}.{}.{}", package, module, info.type_name())
            }
        }
        None => {
            // Best-effort fallback from the Terraform type name.
            let package = resource
                .type_name
                .split('_')
                .next()
                .unwrap_or(&resource.type_name);
            format!("{}.{}", package, pascal(&camel_case(&resource.type_name)))
        }
    }
}

/// `aws:index/getAmi:getAmi` → `aws.getAmi`.
fn invoke_path(resource: &ResourceNode) -> String {
    match &resource.info {
        Some(info) => {
            let package = info.package();
            let module = info.module();
            if module.is_empty() || module == "index" {
                format!("{}.{}", package, info.type_name())
            } else {
                format!("{}.{}.{}", package, module, info.type_name())
            }
        }
        None => {
            let package = resource
                .type_name
                .split('_')
                .next()
                .unwrap_or(&resource.type_name);
            format!("{}.get{}", package, pascal(&camel_case(&resource.type_name)))
        }
    }
}

fn pick_count_var(names: &NameTable) -> String {
    for candidate in ["i", "j", "k", "idx"] {
        if !names.contains_name(candidate) {
            return candidate.to_string();
        }
    }
    "index".to_string()
}

fn emit_comments(out: &mut String, indent: usize, comments: Option<&Comments>) {
    if let Some(comments) = comments {
        for line in &comments.leading {
            indent_line(out, indent, &format!("// {}", line));
        }
    }
}

fn indent_line(out: &mut String, indent: usize, line: &str) {
    out.push_str(&INDENT.repeat(indent));
    out.push_str(line);
    out.push('\n');
}

fn trim_parens(s: &str) -> &str {
    let trimmed = s.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}
