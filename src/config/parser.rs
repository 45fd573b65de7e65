use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::types::*;

/// Parse a single HCL file into a partial ModuleTree.
pub fn parse_hcl(content: &str, file_path: &Path) -> Result<ModuleTree> {
    let body: hcl::Body = hcl::from_str(content)
        .with_context(|| format!("Failed to parse HCL in: {}", file_path.display()))?;

    let mut tree = ModuleTree::default();

    for structure in body.into_inner() {
        match structure {
            hcl::Structure::Block(block) => {
                let ident = block.identifier().to_string();
                match ident.as_str() {
                    "provider" => {
                        if let Some(provider) = parse_provider_block(&block)? {
                            tree.providers.push(provider);
                        }
                    }
                    "resource" => {
                        if let Some(resource) = parse_resource_block(&block)? {
                            tree.resources.push(resource);
                        }
                    }
                    "data" => {
                        if let Some(data) = parse_resource_block(&block)? {
                            tree.data_sources.push(data);
                        }
                    }
                    "variable" => {
                        if let Some(var) = parse_variable_block(&block)? {
                            tree.variables.push(var);
                        }
                    }
                    "output" => {
                        if let Some(out) = parse_output_block(&block)? {
                            tree.outputs.push(out);
                        }
                    }
                    "module" => {
                        if let Some(module) = parse_module_block(&block)? {
                            tree.modules.push(module);
                        }
                    }
                    "locals" => {
                        let locals = parse_locals_block(&block)?;
                        tree.locals.extend(locals);
                    }
                    "terraform" => {
                        tracing::debug!("Skipping terraform settings block");
                    }
                    _ => {
                        tracing::debug!("Ignoring unknown block type: {}", ident);
                    }
                }
            }
            hcl::Structure::Attribute(attr) => {
                tracing::debug!("Ignoring top-level attribute: {}", attr.key);
            }
        }
    }

    Ok(tree)
}

// ─── Block parsers ──────────────────────────────────────────────────────────

fn block_labels(block: &hcl::Block) -> Vec<String> {
    block
        .labels()
        .iter()
        .map(|l| l.as_str().to_string())
        .collect()
}

fn parse_provider_block(block: &hcl::Block) -> Result<Option<RawProvider>> {
    let labels = block_labels(block);
    if labels.is_empty() {
        return Ok(None);
    }

    let name = labels[0].clone();
    let mut alias = None;
    let mut config = BTreeMap::new();

    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            let key: &str = &attr.key;
            if key == "alias" {
                alias = Some(expr_to_string(&attr.expr));
            } else if key == "version" {
                tracing::debug!("Skipping provider version constraint");
            } else {
                config.insert(key.to_string(), hcl_expr_to_raw(&attr.expr));
            }
        }
    }

    Ok(Some(RawProvider {
        name,
        alias,
        config,
        comments: None,
    }))
}

fn parse_resource_block(block: &hcl::Block) -> Result<Option<RawResource>> {
    let labels = block_labels(block);
    if labels.len() < 2 {
        return Ok(None);
    }

    let mut resource = RawResource {
        resource_type: labels[0].clone(),
        name: labels[1].clone(),
        ..RawResource::default()
    };

    for structure in block.body().iter() {
        match structure {
            hcl::Structure::Attribute(attr) => {
                let key: &str = &attr.key;
                match key {
                    "provider" => resource.provider_ref = Some(expr_to_string(&attr.expr)),
                    "count" => resource.count = Some(hcl_expr_to_raw(&attr.expr)),
                    "depends_on" => resource.depends_on = expr_to_string_list(&attr.expr),
                    _ => {
                        resource
                            .attributes
                            .insert(key.to_string(), hcl_expr_to_raw(&attr.expr));
                    }
                }
            }
            hcl::Structure::Block(inner_block) => {
                let ident = inner_block.identifier();
                match ident {
                    "lifecycle" => {
                        resource.ignore_changes = parse_lifecycle_block(inner_block);
                    }
                    "timeouts" => {
                        resource.timeouts = parse_timeouts_block(inner_block);
                    }
                    "provisioner" | "connection" => {
                        tracing::debug!("Skipping {} block (not translated)", ident);
                    }
                    _ => {
                        merge_nested_block(&mut resource.attributes, inner_block);
                    }
                }
            }
        }
    }

    Ok(Some(resource))
}

fn parse_lifecycle_block(block: &hcl::Block) -> Vec<String> {
    let mut ignore_changes = Vec::new();
    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            let key: &str = &attr.key;
            match key {
                "ignore_changes" => ignore_changes = expr_to_string_list(&attr.expr),
                _ => tracing::debug!("Skipping lifecycle attribute: {}", key),
            }
        }
    }
    ignore_changes
}

fn parse_timeouts_block(block: &hcl::Block) -> BTreeMap<String, String> {
    let mut timeouts = BTreeMap::new();
    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            timeouts.insert(attr.key.to_string(), expr_to_string(&attr.expr));
        }
    }
    timeouts
}

/// Fold a nested configuration block into the attribute map. A repeated block
/// name accumulates a list, matching Terraform's repeated-block semantics.
fn merge_nested_block(attributes: &mut BTreeMap<String, RawValue>, block: &hcl::Block) {
    let value = nested_block_to_raw(block);
    let key = block.identifier().to_string();
    match attributes.remove(&key) {
        None => {
            attributes.insert(key, value);
        }
        Some(RawValue::List(mut items)) => {
            items.push(value);
            attributes.insert(key, RawValue::List(items));
        }
        Some(existing) => {
            attributes.insert(key, RawValue::List(vec![existing, value]));
        }
    }
}

fn nested_block_to_raw(block: &hcl::Block) -> RawValue {
    let mut entries = BTreeMap::new();
    for structure in block.body().iter() {
        match structure {
            hcl::Structure::Attribute(attr) => {
                entries.insert(attr.key.to_string(), hcl_expr_to_raw(&attr.expr));
            }
            hcl::Structure::Block(inner) => {
                merge_nested_block(&mut entries, inner);
            }
        }
    }
    RawValue::Map(entries)
}

fn parse_variable_block(block: &hcl::Block) -> Result<Option<RawVariable>> {
    let labels = block_labels(block);
    if labels.is_empty() {
        return Ok(None);
    }

    let name = labels[0].clone();
    let mut default = None;
    let mut description = None;

    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            let key: &str = &attr.key;
            match key {
                "default" => default = Some(hcl_expr_to_raw(&attr.expr)),
                "description" => description = Some(expr_to_string(&attr.expr)),
                "type" | "sensitive" => {}
                _ => tracing::debug!("Ignoring variable attribute: {}", key),
            }
        }
    }

    Ok(Some(RawVariable {
        name,
        default,
        description,
        comments: None,
    }))
}

fn parse_output_block(block: &hcl::Block) -> Result<Option<RawOutput>> {
    let labels = block_labels(block);
    if labels.is_empty() {
        return Ok(None);
    }

    let name = labels[0].clone();
    let mut value = RawValue::Null;
    let mut depends_on = Vec::new();

    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            let key: &str = &attr.key;
            match key {
                "value" => value = hcl_expr_to_raw(&attr.expr),
                "depends_on" => depends_on = expr_to_string_list(&attr.expr),
                "description" | "sensitive" => {}
                _ => tracing::debug!("Ignoring output attribute: {}", key),
            }
        }
    }

    Ok(Some(RawOutput {
        name,
        value,
        depends_on,
        comments: None,
    }))
}

fn parse_module_block(block: &hcl::Block) -> Result<Option<RawModuleCall>> {
    let labels = block_labels(block);
    if labels.is_empty() {
        return Ok(None);
    }

    let name = labels[0].clone();
    let mut source = String::new();
    let mut depends_on = Vec::new();
    let mut variables = BTreeMap::new();

    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            let key: &str = &attr.key;
            match key {
                "source" => source = expr_to_string(&attr.expr),
                "version" => {}
                "depends_on" => depends_on = expr_to_string_list(&attr.expr),
                "providers" => tracing::debug!("Skipping module provider overrides"),
                _ => {
                    variables.insert(key.to_string(), hcl_expr_to_raw(&attr.expr));
                }
            }
        }
    }

    Ok(Some(RawModuleCall {
        name,
        source,
        depends_on,
        variables,
        comments: None,
    }))
}

fn parse_locals_block(block: &hcl::Block) -> Result<BTreeMap<String, Expression>> {
    let mut locals = BTreeMap::new();
    for structure in block.body().iter() {
        if let hcl::Structure::Attribute(attr) = structure {
            locals.insert(
                attr.key.to_string(),
                raw_to_expression(hcl_expr_to_raw(&attr.expr)),
            );
        }
    }
    Ok(locals)
}

// ─── Expression conversion ──────────────────────────────────────────────────

/// Convert an hcl::Expression into a raw value. Scalars, arrays, and objects
/// stay raw; anything needing evaluation becomes an interpolation AST.
pub fn hcl_expr_to_raw(expr: &hcl::Expression) -> RawValue {
    match expr {
        hcl::Expression::Null => RawValue::Null,
        hcl::Expression::Bool(b) => RawValue::Bool(*b),
        hcl::Expression::Number(n) => match n.as_f64() {
            Some(f) => RawValue::Number(f),
            None => RawValue::Null,
        },
        hcl::Expression::String(s) => {
            if s.contains("${") {
                parse_template_string(s)
            } else {
                RawValue::String(s.clone())
            }
        }
        hcl::Expression::Array(items) => {
            RawValue::List(items.iter().map(hcl_expr_to_raw).collect())
        }
        hcl::Expression::Object(entries) => RawValue::Map(
            entries
                .iter()
                .map(|(k, v)| (object_key_to_string(k), hcl_expr_to_raw(v)))
                .collect(),
        ),
        hcl::Expression::Parenthesis(inner) => hcl_expr_to_raw(inner),
        _ => expression_to_raw(hcl_expr_to_expression(expr)),
    }
}

/// Wrap an interpolation AST back into a raw value, projecting literal leaves.
fn expression_to_raw(expr: Expression) -> RawValue {
    match expr {
        Expression::Literal(raw) => raw,
        other => RawValue::Expr(Box::new(other)),
    }
}

fn raw_to_expression(raw: RawValue) -> Expression {
    match raw {
        RawValue::Expr(e) => *e,
        other => Expression::Literal(other),
    }
}

fn hcl_expr_to_expression(expr: &hcl::Expression) -> Expression {
    match expr {
        hcl::Expression::Null => Expression::Literal(RawValue::Null),
        hcl::Expression::Bool(b) => Expression::Literal(RawValue::Bool(*b)),
        hcl::Expression::Number(n) => match n.as_f64() {
            Some(f) => Expression::Literal(RawValue::Number(f)),
            None => Expression::Literal(RawValue::Null),
        },
        hcl::Expression::String(s) => {
            if s.contains("${") {
                raw_to_expression(parse_template_string(s))
            } else {
                Expression::Literal(RawValue::String(s.clone()))
            }
        }
        hcl::Expression::Array(items) => {
            Expression::Literal(RawValue::List(items.iter().map(hcl_expr_to_raw).collect()))
        }
        hcl::Expression::Object(entries) => Expression::Literal(RawValue::Map(
            entries
                .iter()
                .map(|(k, v)| (object_key_to_string(k), hcl_expr_to_raw(v)))
                .collect(),
        )),
        hcl::Expression::TemplateExpr(template) => parse_template_expr(template),
        hcl::Expression::Variable(var) => Expression::Reference(vec![var.to_string()]),
        hcl::Expression::Traversal(traversal) => traversal_to_expression(traversal),
        hcl::Expression::FuncCall(func_call) => Expression::Call {
            name: func_call.name.to_string(),
            args: func_call.args.iter().map(hcl_expr_to_expression).collect(),
        },
        hcl::Expression::Conditional(cond) => Expression::Conditional {
            condition: Box::new(hcl_expr_to_expression(&cond.cond_expr)),
            true_val: Box::new(hcl_expr_to_expression(&cond.true_expr)),
            false_val: Box::new(hcl_expr_to_expression(&cond.false_expr)),
        },
        hcl::Expression::Operation(op) => match op.as_ref() {
            hcl::expr::Operation::Unary(unary) => Expression::UnaryOp {
                op: match unary.operator {
                    hcl::expr::UnaryOperator::Neg => UnaryOp::Neg,
                    hcl::expr::UnaryOperator::Not => UnaryOp::Not,
                },
                operand: Box::new(hcl_expr_to_expression(&unary.expr)),
            },
            hcl::expr::Operation::Binary(binary) => Expression::BinaryOp {
                op: match binary.operator {
                    hcl::expr::BinaryOperator::Eq => BinOp::Eq,
                    hcl::expr::BinaryOperator::NotEq => BinOp::NotEq,
                    hcl::expr::BinaryOperator::Less => BinOp::Lt,
                    hcl::expr::BinaryOperator::LessEq => BinOp::Lte,
                    hcl::expr::BinaryOperator::Greater => BinOp::Gt,
                    hcl::expr::BinaryOperator::GreaterEq => BinOp::Gte,
                    hcl::expr::BinaryOperator::Plus => BinOp::Add,
                    hcl::expr::BinaryOperator::Minus => BinOp::Sub,
                    hcl::expr::BinaryOperator::Mul => BinOp::Mul,
                    hcl::expr::BinaryOperator::Div => BinOp::Div,
                    hcl::expr::BinaryOperator::Mod => BinOp::Mod,
                    hcl::expr::BinaryOperator::And => BinOp::And,
                    hcl::expr::BinaryOperator::Or => BinOp::Or,
                },
                left: Box::new(hcl_expr_to_expression(&binary.lhs_expr)),
                right: Box::new(hcl_expr_to_expression(&binary.rhs_expr)),
            },
        },
        hcl::Expression::Parenthesis(inner) => hcl_expr_to_expression(inner),
        other => Expression::Unsupported {
            summary: summarize(other),
        },
    }
}

/// Convert a traversal like `aws_instance.web[0].id` into a reference path.
/// Literal indices become `"[i]"` elements and splats `"[*]"`; a non-literal
/// index ends the path and becomes an index expression.
fn traversal_to_expression(traversal: &hcl::expr::Traversal) -> Expression {
    let mut parts = Vec::new();
    match &traversal.expr {
        hcl::Expression::Variable(var) => parts.push(var.to_string()),
        other => {
            return Expression::Unsupported {
                summary: summarize(other),
            }
        }
    }

    let mut operators = traversal.operators.iter().peekable();
    while let Some(operator) = operators.next() {
        match operator {
            hcl::expr::TraversalOperator::GetAttr(ident) => parts.push(ident.to_string()),
            hcl::expr::TraversalOperator::LegacyIndex(n) => parts.push(format!("[{}]", n)),
            hcl::expr::TraversalOperator::AttrSplat | hcl::expr::TraversalOperator::FullSplat => {
                parts.push("[*]".to_string());
            }
            hcl::expr::TraversalOperator::Index(idx) => match idx {
                hcl::Expression::Number(n) if n.as_i64().is_some() => {
                    parts.push(format!("[{}]", n.as_i64().unwrap_or_default()));
                }
                key => {
                    // A computed index is only supported in trailing
                    // position, where it becomes an index expression.
                    if operators.peek().is_some() {
                        return Expression::Unsupported {
                            summary: format!("computed index inside path: {}", parts.join(".")),
                        };
                    }
                    return Expression::Index {
                        collection: Box::new(Expression::Reference(parts)),
                        key: Box::new(hcl_expr_to_expression(key)),
                    };
                }
            },
        }
    }

    Expression::Reference(parts)
}

fn summarize(expr: &hcl::Expression) -> String {
    let text = format!("{:?}", expr);
    match text.split_once('(') {
        Some((kind, _)) => format!("unsupported {} expression", kind.to_lowercase()),
        None => "unsupported expression".to_string(),
    }
}

// ─── Template handling ──────────────────────────────────────────────────────

fn parse_template_expr(template: &hcl::expr::TemplateExpr) -> Expression {
    match hcl::template::Template::from_expr(template) {
        Ok(parsed) => template_to_expression(parsed.elements()),
        Err(err) => {
            tracing::debug!("Failed to reparse template: {}", err);
            Expression::Unsupported {
                summary: "unparseable template".to_string(),
            }
        }
    }
}

/// Parse a plain string that carries `${...}` interpolation markers.
fn parse_template_string(s: &str) -> RawValue {
    match s.parse::<hcl::template::Template>() {
        Ok(parsed) => expression_to_raw(template_to_expression(parsed.elements())),
        Err(_) => RawValue::String(s.to_string()),
    }
}

/// An interpolation with exactly one sub-expression and no literal text
/// projects to that sub-expression; everything else stays a template.
fn template_to_expression(elements: &[hcl::template::Element]) -> Expression {
    let mut parts = Vec::new();
    for element in elements {
        match element {
            hcl::template::Element::Literal(text) => {
                parts.push(TemplatePart::Literal(text.clone()));
            }
            hcl::template::Element::Interpolation(interp) => {
                parts.push(TemplatePart::Interpolation(Box::new(
                    hcl_expr_to_expression(&interp.expr),
                )));
            }
            hcl::template::Element::Directive(_) => {
                return Expression::Unsupported {
                    summary: "template directive".to_string(),
                };
            }
        }
    }

    if parts.len() == 1 {
        if let TemplatePart::Interpolation(expr) = &parts[0] {
            return (**expr).clone();
        }
    }

    Expression::Template(parts)
}

// ─── Helper functions ───────────────────────────────────────────────────────

fn expr_to_string(expr: &hcl::Expression) -> String {
    match expr {
        hcl::Expression::String(s) => s.clone(),
        hcl::Expression::Variable(v) => v.to_string(),
        hcl::Expression::Number(n) => n.to_string(),
        hcl::Expression::Bool(b) => b.to_string(),
        hcl::Expression::Null => "null".to_string(),
        hcl::Expression::Traversal(t) => {
            let mut parts = Vec::new();
            if let hcl::Expression::Variable(var) = &t.expr {
                parts.push(var.to_string());
            }
            for op in &t.operators {
                if let hcl::expr::TraversalOperator::GetAttr(ident) = op {
                    parts.push(ident.to_string());
                }
            }
            parts.join(".")
        }
        _ => format!("{:?}", expr),
    }
}

fn object_key_to_string(key: &hcl::expr::ObjectKey) -> String {
    match key {
        hcl::expr::ObjectKey::Identifier(id) => id.to_string(),
        hcl::expr::ObjectKey::Expression(expr) => expr_to_string(expr),
        _ => String::new(),
    }
}

fn expr_to_string_list(expr: &hcl::Expression) -> Vec<String> {
    match expr {
        hcl::Expression::Array(items) => items.iter().map(expr_to_string).collect(),
        _ => vec![],
    }
}
