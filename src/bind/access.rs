use anyhow::{bail, Result};

use crate::bind::{BindError, Binder, ModuleCtx};
use crate::il::expr::{
    AccessExpr, AccessKind, ErrorExpr, Expr, Instancing, IrNode, PathKind, ResourceMode,
};
use crate::il::intrinsics;
use crate::il::ty::Type;
use crate::schema::SchemaView;

impl<'a> Binder<'a> {
    /// Resolve a reference path to a variable access, dispatching on the
    /// source prefix.
    pub(crate) fn bind_reference(&mut self, ctx: &mut ModuleCtx, parts: &[String]) -> Result<Expr> {
        let Some(head) = parts.first() else {
            bail!("empty reference");
        };

        match head.as_str() {
            "count" if parts.get(1).map(String::as_str) == Some("index") => {
                if !ctx.in_counted_resource {
                    return Err(BindError::CountIndexScope.into());
                }
                Ok(access(AccessKind::CountIndex, Type::NUMBER, Vec::new(), None))
            }
            "local" => self.bind_local_access(ctx, parts),
            "module" => self.bind_module_access(ctx, parts),
            "path" => self.bind_path_access(parts),
            "var" => self.bind_variable_access(ctx, parts),
            "self" => Ok(soft_error(
                parts,
                Type::UNKNOWN,
                "self references are not supported",
            )),
            "terraform" => {
                if parts.get(1).map(String::as_str) == Some("workspace") {
                    Ok(intrinsics::get_stack())
                } else {
                    Ok(soft_error(
                        parts,
                        Type::STRING,
                        "only terraform.workspace is supported",
                    ))
                }
            }
            "count" | "each" => Ok(soft_error(
                parts,
                Type::UNKNOWN,
                "unsupported meta reference",
            )),
            _ if parts.len() == 1 => {
                bail!("simple variable reference {:?} is not supported", head)
            }
            _ => self.bind_resource_access(ctx, parts),
        }
    }

    fn bind_local_access(&mut self, ctx: &mut ModuleCtx, parts: &[String]) -> Result<Expr> {
        let Some(name) = parts.get(1) else {
            bail!("malformed local reference");
        };
        let path = normalize_path(&parts[2..]);

        if !self.graph.module(ctx.id).locals.contains_key(name) {
            if self.opts.allow_missing_variables {
                return Ok(access(AccessKind::Local, Type::UNKNOWN, path, None));
            }
            return Err(BindError::MissingLocal(name.clone()).into());
        }

        // Forward references are allowed; binding on demand detects cycles.
        let id = self.ensure_local(ctx, name)?;
        let value_ty = match self.graph.node(id) {
            crate::il::node::Node::Local(local) => {
                local.value.as_ref().map(IrNode::ty).unwrap_or(Type::UNKNOWN)
            }
            _ => Type::UNKNOWN,
        };
        let ty = if path.is_empty() { value_ty } else { Type::UNKNOWN };
        Ok(access(AccessKind::Local, ty, path, Some(id)))
    }

    fn bind_module_access(&mut self, ctx: &mut ModuleCtx, parts: &[String]) -> Result<Expr> {
        let Some(name) = parts.get(1) else {
            bail!("malformed module reference");
        };
        let path = normalize_path(&parts[2..]);

        match self.graph.module(ctx.id).modules.get(name) {
            Some(id) => Ok(access(
                AccessKind::Module,
                Type::UNKNOWN.output_of(),
                path,
                Some(*id),
            )),
            None if self.opts.allow_missing_variables => {
                Ok(access(AccessKind::Module, Type::UNKNOWN, path, None))
            }
            None => Err(BindError::MissingModule(name.clone()).into()),
        }
    }

    fn bind_path_access(&mut self, parts: &[String]) -> Result<Expr> {
        let kind = match parts.get(1).map(String::as_str) {
            Some("cwd") => PathKind::Cwd,
            Some("module") => PathKind::Module,
            Some("root") => PathKind::Root,
            other => bail!("unsupported path reference: path.{}", other.unwrap_or("")),
        };
        Ok(access(AccessKind::Path(kind), Type::STRING, Vec::new(), None))
    }

    fn bind_variable_access(&mut self, ctx: &mut ModuleCtx, parts: &[String]) -> Result<Expr> {
        let Some(name) = parts.get(1) else {
            bail!("malformed variable reference");
        };
        let path = normalize_path(&parts[2..]);

        match self.graph.module(ctx.id).variables.get(name) {
            Some(id) => {
                let default_ty = match self.graph.node(*id) {
                    crate::il::node::Node::Variable(var) => {
                        var.default.as_ref().map(IrNode::ty).unwrap_or(Type::STRING)
                    }
                    _ => Type::STRING,
                };
                let ty = if path.is_empty() {
                    default_ty
                } else {
                    Type::UNKNOWN
                };
                Ok(access(AccessKind::Variable, ty, path, Some(*id)))
            }
            None if self.opts.allow_missing_variables => {
                Ok(access(AccessKind::Variable, Type::STRING, path, None))
            }
            None => Err(BindError::MissingVariable(name.clone()).into()),
        }
    }

    /// Resolve `<type>.<name>[instance].<field>…` (or the `data.`-prefixed
    /// form) against the graph and the provider schema. The leaf type is the
    /// schema-walked field type wrapped in output; a splat wraps it in a list
    /// as well.
    fn bind_resource_access(&mut self, ctx: &mut ModuleCtx, parts: &[String]) -> Result<Expr> {
        let (mut mode, type_name, name, rest) = if parts[0] == "data" {
            if parts.len() < 3 {
                bail!("malformed data source reference: {}", parts.join("."));
            }
            (ResourceMode::Data, &parts[1], &parts[2], &parts[3..])
        } else {
            if parts.len() < 2 {
                bail!("malformed resource reference: {}", parts.join("."));
            }
            (ResourceMode::Managed, &parts[0], &parts[1], &parts[2..])
        };

        let mut address = if mode == ResourceMode::Data {
            format!("data.{}.{}", type_name, name)
        } else {
            format!("{}.{}", type_name, name)
        };
        // Legacy references reach data sources without the `data.` prefix.
        if mode == ResourceMode::Managed
            && !self.graph.module(ctx.id).resources.contains_key(&address)
        {
            let data_address = format!("data.{}.{}", type_name, name);
            if self.graph.module(ctx.id).resources.contains_key(&data_address) {
                mode = ResourceMode::Data;
                address = data_address;
            }
        }

        let Some(&target) = self.graph.module(ctx.id).resources.get(&address) else {
            if self.opts.allow_missing_variables {
                let path = normalize_path(rest);
                return Ok(access(
                    AccessKind::Resource {
                        mode,
                        instancing: Instancing::Single,
                    },
                    Type::UNKNOWN,
                    path,
                    None,
                ));
            }
            return Err(BindError::MissingResource(address).into());
        };

        // The resource's schema lives on its provider; synthesise one if the
        // configuration never mentioned it.
        let provider_name = type_name
            .split('_')
            .next()
            .unwrap_or(type_name)
            .to_string();
        let provider_id = self.ensure_provider(ctx, &provider_name)?;
        let info = match self.graph.node(provider_id) {
            crate::il::node::Node::Provider(p) => p
                .info
                .resource(type_name, mode == ResourceMode::Data)
                .cloned(),
            _ => None,
        };

        // Split an instance selector off the front of the remaining path.
        let (explicit, field_parts) = match rest.first().map(String::as_str) {
            Some("[*]") | Some("*") => (Some(None), &rest[1..]),
            Some(part) => match parse_index(part) {
                Some(i) => (Some(Some(i)), &rest[1..]),
                None => (None, rest),
            },
            None => (None, rest),
        };

        let counted = ctx.counted.get(&address).copied().unwrap_or(false);
        let instancing = match explicit {
            // A counted resource referenced without an index is promoted to
            // its zeroth element; an index on a non-counted resource is
            // demoted to a plain access.
            Some(None) if counted => Instancing::Splat,
            Some(None) => Instancing::Single,
            Some(Some(i)) if counted => Instancing::Indexed(i),
            Some(Some(_)) => Instancing::Single,
            None if counted => Instancing::Indexed(0),
            None => Instancing::Single,
        };

        let path = normalize_path(field_parts);
        let root_view = match &info {
            Some(info) => SchemaView::for_resource(info),
            None => SchemaView::empty(),
        };
        let mut leaf_view = root_view.clone();
        for part in &path {
            leaf_view = leaf_view.property_schemas(part);
        }
        let leaf_ty = leaf_view.type_();

        let ty = match instancing {
            Instancing::Splat => leaf_ty.output_of().list_of(),
            _ => leaf_ty.output_of(),
        };

        Ok(Expr::Access(Box::new(AccessExpr {
            ty,
            comments: None,
            kind: AccessKind::Resource { mode, instancing },
            path,
            schemas: root_view,
            target: Some(target),
        })))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn access(kind: AccessKind, ty: Type, path: Vec<String>, target: Option<crate::il::node::NodeId>) -> Expr {
    Expr::Access(Box::new(AccessExpr {
        ty,
        comments: None,
        kind,
        path,
        schemas: SchemaView::empty(),
        target,
    }))
}

fn soft_error(parts: &[String], ty: Type, diagnostic: &str) -> Expr {
    Expr::Error(Box::new(ErrorExpr {
        ty,
        comments: None,
        node: IrNode::Expr(Expr::string(parts.join("."))),
        diagnostic: format!("{}: {}", diagnostic, parts.join(".")),
    }))
}

/// `"[3]"` and `"3"` both denote index three.
fn parse_index(part: &str) -> Option<usize> {
    let inner = part
        .strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
        .unwrap_or(part);
    inner.parse::<usize>().ok()
}

/// Normalise path elements: strip index brackets so schema walks and the
/// emitter see bare keys.
fn normalize_path(parts: &[String]) -> Vec<String> {
    parts
        .iter()
        .map(|p| {
            p.strip_prefix('[')
                .and_then(|q| q.strip_suffix(']'))
                .unwrap_or(p)
                .to_string()
        })
        .collect()
}
