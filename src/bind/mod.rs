mod access;
mod expr;
mod property;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::types::{Expression, ModuleTree, RawProvider, RawResource, RawValue};
use crate::config::comments::attach_comments;
use crate::il::expr::{Expr, IrNode, LitExpr, LitValue, MapProp, ResourceMode};
use crate::il::node::{
    Graph, LocalNode, Module, ModuleId, ModuleNode, Node, NodeId, OutputNode, ProviderNode,
    ResourceNode, VariableNode,
};
use crate::il::visitor::visit_node_exprs;
use crate::schema::{ProviderInfo, SchemaRegistry, SchemaView};

// ─── Options and errors ─────────────────────────────────────────────────────

/// Knobs for graph building. The allow-missing options downgrade classes of
/// hard errors into best-effort bindings.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Tolerate providers whose schema cannot be fetched; their resources
    /// bind with empty schemas.
    pub allow_missing_plugins: bool,
    /// Tolerate dangling variable/local/resource/module references; they bind
    /// to accesses with no back-reference and a best-effort type.
    pub allow_missing_variables: bool,
    /// Tolerate failures while re-reading sources for comment attachment.
    pub allow_missing_comments: bool,
}

/// Hard errors that abort graph building.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("cyclic reference through local {0:?}")]
    CyclicLocal(String),
    #[error("cyclic reference through provider {0:?}")]
    CyclicProvider(String),
    #[error("unknown provider {0:?}")]
    MissingProvider(String),
    #[error("unknown variable {0:?}")]
    MissingVariable(String),
    #[error("unknown local {0:?}")]
    MissingLocal(String),
    #[error("unknown module {0:?}")]
    MissingModule(String),
    #[error("unknown resource {0:?}")]
    MissingResource(String),
    #[error("module references are not allowed in depends_on: {0:?}")]
    ModuleDependsOn(String),
    #[error("count.index is only valid inside a counted resource")]
    CountIndexScope,
    #[error("unknown depends_on target {0:?}")]
    MissingDependency(String),
}

// ─── Binder ─────────────────────────────────────────────────────────────────

/// Lift a raw module tree into a typed, dependency-annotated graph.
pub fn build_graph(
    tree: &ModuleTree,
    opts: &BuildOptions,
    registry: &mut SchemaRegistry,
) -> Result<Graph> {
    let mut binder = Binder {
        graph: Graph::new(),
        opts,
        registry,
    };
    binder.bind_module(tree, true)?;
    binder.compute_dependencies();
    Ok(binder.graph)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindState {
    Unbound,
    Binding,
    Bound,
}

/// Per-module binding state: raw bodies awaiting binding plus the in-progress
/// markers the ensure-bound machinery uses for cycle detection.
pub(crate) struct ModuleCtx {
    pub(crate) id: ModuleId,
    pub(crate) locals_raw: BTreeMap<String, Expression>,
    pub(crate) local_state: BTreeMap<String, BindState>,
    pub(crate) provider_raw: BTreeMap<String, RawProvider>,
    pub(crate) provider_state: BTreeMap<String, BindState>,
    /// Resource address → still multi-instance after count normalisation.
    pub(crate) counted: BTreeMap<String, bool>,
    /// True while binding the body of a counted resource; gates count.index.
    pub(crate) in_counted_resource: bool,
}

pub(crate) struct Binder<'a> {
    pub(crate) graph: Graph,
    pub(crate) opts: &'a BuildOptions,
    pub(crate) registry: &'a mut SchemaRegistry,
}

impl<'a> Binder<'a> {
    /// Bind one module and, depth-first, its children. Returns the module id.
    fn bind_module(&mut self, tree: &ModuleTree, is_root: bool) -> Result<ModuleId> {
        // Children first so module nodes can hold their handles.
        let mut children = BTreeMap::new();
        for (name, child) in &tree.children {
            let child_id = self.bind_module(child, false)?;
            children.insert(name.clone(), child_id);
        }

        let id = if is_root {
            // The graph pre-allocates the root module slot.
            crate::il::node::ROOT_MODULE
        } else {
            self.graph.add_module(Module::default())
        };
        {
            let module = self.graph.module_mut(id);
            module.name = tree.name.clone();
            module.dir = tree.dir.clone();
            module.children = children.clone();
        }

        let mut ctx = ModuleCtx {
            id,
            locals_raw: tree.locals.clone(),
            local_state: tree
                .locals
                .keys()
                .map(|k| (k.clone(), BindState::Unbound))
                .collect(),
            provider_raw: tree
                .providers
                .iter()
                .map(|p| (provider_key(p), p.clone()))
                .collect(),
            provider_state: tree
                .providers
                .iter()
                .map(|p| (provider_key(p), BindState::Unbound))
                .collect(),
            counted: BTreeMap::new(),
            in_counted_resource: false,
        };

        self.create_nodes(tree, &mut ctx)?;
        self.bind_nodes(tree, &mut ctx)?;

        // Comments are best-effort; only a disabled tolerance turns a failed
        // reparse into a hard error.
        if let Err(err) = attach_comments(&mut self.graph, id, &tree.dir) {
            if self.opts.allow_missing_comments {
                tracing::warn!("Comment extraction failed: {:#}", err);
            } else {
                return Err(err.context("Comment extraction failed"));
            }
        }

        Ok(id)
    }

    /// Create all top-level nodes unbound so that cross-references resolve
    /// during the binding pass.
    fn create_nodes(&mut self, tree: &ModuleTree, ctx: &mut ModuleCtx) -> Result<()> {
        let mut variables: Vec<_> = tree.variables.iter().collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        for var in variables {
            let node_id = self.graph.add_node(Node::Variable(VariableNode {
                name: var.name.clone(),
                default: None,
                deps: Vec::new(),
                comments: var.comments.clone(),
            }));
            self.graph
                .module_mut(ctx.id)
                .variables
                .insert(var.name.clone(), node_id);
        }

        for name in tree.locals.keys() {
            let node_id = self.graph.add_node(Node::Local(LocalNode {
                name: name.clone(),
                value: None,
                deps: Vec::new(),
                comments: None,
            }));
            self.graph
                .module_mut(ctx.id)
                .locals
                .insert(name.clone(), node_id);
        }

        let mut resources: Vec<(&RawResource, ResourceMode)> = tree
            .resources
            .iter()
            .map(|r| (r, ResourceMode::Managed))
            .chain(tree.data_sources.iter().map(|r| (r, ResourceMode::Data)))
            .collect();
        resources.sort_by_key(|(r, mode)| resource_address(r, *mode));
        for (raw, mode) in resources {
            let address = resource_address(raw, mode);
            ctx.counted
                .insert(address.clone(), raw_count_is_multi(raw.count.as_ref()));
            let node_id = self.graph.add_node(Node::Resource(ResourceNode {
                mode,
                type_name: raw.resource_type.clone(),
                name: raw.name.clone(),
                properties: MapProp::default(),
                count: None,
                provider: None,
                info: None,
                ignore_changes: raw.ignore_changes.clone(),
                timeouts: raw.timeouts.clone(),
                is_conditional: false,
                is_prompt: false,
                deps: Vec::new(),
                explicit_deps: Vec::new(),
                comments: raw.comments.clone(),
            }));
            self.graph
                .module_mut(ctx.id)
                .resources
                .insert(address, node_id);
        }

        let mut modules: Vec<_> = tree.modules.iter().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        for call in modules {
            let child = *self
                .graph
                .module(ctx.id)
                .children
                .get(&call.name)
                .with_context(|| format!("Module {:?} was not loaded", call.name))?;
            let node_id = self.graph.add_node(Node::Module(ModuleNode {
                name: call.name.clone(),
                properties: MapProp::default(),
                child,
                deps: Vec::new(),
                explicit_deps: Vec::new(),
                comments: call.comments.clone(),
            }));
            self.graph
                .module_mut(ctx.id)
                .modules
                .insert(call.name.clone(), node_id);
        }

        let mut outputs: Vec<_> = tree.outputs.iter().collect();
        outputs.sort_by(|a, b| a.name.cmp(&b.name));
        for output in outputs {
            let node_id = self.graph.add_node(Node::Output(OutputNode {
                name: output.name.clone(),
                value: None,
                deps: Vec::new(),
                explicit_deps: Vec::new(),
                comments: output.comments.clone(),
            }));
            self.graph
                .module_mut(ctx.id)
                .outputs
                .insert(output.name.clone(), node_id);
        }

        Ok(())
    }

    /// Bind every node's body. Locals and providers bind on demand through
    /// the ensure machinery; everything else binds exactly once here.
    fn bind_nodes(&mut self, tree: &ModuleTree, ctx: &mut ModuleCtx) -> Result<()> {
        let mut variables: Vec<_> = tree.variables.to_vec();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        for var in &variables {
            let bound = match &var.default {
                Some(raw) => self.bind_value(ctx, raw, &SchemaView::empty())?,
                None => None,
            };
            let id = self.graph.module(ctx.id).variables[&var.name];
            if let Node::Variable(node) = self.graph.node_mut(id) {
                node.default = bound;
            }
        }

        let local_names: Vec<String> = ctx.locals_raw.keys().cloned().collect();
        for name in local_names {
            self.ensure_local(ctx, &name)?;
        }

        let provider_keys: Vec<String> = ctx.provider_raw.keys().cloned().collect();
        for key in provider_keys {
            self.ensure_provider(ctx, &key)?;
        }

        let resource_addresses: Vec<String> = self
            .graph
            .module(ctx.id)
            .resources
            .keys()
            .cloned()
            .collect();
        let raw_by_address: BTreeMap<String, (RawResource, ResourceMode)> = tree
            .resources
            .iter()
            .map(|r| (r.clone(), ResourceMode::Managed))
            .chain(tree.data_sources.iter().map(|r| (r.clone(), ResourceMode::Data)))
            .map(|(r, mode)| (resource_address(&r, mode), (r, mode)))
            .collect();
        for address in resource_addresses {
            let (raw, mode) = raw_by_address
                .get(&address)
                .cloned()
                .with_context(|| format!("Missing raw body for {}", address))?;
            self.bind_resource(ctx, &address, &raw, mode)
                .with_context(|| format!("Failed to bind {}", address))?;
        }

        let mut module_calls = tree.modules.to_vec();
        module_calls.sort_by(|a, b| a.name.cmp(&b.name));
        for call in &module_calls {
            let mut properties = MapProp::default();
            for (key, raw) in &call.variables {
                if let Some(bound) = self.bind_value(ctx, raw, &SchemaView::empty())? {
                    properties.entries.insert(key.clone(), bound);
                }
            }
            let explicit = self.bind_depends_on(ctx, &call.depends_on)?;
            let id = self.graph.module(ctx.id).modules[&call.name];
            if let Node::Module(node) = self.graph.node_mut(id) {
                node.properties = properties;
                node.explicit_deps = explicit;
            }
        }

        let mut outputs = tree.outputs.to_vec();
        outputs.sort_by(|a, b| a.name.cmp(&b.name));
        for output in &outputs {
            let bound = self.bind_value(ctx, &output.value, &SchemaView::empty())?;
            let explicit = self.bind_depends_on(ctx, &output.depends_on)?;
            let id = self.graph.module(ctx.id).outputs[&output.name];
            if let Node::Output(node) = self.graph.node_mut(id) {
                node.value = bound;
                node.explicit_deps = explicit;
            }
        }

        Ok(())
    }

    /// Bind one resource: count first (it gates count.index in the body),
    /// then the property bag against the provider schema.
    fn bind_resource(
        &mut self,
        ctx: &mut ModuleCtx,
        address: &str,
        raw: &RawResource,
        mode: ResourceMode,
    ) -> Result<()> {
        let provider_id = self.ensure_resource_provider(ctx, raw)?;
        let info = match self.graph.node(provider_id) {
            Node::Provider(p) => p
                .info
                .resource(&raw.resource_type, mode == ResourceMode::Data)
                .cloned(),
            _ => None,
        };
        if info.is_none() {
            tracing::warn!(
                "No schema for {}; binding with best-effort types",
                address
            );
        }

        let count = match &raw.count {
            Some(raw_count) => self.bind_count(ctx, raw_count)?,
            None => None,
        };
        let is_conditional = count.as_ref().map(is_boolean_expr).unwrap_or(false);
        ctx.counted.insert(address.to_string(), count.is_some());

        let root_view = match &info {
            Some(info) => SchemaView::for_resource(info),
            None => SchemaView::empty(),
        };

        ctx.in_counted_resource = count.is_some();
        let mut properties = MapProp {
            schemas: root_view.clone(),
            comments: None,
            entries: BTreeMap::new(),
        };
        for (key, value) in &raw.attributes {
            let child_view = root_view.property_schemas(key);
            if let Some(bound) = self.bind_value(ctx, value, &child_view)? {
                properties.entries.insert(key.clone(), bound);
            }
        }
        ctx.in_counted_resource = false;

        let explicit = self.bind_depends_on(ctx, &raw.depends_on)?;

        let id = self.graph.module(ctx.id).resources[address];
        if let Node::Resource(node) = self.graph.node_mut(id) {
            node.properties = properties;
            node.count = count;
            node.provider = Some(provider_id);
            node.info = info;
            node.is_conditional = is_conditional;
            node.explicit_deps = explicit;
        }
        Ok(())
    }

    /// Normalise a bound count per the count-coercion rules: a literal that
    /// parses to 1 means single-instance (no count); any other integer
    /// literal becomes a number literal.
    fn bind_count(&mut self, ctx: &mut ModuleCtx, raw: &RawValue) -> Result<Option<Expr>> {
        let bound = match self.bind_value(ctx, raw, &SchemaView::empty())? {
            Some(IrNode::Expr(e)) => e,
            Some(_) => return Ok(None),
            None => return Ok(None),
        };
        match &bound {
            Expr::Lit(LitExpr {
                value: LitValue::String(s),
                ..
            }) => match s.trim().parse::<i64>() {
                Ok(1) => Ok(None),
                Ok(n) => Ok(Some(Expr::number(n as f64))),
                Err(_) => Ok(Some(bound)),
            },
            Expr::Lit(LitExpr {
                value: LitValue::Number(n),
                ..
            }) if *n == 1.0 => Ok(None),
            _ => Ok(Some(bound)),
        }
    }

    /// Bind a local on demand. Re-entry while the local is mid-bind is a
    /// cyclic-reference hard error.
    pub(crate) fn ensure_local(&mut self, ctx: &mut ModuleCtx, name: &str) -> Result<NodeId> {
        let id = match self.graph.module(ctx.id).locals.get(name) {
            Some(id) => *id,
            None => return Err(BindError::MissingLocal(name.to_string()).into()),
        };
        match ctx.local_state.get(name).copied() {
            Some(BindState::Bound) => return Ok(id),
            Some(BindState::Binding) => {
                return Err(BindError::CyclicLocal(name.to_string()).into())
            }
            _ => {}
        }
        ctx.local_state
            .insert(name.to_string(), BindState::Binding);
        let raw = ctx
            .locals_raw
            .get(name)
            .cloned()
            .with_context(|| format!("Missing raw body for local {:?}", name))?;
        let bound = self.bind_expression(ctx, &raw, &SchemaView::empty())?;
        if let Node::Local(node) = self.graph.node_mut(id) {
            node.value = Some(IrNode::Expr(bound));
        }
        ctx.local_state.insert(name.to_string(), BindState::Bound);
        Ok(id)
    }

    /// Bind or synthesise a provider on demand. `key` is `name` or
    /// `name.alias`. Synthesised providers carry only schema info and are
    /// not emitted.
    pub(crate) fn ensure_provider(&mut self, ctx: &mut ModuleCtx, key: &str) -> Result<NodeId> {
        if let Some(id) = self.graph.module(ctx.id).providers.get(key) {
            let id = *id;
            match ctx.provider_state.get(key).copied() {
                Some(BindState::Binding) => {
                    return Err(BindError::CyclicProvider(key.to_string()).into())
                }
                Some(BindState::Bound) | None => return Ok(id),
                Some(BindState::Unbound) => {}
            }
        }

        let name = key.split('.').next().unwrap_or(key).to_string();
        let (info, plugin_name) = self.fetch_provider_info(&name)?;

        match ctx.provider_raw.get(key).cloned() {
            Some(raw) => {
                ctx.provider_state
                    .insert(key.to_string(), BindState::Binding);
                let node_id = self.graph.add_node(Node::Provider(ProviderNode {
                    name: raw.name.clone(),
                    alias: raw.alias.clone(),
                    properties: MapProp::default(),
                    info,
                    plugin_name,
                    synthesised: false,
                    deps: Vec::new(),
                    explicit_deps: Vec::new(),
                    comments: raw.comments.clone(),
                }));
                self.graph
                    .module_mut(ctx.id)
                    .providers
                    .insert(key.to_string(), node_id);

                let mut properties = MapProp::default();
                for (attr, value) in &raw.config {
                    if let Some(bound) = self.bind_value(ctx, value, &SchemaView::empty())? {
                        properties.entries.insert(attr.clone(), bound);
                    }
                }
                if let Node::Provider(node) = self.graph.node_mut(node_id) {
                    node.properties = properties;
                }
                ctx.provider_state
                    .insert(key.to_string(), BindState::Bound);
                Ok(node_id)
            }
            None => {
                let node_id = self.graph.add_node(Node::Provider(ProviderNode {
                    name: name.clone(),
                    alias: None,
                    properties: MapProp::default(),
                    info,
                    plugin_name,
                    synthesised: true,
                    deps: Vec::new(),
                    explicit_deps: Vec::new(),
                    comments: None,
                }));
                self.graph
                    .module_mut(ctx.id)
                    .providers
                    .insert(key.to_string(), node_id);
                Ok(node_id)
            }
        }
    }

    fn fetch_provider_info(
        &mut self,
        name: &str,
    ) -> Result<(std::sync::Arc<ProviderInfo>, String)> {
        match self.registry.get(name) {
            Ok(entry) => Ok(entry),
            Err(err) if self.opts.allow_missing_plugins => {
                tracing::warn!("Missing provider plugin {:?}: {:#}", name, err);
                Ok((
                    std::sync::Arc::new(ProviderInfo {
                        name: name.to_string(),
                        resources: BTreeMap::new(),
                        data_sources: BTreeMap::new(),
                    }),
                    name.to_string(),
                ))
            }
            Err(err) => Err(err.context(BindError::MissingProvider(name.to_string()))),
        }
    }

    /// The provider a resource binds its schema against: the explicit
    /// `provider` reference if present, otherwise the type-name prefix.
    fn ensure_resource_provider(
        &mut self,
        ctx: &mut ModuleCtx,
        raw: &RawResource,
    ) -> Result<NodeId> {
        let key = match &raw.provider_ref {
            Some(provider_ref) => provider_ref.clone(),
            None => raw
                .resource_type
                .split('_')
                .next()
                .unwrap_or(&raw.resource_type)
                .to_string(),
        };
        self.ensure_provider(ctx, &key)
    }

    /// Resolve explicit depends_on addresses to nodes, preserving order.
    fn bind_depends_on(&mut self, ctx: &mut ModuleCtx, deps: &[String]) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for dep in deps {
            if dep.starts_with("module.") {
                return Err(BindError::ModuleDependsOn(dep.clone()).into());
            }
            match self.graph.module(ctx.id).resources.get(dep) {
                Some(id) => out.push(*id),
                None => return Err(BindError::MissingDependency(dep.clone()).into()),
            }
        }
        Ok(out)
    }

    /// Walk every node's bound IR, collect reachable back-references, union
    /// in the explicit dependencies, and store the sorted result.
    fn compute_dependencies(&mut self) {
        for id in self.graph.node_ids().collect::<Vec<_>>() {
            let mut targets = BTreeSet::new();
            visit_node_exprs(self.graph.node(id), &mut |e| {
                if let Expr::Access(access) = e {
                    if let Some(target) = access.target {
                        targets.insert(target);
                    }
                }
            });
            match self.graph.node(id) {
                Node::Resource(n) => targets.extend(n.explicit_deps.iter().copied()),
                Node::Module(n) => targets.extend(n.explicit_deps.iter().copied()),
                Node::Output(n) => targets.extend(n.explicit_deps.iter().copied()),
                _ => {}
            }
            targets.remove(&id);
            let sorted = self.graph.sorted_deps(targets);
            self.graph.node_mut(id).set_deps(sorted);
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

pub(crate) fn provider_key(provider: &RawProvider) -> String {
    match &provider.alias {
        Some(alias) => format!("{}.{}", provider.name, alias),
        None => provider.name.clone(),
    }
}

pub(crate) fn resource_address(raw: &RawResource, mode: ResourceMode) -> String {
    if mode == ResourceMode::Data {
        format!("data.{}.{}", raw.resource_type, raw.name)
    } else {
        format!("{}.{}", raw.resource_type, raw.name)
    }
}

/// Whether a raw count keeps the resource multi-instance. A missing count or
/// a literal 1 means single-instance.
fn raw_count_is_multi(count: Option<&RawValue>) -> bool {
    match count {
        None => false,
        Some(RawValue::Number(n)) => *n != 1.0,
        Some(RawValue::String(s)) => s.trim().parse::<i64>().map(|n| n != 1).unwrap_or(true),
        Some(_) => true,
    }
}

/// A count expression that statically resolves to a boolean: a boolean
/// literal, a boolean-coercible 0/1 literal, or a conditional whose legs are
/// themselves boolean, recursively.
pub(crate) fn is_boolean_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(lit) => match &lit.value {
            LitValue::Bool(_) => true,
            LitValue::Number(n) => *n == 0.0 || *n == 1.0,
            LitValue::String(s) => matches!(s.trim(), "0" | "1" | "true" | "false"),
        },
        Expr::Cond(cond) => is_boolean_expr(&cond.true_expr) && is_boolean_expr(&cond.false_expr),
        _ => false,
    }
}
