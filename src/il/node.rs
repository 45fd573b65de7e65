use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::il::expr::{Comments, Expr, IrNode, MapProp, ResourceMode};
use crate::schema::{ProviderInfo, ResourceInfo};

// ─── Handles ────────────────────────────────────────────────────────────────

/// Opaque handle to a top-level node in the graph arena. Back-references in
/// the IR are these handles, which breaks the ownership cycle between nodes
/// and the subtrees that reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Stable arena position, useful for external renderings of the graph.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle to a module in the graph's module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) u32);

// ─── Top-level nodes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderNode {
    pub name: String,
    pub alias: Option<String>,
    pub properties: MapProp,
    pub info: Arc<ProviderInfo>,
    pub plugin_name: String,
    /// Synthesised providers were never written in the configuration; they
    /// exist only so resources can resolve schemas, and are not emitted.
    pub synthesised: bool,
    pub deps: Vec<NodeId>,
    pub explicit_deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub mode: ResourceMode,
    /// The Terraform resource type, e.g. `aws_vpc`.
    pub type_name: String,
    pub name: String,
    pub properties: MapProp,
    pub count: Option<Expr>,
    pub provider: Option<NodeId>,
    pub info: Option<Arc<ResourceInfo>>,
    pub ignore_changes: Vec<String>,
    pub timeouts: BTreeMap<String, String>,
    /// Count statically resolves to a boolean; the resource is either absent
    /// or a single instance.
    pub is_conditional: bool,
    /// Data source whose inputs contain no outputs; its results are available
    /// promptly and references to it are not output-typed.
    pub is_prompt: bool,
    pub deps: Vec<NodeId>,
    pub explicit_deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

impl ResourceNode {
    pub fn is_data(&self) -> bool {
        self.mode == ResourceMode::Data
    }

    /// The Terraform address, e.g. `aws_vpc.main` or `data.aws_ami.linux`.
    pub fn address(&self) -> String {
        if self.is_data() {
            format!("data.{}.{}", self.type_name, self.name)
        } else {
            format!("{}.{}", self.type_name, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub name: String,
    pub properties: MapProp,
    pub child: ModuleId,
    pub deps: Vec<NodeId>,
    pub explicit_deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
    pub default: Option<IrNode>,
    pub deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalNode {
    pub name: String,
    /// `None` only while the binder is mid-flight; bound graphs always carry
    /// a value.
    pub value: Option<IrNode>,
    pub deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    pub name: String,
    pub value: Option<IrNode>,
    pub deps: Vec<NodeId>,
    pub explicit_deps: Vec<NodeId>,
    pub comments: Option<Comments>,
}

/// A top-level node. Exhaustive matches everywhere keep every kind handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Provider(ProviderNode),
    Resource(ResourceNode),
    Module(ModuleNode),
    Variable(VariableNode),
    Local(LocalNode),
    Output(OutputNode),
}

impl Node {
    /// Stable ordering key: kind letter plus identifier. Dependency lists and
    /// emission order sort by this.
    pub fn sort_key(&self) -> String {
        match self {
            Node::Module(n) => format!("m{}", n.name),
            Node::Provider(n) => match &n.alias {
                Some(alias) => format!("p{}.{}", n.name, alias),
                None => format!("p{}", n.name),
            },
            Node::Resource(n) if n.is_data() => format!("d{}.{}", n.type_name, n.name),
            Node::Resource(n) => format!("r{}.{}", n.type_name, n.name),
            Node::Variable(n) => format!("v{}", n.name),
            Node::Local(n) => format!("l{}", n.name),
            Node::Output(n) => format!("o{}", n.name),
        }
    }

    /// The Terraform-facing name used for display and name-table seeding.
    pub fn display_name(&self) -> String {
        match self {
            Node::Module(n) => n.name.clone(),
            Node::Provider(n) => match &n.alias {
                Some(alias) => format!("{}.{}", n.name, alias),
                None => n.name.clone(),
            },
            Node::Resource(n) => n.address(),
            Node::Variable(n) => n.name.clone(),
            Node::Local(n) => n.name.clone(),
            Node::Output(n) => n.name.clone(),
        }
    }

    pub fn deps(&self) -> &[NodeId] {
        match self {
            Node::Provider(n) => &n.deps,
            Node::Resource(n) => &n.deps,
            Node::Module(n) => &n.deps,
            Node::Variable(n) => &n.deps,
            Node::Local(n) => &n.deps,
            Node::Output(n) => &n.deps,
        }
    }

    pub fn set_deps(&mut self, deps: Vec<NodeId>) {
        match self {
            Node::Provider(n) => n.deps = deps,
            Node::Resource(n) => n.deps = deps,
            Node::Module(n) => n.deps = deps,
            Node::Variable(n) => n.deps = deps,
            Node::Local(n) => n.deps = deps,
            Node::Output(n) => n.deps = deps,
        }
    }

    pub fn comments(&self) -> Option<&Comments> {
        match self {
            Node::Provider(n) => n.comments.as_ref(),
            Node::Resource(n) => n.comments.as_ref(),
            Node::Module(n) => n.comments.as_ref(),
            Node::Variable(n) => n.comments.as_ref(),
            Node::Local(n) => n.comments.as_ref(),
            Node::Output(n) => n.comments.as_ref(),
        }
    }

    pub fn set_comments(&mut self, comments: Comments) {
        let slot = match self {
            Node::Provider(n) => &mut n.comments,
            Node::Resource(n) => &mut n.comments,
            Node::Module(n) => &mut n.comments,
            Node::Variable(n) => &mut n.comments,
            Node::Local(n) => &mut n.comments,
            Node::Output(n) => &mut n.comments,
        };
        *slot = Some(comments);
    }

    pub fn as_resource(&self) -> Option<&ResourceNode> {
        match self {
            Node::Resource(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_resource_mut(&mut self) -> Option<&mut ResourceNode> {
        match self {
            Node::Resource(n) => Some(n),
            _ => None,
        }
    }
}

// ─── Modules ────────────────────────────────────────────────────────────────

/// One module's named node sets, keyed the way Terraform names them. The root
/// module has an empty name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: String,
    pub dir: PathBuf,
    pub providers: BTreeMap<String, NodeId>,
    /// Keyed by Terraform address: `type.name`, `data.type.name`.
    pub resources: BTreeMap<String, NodeId>,
    pub modules: BTreeMap<String, NodeId>,
    pub variables: BTreeMap<String, NodeId>,
    pub locals: BTreeMap<String, NodeId>,
    pub outputs: BTreeMap<String, NodeId>,
    pub children: BTreeMap<String, ModuleId>,
}

impl Module {
    /// All node ids of this module in sort-key-independent declaration maps.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        ids.extend(self.providers.values());
        ids.extend(self.resources.values());
        ids.extend(self.modules.values());
        ids.extend(self.variables.values());
        ids.extend(self.locals.values());
        ids.extend(self.outputs.values());
        ids
    }
}

// ─── Graph ──────────────────────────────────────────────────────────────────

/// The bound program: an arena of top-level nodes plus the module tree. The
/// graph exclusively owns all nodes; every cross-node edge is a `NodeId`.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    modules: Vec<Module>,
}

pub const ROOT_MODULE: ModuleId = ModuleId(0);

impl Graph {
    pub fn new() -> Graph {
        Graph {
            nodes: Vec::new(),
            modules: vec![Module::default()],
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn sort_key(&self, id: NodeId) -> String {
        self.node(id).sort_key()
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn root(&self) -> &Module {
        &self.modules[0]
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Sort a dependency list by (kind letter, identifier), dropping
    /// duplicates, for deterministic emission.
    pub fn sorted_deps(&self, deps: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut keyed: Vec<(String, NodeId)> = deps
            .into_iter()
            .map(|id| (self.sort_key(id), id))
            .collect();
        keyed.sort();
        keyed.dedup();
        keyed.into_iter().map(|(_, id)| id).collect()
    }
}
