pub mod expr;
pub mod intrinsics;
pub mod node;
pub mod ty;
pub mod visitor;

pub use expr::{
    AccessExpr, AccessKind, ArithExpr, ArithOp, CallExpr, Comments, CondExpr, ErrorExpr, Expr,
    IndexExpr, Instancing, IrNode, ListProp, LitExpr, LitValue, MapProp, PathKind, PropValueExpr,
    ResourceMode, TemplateExpr,
};
pub use node::{
    Graph, LocalNode, Module, ModuleId, ModuleNode, Node, NodeId, OutputNode, ProviderNode,
    ResourceNode, VariableNode,
};
pub use ty::Type;
