use std::collections::BTreeMap;

use crate::il::node::NodeId;
use crate::il::ty::Type;
use crate::schema::SchemaView;

// ─── Comments ───────────────────────────────────────────────────────────────

/// Source comments attached out-of-band to an IR node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comments {
    pub leading: Vec<String>,
    pub trailing: Vec<String>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty()
    }
}

// ─── Bound nodes ────────────────────────────────────────────────────────────

/// A bound IR node: an expression or a list/map property tree.
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    Expr(Expr),
    List(ListProp),
    Map(MapProp),
}

impl IrNode {
    pub fn ty(&self) -> Type {
        match self {
            IrNode::Expr(e) => e.ty(),
            IrNode::List(l) => {
                let t = l.schemas.type_();
                if t.is_list() {
                    t
                } else {
                    Type::UNKNOWN.list_of()
                }
            }
            IrNode::Map(_) => Type::MAP,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            IrNode::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_expr(self) -> Option<Expr> {
        match self {
            IrNode::Expr(e) => Some(e),
            _ => None,
        }
    }
}

/// An ordered list property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListProp {
    pub schemas: SchemaView,
    pub comments: Option<Comments>,
    pub elems: Vec<IrNode>,
}

/// A keyed map property. Keys are unique; iteration is sorted so rewrites and
/// emission are deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapProp {
    pub schemas: SchemaView,
    pub comments: Option<Comments>,
    pub entries: BTreeMap<String, IrNode>,
}

// ─── Expressions ────────────────────────────────────────────────────────────

/// A bound expression. One closed variant per kind so every dispatch is an
/// exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Arith(ArithExpr),
    Call(CallExpr),
    Cond(Box<CondExpr>),
    Index(Box<IndexExpr>),
    Lit(LitExpr),
    Template(TemplateExpr),
    Access(Box<AccessExpr>),
    PropValue(Box<PropValueExpr>),
    Error(Box<ErrorExpr>),
}

impl Expr {
    pub fn ty(&self) -> Type {
        match self {
            Expr::Arith(e) => e.ty,
            Expr::Call(e) => e.ty,
            Expr::Cond(e) => e.ty,
            Expr::Index(e) => e.ty,
            Expr::Lit(e) => e.ty,
            Expr::Template(e) => e.ty,
            Expr::Access(e) => e.ty,
            Expr::PropValue(e) => e.ty,
            Expr::Error(e) => e.ty,
        }
    }

    pub fn ty_mut(&mut self) -> &mut Type {
        match self {
            Expr::Arith(e) => &mut e.ty,
            Expr::Call(e) => &mut e.ty,
            Expr::Cond(e) => &mut e.ty,
            Expr::Index(e) => &mut e.ty,
            Expr::Lit(e) => &mut e.ty,
            Expr::Template(e) => &mut e.ty,
            Expr::Access(e) => &mut e.ty,
            Expr::PropValue(e) => &mut e.ty,
            Expr::Error(e) => &mut e.ty,
        }
    }

    pub fn comments(&self) -> Option<&Comments> {
        match self {
            Expr::Arith(e) => e.comments.as_ref(),
            Expr::Call(e) => e.comments.as_ref(),
            Expr::Cond(e) => e.comments.as_ref(),
            Expr::Index(e) => e.comments.as_ref(),
            Expr::Lit(e) => e.comments.as_ref(),
            Expr::Template(e) => e.comments.as_ref(),
            Expr::Access(e) => e.comments.as_ref(),
            Expr::PropValue(e) => e.comments.as_ref(),
            Expr::Error(e) => e.comments.as_ref(),
        }
    }

    pub fn bool(value: bool) -> Expr {
        Expr::Lit(LitExpr {
            ty: Type::BOOL,
            comments: None,
            value: LitValue::Bool(value),
        })
    }

    pub fn number(value: f64) -> Expr {
        Expr::Lit(LitExpr {
            ty: Type::NUMBER,
            comments: None,
            value: LitValue::Number(value),
        })
    }

    pub fn string(value: impl Into<String>) -> Expr {
        Expr::Lit(LitExpr {
            ty: Type::STRING,
            comments: None,
            value: LitValue::String(value.into()),
        })
    }
}

/// Operators for the arithmetic/comparison/logical expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ArithOp {
    /// Comparison and logical operators produce bool; the rest produce number.
    pub fn result_type(self) -> Type {
        match self {
            ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div | ArithOp::Mod => {
                Type::NUMBER
            }
            _ => Type::BOOL,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::And => "&&",
            ArithOp::Or => "||",
            ArithOp::Eq => "===",
            ArithOp::NotEq => "!==",
            ArithOp::Lt => "<",
            ArithOp::Lte => "<=",
            ArithOp::Gt => ">",
            ArithOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub op: ArithOp,
    pub operands: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub cond: Expr,
    pub true_expr: Expr,
    pub false_expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub target: Expr,
    pub key: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LitExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub value: LitValue,
}

/// An interpolated string: the concatenation of its parts. Parts that are
/// string literals print verbatim; everything else becomes an interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub parts: Vec<Expr>,
}

// ─── Variable accesses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Cwd,
    Module,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// How a resource access addresses instances of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instancing {
    /// The target is not counted.
    Single,
    /// A specific element of a counted target.
    Indexed(usize),
    /// Every element of a counted target.
    Splat,
}

/// The source a variable access resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessKind {
    CountIndex,
    Local,
    Module,
    Path(PathKind),
    Resource {
        mode: ResourceMode,
        instancing: Instancing,
    },
    Variable,
    SelfRef,
    Terraform,
}

/// A reference to another node (or to an ambient value such as `count.index`).
/// `target` is a weak back-reference into the graph arena; it is never used
/// to discover ownership or lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub kind: AccessKind,
    /// The element path below the source, e.g. `["network_interface", "0",
    /// "address"]` for `aws_instance.web.network_interface.0.address`.
    pub path: Vec<String>,
    pub schemas: SchemaView,
    pub target: Option<NodeId>,
}

impl AccessExpr {
    /// True when two accesses denote the same value, ignoring comments.
    pub fn same_target(&self, other: &AccessExpr) -> bool {
        self.kind == other.kind && self.path == other.path && self.target == other.target
    }
}

/// Carries a list/map property in expression position so intrinsics can take
/// property subtrees as arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PropValueExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub value: IrNode,
}

/// Preserves a subtree that failed to bind, together with its diagnostic.
/// The intended type stays visible so downstream transforms still typecheck;
/// the emitter prints an immediately-thrown expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorExpr {
    pub ty: Type,
    pub comments: Option<Comments>,
    pub node: IrNode,
    pub diagnostic: String,
}
