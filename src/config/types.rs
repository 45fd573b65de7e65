use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::il::expr::Comments;

// ─── Module tree ────────────────────────────────────────────────────────────

/// One module's raw configuration, the shape the loader hands to the binder.
/// The root module has an empty name; children are keyed by the name of the
/// `module` block that pulled them in.
#[derive(Debug, Clone, Default)]
pub struct ModuleTree {
    pub name: String,
    pub dir: PathBuf,
    pub providers: Vec<RawProvider>,
    pub resources: Vec<RawResource>,
    pub data_sources: Vec<RawResource>,
    pub modules: Vec<RawModuleCall>,
    pub variables: Vec<RawVariable>,
    pub locals: BTreeMap<String, Expression>,
    pub outputs: Vec<RawOutput>,
    pub children: BTreeMap<String, ModuleTree>,
}

/// A provider configuration block.
#[derive(Debug, Clone)]
pub struct RawProvider {
    pub name: String,
    pub alias: Option<String>,
    pub config: BTreeMap<String, RawValue>,
    pub comments: Option<Comments>,
}

/// A managed resource or data source block.
#[derive(Debug, Clone, Default)]
pub struct RawResource {
    pub resource_type: String,
    pub name: String,
    pub provider_ref: Option<String>,
    pub count: Option<RawValue>,
    pub depends_on: Vec<String>,
    pub ignore_changes: Vec<String>,
    pub timeouts: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, RawValue>,
    pub comments: Option<Comments>,
}

/// A `module` block instantiating a child module.
#[derive(Debug, Clone)]
pub struct RawModuleCall {
    pub name: String,
    pub source: String,
    pub depends_on: Vec<String>,
    pub variables: BTreeMap<String, RawValue>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone)]
pub struct RawVariable {
    pub name: String,
    pub default: Option<RawValue>,
    pub description: Option<String>,
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone)]
pub struct RawOutput {
    pub name: String,
    pub value: RawValue,
    pub depends_on: Vec<String>,
    pub comments: Option<Comments>,
}

// ─── Raw values ─────────────────────────────────────────────────────────────

/// A raw configuration value: a scalar, a list, a map, or an interpolation
/// AST. This is the single tagged union at the loader/binder boundary; the
/// binder never touches `hcl` types.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
    Expr(Box<Expression>),
}

impl RawValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value contains no interpolation anywhere.
    pub fn is_literal(&self) -> bool {
        match self {
            RawValue::Expr(_) => false,
            RawValue::List(items) => items.iter().all(|v| v.is_literal()),
            RawValue::Map(entries) => entries.values().all(|v| v.is_literal()),
            _ => true,
        }
    }
}

// ─── Interpolation AST ──────────────────────────────────────────────────────

/// An interpolation expression as parsed out of HCL. This mirrors the HIL
/// surface the binder supports; shapes outside it arrive as `Unsupported` and
/// bind to error nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value in expression position.
    Literal(RawValue),

    /// A dotted reference path. Indexing and splats appear as `"[3]"` and
    /// `"[*]"` path elements, e.g. `aws_instance.web.[*].id`.
    Reference(Vec<String>),

    /// `join(",", var.list)`
    Call { name: String, args: Vec<Expression> },

    /// `cond ? a : b`
    Conditional {
        condition: Box<Expression>,
        true_val: Box<Expression>,
        false_val: Box<Expression>,
    },

    /// `"prefix-${expr}-suffix"`
    Template(Vec<TemplatePart>),

    /// `expr[key]` with a non-literal key.
    Index {
        collection: Box<Expression>,
        key: Box<Expression>,
    },

    /// `a + b`, `a == b`, …
    BinaryOp {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `!a`, `-a`
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Anything the translator does not model (for-expressions, directives…).
    Unsupported { summary: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Interpolation(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
