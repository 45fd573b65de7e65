use anyhow::Result;

use crate::bind::{Binder, ModuleCtx};
use crate::config::types::{BinOp, Expression, RawValue, TemplatePart, UnaryOp};
use crate::il::expr::{
    ArithExpr, ArithOp, CallExpr, CondExpr, ErrorExpr, Expr, IndexExpr, IrNode, PropValueExpr,
    TemplateExpr,
};
use crate::il::ty::Type;
use crate::schema::SchemaView;

/// The Terraform interpolation functions the translator understands. Calls
/// outside this set bind to error nodes that preserve the call subtree.
const SUPPORTED_FUNCTIONS: &[&str] = &[
    "base64decode",
    "base64encode",
    "chomp",
    "cidrhost",
    "coalesce",
    "coalescelist",
    "compact",
    "concat",
    "element",
    "file",
    "format",
    "formatlist",
    "indent",
    "join",
    "length",
    "list",
    "lookup",
    "lower",
    "map",
    "merge",
    "min",
    "replace",
    "signum",
    "split",
    "substr",
    "zipmap",
];

impl<'a> Binder<'a> {
    /// Lift one interpolation expression into IR, computing types bottom-up.
    pub(crate) fn bind_expression(
        &mut self,
        ctx: &mut ModuleCtx,
        expr: &Expression,
        view: &SchemaView,
    ) -> Result<Expr> {
        match expr {
            Expression::Literal(raw) => self.bind_literal(ctx, raw, view),
            Expression::Reference(parts) => self.bind_reference(ctx, parts),
            Expression::Call { name, args } => self.bind_call(ctx, name, args),
            Expression::Conditional {
                condition,
                true_val,
                false_val,
            } => {
                let cond = self.bind_expression(ctx, condition, &SchemaView::empty())?;
                let true_expr = self.bind_expression(ctx, true_val, view)?;
                let false_expr = self.bind_expression(ctx, false_val, view)?;
                let ty = if true_expr.ty() == false_expr.ty() {
                    true_expr.ty()
                } else {
                    Type::UNKNOWN
                };
                Ok(Expr::Cond(Box::new(CondExpr {
                    ty,
                    comments: None,
                    cond,
                    true_expr,
                    false_expr,
                })))
            }
            Expression::Template(parts) => self.bind_template(ctx, parts),
            Expression::Index { collection, key } => {
                let target = self.bind_expression(ctx, collection, view)?;
                let key = self.bind_expression(ctx, key, &SchemaView::empty())?;
                let ty = if target.ty().is_list() {
                    target.ty().element_type()
                } else {
                    Type::UNKNOWN
                };
                Ok(Expr::Index(Box::new(IndexExpr {
                    ty,
                    comments: None,
                    target,
                    key,
                })))
            }
            Expression::BinaryOp { op, left, right } => {
                let op = bin_op(*op);
                let left = self.bind_expression(ctx, left, &SchemaView::empty())?;
                let right = self.bind_expression(ctx, right, &SchemaView::empty())?;
                Ok(Expr::Arith(ArithExpr {
                    ty: op.result_type(),
                    comments: None,
                    op,
                    operands: vec![left, right],
                }))
            }
            Expression::UnaryOp { op, operand } => {
                let operand = self.bind_expression(ctx, operand, &SchemaView::empty())?;
                // The IR has no unary variant; negation and logical not are
                // expressed through binary forms.
                let (op, operands) = match op {
                    UnaryOp::Neg => (ArithOp::Sub, vec![Expr::number(0.0), operand]),
                    UnaryOp::Not => (ArithOp::Eq, vec![operand, Expr::bool(false)]),
                };
                Ok(Expr::Arith(ArithExpr {
                    ty: op.result_type(),
                    comments: None,
                    op,
                    operands,
                }))
            }
            Expression::Unsupported { summary } => Ok(Expr::Error(Box::new(ErrorExpr {
                ty: Type::UNKNOWN,
                comments: None,
                node: IrNode::Expr(Expr::string(summary.clone())),
                diagnostic: format!("unsupported expression: {}", summary),
            }))),
        }
    }

    /// A literal in expression position: scalars become literal expressions;
    /// lists and maps bind as properties carried by a property-value wrapper.
    fn bind_literal(
        &mut self,
        ctx: &mut ModuleCtx,
        raw: &RawValue,
        view: &SchemaView,
    ) -> Result<Expr> {
        match raw {
            RawValue::Null => Ok(Expr::string(String::new())),
            RawValue::Bool(b) => Ok(Expr::bool(*b)),
            RawValue::Number(n) => Ok(Expr::number(*n)),
            RawValue::String(s) => Ok(Expr::string(s.clone())),
            RawValue::List(_) | RawValue::Map(_) => {
                let bound = self
                    .bind_value(ctx, raw, view)?
                    .unwrap_or(IrNode::Expr(Expr::string(String::new())));
                let ty = bound.ty();
                Ok(Expr::PropValue(Box::new(PropValueExpr {
                    ty,
                    comments: None,
                    value: bound,
                })))
            }
            RawValue::Expr(e) => self.bind_expression(ctx, e, view),
        }
    }

    fn bind_template(&mut self, ctx: &mut ModuleCtx, parts: &[TemplatePart]) -> Result<Expr> {
        // A single interpolation with no surrounding text projects to its
        // sub-expression.
        if let [TemplatePart::Interpolation(only)] = parts {
            return self.bind_expression(ctx, only, &SchemaView::empty());
        }

        let mut bound = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                TemplatePart::Literal(text) => bound.push(Expr::string(text.clone())),
                TemplatePart::Interpolation(expr) => {
                    bound.push(self.bind_expression(ctx, expr, &SchemaView::empty())?);
                }
            }
        }
        Ok(Expr::Template(TemplateExpr {
            ty: Type::STRING,
            comments: None,
            parts: bound,
        }))
    }

    /// Bind a function call. Result types are driven by the argument types;
    /// a function outside the supported set binds to an error that keeps the
    /// bound call visible to downstream passes.
    fn bind_call(&mut self, ctx: &mut ModuleCtx, name: &str, args: &[Expression]) -> Result<Expr> {
        let mut bound_args = Vec::with_capacity(args.len());
        for arg in args {
            bound_args.push(self.bind_expression(ctx, arg, &SchemaView::empty())?);
        }

        if !SUPPORTED_FUNCTIONS.contains(&name) {
            let call = Expr::Call(CallExpr {
                ty: Type::UNKNOWN,
                comments: None,
                name: name.to_string(),
                args: bound_args,
            });
            return Ok(Expr::Error(Box::new(ErrorExpr {
                ty: Type::UNKNOWN,
                comments: None,
                node: IrNode::Expr(call),
                diagnostic: format!("unknown function {:?}", name),
            })));
        }

        if bound_args.len() < min_arity(name) {
            let call = Expr::Call(CallExpr {
                ty: Type::UNKNOWN,
                comments: None,
                name: name.to_string(),
                args: bound_args,
            });
            return Ok(Expr::Error(Box::new(ErrorExpr {
                ty: Type::UNKNOWN,
                comments: None,
                node: IrNode::Expr(call),
                diagnostic: format!("too few arguments to {:?}", name),
            })));
        }

        let ty = call_result_type(name, &bound_args);
        Ok(Expr::Call(CallExpr {
            ty,
            comments: None,
            name: name.to_string(),
            args: bound_args,
        }))
    }
}

/// The result type of a supported builtin, derived from its argument types.
fn call_result_type(name: &str, args: &[Expr]) -> Type {
    match name {
        "element" => first_list_arg(args)
            .map(|t| t.element_type())
            .unwrap_or(Type::UNKNOWN),
        "concat" | "coalescelist" => first_list_arg(args)
            .map(|t| t.element_type().list_of())
            .unwrap_or_else(|| Type::UNKNOWN.list_of()),
        "length" | "min" | "signum" => Type::NUMBER,
        "list" => Type::UNKNOWN.list_of(),
        "compact" | "formatlist" | "split" => Type::STRING.list_of(),
        "map" | "merge" | "zipmap" => Type::MAP,
        "file" | "format" | "join" | "lower" | "chomp" | "indent" | "replace" | "substr"
        | "base64encode" | "base64decode" | "cidrhost" | "coalesce" | "lookup" => Type::STRING,
        _ => Type::UNKNOWN,
    }
}

/// The fewest arguments each builtin accepts; calls below this bind as
/// errors so positional emission stays safe.
fn min_arity(name: &str) -> usize {
    match name {
        "map" | "list" => 0,
        "replace" | "substr" => 3,
        "split" | "element" | "lookup" | "indent" | "join" | "zipmap" | "cidrhost"
        | "formatlist" => 2,
        _ => 1,
    }
}

fn first_list_arg(args: &[Expr]) -> Option<Type> {
    args.iter().map(|a| a.ty()).find(|t| t.is_list())
}

fn bin_op(op: BinOp) -> ArithOp {
    match op {
        BinOp::Add => ArithOp::Add,
        BinOp::Sub => ArithOp::Sub,
        BinOp::Mul => ArithOp::Mul,
        BinOp::Div => ArithOp::Div,
        BinOp::Mod => ArithOp::Mod,
        BinOp::Eq => ArithOp::Eq,
        BinOp::NotEq => ArithOp::NotEq,
        BinOp::Lt => ArithOp::Lt,
        BinOp::Lte => ArithOp::Lte,
        BinOp::Gt => ArithOp::Gt,
        BinOp::Gte => ArithOp::Gte,
        BinOp::And => ArithOp::And,
        BinOp::Or => ArithOp::Or,
    }
}
