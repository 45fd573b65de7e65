use crate::il::expr::{CallExpr, Expr, LitExpr, LitValue, MapProp, PropValueExpr};
use crate::il::ty::Type;

// ─── Intrinsic calls ────────────────────────────────────────────────────────
//
// The IR reserves these function names for compiler-internal calls. The
// binder never produces them; rewrites introduce them and the emitter
// recognises them specially.

/// `__apply(args..., then)`: inside `then`, `__applyArg(i)` is the resolved
/// value of `args[i]`.
pub const APPLY: &str = "__apply";
/// `__applyArg(i)`: placeholder inside an apply body.
pub const APPLY_ARG: &str = "__applyArg";
/// `__archive(expr)`: mark an expression as an archive.
pub const ARCHIVE: &str = "__archive";
/// `__asset(expr)`: mark an expression as an asset.
pub const ASSET: &str = "__asset";
/// `__coerce(value)`: runtime conversion; the destination is the call's own
/// type.
pub const COERCE: &str = "__coerce";
/// `__getStack()`: the current deployment environment name.
pub const GET_STACK: &str = "__getStack";
/// `__interpolate(parts...)`: output-aware template literal.
pub const INTERPOLATE: &str = "__interpolate";
/// `__dataSource(fn, inputs, options)`: a data-source function invocation.
pub const DATA_SOURCE: &str = "__dataSource";

pub fn is_intrinsic(name: &str) -> bool {
    name.starts_with("__")
}

// ─── Constructors ───────────────────────────────────────────────────────────

pub fn apply(mut args: Vec<Expr>, then: Expr) -> Expr {
    let ty = then.ty().output_of();
    args.push(then);
    Expr::Call(CallExpr {
        ty,
        comments: None,
        name: APPLY.to_string(),
        args,
    })
}

pub fn apply_arg(index: usize, ty: Type) -> Expr {
    Expr::Call(CallExpr {
        ty,
        comments: None,
        name: APPLY_ARG.to_string(),
        args: vec![Expr::number(index as f64)],
    })
}

pub fn asset(expr: Expr) -> Expr {
    let ty = expr.ty();
    Expr::Call(CallExpr {
        ty,
        comments: None,
        name: ASSET.to_string(),
        args: vec![expr],
    })
}

pub fn archive(expr: Expr) -> Expr {
    let ty = expr.ty();
    Expr::Call(CallExpr {
        ty,
        comments: None,
        name: ARCHIVE.to_string(),
        args: vec![expr],
    })
}

pub fn coerce(expr: Expr, to: Type) -> Expr {
    Expr::Call(CallExpr {
        ty: to,
        comments: None,
        name: COERCE.to_string(),
        args: vec![expr],
    })
}

pub fn get_stack() -> Expr {
    Expr::Call(CallExpr {
        ty: Type::STRING,
        comments: None,
        name: GET_STACK.to_string(),
        args: Vec::new(),
    })
}

pub fn interpolate(parts: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        ty: Type::STRING.output_of(),
        comments: None,
        name: INTERPOLATE.to_string(),
        args: parts,
    })
}

pub fn data_source(function: &str, inputs: MapProp, options: Option<Expr>) -> Expr {
    let mut args = vec![
        Expr::string(function),
        Expr::PropValue(Box::new(PropValueExpr {
            ty: Type::MAP,
            comments: None,
            value: crate::il::expr::IrNode::Map(inputs),
        })),
    ];
    if let Some(options) = options {
        args.push(options);
    }
    Expr::Call(CallExpr {
        ty: Type::MAP.output_of(),
        comments: None,
        name: DATA_SOURCE.to_string(),
        args,
    })
}

// ─── Matchers ───────────────────────────────────────────────────────────────

/// Split an `__apply` call into its argument list and continuation.
pub fn match_apply(call: &CallExpr) -> Option<(&[Expr], &Expr)> {
    if call.name != APPLY || call.args.is_empty() {
        return None;
    }
    let (then, args) = call.args.split_last()?;
    Some((args, then))
}

/// The index carried by an `__applyArg` call.
pub fn match_apply_arg(call: &CallExpr) -> Option<usize> {
    if call.name != APPLY_ARG {
        return None;
    }
    match call.args.first() {
        Some(Expr::Lit(LitExpr {
            value: LitValue::Number(n),
            ..
        })) => Some(*n as usize),
        _ => None,
    }
}
