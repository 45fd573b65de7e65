use anyhow::{bail, Result};

use crate::emit::names::{is_identifier_shaped, legalize, pascal, NameTable};
use crate::il::expr::{
    AccessExpr, AccessKind, CallExpr, Expr, Instancing, IrNode, LitExpr, LitValue, MapProp,
    PathKind, ResourceMode,
};
use crate::il::intrinsics;
use crate::il::node::{Graph, Node};
use crate::il::ty::Type;
use crate::rewrite::coerce::format_number;
use crate::schema::SchemaView;

// ─── Expression emitter ─────────────────────────────────────────────────────

const INDENT: &str = "    ";

/// One apply's in-scope arguments: the accesses passed to `__apply` and the
/// binding names chosen for them.
struct ApplyScope {
    args: Vec<AccessExpr>,
    names: Vec<String>,
}

/// Prints single IR expressions as TypeScript, honoring operator precedence,
/// the name table, and the schema-driven access-path projection.
pub struct ExprEmitter<'g> {
    pub graph: &'g Graph,
    pub names: &'g NameTable,
    /// Indent level for multi-line property literals.
    pub indent: usize,
    /// The loop variable of the enclosing counted-resource loop, if any.
    pub count_var: Option<String>,
    apply_scopes: Vec<ApplyScope>,
}

impl<'g> ExprEmitter<'g> {
    pub fn new(graph: &'g Graph, names: &'g NameTable) -> ExprEmitter<'g> {
        ExprEmitter {
            graph,
            names,
            indent: 0,
            count_var: None,
            apply_scopes: Vec::new(),
        }
    }

    fn ind(&self, out: &mut String, level: usize) {
        for _ in 0..level {
            out.push_str(INDENT);
        }
    }

    // ─── Bound nodes ────────────────────────────────────────────────────

    /// Print a bound node: expressions inline, properties as object/array
    /// literals spanning lines at the current indent.
    pub fn emit_ir(&mut self, out: &mut String, node: &IrNode) -> Result<()> {
        match node {
            IrNode::Expr(e) => self.emit_expr(out, e),
            IrNode::List(list) => {
                if list.elems.is_empty() {
                    out.push_str("[]");
                    return Ok(());
                }
                out.push_str("[");
                self.indent += 1;
                for elem in &list.elems {
                    out.push('\n');
                    self.ind(out, self.indent);
                    self.emit_ir(out, elem)?;
                    out.push(',');
                }
                self.indent -= 1;
                out.push('\n');
                self.ind(out, self.indent);
                out.push(']');
                Ok(())
            }
            IrNode::Map(map) => self.emit_map(out, map),
        }
    }

    /// Print a map property. Keys map through the schema when the map is an
    /// object (renames and camel-casing); data maps keep their keys verbatim.
    pub fn emit_map(&mut self, out: &mut String, map: &MapProp) -> Result<()> {
        if map.entries.is_empty() {
            out.push_str("{}");
            return Ok(());
        }
        let is_object = map.schemas.res.is_some();
        out.push('{');
        self.indent += 1;
        for (key, value) in &map.entries {
            let printed = if is_object {
                map.schemas.pulumi_name(key)
            } else {
                key.clone()
            };
            out.push('\n');
            self.ind(out, self.indent);
            out.push_str(&object_key(&printed));
            out.push_str(": ");
            self.emit_ir(out, value)?;
            out.push(',');
        }
        self.indent -= 1;
        out.push('\n');
        self.ind(out, self.indent);
        out.push('}');
        Ok(())
    }

    // ─── Expressions ────────────────────────────────────────────────────

    pub fn emit_expr(&mut self, out: &mut String, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Arith(e) => {
                out.push('(');
                for (i, operand) in e.operands.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(e.op.symbol());
                        out.push(' ');
                    }
                    self.emit_expr(out, operand)?;
                }
                out.push(')');
                Ok(())
            }
            Expr::Cond(e) => {
                out.push('(');
                self.emit_expr(out, &e.cond)?;
                out.push_str(" ? ");
                self.emit_expr(out, &e.true_expr)?;
                out.push_str(" : ");
                self.emit_expr(out, &e.false_expr)?;
                out.push(')');
                Ok(())
            }
            Expr::Index(e) => {
                self.emit_expr(out, &e.target)?;
                out.push('[');
                self.emit_expr(out, &e.key)?;
                out.push(']');
                Ok(())
            }
            Expr::Lit(lit) => {
                self.emit_literal(out, lit);
                Ok(())
            }
            Expr::Template(e) => {
                out.push('`');
                for part in &e.parts {
                    self.emit_template_part(out, part)?;
                }
                out.push('`');
                Ok(())
            }
            Expr::Access(access) => self.emit_access(out, access),
            Expr::PropValue(e) => self.emit_ir(out, &e.value),
            Expr::Error(e) => {
                out.push_str("(() => { throw new Error(");
                out.push_str(&quote(&e.diagnostic));
                out.push_str("); })()");
                Ok(())
            }
            Expr::Call(call) => self.emit_call(out, call),
        }
    }

    fn emit_literal(&self, out: &mut String, lit: &LitExpr) {
        match &lit.value {
            LitValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            LitValue::Number(n) => out.push_str(&format_number(*n)),
            LitValue::String(s) => {
                if s.contains('\n') {
                    out.push('`');
                    out.push_str(&escape_template(s));
                    out.push('`');
                } else {
                    out.push_str(&quote(s));
                }
            }
        }
    }

    fn emit_template_part(&mut self, out: &mut String, part: &Expr) -> Result<()> {
        if let Expr::Lit(LitExpr {
            value: LitValue::String(s),
            ..
        }) = part
        {
            out.push_str(&escape_template(s));
            return Ok(());
        }
        out.push_str("${");
        self.emit_expr(out, part)?;
        out.push('}');
        Ok(())
    }

    // ─── Accesses ───────────────────────────────────────────────────────

    fn emit_access(&mut self, out: &mut String, access: &AccessExpr) -> Result<()> {
        match &access.kind {
            AccessKind::CountIndex => {
                out.push_str(self.count_var.as_deref().unwrap_or("i"));
                Ok(())
            }
            AccessKind::Path(PathKind::Cwd) => {
                out.push_str("process.cwd()");
                Ok(())
            }
            AccessKind::Path(_) => {
                // Lowered to literals before emission; keep a sane fallback.
                out.push_str(&quote("."));
                Ok(())
            }
            AccessKind::Local | AccessKind::Variable => {
                let name = match access.target {
                    Some(target) => self.names.name(target),
                    None => "undefined",
                };
                out.push_str(name);
                for part in &access.path {
                    out.push('.');
                    out.push_str(&crate::schema::view::camel_case(part));
                }
                Ok(())
            }
            AccessKind::Module => {
                let name = match access.target {
                    Some(target) => self.names.name(target),
                    None => "undefined",
                };
                out.push_str(name);
                for part in &access.path {
                    out.push('.');
                    out.push_str(&crate::schema::view::camel_case(part));
                }
                Ok(())
            }
            AccessKind::Resource { mode, instancing } => {
                self.emit_resource_access(out, access, *mode, *instancing)
            }
            AccessKind::SelfRef | AccessKind::Terraform => {
                bail!("unsupported access reached the emitter")
            }
        }
    }

    fn emit_resource_access(
        &mut self,
        out: &mut String,
        access: &AccessExpr,
        _mode: ResourceMode,
        instancing: Instancing,
    ) -> Result<()> {
        let Some(target) = access.target else {
            out.push_str("undefined");
            return Ok(());
        };
        let name = self.names.name(target).to_string();
        let conditional = self
            .graph
            .node(target)
            .as_resource()
            .map(|r| r.is_conditional)
            .unwrap_or(false);

        match instancing {
            Instancing::Splat => {
                // Every instance: project the field over the array.
                out.push_str(&name);
                if access.path.is_empty() {
                    return Ok(());
                }
                out.push_str(".map(v => v");
                let mut path = String::new();
                emit_path(&mut path, &access.schemas, &access.path, false);
                out.push_str(&path);
                out.push(')');
                Ok(())
            }
            Instancing::Indexed(i) => {
                out.push_str(&name);
                if conditional {
                    // A conditional resource is a single optional binding.
                    out.push('!');
                } else {
                    out.push('[');
                    out.push_str(&format_number(i as f64));
                    out.push(']');
                }
                let mut path = String::new();
                emit_path(&mut path, &access.schemas, &access.path, false);
                out.push_str(&path);
                Ok(())
            }
            Instancing::Single => {
                out.push_str(&name);
                let mut path = String::new();
                emit_path(&mut path, &access.schemas, &access.path, false);
                out.push_str(&path);
                Ok(())
            }
        }
    }

    // ─── Calls ──────────────────────────────────────────────────────────

    fn emit_call(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        if intrinsics::is_intrinsic(&call.name) {
            return self.emit_intrinsic(out, call);
        }
        self.emit_builtin(out, call)
    }

    fn emit_intrinsic(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        match call.name.as_str() {
            intrinsics::APPLY => self.emit_apply(out, call),
            intrinsics::APPLY_ARG => self.emit_apply_arg(out, call),
            intrinsics::ASSET => {
                out.push_str("new pulumi.asset.FileAsset(");
                self.emit_expr(out, &call.args[0])?;
                out.push(')');
                Ok(())
            }
            intrinsics::ARCHIVE => {
                out.push_str("new pulumi.asset.FileArchive(");
                self.emit_expr(out, &call.args[0])?;
                out.push(')');
                Ok(())
            }
            intrinsics::COERCE => self.emit_coerce(out, call),
            intrinsics::GET_STACK => {
                out.push_str("pulumi.getStack()");
                Ok(())
            }
            intrinsics::INTERPOLATE => {
                out.push_str("pulumi.interpolate`");
                for part in &call.args {
                    self.emit_template_part(out, part)?;
                }
                out.push('`');
                Ok(())
            }
            intrinsics::DATA_SOURCE => {
                let Some(Expr::Lit(LitExpr {
                    value: LitValue::String(function),
                    ..
                })) = call.args.first()
                else {
                    bail!("__dataSource requires a function name literal");
                };
                out.push_str(function);
                out.push('(');
                self.emit_expr(out, &call.args[1])?;
                if let Some(options) = call.args.get(2) {
                    out.push_str(", ");
                    // The options literal is target-language text.
                    if let Expr::Lit(LitExpr {
                        value: LitValue::String(raw),
                        ..
                    }) = options
                    {
                        out.push_str(raw);
                    } else {
                        self.emit_expr(out, options)?;
                    }
                }
                out.push(')');
                Ok(())
            }
            other => bail!("unknown intrinsic {:?}", other),
        }
    }

    /// `__apply` prints as `arg.apply(name => body)` for one argument and
    /// `pulumi.all([…]).apply(([names]) => body)` otherwise. Splat arguments
    /// are always wrapped in an `all` aggregator first.
    fn emit_apply(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        let Some((args, then)) = intrinsics::match_apply(call) else {
            bail!("malformed __apply call");
        };
        let accesses: Vec<AccessExpr> = args
            .iter()
            .map(|a| match a {
                Expr::Access(access) => Ok((**access).clone()),
                _ => bail!("__apply arguments must be variable accesses"),
            })
            .collect::<Result<_>>()?;
        let names = self.apply_arg_names(&accesses);

        if accesses.len() == 1 {
            let mut arg_text = String::new();
            self.emit_apply_arg_expr(&mut arg_text, &accesses[0])?;
            out.push_str(&arg_text);
            out.push_str(".apply(");
            out.push_str(&names[0]);
            out.push_str(" => ");
        } else {
            out.push_str("pulumi.all([");
            for (i, access) in accesses.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.emit_apply_arg_expr(out, access)?;
            }
            out.push_str("]).apply(([");
            out.push_str(&names.join(", "));
            out.push_str("]) => ");
        }

        self.apply_scopes.push(ApplyScope {
            args: accesses,
            names,
        });
        let result = self.emit_expr(out, then);
        self.apply_scopes.pop();
        result?;
        out.push(')');
        Ok(())
    }

    /// The expression passed into the apply for one argument: the access up
    /// to its consumed prefix. Splats aggregate the projected array.
    fn emit_apply_arg_expr(&mut self, out: &mut String, access: &AccessExpr) -> Result<()> {
        if let AccessKind::Resource {
            instancing: Instancing::Splat,
            ..
        } = access.kind
        {
            out.push_str("pulumi.all(");
            self.emit_access(out, access)?;
            out.push(')');
            return Ok(());
        }

        let consumed = consumed_parts(access);
        let mut trimmed = access.clone();
        trimmed.path = access.path[..consumed].to_vec();
        self.emit_access(out, &trimmed)
    }

    /// `__applyArg(i)` prints the scoped name plus whatever path the apply's
    /// outer expression did not already consume.
    fn emit_apply_arg(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        let Some(index) = intrinsics::match_apply_arg(call) else {
            bail!("malformed __applyArg call");
        };
        let Some(scope) = self.apply_scopes.last() else {
            bail!("__applyArg outside of __apply");
        };
        let Some(access) = scope.args.get(index) else {
            bail!("__applyArg index {} out of range", index);
        };
        let access = access.clone();
        let name = scope.names[index].clone();

        out.push_str(&name);
        let consumed = consumed_parts(&access);
        if consumed >= access.path.len() {
            return Ok(());
        }

        // Walk the schema to the consumed point, then print the remainder.
        let mut view = access.schemas.clone();
        for part in &access.path[..consumed] {
            view = view.property_schemas(part);
        }
        let mut path = String::new();
        emit_path(&mut path, &view, &access.path[consumed..], false);
        out.push_str(&path);
        Ok(())
    }

    /// Two-pass binding names for apply arguments: a best name per argument,
    /// disambiguated by prepending the target's assigned name and finally by
    /// integer suffix.
    fn apply_arg_names(&self, args: &[AccessExpr]) -> Vec<String> {
        let best: Vec<String> = args.iter().map(|a| self.best_arg_name(a)).collect();

        let mut names = best.clone();
        for i in 0..names.len() {
            let collides = best.iter().enumerate().any(|(j, b)| j != i && *b == best[i]);
            if collides {
                let prefix = args[i]
                    .target
                    .map(|t| self.names.name(t).to_string())
                    .unwrap_or_else(|| "arg".to_string());
                names[i] = format!("{}{}", prefix, pascal(&best[i]));
            }
        }

        for i in 0..names.len() {
            let mut n = 1usize;
            while names[..i].contains(&names[i]) {
                names[i] = format!("{}{}", names[i], n);
                n += 1;
            }
            names[i] = legalize(&names[i]);
        }
        names
    }

    fn best_arg_name(&self, access: &AccessExpr) -> String {
        let assigned = |target: Option<crate::il::node::NodeId>| {
            target
                .map(|t| self.names.name(t).to_string())
                .unwrap_or_else(|| "arg".to_string())
        };
        match &access.kind {
            AccessKind::Local | AccessKind::Variable => assigned(access.target),
            AccessKind::Module => match access.path.first() {
                Some(first) => crate::schema::view::camel_case(first),
                None => assigned(access.target),
            },
            AccessKind::Resource {
                mode: ResourceMode::Data,
                ..
            } => assigned(access.target),
            AccessKind::Resource { .. } => match access.path.first() {
                Some(first) => crate::schema::view::camel_case(first),
                None => assigned(access.target),
            },
            _ => "arg".to_string(),
        }
    }

    /// Inline conversions for `__coerce`, keyed by the destination carried in
    /// the call's own type.
    fn emit_coerce(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        let value = &call.args[0];
        match call.ty.element_type() {
            Type::STRING => {
                out.push_str("`${");
                self.emit_expr(out, value)?;
                out.push_str("}`");
            }
            Type::NUMBER => {
                out.push_str("parseFloat(");
                self.emit_expr(out, value)?;
                out.push(')');
            }
            Type::BOOL => {
                if value.ty().element_type() == Type::NUMBER {
                    out.push('(');
                    self.emit_expr(out, value)?;
                    out.push_str(" !== 0)");
                } else {
                    out.push('(');
                    self.emit_expr(out, value)?;
                    out.push_str(" === \"true\")");
                }
            }
            _ => self.emit_expr(out, value)?,
        }
        Ok(())
    }

    // ─── Terraform builtins ─────────────────────────────────────────────

    fn emit_builtin(&mut self, out: &mut String, call: &CallExpr) -> Result<()> {
        let args = &call.args;
        match call.name.as_str() {
            "file" => {
                out.push_str("fs.readFileSync(");
                self.emit_expr(out, &args[0])?;
                out.push_str(", \"utf-8\")");
            }
            "element" => {
                self.emit_expr(out, &args[0])?;
                out.push('[');
                self.emit_expr(out, &args[1])?;
                out.push(']');
            }
            "lookup" => {
                if let Some(default) = args.get(2) {
                    out.push('(');
                    self.emit_index_pair(out, &args[0], &args[1])?;
                    out.push_str(" !== undefined ? ");
                    self.emit_index_pair(out, &args[0], &args[1])?;
                    out.push_str(" : ");
                    self.emit_expr(out, default)?;
                    out.push(')');
                } else {
                    self.emit_index_pair(out, &args[0], &args[1])?;
                }
            }
            "split" => {
                self.emit_expr(out, &args[1])?;
                out.push_str(".split(");
                self.emit_expr(out, &args[0])?;
                out.push(')');
            }
            "join" => {
                self.emit_expr(out, &args[1])?;
                out.push_str(".join(");
                self.emit_expr(out, &args[0])?;
                out.push(')');
            }
            "length" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".length");
            }
            "format" => {
                out.push_str("util.format(");
                self.emit_args(out, args)?;
                out.push(')');
            }
            "formatlist" => {
                self.emit_expr(out, &args[1])?;
                out.push_str(".map(v => util.format(");
                self.emit_expr(out, &args[0])?;
                out.push_str(", v))");
            }
            "map" => {
                out.push('{');
                for pair in args.chunks(2) {
                    if pair.len() < 2 {
                        break;
                    }
                    if let Expr::Lit(LitExpr {
                        value: LitValue::String(key),
                        ..
                    }) = &pair[0]
                    {
                        out.push_str(&object_key(key));
                    } else {
                        out.push('[');
                        self.emit_expr(out, &pair[0])?;
                        out.push(']');
                    }
                    out.push_str(": ");
                    self.emit_expr(out, &pair[1])?;
                    out.push_str(", ");
                }
                out.push('}');
            }
            "list" => {
                out.push('[');
                self.emit_args(out, args)?;
                out.push(']');
            }
            "chomp" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".replace(/[\\r\\n]+$/, \"\")");
            }
            "lower" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".toLowerCase()");
            }
            "substr" => self.emit_substr(out, args)?,
            "replace" => self.emit_replace(out, args)?,
            "indent" => {
                self.emit_expr(out, &args[1])?;
                out.push_str(".split(\"\\n\").join(\"\\n\" + \" \".repeat(");
                self.emit_expr(out, &args[0])?;
                out.push_str("))");
            }
            "base64encode" => {
                out.push_str("Buffer.from(");
                self.emit_expr(out, &args[0])?;
                out.push_str(").toString(\"base64\")");
            }
            "base64decode" => {
                out.push_str("Buffer.from(");
                self.emit_expr(out, &args[0])?;
                out.push_str(", \"base64\").toString()");
            }
            "merge" => {
                out.push_str("Object.assign({}, ");
                self.emit_args(out, args)?;
                out.push(')');
            }
            "zipmap" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".reduce((m, k, i) => { m[k] = ");
                self.emit_expr(out, &args[1])?;
                out.push_str("[i]; return m; }, {} as {[key: string]: any})");
            }
            "concat" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".concat(");
                self.emit_args(out, &args[1..])?;
                out.push(')');
            }
            "compact" => {
                self.emit_expr(out, &args[0])?;
                out.push_str(".filter(v => v !== \"\")");
            }
            "coalesce" => {
                out.push('[');
                self.emit_args(out, args)?;
                out.push_str("].find(v => v !== undefined && v !== \"\")");
            }
            "coalescelist" => {
                out.push('[');
                self.emit_args(out, args)?;
                out.push_str("].find(l => l.length > 0)");
            }
            "min" => {
                out.push_str("Math.min(");
                self.emit_args(out, args)?;
                out.push(')');
            }
            "signum" => {
                out.push_str("Math.sign(");
                self.emit_expr(out, &args[0])?;
                out.push(')');
            }
            "cidrhost" => {
                out.push_str("((prefix: string, host: number) => { const [ip, bits] = prefix.split(\"/\"); const base = ip.split(\".\").reduce((n, o) => n * 256 + parseInt(o, 10), 0); const mask = 32 - parseInt(bits, 10); const addr = base + host; return [24, 16, 8, 0].map(s => (addr >> s) & 0xff).join(\".\"); })(");
                self.emit_expr(out, &args[0])?;
                out.push_str(", ");
                self.emit_expr(out, &args[1])?;
                out.push(')');
            }
            other => bail!("no target mapping for function {:?}", other),
        }
        Ok(())
    }

    fn emit_index_pair(&mut self, out: &mut String, map: &Expr, key: &Expr) -> Result<()> {
        self.emit_expr(out, map)?;
        out.push('[');
        self.emit_expr(out, key)?;
        out.push(']');
        Ok(())
    }

    fn emit_substr(&mut self, out: &mut String, args: &[Expr]) -> Result<()> {
        let to_end = matches!(
            args.get(2),
            Some(Expr::Lit(LitExpr {
                value: LitValue::Number(n),
                ..
            })) if *n == -1.0
        );
        self.emit_expr(out, &args[0])?;
        if to_end {
            out.push_str(".slice(");
            self.emit_expr(out, &args[1])?;
            out.push(')');
        } else {
            out.push_str(".substr(");
            self.emit_expr(out, &args[1])?;
            out.push_str(", ");
            self.emit_expr(out, &args[2])?;
            out.push(')');
        }
        Ok(())
    }

    /// Terraform's replace substitutes every occurrence; a `/pattern/`
    /// literal switches to regex matching.
    fn emit_replace(&mut self, out: &mut String, args: &[Expr]) -> Result<()> {
        if let Some(Expr::Lit(LitExpr {
            value: LitValue::String(pattern),
            ..
        })) = args.get(1)
        {
            if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
                self.emit_expr(out, &args[0])?;
                out.push_str(".replace(new RegExp(");
                out.push_str(&quote(&pattern[1..pattern.len() - 1]));
                out.push_str(", \"g\"), ");
                self.emit_expr(out, &args[2])?;
                out.push(')');
                return Ok(());
            }
        }
        self.emit_expr(out, &args[0])?;
        out.push_str(".split(");
        self.emit_expr(out, &args[1])?;
        out.push_str(").join(");
        self.emit_expr(out, &args[2])?;
        out.push(')');
        Ok(())
    }

    fn emit_args(&mut self, out: &mut String, args: &[Expr]) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.emit_expr(out, arg)?;
        }
        Ok(())
    }
}

// ─── Path projection ────────────────────────────────────────────────────────

/// How many leading path elements the apply's outer expression consumes for
/// an argument access: managed-resource and module accesses resolve their
/// first field, data sources and plain variables resolve whole values, and a
/// splat is aggregated in full.
pub fn consumed_parts(access: &AccessExpr) -> usize {
    match &access.kind {
        AccessKind::Resource {
            instancing: Instancing::Splat,
            ..
        } => access.path.len(),
        AccessKind::Resource {
            mode: ResourceMode::Data,
            ..
        } => 0,
        AccessKind::Resource { .. } | AccessKind::Module => access.path.len().min(1),
        _ => 0,
    }
}

/// Print an access path against its schema view: fields map through Pulumi
/// renames, numeric elements index lists except where the max-items-one
/// projection removed the wrapper, and optional fields assert non-null.
fn emit_path(out: &mut String, view: &SchemaView, parts: &[String], _in_apply: bool) {
    let mut view = view.clone();
    for part in parts {
        if part.parse::<usize>().is_ok() {
            if !view.is_max_items_one() {
                out.push('[');
                out.push_str(part);
                out.push(']');
            }
            view = view.elem_schemas();
            continue;
        }
        let mapped = view.pulumi_name(part);
        out.push('.');
        out.push_str(&mapped);
        let child = view.property_schemas(part);
        let optional = child
            .tf
            .as_ref()
            .map(|s| s.optional && !s.computed)
            .unwrap_or(false);
        if optional {
            out.push('!');
        }
        view = child;
    }
}

// ─── String forms ───────────────────────────────────────────────────────────

/// Double-quoted string literal with escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Escape literal text for a back-tick template: backslashes, back-ticks,
/// and `${` sequences.
pub fn escape_template(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

/// An object key, quoted only when it is not identifier-shaped.
pub fn object_key(key: &str) -> String {
    if is_identifier_shaped(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Scan a node for builtin usage that requires a preamble import.
pub fn uses_function(node: &Node, name: &str) -> bool {
    let mut found = false;
    crate::il::visitor::visit_node_exprs(node, &mut |e| {
        if let Expr::Call(call) = e {
            if call.name == name {
                found = true;
            }
        }
    });
    found
}

/// The conditional form of a count expression: boolean-coercible literals
/// print as booleans so `count = var.x ? 1 : 0` reads as a plain condition.
pub fn emit_count_condition(
    emitter: &mut ExprEmitter<'_>,
    out: &mut String,
    count: &Expr,
) -> Result<()> {
    match count {
        Expr::Lit(lit) => {
            let as_bool = match &lit.value {
                LitValue::Bool(b) => *b,
                LitValue::Number(n) => *n != 0.0,
                LitValue::String(s) => matches!(s.trim(), "1" | "true"),
            };
            out.push_str(if as_bool { "true" } else { "false" });
            Ok(())
        }
        Expr::Cond(cond) => {
            out.push('(');
            emitter.emit_expr(out, &cond.cond)?;
            out.push_str(" ? ");
            emit_count_condition(emitter, out, &cond.true_expr)?;
            out.push_str(" : ");
            emit_count_condition(emitter, out, &cond.false_expr)?;
            out.push(')');
            Ok(())
        }
        other => emitter.emit_expr(out, other),
    }
}
