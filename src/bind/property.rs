use std::collections::BTreeMap;

use anyhow::Result;

use crate::bind::{Binder, ModuleCtx};
use crate::config::types::RawValue;
use crate::il::expr::{Expr, IrNode, ListProp, MapProp};
use crate::schema::SchemaView;

impl<'a> Binder<'a> {
    /// Bind a raw configuration value into an IR property tree, guided by the
    /// schema view. Scalars become literals, lists and maps become property
    /// nodes, and interpolation ASTs dispatch to expression binding. A null
    /// value binds to nothing.
    pub(crate) fn bind_value(
        &mut self,
        ctx: &mut ModuleCtx,
        raw: &RawValue,
        view: &SchemaView,
    ) -> Result<Option<IrNode>> {
        match raw {
            RawValue::Null => Ok(None),
            RawValue::Bool(b) => Ok(Some(IrNode::Expr(Expr::bool(*b)))),
            RawValue::Number(n) => Ok(Some(IrNode::Expr(Expr::number(*n)))),
            RawValue::String(s) => Ok(Some(IrNode::Expr(Expr::string(s.clone())))),
            RawValue::List(items) => self.bind_list(ctx, items, view),
            RawValue::Map(entries) => self.bind_map(ctx, entries, view),
            RawValue::Expr(expr) => Ok(Some(IrNode::Expr(
                self.bind_expression(ctx, expr, view)?,
            ))),
        }
    }

    /// Bind a raw list. A max-items-one list with a single element projects
    /// to its sole child; an element that itself binds to a list is flattened
    /// into the parent.
    fn bind_list(
        &mut self,
        ctx: &mut ModuleCtx,
        items: &[RawValue],
        view: &SchemaView,
    ) -> Result<Option<IrNode>> {
        let elem_view = view.elem_schemas();

        if view.is_max_items_one() && items.len() == 1 {
            return self.bind_value(ctx, &items[0], &elem_view);
        }

        let mut elems = Vec::with_capacity(items.len());
        for item in items {
            match self.bind_value(ctx, item, &elem_view)? {
                Some(IrNode::List(inner)) => elems.extend(inner.elems),
                Some(bound) => elems.push(bound),
                None => {}
            }
        }

        Ok(Some(IrNode::List(ListProp {
            schemas: view.clone(),
            comments: None,
            elems,
        })))
    }

    fn bind_map(
        &mut self,
        ctx: &mut ModuleCtx,
        entries: &BTreeMap<String, RawValue>,
        view: &SchemaView,
    ) -> Result<Option<IrNode>> {
        let mut bound_entries = BTreeMap::new();
        for (key, value) in entries {
            let child_view = view.property_schemas(key);
            if let Some(bound) = self.bind_value(ctx, value, &child_view)? {
                bound_entries.insert(key.clone(), bound);
            }
        }
        Ok(Some(IrNode::Map(MapProp {
            schemas: view.clone(),
            comments: None,
            entries: bound_entries,
        })))
    }
}
