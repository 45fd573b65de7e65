use std::sync::Arc;

use crate::il::ty::Type;
use crate::schema::info::{Elem, FieldInfo, ResourceInfo, TfResource, TfSchema, ValueKind};

// ─── Schema view ────────────────────────────────────────────────────────────

/// A lightweight triple over one property: the Terraform property schema, the
/// Terraform nested resource schema (for composite types), and the Pulumi
/// field info. Both the binder and the emitter navigate properties through
/// this view so the max-items-one projection is decided in exactly one place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaView {
    pub tf: Option<Arc<TfSchema>>,
    pub res: Option<Arc<TfResource>>,
    pub info: Option<Arc<FieldInfo>>,
}

impl SchemaView {
    pub fn empty() -> SchemaView {
        SchemaView::default()
    }

    /// The root view over a resource's schema.
    pub fn for_resource(info: &Arc<ResourceInfo>) -> SchemaView {
        SchemaView {
            tf: None,
            res: Some(Arc::clone(&info.schema)),
            info: Some(Arc::clone(&info.info)),
        }
    }

    /// Navigate to a named child property. An integer key is an element
    /// access and routes to `elem_schemas`.
    pub fn property_schemas(&self, key: &str) -> SchemaView {
        if key.parse::<usize>().is_ok() {
            return self.elem_schemas();
        }

        // A primitive map has no named children; every key shares the
        // element schema.
        if self.res.is_none() {
            if let Some(tf) = &self.tf {
                if tf.kind == ValueKind::Map {
                    return self.elem_schemas();
                }
            }
        }

        let tf = self.object_schema().and_then(|r| r.schema.get(key).cloned());
        let res = tf.as_ref().and_then(|s| match &s.elem {
            Some(Elem::Resource { resource }) => Some(Arc::clone(resource)),
            _ => None,
        });
        let info = self
            .info
            .as_ref()
            .and_then(|i| i.fields.get(key).cloned());
        SchemaView { tf, res, info }
    }

    /// Navigate into the element of a list/set/map schema.
    pub fn elem_schemas(&self) -> SchemaView {
        let info = self.info.as_ref().and_then(|i| i.elem.clone());
        match self.tf.as_ref().and_then(|s| s.elem.clone()) {
            Some(Elem::Schema { schema }) => {
                let res = match &schema.elem {
                    Some(Elem::Resource { resource }) => Some(Arc::clone(resource)),
                    _ => None,
                };
                SchemaView {
                    tf: Some(schema),
                    res,
                    info,
                }
            }
            Some(Elem::Resource { resource }) => SchemaView {
                tf: None,
                res: Some(resource),
                info,
            },
            None => SchemaView {
                tf: None,
                res: self.res.clone(),
                info,
            },
        }
    }

    /// The nested resource to look child properties up in, whether this view
    /// sits at a resource root or at a block-typed property.
    fn object_schema(&self) -> Option<&Arc<TfResource>> {
        self.res.as_ref()
    }

    /// Derive the IR type this view describes. List and set schemas become
    /// `list<elem>`; integers and floats become number; a bare nested
    /// resource becomes map; an absent schema is unknown.
    pub fn type_(&self) -> Type {
        match self.tf.as_ref() {
            Some(tf) => match tf.kind {
                ValueKind::Bool => Type::BOOL,
                ValueKind::Int | ValueKind::Float => Type::NUMBER,
                ValueKind::String => Type::STRING,
                ValueKind::Map => Type::MAP,
                ValueKind::List | ValueKind::Set => self.elem_schemas().type_().list_of(),
            },
            None if self.res.is_some() => Type::MAP,
            None => Type::UNKNOWN,
        }
    }

    /// True when a single-element Terraform list/set projects to a scalar in
    /// the target language.
    pub fn is_max_items_one(&self) -> bool {
        if let Some(explicit) = self.info.as_ref().and_then(|i| i.max_items_one) {
            return explicit;
        }
        self.tf
            .as_ref()
            .map(|s| matches!(s.kind, ValueKind::List | ValueKind::Set) && s.max_items == 1)
            .unwrap_or(false)
    }

    /// The Pulumi-side name for a Terraform property key: the explicit rename
    /// if the info carries one, otherwise the camel-cased key.
    pub fn pulumi_name(&self, key: &str) -> String {
        if let Some(name) = self
            .info
            .as_ref()
            .and_then(|i| i.fields.get(key))
            .and_then(|f| f.name.clone())
        {
            return name;
        }
        camel_case(key)
    }
}

/// Terraform-style snake_case to the target language's camelCase.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' || c == '-' {
            upper_next = i > 0;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::info::{AssetInfo, AssetKind};
    use std::collections::BTreeMap;

    fn scalar(kind: ValueKind) -> Arc<TfSchema> {
        Arc::new(TfSchema {
            kind,
            elem: None,
            max_items: 0,
            min_items: 0,
            optional: true,
            required: false,
            computed: false,
        })
    }

    fn list_of(elem: Elem, max_items: usize) -> Arc<TfSchema> {
        Arc::new(TfSchema {
            kind: ValueKind::List,
            elem: Some(elem),
            max_items,
            min_items: 0,
            optional: true,
            required: false,
            computed: false,
        })
    }

    fn resource(fields: Vec<(&str, Arc<TfSchema>)>) -> Arc<TfResource> {
        Arc::new(TfResource {
            schema: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }

    fn view_over(res: Arc<TfResource>) -> SchemaView {
        SchemaView {
            tf: None,
            res: Some(res),
            info: None,
        }
    }

    #[test]
    fn scalar_kinds_map_to_ir_types() {
        let res = resource(vec![
            ("enabled", scalar(ValueKind::Bool)),
            ("size", scalar(ValueKind::Int)),
            ("ratio", scalar(ValueKind::Float)),
            ("name", scalar(ValueKind::String)),
            ("tags", scalar(ValueKind::Map)),
        ]);
        let view = view_over(res);
        assert_eq!(view.property_schemas("enabled").type_(), Type::BOOL);
        assert_eq!(view.property_schemas("size").type_(), Type::NUMBER);
        assert_eq!(view.property_schemas("ratio").type_(), Type::NUMBER);
        assert_eq!(view.property_schemas("name").type_(), Type::STRING);
        assert_eq!(view.property_schemas("tags").type_(), Type::MAP);
        assert_eq!(view.property_schemas("absent").type_(), Type::UNKNOWN);
    }

    #[test]
    fn list_schema_types_as_list_of_elem() {
        let res = resource(vec![(
            "names",
            list_of(
                Elem::Schema {
                    schema: scalar(ValueKind::String),
                },
                0,
            ),
        )]);
        let view = view_over(res).property_schemas("names");
        assert_eq!(view.type_(), Type::STRING.list_of());
        assert_eq!(view.elem_schemas().type_(), Type::STRING);
    }

    #[test]
    fn nested_resource_elem_types_as_map() {
        let inner = resource(vec![("address", scalar(ValueKind::String))]);
        let res = resource(vec![(
            "network_interface",
            list_of(Elem::Resource { resource: inner }, 1),
        )]);
        let view = view_over(res).property_schemas("network_interface");
        assert_eq!(view.type_(), Type::MAP.list_of());
        assert!(view.is_max_items_one());
        assert_eq!(
            view.elem_schemas().property_schemas("address").type_(),
            Type::STRING
        );
    }

    #[test]
    fn integer_key_routes_to_elem() {
        let inner = resource(vec![("address", scalar(ValueKind::String))]);
        let res = resource(vec![(
            "network_interface",
            list_of(Elem::Resource { resource: inner }, 0),
        )]);
        let view = view_over(res).property_schemas("network_interface");
        assert_eq!(
            view.property_schemas("0").property_schemas("address").type_(),
            Type::STRING
        );
    }

    #[test]
    fn info_overrides_and_renames() {
        let res = resource(vec![("user_data", scalar(ValueKind::String))]);
        let mut fields = BTreeMap::new();
        fields.insert(
            "user_data".to_string(),
            Arc::new(FieldInfo {
                name: Some("userData".to_string()),
                asset: Some(AssetInfo {
                    kind: AssetKind::Asset,
                    hash_field: None,
                }),
                ..FieldInfo::default()
            }),
        );
        let view = SchemaView {
            tf: None,
            res: Some(res),
            info: Some(Arc::new(FieldInfo {
                fields,
                ..FieldInfo::default()
            })),
        };
        assert_eq!(view.pulumi_name("user_data"), "userData");
        assert_eq!(view.pulumi_name("cidr_block"), "cidrBlock");
        assert!(view
            .property_schemas("user_data")
            .info
            .as_ref()
            .and_then(|i| i.asset.as_ref())
            .is_some());
    }

    #[test]
    fn camel_case_handles_edges() {
        assert_eq!(camel_case("cidr_block"), "cidrBlock");
        assert_eq!(camel_case("_private"), "private");
        assert_eq!(camel_case("already"), "already");
        assert_eq!(camel_case("a_b_c"), "aBC");
    }
}
