use std::collections::{BTreeMap, BTreeSet};

use crate::il::node::{Graph, Module, ModuleId, Node, NodeId};
use crate::schema::view::camel_case;

// ─── Name table ─────────────────────────────────────────────────────────────

/// Target-language reserved words that can never be claimed as bindings.
const RESERVED: &[&str] = &[
    "abstract", "any", "as", "async", "await", "boolean", "break", "case", "catch", "class",
    "const", "continue", "debugger", "declare", "default", "delete", "do", "else", "enum",
    "export", "extends", "false", "finally", "for", "from", "function", "get", "if", "implements",
    "import", "in", "instanceof", "interface", "is", "let", "module", "namespace", "new", "null",
    "number", "of", "package", "private", "protected", "public", "require", "return", "set",
    "static", "string", "super", "switch", "symbol", "this", "throw", "true", "try", "type",
    "typeof", "undefined", "var", "void", "while", "with", "yield",
];

/// Assigns every named node of a module an unambiguous identifier. The table
/// is injective within the module and deterministic for a given graph.
#[derive(Debug, Default)]
pub struct NameTable {
    names: BTreeMap<NodeId, String>,
    claimed: BTreeSet<String>,
}

impl NameTable {
    pub fn build(graph: &Graph, module_id: ModuleId, seed: &[&str]) -> NameTable {
        let mut table = NameTable {
            names: BTreeMap::new(),
            claimed: seed.iter().map(|s| s.to_string()).collect(),
        };
        let module = graph.module(module_id);
        let is_root = module.name.is_empty();

        table.assign_outputs(module, is_root);
        table.assign_locals(module);
        table.assign_variables(module);
        table.assign_modules(module);
        table.assign_providers(graph, module);
        table.assign_resources(graph, module);
        table
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("unknown")
    }

    /// True when an identifier was handed out (or seeded) in this module.
    pub fn contains_name(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    fn is_free(&self, name: &str) -> bool {
        !self.claimed.contains(name) && !RESERVED.contains(&name)
    }

    fn claim(&mut self, id: NodeId, name: String) {
        self.claimed.insert(name.clone());
        self.names.insert(id, name);
    }

    /// Outputs win conflicts at the root module: they take the raw
    /// transformed name and reserve it first. Child-module outputs yield on
    /// conflict instead, since they only name fields of the returned object.
    fn assign_outputs(&mut self, module: &Module, is_root: bool) {
        for (tf_name, &id) in &module.outputs {
            let base = legalize(&camel_case(tf_name));
            if is_root || self.is_free(&base) {
                self.claim(id, base);
            } else {
                self.claim_with_integer(id, &format!("{}Output", base));
            }
        }
    }

    /// Conflicting locals are prefixed with "my" and re-cased.
    fn assign_locals(&mut self, module: &Module) {
        for (tf_name, &id) in &module.locals {
            let base = legalize(&camel_case(tf_name));
            if self.is_free(&base) {
                self.claim(id, base);
            } else {
                self.claim_with_integer(id, &format!("my{}", pascal(&base)));
            }
        }
    }

    fn assign_variables(&mut self, module: &Module) {
        for (tf_name, &id) in &module.variables {
            let base = legalize(&camel_case(tf_name));
            if self.is_free(&base) {
                self.claim(id, base);
            } else {
                self.claim_with_integer(id, &format!("{}Input", base));
            }
        }
    }

    fn assign_modules(&mut self, module: &Module) {
        for (tf_name, &id) in &module.modules {
            let base = legalize(&camel_case(tf_name));
            if self.is_free(&base) {
                self.claim(id, base);
            } else {
                self.claim_with_integer(id, &format!("{}Instance", base));
            }
        }
    }

    fn assign_providers(&mut self, graph: &Graph, module: &Module) {
        for (key, &id) in &module.providers {
            let base = legalize(&camel_case(&key.replace('.', "_")));
            if self.is_free(&base) {
                self.claim(id, base);
            } else {
                let plugin = match graph.node(id) {
                    Node::Provider(p) => p.plugin_name.clone(),
                    _ => String::new(),
                };
                self.claim_with_integer(id, &legalize(&format!("{}{}", plugin, pascal(&base))));
            }
        }
    }

    /// Resources group by their transformed Terraform name. A lone member
    /// keeps the base name when it is free; members of larger groups are
    /// always disambiguated by type, then module and type, then package,
    /// module, and type, and finally by integer.
    fn assign_resources(&mut self, graph: &Graph, module: &Module) {
        let mut groups: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        for &id in module.resources.values() {
            if let Node::Resource(resource) = graph.node(id) {
                let base = legalize(&camel_case(&resource.name));
                groups.entry(base).or_default().push(id);
            }
        }

        for (base, members) in groups {
            // Members sort by Terraform address via the resources map order;
            // re-sort by sort key for stability.
            let mut members = members;
            members.sort_by_key(|&id| graph.sort_key(id));

            let force = members.len() > 1;
            for id in members {
                if !force && self.is_free(&base) {
                    self.claim(id, base.clone());
                    continue;
                }
                self.disambiguate_resource(graph, id, &base);
            }
        }
    }

    fn disambiguate_resource(&mut self, graph: &Graph, id: NodeId, base: &str) {
        let Node::Resource(resource) = graph.node(id) else {
            return;
        };
        let (type_name, module_name, package) = match &resource.info {
            Some(info) => {
                let mut type_name = info.type_name().to_string();
                if resource.is_data() {
                    type_name = strip_get(&type_name);
                }
                (
                    pascal(&type_name),
                    pascal(&camel_case(info.module())),
                    pascal(&camel_case(info.package())),
                )
            }
            None => (pascal(&camel_case(&resource.type_name)), String::new(), String::new()),
        };

        let candidates = [
            format!("{}{}", base, type_name),
            format!("{}{}{}", base, module_name, type_name),
            format!("{}{}{}{}", base, package, module_name, type_name),
        ];
        for candidate in &candidates {
            let candidate = legalize(candidate);
            if self.is_free(&candidate) {
                self.claim(id, candidate);
                return;
            }
        }
        self.claim_with_integer(id, &legalize(&candidates[0]));
    }

    fn claim_with_integer(&mut self, id: NodeId, base: &str) {
        if self.is_free(base) {
            self.claim(id, base.to_string());
            return;
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}{}", base, n);
            if self.is_free(&candidate) {
                self.claim(id, candidate);
                return;
            }
            n += 1;
        }
    }
}

// ─── Identifier transforms ──────────────────────────────────────────────────

/// Make a camel-cased name a legal binding identifier: illegal characters are
/// replaced with underscores and a leading digit is prefixed.
pub fn legalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let legal = c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit());
        if legal {
            out.push(c);
        } else if c.is_ascii_digit() {
            out.push('_');
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

pub fn pascal(name: &str) -> String {
    let camel = camel_case(name);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => camel,
    }
}

/// Data-source type names drop their `get` prefix, e.g. `getAmi` → `Ami`.
fn strip_get(type_name: &str) -> String {
    match type_name.strip_prefix("get") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => type_name.to_string(),
    }
}

/// True when a string can be used as an unquoted object key.
pub fn is_legal_identifier(name: &str) -> bool {
    !name.is_empty()
        && !RESERVED.contains(&name)
        && name.chars().enumerate().all(|(i, c)| {
            c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())
        })
}

/// True when a string is shaped like an identifier, reserved or not; object
/// keys may use reserved words unquoted.
pub fn is_identifier_shaped(name: &str) -> bool {
    !name.is_empty()
        && name.chars().enumerate().all(|(i, c)| {
            c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legalize_replaces_and_prefixes() {
        assert_eq!(legalize("cidrBlock"), "cidrBlock");
        assert_eq!(legalize("my-name"), "my_name");
        assert_eq!(legalize("9lives"), "_9lives");
        assert_eq!(legalize(""), "_");
    }

    #[test]
    fn pascal_uppercases_first() {
        assert_eq!(pascal("vpc"), "Vpc");
        assert_eq!(pascal("awsVpc"), "AwsVpc");
        assert_eq!(pascal("aws_vpc"), "AwsVpc");
    }

    #[test]
    fn strip_get_only_when_meaningful() {
        assert_eq!(strip_get("getAmi"), "Ami");
        assert_eq!(strip_get("get"), "get");
        assert_eq!(strip_get("Ami"), "Ami");
    }
}
