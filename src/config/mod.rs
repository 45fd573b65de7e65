pub mod comments;
pub mod parser;
pub mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

pub use types::{
    BinOp, Expression, ModuleTree, RawModuleCall, RawOutput, RawProvider, RawResource, RawValue,
    RawVariable, TemplatePart, UnaryOp,
};

/// Load a Terraform configuration directory into a module tree. Child modules
/// with local-path sources are loaded recursively; any other source is a hard
/// error because the module's root path cannot be located.
pub fn load_module_tree(dir: &Path) -> Result<ModuleTree> {
    let mut visiting = BTreeSet::new();
    load_module(dir, String::new(), &mut visiting)
}

fn load_module(dir: &Path, name: String, visiting: &mut BTreeSet<PathBuf>) -> Result<ModuleTree> {
    let canonical = dir
        .canonicalize()
        .with_context(|| format!("Cannot locate module directory: {}", dir.display()))?;
    if !visiting.insert(canonical.clone()) {
        bail!(
            "Module cycle detected through directory: {}",
            canonical.display()
        );
    }

    let mut tree = parse_directory(dir)?;
    tree.name = name;

    let module_calls = tree.modules.clone();
    for call in &module_calls {
        let source = call.source.as_str();
        if !(source.starts_with("./") || source.starts_with("../")) {
            bail!(
                "Cannot locate root path for module {:?}: only local sources are supported, got {:?}",
                call.name,
                source
            );
        }
        let child_dir = dir.join(source);
        let child = load_module(&child_dir, call.name.clone(), visiting)
            .with_context(|| format!("Failed to load module {:?}", call.name))?;
        tree.children.insert(call.name.clone(), child);
    }

    visiting.remove(&canonical);
    Ok(tree)
}

/// Parse all .tf files in a directory, in sorted order, into one module.
pub fn parse_directory(dir: &Path) -> Result<ModuleTree> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read configuration directory: {}", dir.display()))?;
    let mut tf_files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "tf").unwrap_or(false))
        .collect();
    tf_files.sort();

    if tf_files.is_empty() {
        bail!("No .tf files found in directory: {}", dir.display());
    }

    let mut tree = ModuleTree {
        dir: dir.to_path_buf(),
        ..ModuleTree::default()
    };

    for file in &tf_files {
        tracing::debug!("Parsing HCL file: {}", file.display());
        let content = std::fs::read_to_string(file)?;
        let partial = parser::parse_hcl(&content, file)?;
        merge_module(&mut tree, partial);
    }

    Ok(tree)
}

/// Merge one file's partial tree into the module.
fn merge_module(main: &mut ModuleTree, partial: ModuleTree) {
    main.providers.extend(partial.providers);
    main.resources.extend(partial.resources);
    main.data_sources.extend(partial.data_sources);
    main.modules.extend(partial.modules);
    main.variables.extend(partial.variables);
    main.outputs.extend(partial.outputs);
    main.locals.extend(partial.locals);
}
