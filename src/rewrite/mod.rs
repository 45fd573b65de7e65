pub mod apply;
pub mod assets;
pub mod coerce;
pub mod paths;
pub mod prompt;

use anyhow::Result;

use crate::il::node::Graph;

/// Run every IR rewrite in order. Prompt marking comes first because it
/// removes output flags the apply rewrite would otherwise lift; apply lifting
/// comes last so it sees the final shapes the other rewrites produce.
pub fn rewrite_graph(graph: &mut Graph) -> Result<()> {
    prompt::mark_prompt_data_sources(graph)?;
    paths::lower_path_literals(graph)?;
    assets::lift_assets(graph)?;
    coerce::insert_coercions(graph)?;
    apply::lift_applies(graph)?;
    Ok(())
}
