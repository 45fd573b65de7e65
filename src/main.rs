use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use terracast::bind::{build_graph, BuildOptions};
use terracast::config::load_module_tree;
use terracast::emit::emit_program;
use terracast::il::node::{Graph, Node};
use terracast::rewrite::rewrite_graph;
use terracast::schema::{PluginSource, SchemaRegistry};

/// terracast - Translate Terraform configurations into Pulumi programs
#[derive(Parser)]
#[command(name = "terracast", version, about, long_about = None)]
struct Cli {
    /// Path to the Terraform configuration directory
    #[arg(short, long, default_value = ".")]
    path: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate the configuration and write the target program
    Convert {
        /// Output file ("-" for stdout)
        #[arg(short, long, default_value = "index.ts")]
        out: String,

        /// Tolerate providers whose schema cannot be fetched
        #[arg(long)]
        allow_missing_plugins: bool,

        /// Tolerate dangling variable and resource references
        #[arg(long)]
        allow_missing_variables: bool,

        /// Fail instead of warning when comment extraction breaks
        #[arg(long)]
        strict_comments: bool,

        /// Prefix for provider schema plugins on PATH
        #[arg(long)]
        plugin_prefix: Option<String>,
    },

    /// Print the bound dependency graph in GraphViz DOT format
    Graph {
        /// Tolerate providers whose schema cannot be fetched
        #[arg(long)]
        allow_missing_plugins: bool,

        /// Tolerate dangling variable and resource references
        #[arg(long)]
        allow_missing_variables: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(err) = run(cli) {
        println!("{} {:#}", "✗".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = PathBuf::from(&cli.path);
    match cli.command {
        Commands::Convert {
            out,
            allow_missing_plugins,
            allow_missing_variables,
            strict_comments,
            plugin_prefix,
        } => {
            let options = BuildOptions {
                allow_missing_plugins,
                allow_missing_variables,
                allow_missing_comments: !strict_comments,
            };
            let graph = build(&dir, &options, plugin_prefix.as_deref())?;
            let program = emit_program(&graph)?;
            if out == "-" {
                print!("{}", program);
            } else {
                std::fs::write(&out, &program)
                    .with_context(|| format!("Failed to write {}", out))?;
                println!(
                    "{} Converted {} to {}",
                    "✓".green().bold(),
                    dir.display(),
                    out
                );
            }
            Ok(())
        }
        Commands::Graph {
            allow_missing_plugins,
            allow_missing_variables,
        } => {
            let options = BuildOptions {
                allow_missing_plugins,
                allow_missing_variables,
                allow_missing_comments: true,
            };
            let graph = build(&dir, &options, None)?;
            print!("{}", to_dot(&graph));
            Ok(())
        }
    }
}

fn build(dir: &Path, options: &BuildOptions, plugin_prefix: Option<&str>) -> Result<Graph> {
    let tree = load_module_tree(dir)?;
    let source = match plugin_prefix {
        Some(prefix) => PluginSource::with_prefix(prefix),
        None => PluginSource::new(),
    };
    let mut registry = SchemaRegistry::new(Box::new(source));
    let mut graph = build_graph(&tree, options, &mut registry)?;
    rewrite_graph(&mut graph)?;
    Ok(graph)
}

/// Render the bound graph's nodes and dependency edges as GraphViz DOT.
fn to_dot(graph: &Graph) -> String {
    let mut dot = String::from("digraph nodes {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=filled];\n\n");

    for id in graph.node_ids() {
        let node = graph.node(id);
        let color = match node {
            Node::Provider(_) => "#d8c8a8",
            Node::Resource(r) if r.is_data() => "#a8c8d8",
            Node::Resource(_) => "#a8d8a8",
            Node::Module(_) => "#c8a8d8",
            Node::Variable(_) => "#e8e8e8",
            Node::Local(_) => "#e8d8c8",
            Node::Output(_) => "#d8d8a8",
        };
        dot.push_str(&format!(
            "  n{} [label=\"{}\", fillcolor=\"{}\"];\n",
            id.index(),
            node.display_name(),
            color
        ));
    }

    dot.push('\n');

    for id in graph.node_ids() {
        for &dep in graph.node(id).deps() {
            dot.push_str(&format!("  n{} -> n{};\n", dep.index(), id.index()));
        }
    }

    dot.push_str("}\n");
    dot
}
