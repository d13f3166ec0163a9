// SPDX-License-Identifier: MIT OR Apache-2.0
//! `reel` - command-line front end for the Reel node graph engine
//!
//! Loads and saves projects, inspects graph structure and hashes, edits
//! standard values through the undo history, and renders outputs in
//! parallel with content-addressed caching.

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use parking_lot::RwLock;
use reel_app::backend::CpuBackend;
use reel_app::history::History;
use reel_app::render::{self, Renderer};
use reel_app::settings::{EngineSettings, DEFAULT_LOG_FILTER, SETTINGS_FILE_NAME};
use reel_app::{project, AppError, Result};
use reel_graph::command::SetValueCommand;
use reel_graph::nodes::create_default_registry;
use reel_graph::{InputRef, NodeGraph, SharedGraph};
use reel_time::Rational;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "Reel node graph engine")]
struct Cli {
    /// Engine settings file
    #[arg(long, default_value = SETTINGS_FILE_NAME, global = true)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the sample project
    Demo {
        /// Destination project file
        #[arg(long, default_value = "demo.reel")]
        out: PathBuf,
    },
    /// Summarize a project
    Info {
        /// Project file
        project: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the cache key of a node at a time
    Hash {
        /// Project file
        project: PathBuf,
        /// Node label, defaults to the first output node
        #[arg(long)]
        node: Option<String>,
        /// Time as `num/den` or an integer
        #[arg(long, default_value = "0")]
        time: Rational,
    },
    /// List the nodes a node depends on
    Deps {
        /// Project file
        project: PathBuf,
        /// Node label, defaults to the first output node
        #[arg(long)]
        node: Option<String>,
        /// Only dependencies nothing else uses
        #[arg(long)]
        exclusive: bool,
    },
    /// Set a standard value and save the project
    Set {
        /// Project file
        project: PathBuf,
        /// Node label
        #[arg(long)]
        node: String,
        /// Input id
        #[arg(long)]
        input: String,
        /// New value, parsed according to the input's type
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
    /// Render a node over a span of frames
    Render {
        /// Project file
        project: PathBuf,
        /// Node label, defaults to the first output node
        #[arg(long)]
        node: Option<String>,
        /// First frame time
        #[arg(long, default_value = "0")]
        start: Rational,
        /// End time, exclusive
        #[arg(long)]
        end: Rational,
        /// Write rendered pictures as PNG files here
        #[arg(long)]
        png_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct NodeSummary {
    id: String,
    label: String,
    type_id: &'static str,
    dirty_ranges: usize,
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    name: String,
    edges: usize,
    types: IndexMap<&'static str, usize>,
    nodes: Vec<NodeSummary>,
}

fn summarize(graph: &NodeGraph) -> ProjectSummary {
    let mut types = IndexMap::new();
    let nodes = graph
        .nodes()
        .map(|n| {
            *types.entry(n.type_id()).or_insert(0) += 1;
            NodeSummary {
                id: n.id().to_string(),
                label: n.display_name().to_string(),
                type_id: n.type_id(),
                dirty_ranges: n.invalidated().len(),
            }
        })
        .collect();
    ProjectSummary {
        name: graph.name.clone(),
        edges: graph.edges().len(),
        types,
        nodes,
    }
}

fn load(path: &Path) -> Result<NodeGraph> {
    project::load_project(path, &create_default_registry())
}

fn run(command: Command, settings: &EngineSettings) -> Result<()> {
    match command {
        Command::Demo { out } => {
            project::save_project(&project::demo_graph()?, &out)?;
            println!("Wrote {}", out.display());
        }
        Command::Info { project: path, json } => {
            let summary = summarize(&load(&path)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}: {} nodes, {} edges", summary.name, summary.nodes.len(), summary.edges);
                for node in &summary.nodes {
                    println!("  {:<16} {:<20} {}", node.label, node.type_id, node.id);
                }
            }
        }
        Command::Hash { project: path, node, time } => {
            let graph = load(&path)?;
            let id = project::find_node(&graph, node.as_deref())?;
            println!("{}", graph.hash(id, time)?);
        }
        Command::Deps {
            project: path,
            node,
            exclusive,
        } => {
            let graph = load(&path)?;
            let id = project::find_node(&graph, node.as_deref())?;
            let deps = if exclusive {
                graph.exclusive_dependencies(id)
            } else {
                graph.dependencies(id)
            };
            for dep in deps.into_iter().filter_map(|d| graph.node(d)) {
                println!("{} ({})", dep.display_name(), dep.type_id());
            }
        }
        Command::Set {
            project: path,
            node,
            input,
            value,
        } => {
            let mut graph = load(&path)?;
            let id = project::find_node(&graph, Some(node.as_str()))?;
            let value = project::parse_value(project::input_data_type(&graph, id, &input)?, &value)?;
            let mut history = History::new();
            history.execute(&mut graph, SetValueCommand::new(InputRef::new(id, input), value))?;
            if let Some(description) = history.undo_description() {
                tracing::info!("{description} on {node}");
            }
            project::save_project(&graph, &path)?;
        }
        Command::Render {
            project: path,
            node,
            start,
            end,
            png_dir,
        } => {
            let graph = load(&path)?;
            let id = project::find_node(&graph, node.as_deref())?;
            let ranges = render::frame_ranges(start, end, settings.timebase)?;

            let shared: SharedGraph = Arc::new(RwLock::new(graph));
            let backend = Arc::new(CpuBackend::new(settings.video_params()));
            let renderer = Renderer::new(shared, backend, settings)?;
            let report = renderer.render(id, &ranges)?;

            for frame in &report.frames {
                println!("{} {}", frame.range, frame.digest);
            }
            if let Some(dir) = png_dir {
                let written = render::export_report(&report, &dir, settings.timebase)?;
                println!("Wrote {} images to {}", written.len(), dir.display());
            }
            if report.cancelled > 0 {
                return Err(AppError::InvalidArgument(format!("{} frames were cancelled", report.cancelled)));
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let settings = EngineSettings::load_or_default(&cli.settings);

    let filter = match settings.as_ref().ok().and_then(|s| s.log_filter.as_deref()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = settings.and_then(|settings| run(cli.command, &settings));
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_graph::nodes::clip::{IN_INPUT, LENGTH_INPUT};
    use reel_graph::nodes::solid::COLOR_INPUT;
    use reel_graph::{Color, ParamValue};

    fn set_command(path: &Path, node: &str, input: &str, value: &str) -> Command {
        let cli = Cli::try_parse_from([
            "reel",
            "set",
            path.to_str().unwrap(),
            "--node",
            node,
            "--input",
            input,
            "--value",
            value,
        ])
        .unwrap();
        cli.command
    }

    #[test]
    fn test_set_parses_values_by_input_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.reel");
        project::save_project(&project::demo_graph().unwrap(), &path).unwrap();
        let settings = EngineSettings::default();

        run(set_command(&path, "Clip 1", LENGTH_INPUT, "3/2"), &settings).unwrap();
        run(set_command(&path, "Clip 2", IN_INPUT, "-1"), &settings).unwrap();
        run(set_command(&path, "Solid 1", COLOR_INPUT, "0,1,0"), &settings).unwrap();
        assert!(run(set_command(&path, "Clip 1", LENGTH_INPUT, "soon"), &settings).is_err());

        let graph = load(&path).unwrap();
        let value = |label: &str, input: &str| {
            let id = project::find_node(&graph, Some(label)).unwrap();
            graph.node(id).unwrap().value_at(input, Rational::ZERO)
        };
        assert_eq!(
            value("Clip 1", LENGTH_INPUT),
            ParamValue::Rational(Rational::new(3, 2).unwrap())
        );
        assert_eq!(value("Clip 2", IN_INPUT), ParamValue::Rational(Rational::from_integer(-1)));
        assert_eq!(value("Solid 1", COLOR_INPUT), ParamValue::Color(Color::new(0.0, 1.0, 0.0, 1.0)));
    }
}
