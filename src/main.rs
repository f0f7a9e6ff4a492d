use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser, Subcommand};
use patchcanvas::{Canvas, CanvasSettings, ConnectionHandle, ConnectionKey, MemoryPatch, Point, SyncReport};
use serde::Serialize;
use std::time::Instant;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconcile a patch into a canvas and route its cables", long_about = None)]
struct Cli {
    /// More log output (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route every connection around the other objects and print the routes as JSON
    Route {
        /// Patch document in JSON form
        #[arg(value_name = "PATCH_JSON")]
        patch: Utf8PathBuf,

        /// Canvas settings JSON; defaults apply when omitted
        #[arg(long, value_name = "SETTINGS_JSON")]
        settings: Option<Utf8PathBuf>,

        /// Also write the patch with the new path states here
        #[arg(short, long, value_name = "OUT_JSON")]
        output: Option<Utf8PathBuf>,
    },
    /// Print object and connection counts and the reconciliation report
    Inspect {
        #[arg(value_name = "PATCH_JSON")]
        patch: Utf8PathBuf,
    },
}

#[derive(Serialize)]
struct RoutedConnection {
    handle: ConnectionHandle,
    segmented: bool,
    points: Vec<Point>,
    path_state: String,
}

#[derive(Serialize)]
struct Inspection {
    objects: usize,
    connections: usize,
    report: SyncReport,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Route {
            patch,
            settings,
            output,
        } => route(&patch, settings.as_deref(), output.as_deref()),
        Command::Inspect { patch } => inspect(&patch),
    }
}

fn load_patch(path: &Utf8Path) -> Result<MemoryPatch> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
    MemoryPatch::from_json(&text).with_context(|| format!("Failed to parse {}", path))
}

fn route(patch_path: &Utf8Path, settings_path: Option<&Utf8Path>, output: Option<&Utf8Path>) -> Result<()> {
    let mut patch = load_patch(patch_path)?;
    let settings = match settings_path {
        Some(path) => CanvasSettings::load(path).with_context(|| format!("Failed to load settings {}", path))?,
        None => CanvasSettings::default(),
    };

    let mut canvas = Canvas::new(settings);
    let report = canvas.synchronise(&mut patch);
    info!(?report, "loaded {}", patch_path);

    let now = Instant::now();
    let keys: Vec<ConnectionKey> = canvas.scene().connection_keys().to_vec();
    for key in keys {
        canvas
            .find_path(&mut patch, key, now)
            .context("Failed to route connection")?;
    }
    let written = canvas.flush_paths(&mut patch);
    info!(written, "path states written");

    let scene = canvas.scene();
    let routes: Vec<RoutedConnection> = scene
        .connections()
        .filter_map(|(key, c)| {
            let (start, end) = scene.connection_anchors(key)?;
            Some(RoutedConnection {
                handle: c.handle,
                segmented: c.route.is_segmented(),
                points: c.route.polyline(start, end),
                path_state: c.path_state.clone(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&routes)?);

    if let Some(output) = output {
        let json = patch.to_json()?;
        std::fs::write(output, json).with_context(|| format!("Write {}", output))?;
    }
    Ok(())
}

fn inspect(patch_path: &Utf8Path) -> Result<()> {
    let mut patch = load_patch(patch_path)?;
    let mut canvas = Canvas::new(CanvasSettings::default());
    let report = canvas.synchronise(&mut patch);
    let inspection = Inspection {
        objects: canvas.scene().object_count(),
        connections: canvas.scene().connection_count(),
        report,
    };
    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}
