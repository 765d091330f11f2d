//! Command-line driver for the relight engine.
//!
//! `basic` runs the automatic compositor on image files. `interactive` parks a
//! worker on the handoff bridge, serves the callback routes, and writes
//! whatever the editor sends back (or the original image on cancel).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use normal_relight::{codec, relight, Image, RelightParams};
use normal_relight_server::{init_tracing, start_server, AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "relight_tester")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relight with fixed parameters.
    Basic(BasicArgs),
    /// Hand the image to an editor and wait for its answer.
    Interactive(InteractiveArgs),
}

#[derive(Args, Debug)]
struct Paths {
    /// Image to relight.
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Normal map for the image.
    #[arg(long, value_name = "PATH")]
    normals: PathBuf,

    /// Where to write the PNG result.
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct BasicArgs {
    #[command(flatten)]
    io: Paths,

    /// Light position across the image (0 = left).
    #[arg(short, long, default_value = "0.5")]
    x: f32,

    /// Light position down the image (0 = top).
    #[arg(short, long, default_value = "0.5")]
    y: f32,

    /// Light depth (-1 behind, 1 in front).
    #[arg(short, long, default_value = "1.0", allow_hyphen_values = true)]
    z: f32,

    #[arg(long, default_value = "1.0")]
    brightness: f32,

    #[arg(long, default_value = "1.0")]
    shadow_range: f32,

    #[arg(long, default_value = "1.0")]
    shadow_strength: f32,

    #[arg(long, default_value = "1.0")]
    highlight_range: f32,

    #[arg(long, default_value = "1.0")]
    highlight_strength: f32,

    #[arg(long, default_value = "#FFFFFF")]
    highlight_color: String,

    #[arg(long, default_value = "#000000")]
    shadow_color: String,
}

#[derive(Args, Debug)]
struct InteractiveArgs {
    #[command(flatten)]
    io: Paths,

    /// Request id announced to the editor.
    #[arg(long, default_value = "1")]
    id: String,

    /// Address to serve the callback routes on (overrides RELIGHT_BIND).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_tracing(&format!(
        "relight_tester={log_level},normal_relight={log_level},normal_relight_server={log_level}"
    ));

    if let Err(err) = run(cli.command) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Basic(args) => run_basic(&args),
        Command::Interactive(args) => tokio::runtime::Runtime::new()
            .context("Failed to start runtime")?
            .block_on(run_interactive(args)),
    }
}

fn run_basic(args: &BasicArgs) -> Result<()> {
    let (image, normals) = load_inputs(&args.io)?;

    let params = RelightParams {
        x: args.x,
        y: args.y,
        z: args.z,
        brightness: args.brightness,
        shadow_range: args.shadow_range,
        shadow_strength: args.shadow_strength,
        highlight_range: args.highlight_range,
        highlight_strength: args.highlight_strength,
        ..RelightParams::default()
    }
    .clamped()
    .with_hex_colors(&args.highlight_color, &args.shadow_color)
    .context("Invalid colour")?;
    tracing::info!(
        "relighting at ({}, {}, {}), highlight {} shadow {}",
        params.x,
        params.y,
        params.z,
        params.highlight_color.to_hex(),
        params.shadow_color.to_hex(),
    );

    let relit = relight(&image, &normals, &params).context("Failed to relight image")?;
    save_output(&relit, &args.io.output)
}

async fn run_interactive(args: InteractiveArgs) -> Result<()> {
    let (image, normals) = load_inputs(&args.io)?;

    let mut cfg = ServerConfig::from_env();
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }
    let state = AppState::new(cfg.bus_capacity);
    let handle = start_server(state.clone(), &cfg).await?;

    println!(
        "Waiting for an editor on ws://{addr}/ws (request id {id}); \
         POST the result to http://{addr}/relight/update_image or cancel via /relight/cancel",
        addr = handle.local_addr(),
        id = args.id,
    );

    let bridge = state.bridge();
    let id = args.id;
    let mut worker =
        tokio::task::spawn_blocking(move || bridge.interactive_relight(&image, &normals, id));

    let result = tokio::select! {
        result = &mut worker => result.context("Relight worker panicked")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling outstanding request");
            state.registry.cancel_all();
            worker.await.context("Relight worker panicked")?
        }
    };

    handle.shutdown().await?;
    save_output(&result, &args.io.output)
}

fn load_inputs(io: &Paths) -> Result<(Image, Image)> {
    Ok((load_image(&io.image)?, load_image(&io.normals)?))
}

fn load_image(path: &Path) -> Result<Image> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    codec::decode_bytes(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
}

fn save_output(image: &Image, path: &Path) -> Result<()> {
    let png = codec::encode_png(image).context("Failed to encode result")?;
    std::fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}
