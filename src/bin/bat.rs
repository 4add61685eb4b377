use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bat", version)]
struct Cli {
    /// Log at DEBUG level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the remote command server against a demo in-memory scene.
    Serve(ServeArgs),
    /// Import a calibration file and print the resulting camera intrinsics.
    Calibration(CalibrationArgs),
    /// Write the inverse lens distortion map of a camera as OpenEXR.
    DistortionMap(DistortionMapArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,

    /// Milliseconds between host ticks.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Stop after this many ticks (runs forever when omitted).
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Directory the demo scene reports renders in; annotations go to a sibling directory.
    #[arg(long, default_value = "render")]
    render_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct CalibrationArgs {
    /// Calibration JSON with `cam_mtx` and/or `dist`.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct DistortionMapArgs {
    /// Render width in pixels.
    #[arg(long)]
    width: u32,

    /// Render height in pixels.
    #[arg(long)]
    height: u32,

    /// Camera intrinsics JSON (missing fields take defaults).
    #[arg(long)]
    camera: PathBuf,

    /// Output EXR path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Serve(args) => cmd_serve(args),
        Command::Calibration(args) => cmd_calibration(args),
        Command::DistortionMap(args) => cmd_distortion_map(args),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => bat::BatConfig::from_path(path)?,
        None => bat::BatConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let mut scene = demo_scene()?;
    scene.set_output_dir(&args.render_dir);
    let annotation_dir = args
        .render_dir
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join(&config.output.annotation_dir);

    let sink = bat::ImageDirSink::new(annotation_dir);
    tracing::info!(dir = %sink.dir().display(), "writing annotations");
    let mut session = bat::AnnotationSession::new(&config, Box::new(sink));
    let cube = session
        .registry_mut()
        .add_class("Cube", bat::Rgb::new(1.0, 0.5, 0.0)?)?;
    session.registry_mut().update_class(
        cube,
        bat::ClassUpdate {
            instance_segmentation: Some(true),
            collection: Some(Some("Cubes".to_string())),
            ..bat::ClassUpdate::default()
        },
    )?;

    let mut server = bat::RemoteServer::start(
        &config.server,
        session.queue().clone(),
        Arc::new(scene.query()),
    )?;
    eprintln!("listening on http://{}", server.local_addr());

    let mut ticks = 0u64;
    loop {
        let report = session.tick(&mut scene);
        if !report.is_empty() {
            tracing::info!(
                commands = report.len(),
                failures = report.failure_count(),
                frame = bat::SceneHost::current_frame(&scene),
                "tick"
            );
        }
        ticks += 1;
        if args.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        std::thread::sleep(Duration::from_millis(args.tick_ms));
    }
    server.stop();
    Ok(())
}

fn demo_scene() -> anyhow::Result<bat::MemoryScene> {
    let mut scene = bat::MemoryScene::new(bat::Resolution::new(320, 240)?);
    for (i, name) in ["Cube", "Cube.001"].into_iter().enumerate() {
        let offset = i as u32 * 120;
        let handle = scene.add_object(
            name,
            bat::Pose {
                location: [f64::from(offset) / 100.0, 0.0, 5.0],
                rotation: [0.0; 3],
            },
        )?;
        scene.set_footprint(
            handle,
            bat::Footprint {
                x: 40 + offset,
                y: 60,
                width: 100,
                height: 100,
            },
        )?;
        scene.link("Cubes", handle)?;
    }
    Ok(scene)
}

fn cmd_calibration(args: CalibrationArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read calibration '{}'", args.in_path.display()))?;
    let mut camera = bat::CameraIntrinsics::default();
    camera.apply_calibration_json(&text)?;
    println!("{}", serde_json::to_string_pretty(&camera)?);
    Ok(())
}

fn cmd_distortion_map(args: DistortionMapArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.camera)
        .with_context(|| format!("read camera '{}'", args.camera.display()))?;
    let camera: bat::CameraIntrinsics =
        serde_json::from_str(&text).context("parse camera intrinsics")?;
    let resolution = bat::Resolution::new(args.width, args.height)?;

    let map = bat::InverseDistortionMap::generate(resolution, &camera)?;
    let coverage = map.coverage();
    let buffer = map.into_channel()?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    bat::write_float_layer(&args.out, &buffer)?;
    eprintln!(
        "wrote {} ({:.1}% direct hits)",
        args.out.display(),
        coverage * 100.0
    );
    Ok(())
}
