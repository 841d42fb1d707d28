use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde_json::json;

use glyphfield::error_codes::{envelope_for, find_coded_error, CodedErrorKind};
use glyphfield::export::{
    frame_ansi, frame_text, run_export, ExportArgs, DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH,
};
use glyphfield::render::{FrameLimiter, RenderState};
use glyphfield::scene::load_and_validate_scene;

const DEFAULT_PLAY_SECONDS: u32 = 5;

#[derive(Debug, Parser)]
#[command(name = "glyphfield")]
#[command(about = "Procedural ASCII pattern fields")]
#[command(version = env!("GLYPHFIELD_VERSION"))]
struct Cli {
    /// Print failures as a JSON error envelope on stdout.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a scene file.
    Check { scene: PathBuf },
    /// Print one frame as plain text.
    Frame {
        scene: PathBuf,
        #[command(flatten)]
        at: FrameSelector,
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Write a frame or frame sequence to .txt, .png, .jpg or .gif.
    Export {
        scene: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[command(flatten)]
        at: FrameSelector,
        #[arg(long, default_value_t = 1)]
        frames: u32,
        #[arg(long)]
        font: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_CELL_WIDTH)]
        cell_width: u32,
        #[arg(long, default_value_t = DEFAULT_CELL_HEIGHT)]
        cell_height: u32,
        #[arg(long)]
        sidecar: bool,
    },
    /// Animate the scene in the terminal.
    Play {
        scene: PathBuf,
        #[arg(long)]
        frames: Option<u32>,
        /// Pointer position in normalized grid space, e.g. `0.5,0.5`.
        #[arg(long)]
        pointer: Option<PointArg>,
        /// Scripted click, e.g. `0.25,0.75@30`. Repeatable.
        #[arg(long = "click")]
        clicks: Vec<ScriptedClick>,
    },
}

#[derive(Debug, Args)]
struct FrameSelector {
    /// Frame index; the scene is advanced this many ticks.
    #[arg(long, conflicts_with = "time")]
    frame: Option<u32>,
    /// Pattern time to sample directly.
    #[arg(long)]
    time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointArg {
    x: f64,
    y: f64,
}

impl FromStr for PointArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (x, y) = value
            .split_once(',')
            .ok_or_else(|| format!("expected x,y, got '{value}'"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|error| format!("invalid coordinate '{part}': {error}"))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScriptedClick {
    point: PointArg,
    frame: u32,
}

impl FromStr for ScriptedClick {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (point, frame) = value
            .split_once('@')
            .ok_or_else(|| format!("expected x,y@frame, got '{value}'"))?;
        Ok(Self {
            point: point.parse()?,
            frame: frame
                .trim()
                .parse()
                .map_err(|error| format!("invalid frame '{frame}': {error}"))?,
        })
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let json_errors = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if json_errors {
                let envelope = envelope_for(&error);
                match serde_json::to_string_pretty(&envelope) {
                    Ok(text) => println!("{text}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            match find_coded_error(&error).map(|coded| coded.kind) {
                Some(CodedErrorKind::Usage) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { scene } => run_check(&scene, cli.json),
        Commands::Frame { scene, at, output } => run_frame(&scene, &at, output.as_deref()),
        Commands::Export {
            scene,
            output,
            at,
            frames,
            font,
            cell_width,
            cell_height,
            sidecar,
        } => {
            if cell_width == 0 || cell_height == 0 {
                bail!("--cell-width and --cell-height must be >= 1");
            }
            let mut state = RenderState::new(load_and_validate_scene(&scene)?);
            seek(&mut state, &at);
            let summary = run_export(
                &mut state,
                &ExportArgs {
                    output: &output,
                    frames: frames.max(1),
                    font: font.as_deref(),
                    cell_width,
                    cell_height,
                    sidecar,
                },
            )?;
            println!(
                "Wrote {} ({} frame(s), sequence hash 0x{:016x})",
                output.display(),
                summary.frame_hashes.len(),
                summary.sequence_hash
            );
            if let Some(path) = summary.sidecar_path {
                println!("Wrote sidecar {}", path.display());
            }
            Ok(())
        }
        Commands::Play {
            scene,
            frames,
            pointer,
            clicks,
        } => run_play(&scene, frames, pointer, &clicks),
    }
}

fn run_check(scene_path: &Path, json_output: bool) -> Result<()> {
    let scene = load_and_validate_scene(scene_path)?;
    if json_output {
        let report = json!({
            "ok": true,
            "scene": scene_path.display().to_string(),
            "grid": { "cols": scene.grid.cols(), "rows": scene.grid.rows() },
            "fps": scene.timing.fps,
            "primary": scene.primary.kind.as_str(),
            "secondary": scene.secondary.active().map(|pattern| pattern.kind.as_str()),
            "interactive": scene.interactive.enabled,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "OK: {} ({}x{}, {} fps, primary {})",
            scene_path.display(),
            scene.grid.cols(),
            scene.grid.rows(),
            scene.timing.fps,
            scene.primary.kind.as_str()
        );
        if let Some(secondary) = scene.secondary.active() {
            println!(
                "Secondary: {} ({:?}, amount {})",
                secondary.kind.as_str(),
                scene.blend.mode,
                scene.blend.amount
            );
        }
    }
    Ok(())
}

/// Moves the state to the selected frame or pattern time.
fn seek(state: &mut RenderState, at: &FrameSelector) {
    if let Some(frame) = at.frame {
        let frame_delta = state.scene().timing.frame_delta;
        for _ in 0..frame {
            state.advance(frame_delta);
        }
    }
    if let Some(time) = at.time {
        state.set_time(time);
    }
}

fn run_frame(scene_path: &Path, at: &FrameSelector, output: Option<&Path>) -> Result<()> {
    let mut state = RenderState::new(load_and_validate_scene(scene_path)?);
    seek(&mut state, at);
    let text = frame_text(&state.render());
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote frame to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Frames in the default play length at `fps`.
fn default_play_frames(fps: u32) -> Result<u32> {
    fps.checked_mul(DEFAULT_PLAY_SECONDS).with_context(|| {
        format!("timing.fps {fps} is too high for a {DEFAULT_PLAY_SECONDS}s default; pass --frames")
    })
}

fn run_play(
    scene_path: &Path,
    frames: Option<u32>,
    pointer: Option<PointArg>,
    clicks: &[ScriptedClick],
) -> Result<()> {
    let scene = load_and_validate_scene(scene_path)?;
    let total = match frames {
        Some(frames) => frames,
        None => default_play_frames(scene.timing.fps)?,
    };
    let frame_delta = scene.timing.frame_delta;
    let mut limiter = FrameLimiter::new(scene.timing.fps);
    if (pointer.is_some() || !clicks.is_empty()) && !scene.interactive.enabled {
        warn!("scene has interactive.enabled = false; pointer input is ignored");
    }

    let mut state = RenderState::new(scene);
    if let Some(point) = pointer {
        state.pointer_move(point.x, point.y);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write!(out, "\x1b[2J")?;

    for index in 0..total {
        for click in clicks.iter().filter(|click| click.frame == index) {
            state.pointer_down(click.point.x, click.point.y);
        }
        let frame = if index == 0 {
            state.render()
        } else {
            state.tick(frame_delta).unwrap_or_else(|| state.render())
        };

        loop {
            let now = Instant::now();
            if limiter.ready(now) {
                break;
            }
            std::thread::sleep(limiter.remaining(now));
        }

        write!(out, "\x1b[H{}", frame_ansi(&frame))?;
        out.flush()?;
    }
    writeln!(out, "\x1b[0m")?;
    info!(
        "played {total} frames, {} skipped by limiter",
        limiter.skipped()
    );
    Ok(())
}
