use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sbx_core::time::FrameClock;
use sbx_core::units::Units;
use sbx_render::RgbaSurface;
use sbx_runtime::{
    default_project, load_config_from_path, load_input_script_from_path, load_snapshot_from_path,
    save_snapshot_to_path, FrameInput, FrameOutcome, FrameRequest, PlayerConfig, Runtime,
    SnapshotWatcher,
};

/// Poll interval while a faulted run waits for the snapshot to change.
const FAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless player for sprite sandbox projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a project snapshot headlessly.
    Run(RunArgs),
    /// Write a default project snapshot.
    Init {
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
        /// Player config whose units size the default project.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Project snapshot JSON.
    snapshot: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input script JSON with per-frame key presses and releases.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Frame limit; overrides the config.
    #[arg(long)]
    frames: Option<u64>,
    /// Target frame rate, 0 for unpaced; overrides the config.
    #[arg(long)]
    fps: Option<u32>,
    /// Write the final frame to this PNG.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Restart when the snapshot file changes.
    #[arg(long)]
    watch: bool,
}

enum RunStatus {
    Completed,
    Faulted,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(&args),
        Command::Init {
            path,
            force,
            config,
        } => init(&path, force, config.as_deref()).map(|()| RunStatus::Completed),
    };

    match result {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(RunStatus::Faulted) => ExitCode::from(2),
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(path: Option<&Path>, args: Option<&RunArgs>) -> Result<PlayerConfig, String> {
    let mut config = match path {
        Some(path) => load_config_from_path(path).map_err(|e| e.to_string())?,
        None => PlayerConfig::default(),
    };
    if let Some(args) = args {
        if let Some(frames) = args.frames {
            config.max_frames = frames;
        }
        if let Some(fps) = args.fps {
            config.target_fps = fps;
        }
        if args.output.is_some() {
            config.output = args.output.clone();
        }
        config.watch |= args.watch;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init(path: &Path, force: bool, config: Option<&Path>) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        ));
    }
    let config = resolve_config(config, None)?;
    save_snapshot_to_path(&default_project(&config.units), path)?;
    log::info!("Wrote default project to {}", path.display());
    Ok(())
}

/// One started runtime plus its pending frame token.
struct Session {
    runtime: Runtime,
    request: Option<FrameRequest>,
}

impl Session {
    fn launch(path: &Path, units: Units, surface: &mut RgbaSurface) -> Result<Self, String> {
        let snapshot = load_snapshot_from_path(path, &units).map_err(|e| e.to_string())?;
        let mut runtime = Runtime::new(&snapshot, units).map_err(|e| e.to_string())?;
        let request = runtime.start(surface).map_err(|e| e.to_string())?;
        Ok(Self { runtime, request })
    }

    fn apply_input(&mut self, input: &FrameInput) {
        for key in &input.release {
            self.runtime.key_up(key);
        }
        for key in &input.press {
            self.runtime.key_down(key);
        }
    }
}

fn run(args: &RunArgs) -> Result<RunStatus, String> {
    let config = resolve_config(args.config.as_deref(), Some(args))?;
    let inputs = match &args.input {
        Some(path) => load_input_script_from_path(path)?.expanded_inputs(),
        None => Vec::new(),
    };

    let side = config.units.map_pixels;
    let mut surface = RgbaSurface::new(side, side);
    let mut clock = FrameClock::with_target_fps(config.target_fps);
    let mut watcher = config
        .watch
        .then(|| SnapshotWatcher::new(args.snapshot.clone()));
    let mut session = Session::launch(&args.snapshot, config.units, &mut surface)?;

    log::info!(
        "Running {} for up to {} frames ({} fps target)",
        args.snapshot.display(),
        config.max_frames,
        config.target_fps
    );

    let mut frame_index: u64 = 0;
    while frame_index < config.max_frames {
        clock.begin_frame();

        if let Some(watcher) = watcher.as_mut() {
            if watcher.should_reload() {
                log::info!("Snapshot {} changed; restarting", watcher.path().display());
                match Session::launch(&args.snapshot, config.units, &mut surface) {
                    Ok(next) => {
                        session.runtime.stop();
                        session = next;
                    }
                    Err(e) => log::warn!("Reload skipped: {e}"),
                }
            }
        }

        let Some(request) = session.request else {
            if watcher.is_none() {
                break;
            }
            std::thread::sleep(FAULT_POLL_INTERVAL);
            continue;
        };

        if let Some(input) = inputs.get(frame_index as usize) {
            session.apply_input(input);
        }
        session.request = match session.runtime.run_frame(request, &mut surface) {
            FrameOutcome::Rendered => session.runtime.pending_request(),
            FrameOutcome::Faulted | FrameOutcome::Stale => None,
        };
        for sound in session.runtime.take_played_sounds() {
            log::info!("Sound '{}' played ({})", sound.name, sound.url);
        }
        frame_index += 1;

        if let Some(wait) = clock.remaining_budget() {
            std::thread::sleep(wait);
        }
    }

    let faulted = session.runtime.fault().is_some();
    session.runtime.stop();
    log::info!(
        "Run finished after {} frames (state {})",
        session.runtime.frame_count(),
        session.runtime.state()
    );

    if let Some(output) = &config.output {
        surface.save_png(output)?;
    }

    Ok(if faulted {
        RunStatus::Faulted
    } else {
        RunStatus::Completed
    })
}
