use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use tracing_subscriber::EnvFilter;

use cuebox::audio::{
    OutputContext, OutputSettings, OutputTarget, SymphoniaDecoder, list_output_devices,
};
use cuebox::cache::DecodeCache;
use cuebox::config::Config;
use cuebox::console::Console;
use cuebox::export;
use cuebox::fader::MasterFader;
use cuebox::poller::{ProgressPoller, sleep_until_due};
use cuebox::runner::CueRunner;
use cuebox::show::{self, Show};
use cuebox::tone::ToneSpec;
use cuebox::tui;
use cuebox::tui::input::UiAction;

#[derive(Parser, Debug)]
#[command(name = "cuebox", about = "Show-cue player for the terminal")]
struct Args {
    /// Show file (JSON). Without one the built-in tone test show is loaded.
    show: Option<PathBuf>,

    /// Which show to run when the file holds several.
    #[arg(long)]
    show_id: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Output device, matched by case-insensitive substring.
    #[arg(long)]
    device: Option<String>,

    /// Print output device names and exit.
    #[arg(long)]
    list_devices: bool,

    /// Where logs go; the terminal belongs to the UI.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Render a sine tone to a 16-bit WAV file.
    ExportTone {
        #[arg(long)]
        hz: f64,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        gain_db: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pan: f64,
        out: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    if args.list_devices {
        for name in list_output_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(Cmd::ExportTone {
        hz,
        seconds,
        gain_db,
        pan,
        out,
    }) = &args.command
    {
        let spec = ToneSpec::new(*hz, *seconds, *gain_db, *pan)
            .with_context(|| format!("invalid tone frequency {hz}"))?;
        let written = export::write_tone_wav(out, &spec)?;
        println!("{}", written.display());
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    if args.device.is_some() {
        config.device = args.device.clone();
    }

    let shows = match &args.show {
        Some(path) => show::load_shows(path)?,
        None => vec![show::tone_test_show()],
    };
    let warm = show::pick_warm_paths(&shows, config.preload_cap);
    let show = show::choose_show(shows, args.show_id.as_deref())?;
    tracing::info!(show = %show.id, cues = show.cues.len(), pads = show.pads.len(), "show loaded");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run_console(config, show, warm))
}

async fn run_console(config: Config, show: Show, warm: Vec<String>) -> anyhow::Result<()> {
    let output = Rc::new(OutputContext::new(OutputSettings {
        target: OutputTarget::Device {
            name: config.device.clone(),
        },
        max_voices: config.max_voices,
        smoothing_ms: config.master_smoothing_ms,
    }));
    let cache = Rc::new(DecodeCache::new(Arc::new(SymphoniaDecoder)));
    cache.preload_many(&warm, config.preload_cap);

    let runner = CueRunner::new(show, cache, output.clone(), config.default_tone_seconds);
    let poller = ProgressPoller::new(config.poll_interval());
    let fader = MasterFader::new(output.clone(), config.fader_step, config.dim_level);
    let mut console = Console::new(runner, poller, fader);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    execute!(std::io::stdout(), EnableMouseCapture)?;
    let mut term = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    term.clear()?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || tui::input::forward_keys(tx));

    let mut screen = Rect::default();
    loop {
        let ds = console.display_state();
        term.draw(|frame| {
            screen = frame.area();
            tui::view::render(frame, screen, &ds);
        })?;

        // a file GO parks its decode here so input keeps flowing meanwhile
        let deadline = console.deadline();
        let parked = console.has_pending();
        tokio::select! {
            action = rx.recv() => match action {
                None | Some(UiAction::Quit) => break,
                Some(UiAction::Command(cmd)) => console.dispatch(cmd),
                Some(UiAction::Pad(index)) => console.play_pad(index),
                Some(UiAction::Nudge(steps)) => {
                    console.fader().nudge(steps);
                }
                Some(UiAction::ToggleDim) => {
                    console.fader().toggle_dim();
                }
                Some(UiAction::Drag { column, row }) => {
                    if let Some((pos, track)) = tui::view::fader_hit(screen, column, row) {
                        console.fader().drag_to(pos, track);
                    }
                }
                Some(UiAction::Reset) => console.reset(),
            },
            Some(arrival) = console.next_arrival(), if parked => console.land(arrival),
            _ = sleep_until_due(deadline) => console.tick(),
        }
    }

    drop(console);
    output.shutdown();
    term.clear()?;
    Ok(())
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join("cuebox.log"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cuebox=info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(std::io::stdout(), DisableMouseCapture);
        let _ = terminal::disable_raw_mode();
    }
}
