//! Mistake or Not CLI - Binary entry point and terminal session management.
//!
//! # Architecture
//!
//! The CLI bridges [`mistake_engine`] (session state) and [`mistake_tui`]
//! (rendering), providing RAII-based terminal management with guaranteed
//! cleanup.
//!
//! ```text
//! main() -> TerminalSession::new() -> run_app() -> Stage::{Loading, Unavailable, Running}
//! ```
//!
//! # Event Loop
//!
//! A fixed 8ms render cadence:
//!
//! 1. Wait for frame tick
//! 2. Drain input queue (non-blocking via [`mistake_tui::InputPump`])
//! 3. Promote the startup task to a running session once it finishes
//! 4. Advance application state (`app.tick()`)
//! 5. Render frame
//!
//! `mistake manifest <images-dir> [output]` skips the TUI entirely and writes
//! the image manifest.

mod manifest;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::{
    env,
    fs::{self, OpenOptions},
    io::{Stdout, stdout},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mistake_engine::{App, AppError, FileStore, KeyValueStore, MemoryStore, MistakeConfig};
use mistake_tui::{InputPump, Scene, Screen, draw, handle_events};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // If we can't open a log file, prefer "no logs" over corrupting the TUI
    // by writing to stdout/stderr.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.mistake/logs/mistake.log
    if let Some(config_path) = MistakeConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("mistake.log"));
    }

    // Fallback: ./.mistake/logs/mistake.log
    candidates.push(PathBuf::from(".mistake").join("logs").join("mistake.log"));

    candidates
}

/// RAII wrapper for terminal state with guaranteed cleanup on drop.
///
/// Raw mode and the alternate screen are restored on drop, so the terminal
/// stays usable after panics or early returns.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Where the shell is in its lifecycle.
enum Stage {
    Loading(JoinHandle<Result<App, AppError>>),
    Unavailable(String),
    Running(Box<App>),
}

impl Stage {
    fn app_mut(&mut self) -> Option<&mut App> {
        match self {
            Stage::Running(app) => Some(app.as_mut()),
            Stage::Loading(_) | Stage::Unavailable(_) => None,
        }
    }

    fn screen(&self) -> Screen {
        match self {
            Stage::Loading(_) => Screen::Loading,
            Stage::Unavailable(reason) => Screen::Unavailable(reason.clone()),
            Stage::Running(app) => Screen::Session(Box::new(Scene::from_app(app.as_ref()))),
        }
    }

    /// Swap a finished startup task for its result.
    async fn promote(&mut self) {
        let Stage::Loading(handle) = self else {
            return;
        };
        if !handle.is_finished() {
            return;
        }
        let next = match handle.await {
            Ok(Ok(app)) => Stage::Running(Box::new(app)),
            Ok(Err(e)) => {
                tracing::warn!("Session unavailable: {e}");
                Stage::Unavailable(format!("No images to show: {e}"))
            }
            Err(e) => {
                tracing::warn!("Startup task failed: {e}");
                Stage::Unavailable("Failed to start the session".to_string())
            }
        };
        *self = next;
    }

    fn shutdown(&mut self) {
        match self {
            Stage::Loading(handle) => handle.abort(),
            Stage::Running(app) => app.shutdown(),
            Stage::Unavailable(_) => {}
        }
    }
}

fn open_store() -> Box<dyn KeyValueStore> {
    match FileStore::default_path() {
        Some(path) => Box::new(FileStore::open(path)),
        None => {
            tracing::warn!("No home directory; the starting image will not be remembered");
            Box::new(MemoryStore::new())
        }
    }
}

fn start_session(config: MistakeConfig) -> JoinHandle<Result<App, AppError>> {
    tokio::spawn(async move {
        let mut store = open_store();
        App::from_config(&config, store.as_mut()).await
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("manifest") {
        return manifest::run(&args[1..]);
    }

    let config = match MistakeConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Using default configuration: {e}");
            MistakeConfig::default()
        }
    };

    let mut stage = Stage::Loading(start_session(config));
    let result = {
        let mut session = TerminalSession::new()?;
        run_app(&mut session.terminal, &mut stage).await
    };
    stage.shutdown();
    result
}

const FRAME_DURATION: Duration = Duration::from_millis(8);

async fn run_app<B>(terminal: &mut Terminal<B>, stage: &mut Stage) -> Result<()>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    let mut input = InputPump::new();
    let mut frames = tokio::time::interval(FRAME_DURATION);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result: Result<()> = loop {
        frames.tick().await;

        // Non-blocking input (drain queue only)
        match handle_events(stage.app_mut(), &mut input) {
            Ok(true) => break Ok(()),
            Ok(false) => {}
            Err(e) => break Err(e),
        }

        stage.promote().await;
        if let Some(app) = stage.app_mut() {
            app.tick();
        }

        let screen = stage.screen();
        if let Err(e) = terminal.draw(|frame| draw(frame, &screen)) {
            break Err(e.into());
        }
    };

    input.shutdown().await;
    result
}
