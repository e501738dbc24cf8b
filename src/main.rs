mod ambient;
mod animation;
mod app;
mod assets;
mod capture;
mod config;
mod error;
mod event;
mod gamepad;
mod reel;
mod sequence;
mod stage;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::ambient::AmbientArrows;
use crate::app::App;
use crate::assets::AssetStore;
use crate::capture::{CaptureSession, HttpCaptureClient};
use crate::config::{CliArgs, Config};
use crate::error::BoothError;
use crate::event::EventHandler;
use crate::gamepad::GamepadListener;
use crate::sequence::{Choreographer, TravelingEffects};
use crate::stage::{OverlayController, StageSize};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print!("{}", config::default_config_toml());
        return Ok(());
    }

    // Initialize color-eyre with custom panic hook that restores terminal
    install_panic_hook();

    let config = config::load(&cli)?;

    // The guard flushes the log writer on drop; keep it for the whole run
    let _log_guard = init_logging(cli.log.as_deref(), &config.general.log_level);

    info!(
        server = %config.server.base_url,
        mode = ?config.capture.mode,
        "snapbooth starting"
    );

    // Setup terminal
    enable_raw_mode()
        .map_err(|e| BoothError::Terminal(format!("Failed to enable raw mode: {}", e)))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // One terminal cell holds two stage dots
    let size = terminal.size()?;
    let overlay = Arc::new(OverlayController::new(StageSize::new(
        size.width as f32,
        size.height as f32 * 2.0,
    )));

    let mut event_handler = EventHandler::new(config.tick_rate());
    let event_tx = event_handler.sender();

    let assets = Arc::new(AssetStore::from_config(&config));
    let effects = Arc::new(TravelingEffects::new(
        overlay.clone(),
        config.arrows.clone(),
        StdRng::from_entropy(),
    ));
    let choreographer = Arc::new(Choreographer::new(
        overlay.clone(),
        effects,
        assets.clone(),
        &config,
        StdRng::from_entropy(),
        event_tx.clone(),
    ));

    let client = Arc::new(HttpCaptureClient::new(
        &config.server.base_url,
        config.server_timeout(),
    )?);
    let session = CaptureSession::new(client, choreographer, config.capture.mode, event_tx.clone());

    // Idle arrows are decoration; the booth still works without them
    let ambient = match assets.load_ambient_sheet().await {
        Ok(sheet) => match AmbientArrows::new(overlay.clone(), sheet, &config.ambient, &config.arrows) {
            Ok(ambient) => Some(ambient),
            Err(e) => {
                warn!("Ambient arrows disabled: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Ambient arrows disabled: {}", e);
            None
        }
    };

    let gamepads = GamepadListener::spawn(
        config.capture.gamepad_devices.clone(),
        config.gamepad_cooldown(),
        event_tx.clone(),
    );

    let mut app = App::new(overlay, session, ambient, &config);

    // ── Main event loop ───────────────────────────────────────────────
    let result = run(&mut terminal, &mut event_handler, &mut app).await;

    gamepads.shutdown();
    event_handler.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("snapbooth exiting");
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    events: &mut EventHandler,
    app: &mut App<HttpCaptureClient>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        match events.next().await {
            Some(event) => app.handle_event(event),
            None => return Ok(()),
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Install a panic hook that restores the terminal before printing the panic
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call default handler
        default_hook(panic_info);
    }));
    color_eyre::install().ok();
}

/// Initialize tracing to a log file. stdout belongs to the TUI, so logs
/// always go to disk: the `--log` path, or `snapbooth.log` in the data
/// directory.
fn init_logging(log_path: Option<&Path>, level: &str) -> WorkerGuard {
    use tracing_subscriber::EnvFilter;

    let (dir, file) = match log_path {
        Some(path) => (
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            path.file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "snapbooth.log".into()),
        ),
        None => (Config::log_dir(), "snapbooth.log".into()),
    };

    let appender = tracing_appender::rolling::never(dir, file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    guard
}
