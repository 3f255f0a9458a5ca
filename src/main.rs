use rundash::app::{self, App, Effect};
use rundash::cache::{SessionCache, SharedCache};
use rundash::cli::Cli;
use rundash::config::AppConfig;
use rundash::context::NavigationContext;
use rundash::coordinator::Coordinator;
use rundash::events::{AppEvent, EventHandler};
use rundash::http::HttpProvider;
use rundash::poller::{self, Poller};
use rundash::provider::RunsProvider;
use rundash::tui;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

fn setup_verbose_logging(config: &AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.state_dir)
        .map_err(|e| eyre!("Failed to create log directory {:?}: {e}", config.state_dir))?;
    let log_path = config.log_path();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!("{} starting with verbose logging", config.version_string);
    Ok(())
}

fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => s.to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

fn effect_label(effect: &Effect) -> &'static str {
    match effect {
        Effect::LoadOverview { .. } => "overview load",
        Effect::LoadRuns { .. } => "runs load",
        Effect::LoadUserInfo => "user info load",
        Effect::SubmitRun { .. } => "run submit",
        Effect::ChordTimeout { .. } => "chord timer",
        Effect::ClearMessage { .. } => "message timer",
        Effect::Persist | Effect::Quit => "inline",
    }
}

fn persist(cache: &SharedCache, path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    if let Err(e) = cache.persist(path) {
        tracing::warn!("cache not saved: {e}");
    }
}

fn dispatch(
    effects: Vec<Effect>,
    coordinator: &Arc<Coordinator>,
    config: &AppConfig,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    for effect in effects {
        match effect {
            Effect::Persist => persist(coordinator.cache(), config.cache_path()),
            Effect::Quit => {}
            effect => {
                let label = effect_label(&effect);
                let coordinator = Arc::clone(coordinator);
                let result_tx = tx.clone();
                spawn_monitored(tx.clone(), label, async move {
                    if let Some(event) = app::perform(&coordinator, effect).await {
                        // Receiver gone means the UI is shutting down.
                        let _ = result_tx.send(event);
                    }
                });
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let config = AppConfig::from_cli(&args)?;

    if config.verbose {
        setup_verbose_logging(&config)?;
    }
    if let Some(notice) = config.auth_notice() {
        tracing::info!("{notice}");
    }

    let cache: SharedCache = match config.cache_path() {
        Some(path) => Arc::new(SessionCache::load(path)),
        None => SessionCache::shared(),
    };
    let provider: Arc<dyn RunsProvider> = Arc::new(HttpProvider::new(
        &config.base_url,
        config.token.clone(),
        config.request_timeout,
    )?);
    let coordinator = Arc::new(Coordinator::new(
        provider,
        Arc::clone(&cache),
        config.retry,
        config.coordinator,
    ));

    // Panic hook before raw mode so a crash never leaves the terminal broken
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetTitle("rundash"))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(NavigationContext::new(cache), config.repository.clone());
    app.version_string.clone_from(&config.version_string);
    let size = terminal.size()?;
    app.handle_event(AppEvent::Resize(size.width, size.height), Instant::now());

    let events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();

    let (interval_tx, interval_rx) = watch::channel(config.idle_interval);
    let poller = Poller::new(Arc::clone(&coordinator), tx.clone(), interval_rx);
    spawn_monitored(tx.clone(), "poller", poller.run());

    let result = run_app(&mut terminal, &mut app, events, &coordinator, &config, &interval_tx).await;

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut events: EventHandler,
    coordinator: &Arc<Coordinator>,
    config: &AppConfig,
    interval_tx: &watch::Sender<u64>,
) -> Result<()> {
    let tx = events.sender();
    dispatch(app.start(), coordinator, config, &tx);

    loop {
        terminal.draw(|f| tui::render::render(f, app))?;

        let Some(event) = events.next().await else {
            tracing::warn!("event channel closed");
            break;
        };
        let is_tick = matches!(event, AppEvent::Tick);
        let effects = app.handle_event(event, Instant::now());
        dispatch(effects, coordinator, config, &tx);

        if is_tick {
            let interval =
                poller::poll_interval(app.dashboard().has_active_runs(), config.idle_interval);
            if *interval_tx.borrow() != interval {
                tracing::debug!("poll interval now {interval}s");
                let _ = interval_tx.send(interval);
            }
        }

        if app.should_quit {
            break;
        }
    }

    events.stop();
    Ok(())
}
