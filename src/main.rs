use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use release_finder::app::App;
use release_finder::config::Config;
use release_finder::events;
use release_finder::persist::FileStore;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "release-finder", version, about)]
struct Cli {
    /// Config file to use instead of the default search path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Redirect location carrying `?code=`, as pasted from the browser
    #[arg(long)]
    callback_url: Option<String>,

    /// Forget the saved session and search state before starting
    #[arg(long)]
    reset: bool,

    /// Write logs to this file instead of the daily rolling log
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(data_dir: &Path, log_file: Option<&Path>) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "release-finder.log".into());
            std::fs::create_dir_all(dir).ok();
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
        None => {
            let logs_dir = data_dir.join("logs");
            std::fs::create_dir_all(&logs_dir).ok();
            tracing_appender::non_blocking(tracing_appender::rolling::daily(&logs_dir, "release-finder.log"))
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,release_finder=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(cli.config.as_deref());
    let data_dir = config.data_dir().unwrap_or_else(|| PathBuf::from(".release-finder"));

    // Guard must live for the whole run
    let _log_guard = init_logging(&data_dir, cli.log_file.as_deref());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), data_dir = %data_dir.display(), "release-finder starting");

    let mut app = App::new(config, Box::new(FileStore::new(&data_dir)))?;
    if cli.reset {
        app.reset().context("Failed to reset saved state")?;
    } else if app.restore() {
        tracing::debug!("restored previous state");
    }
    app.start(cli.callback_url.as_deref());

    // Setup panic hook for clean terminal restore
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = events::run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "release-finder exited with an error");
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }

    tracing::info!("release-finder exiting");
    Ok(())
}
