mod bootstrap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use board_core::notifications::{NoticeLog, DEFAULT_NOTICE_CAPACITY};
use board_core::settings::Settings;
use board_data::api::RestClient;
use board_data::events::EventHub;
use board_data::feed;
use board_runtime::{Board, BoardConfig, Navigation};
use board_ui::app::{self, App};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    let log_path = bootstrap::setup_logging(&settings.log_level, settings.debug, settings.log_file.as_ref())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "machine board starting");

    let department_id = settings.department_id()?;
    let events_url = settings.resolved_events_url();
    tracing::info!(
        department = %department_id,
        api = %settings.api_url,
        events = %events_url,
        theme = %settings.theme,
        "configuration resolved"
    );

    let api = RestClient::new(&settings.api_url, Duration::from_secs(settings.request_timeout_secs))
        .context("building API client")?;
    let notices = Arc::new(NoticeLog::new(DEFAULT_NOTICE_CAPACITY));

    let mut board = Board::new(department_id, Arc::new(api), notices.clone(), BoardConfig::default());

    // A failed load leaves the board in its failed state, which the view shows.
    if let Err(e) = board.load_snapshot().await {
        tracing::error!(error = %e, "initial load failed");
    }

    let hub = Arc::new(EventHub::new());
    let feed = match feed::connect(&events_url, hub.clone()).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "push feed unavailable; board will not update live");
            None
        }
    };

    if let Err(e) = board.activate(hub) {
        tracing::warn!(error = %e, "push subscription incomplete");
    }

    let app = App::new(&settings.theme, notices);

    // The view handles q / Ctrl+C itself; the OS signal covers anything
    // delivered outside raw mode.
    let outcome = tokio::select! {
        result = app.run(&mut board) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; shutting down");
            app::restore_terminal()?;
            Ok(None)
        }
    };

    board.deactivate();
    if let Some(handle) = &feed {
        handle.abort();
    }

    match outcome? {
        Some(Navigation::MachineDetail(id)) => {
            tracing::info!(machine_id = %id, "navigating to machine detail");
            println!("open machine {id}");
        }
        Some(Navigation::DepartmentList) => {
            tracing::info!("navigating to department list");
            println!("open department list");
        }
        None => tracing::info!("board closed"),
    }

    Ok(())
}
