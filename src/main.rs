//! Staff calendar CLI - list staff events and answer invitations
//!
//! Events are served from the local cache when fresh and revalidated against
//! the HR backend before the process exits.

use std::error::Error;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staffcal::cache::{KeyValueStore, LoadOptions, Loaded, MemoryStore, Origin, RevalidatingCache};
use staffcal::cli::{consecutive_windows, format_events, Cli, Command};
use staffcal::config::Config;
use staffcal::data::{EventWindow, EventsClient};
use staffcal::refresh::{RefreshHandle, RefreshMessage};

type Calendar = RevalidatingCache<EventsClient, Box<dyn KeyValueStore>>;

/// Sets up logging to stderr so stdout only carries listings
///
/// Defaults to "staffcal=info"; override with RUST_LOG.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staffcal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_calendar(config: &Config) -> Calendar {
    let store: Box<dyn KeyValueStore> = match config.file_store() {
        Some(store) => {
            debug!(dir = %store.dir().display(), "Using on-disk cache");
            Box::new(store)
        }
        None => {
            warn!("No cache directory available, caching in memory only");
            Box::new(MemoryStore::new())
        }
    };
    let client = EventsClient::new(config.api_url.clone());
    RevalidatingCache::new(client, store, config.cache_config())
}

/// Prints a loaded window and reports where it came from
fn print_loaded(window: &EventWindow, loaded: &Loaded) {
    print!("{}", format_events(&loaded.events, window));
    if loaded.origin == Origin::Cache {
        debug!(%window, "Served from cache, revalidating");
    }
}

/// Waits for background revalidations, then reprints windows that changed
async fn settle_and_rerender(
    mut pending: Vec<(EventWindow, Loaded)>,
    handle: &mut RefreshHandle,
) {
    for (_, loaded) in pending.iter_mut() {
        loaded.settle().await;
    }

    while let Some(message) = handle.try_recv() {
        match message {
            RefreshMessage::WindowRevalidated { window, events } => {
                let shown = pending
                    .iter()
                    .find(|(w, _)| *w == window)
                    .map(|(_, loaded)| &loaded.events);
                if shown != Some(&events) {
                    println!("\nUpdated:");
                    print!("{}", format_events(&events, &window));
                }
            }
            RefreshMessage::RevalidationFailed { window, error } => {
                debug!(%window, %error, "Revalidation failed, cached view kept");
            }
            // Foreground loads already finished before anything was printed
            RefreshMessage::LoadingStarted(_) | RefreshMessage::LoadingFinished(_) => {}
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Events {
            window,
            refresh,
            months,
        } => {
            // Validate arguments before touching the network
            let first = window.resolve(today)?;
            let windows = consecutive_windows(first, months)?;

            let calendar = build_calendar(&config);
            let mut handle = calendar.subscribe();

            if refresh {
                for window in &windows {
                    let events = calendar.refresh(window).await?;
                    print!("{}", format_events(&events, window));
                }
                return Ok(());
            }

            let results = calendar.load_all(&windows, LoadOptions::default()).await;
            let mut pending = Vec::with_capacity(windows.len());
            for (window, result) in windows.into_iter().zip(results) {
                let loaded = result?;
                print_loaded(&window, &loaded);
                pending.push((window, loaded));
            }
            settle_and_rerender(pending, &mut handle).await;
        }
        Command::Respond {
            event_id,
            status,
            window,
        } => {
            let window = window.resolve(today)?;

            let calendar = build_calendar(&config);
            let mut handle = calendar.subscribe();

            let loaded = calendar.respond_and_reload(&window, event_id, status).await?;
            println!("Event #{} {}", event_id, status);
            print_loaded(&window, &loaded);
            settle_and_rerender(vec![(window, loaded)], &mut handle).await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
