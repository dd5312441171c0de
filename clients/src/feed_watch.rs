use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use lib_feedpulse::ingestors::SseConnector;
use lib_feedpulse::retrieve::HttpSessionApi;
use lib_feedpulse::storage::FileUserStore;
use lib_feedpulse::{Credential, EventRouter, SessionContext, SessionPorts, StreamManager};
use mockable::DefaultClock;

mod watch_logic;
use watch_logic::{bridge, config, console_router, consumers, logger, presentation};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;
    log::debug!("Effective configuration: {:?}", config);

    let session_settings = config.session_settings();
    let stream_settings = config.stream_settings();
    let token = Credential::from(config.token.clone().unwrap_or_default());
    let shutdown = CancellationToken::new();

    // --- Ports ---
    let store = Arc::new(FileUserStore::new(config.user_file()));
    let api = Arc::new(HttpSessionApi::new(&stream_settings, Some(&token))?);
    let connector = Arc::new(SseConnector::new(&stream_settings)?);
    let (route_tx, route_rx) = futures_channel::mpsc::unbounded();
    let navigator = Arc::new(console_router::ConsoleNavigator::new(route_tx));

    // --- Push pipeline ---
    let manager = Arc::new(StreamManager::new(connector));
    let router = EventRouter::from_manager(&manager);
    let (credential_tx, credential_rx) = futures_channel::mpsc::unbounded();

    // --- Session pipeline ---
    let context = Arc::new(SessionContext::new(
        SessionPorts {
            api,
            store: store.clone(),
            navigator: navigator.clone(),
            presentation: Arc::new(presentation::LogPresentation),
            clock: Arc::new(DefaultClock),
        },
        &session_settings,
    ));
    let _bridge = context
        .validator()
        .subscribe(Arc::new(bridge::CredentialBridge::new(token, credential_tx.clone())));

    log::info!("feed_watch starting against {}", stream_settings.base_url);
    navigator.open(&config.start_path());

    let stream_handle = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run(credential_rx).await }
    });
    let feed_handle = tokio::spawn(consumers::log_feed_updates(router.clone(), shutdown.clone()));
    let article_handle = tokio::spawn(consumers::log_article_states(router, shutdown.clone()));
    let poller_handle = store.spawn_poller(config.storage_poll(), shutdown.clone());
    let session_handle = tokio::spawn({
        let context = context.clone();
        let shutdown = shutdown.clone();
        async move { context.run(route_rx, shutdown).await }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = wait_for_terminate() => {
            log::info!("SIGTERM received, initiating shutdown.");
        }
    }

    // Close the push connection, then stop every loop
    let _ = credential_tx.unbounded_send(Credential::none());
    credential_tx.close_channel();
    shutdown.cancel();

    let _ = tokio::try_join!(stream_handle, feed_handle, article_handle, poller_handle, session_handle);

    log::info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut term_signal) => {
            term_signal.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
}
