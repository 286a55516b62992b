//! # furrymatch-watch
//!
//! Headless session watcher. Resolves the active pet against the REST
//! backend, prints its match and contract rosters, then keeps the unread
//! indicator fresh and logs every transition until Ctrl+C.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use furrymatch_client::polling::on_chat_read;
use furrymatch_client::state::{shared, Account};
use furrymatch_client::{
    init_tracing, Backend, ClientConfig, IdentityResolver, NotificationIndicator, Poller,
    RestBackend, RosterBuilder, SessionBus, SessionEvent, SessionState, UnreadTracker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting FurryMatch watcher v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(
        api_url = %config.api_url,
        poll_secs = config.poll_interval.as_secs(),
        token = config.api_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 2. Backend and session
    // -----------------------------------------------------------------------
    let backend: Arc<dyn Backend> =
        Arc::new(RestBackend::new(&config).context("building REST backend")?);
    let session = shared(SessionState::new());
    let bus = SessionBus::new(config.event_capacity);
    let identity = Arc::new(IdentityResolver::new(backend.clone(), session.clone()));

    let Some(current) = identity.resolve().await else {
        warn!("No active pet for this account, nothing to watch");
        return Ok(());
    };
    let owner = backend
        .find_pet(current)
        .await
        .context("loading active pet")?
        .and_then(|p| p.owner_id())
        .context("active pet has no owner")?;
    if let Ok(mut state) = session.lock() {
        state.account = Some(Account {
            id: owner,
            login: format!("owner-{owner}"),
        });
    }

    // -----------------------------------------------------------------------
    // 3. Rosters
    // -----------------------------------------------------------------------
    let roster = RosterBuilder::new(backend.clone(), identity.clone());
    match roster.load_match_roster().await {
        Ok(entries) => {
            for entry in &entries {
                let name = entry
                    .pet
                    .as_ref()
                    .and_then(|p| p.name.as_deref())
                    .unwrap_or("?");
                info!(match_id = %entry.match_id, pet_id = %entry.pet_id, name, "Match");
            }
        }
        Err(e) => warn!(error = %e, "Could not load match roster"),
    }
    match roster.build_contract_roster().await {
        Ok(contracts) => {
            for entry in &contracts.entries {
                info!(
                    match_id = %entry.match_id,
                    pet = entry.pet.name.as_deref().unwrap_or("?"),
                    status = ?entry.status,
                    action = ?entry.status.affordance(),
                    "Contract"
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not load contract roster"),
    }

    // -----------------------------------------------------------------------
    // 4. Poll unread state until shutdown
    // -----------------------------------------------------------------------
    let tracker = Arc::new(UnreadTracker::new(backend.clone(), session.clone(), bus.clone()));
    let mut events = bus.subscribe();
    let _poller = Poller::spawn_triggered(
        "unread",
        config.poll_interval,
        tracker.clone(),
        &bus,
        on_chat_read,
    );

    let mut indicator = NotificationIndicator::Idle;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::UnreadChanged { match_ids }) => {
                    let next = NotificationIndicator::resolve(false, match_ids.len());
                    if next != indicator {
                        info!(from = ?indicator, to = ?next, unread = ?match_ids, "Indicator changed");
                        indicator = next;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Watcher lagged behind session events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}
