//! SmartStore offline smoke harness.
//!
//! Drives the full offline lifecycle against a scripted network: install
//! and activate a first deployment, browse it offline, roll out an update
//! through the prompt flow, then exercise push delivery and the install
//! prompt. Exits non-zero on the first property that does not hold.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use smartstore_common::{init_logging, LogConfig, OfflineConfig};
use smartstore_shell::{
    DeferredPrompt, InstallOutcome, InstallPromptCoordinator, MemoryDismissalStore, UpdateAction,
    UpdateCoordinator,
};
use smartstore_sw::{
    CacheVersion, Destination, FetchRequest, NotificationCenter, PushManager, Registration,
    ServedFrom, StaticNetwork, SwEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use url::Url;

const ORIGIN: &str = "https://smartstore.example";

fn scripted_network(config: &OfflineConfig) -> Arc<StaticNetwork> {
    let network = StaticNetwork::new();
    for path in &config.precache {
        if path.ends_with(".png") {
            network.route(path.clone(), "image/png", vec![0x89, b'P', b'N', b'G']);
        } else {
            network.page(path.clone(), format!("<html>{path}</html>"));
        }
    }
    Arc::new(network)
}

fn drain(
    coordinator: &mut UpdateCoordinator,
    events: &mut UnboundedReceiver<SwEvent>,
) -> Vec<UpdateAction> {
    let mut actions = Vec::new();
    while let Ok(event) = events.try_recv() {
        actions.extend(coordinator.on_event(&event));
    }
    actions
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LogConfig::default());
    info!("smartstore offline smoke starting");

    let v1 = OfflineConfig::default();
    v1.validate().context("v1 config invalid")?;
    let network = scripted_network(&v1);

    let origin = Url::parse(ORIGIN)?;
    let (mut registration, mut events) = Registration::new(origin, network.clone());

    // -- first visit: register, install, claim --
    let page = registration.clients().write().await.add_window("/dashboard");
    let mut update = UpdateCoordinator::new(page);

    registration.register(&v1).await.context("v1 install")?;
    let actions = drain(&mut update, &mut events);
    ensure!(actions.is_empty(), "first install must not prompt");
    ensure!(update.has_controller(), "page was not claimed");
    info!(fetches = network.fetch_count(), "v1 installed and controlling");

    // -- offline browsing --
    tokio::time::sleep(Duration::from_millis(50)).await;
    network.set_offline(true);

    let cached = registration
        .handle_fetch(&FetchRequest::navigation("/dashboard"))
        .await
        .context("cached navigation offline")?;
    ensure!(cached.served_from == ServedFrom::Cache, "expected cache hit");

    let fallback = registration
        .handle_fetch(&FetchRequest::navigation("/reports"))
        .await
        .context("offline navigation fallback")?;
    ensure!(
        fallback.body_text().contains("/offline"),
        "expected the offline page, got: {}",
        fallback.body_text()
    );

    let image = registration
        .handle_fetch(&FetchRequest::new("/photo.jpg", Destination::Image))
        .await;
    ensure!(image.is_err(), "offline image fetch must fail, not fall back");
    info!("offline behavior verified");

    network.set_offline(false);

    // -- update rollout through the prompt --
    let v2 = OfflineConfig::default().with_version("smartstore-v2");
    let pending = registration.register(&v2).await.context("v2 install")?;
    let actions = drain(&mut update, &mut events);
    ensure!(
        actions == vec![UpdateAction::ShowPrompt],
        "v2 install should prompt, got {actions:?}"
    );

    let Some(UpdateAction::SkipWaiting(worker)) = update.accept() else {
        bail!("accept produced no skip-waiting action");
    };
    ensure!(worker == pending, "prompt held the wrong worker");
    registration
        .post_message(worker, Registration::skip_waiting_message())
        .await?;

    let actions = drain(&mut update, &mut events);
    ensure!(
        actions == vec![UpdateAction::Reload],
        "controller change should reload, got {actions:?}"
    );
    info!("update accepted, page reloading under v2");

    {
        let storage = registration.storage();
        let storage = storage.read().await;
        ensure!(
            !storage.has(&CacheVersion::new("smartstore-v1")),
            "stale v1 cache survived activation"
        );
        ensure!(
            storage.has(&CacheVersion::new("smartstore-v2")),
            "v2 cache missing after activation"
        );
    }

    // -- push delivery --
    let mut push = PushManager::new();
    push.subscribe(format!("{ORIGIN}/push/endpoint"));
    ensure!(push.is_subscribed(), "subscription not created");

    let mut center = NotificationCenter::new();
    let shown = registration
        .handle_push(Some(b"Inventory low at store #12"), &mut center)
        .await?;
    let opened = registration
        .handle_notification_click(&mut center, shown)
        .await
        .context("notification click")?;
    ensure!(center.is_empty(), "notification not closed on click");
    {
        let clients = registration.clients();
        let clients = clients.read().await;
        let client = clients.get(opened).context("clicked window missing")?;
        ensure!(client.url.path() == "/dashboard", "click opened wrong page");
    }
    info!("push and notification click verified");

    // -- install prompt --
    let mut install = InstallPromptCoordinator::new(Box::new(MemoryDismissalStore::new()));
    ensure!(
        install.on_platform_prompt(DeferredPrompt {
            platform: "web".to_string(),
        }),
        "install prompt should show"
    );
    let deferred = install.accept().context("install prompt accept")?;
    info!(platform = %deferred.platform, "forwarding install prompt to platform");
    install.resolve(InstallOutcome::Accepted);
    install.on_app_installed();

    info!("smartstore offline smoke passed");
    Ok(())
}
