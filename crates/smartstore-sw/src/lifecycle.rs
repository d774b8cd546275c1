//! Worker lifecycle state machine and registration.
//!
//! A [`CacheController`] is one deployed version of the worker: it owns the
//! install, activate, fetch, and push behavior for its cache generation. A
//! [`Registration`] coordinates instances across deployments: at most one
//! active controller serves pages while a newer install may sit in the
//! waiting slot until the activation gate opens (no controlled pages) or a
//! page sends the skip-waiting command.

use crate::cache::{Cache, CacheStorage, CacheVersion};
use crate::clients::{ClientId, Clients};
use crate::net::{Destination, FetchError, FetchRequest, FetchResponse, Network};
use crate::push::{decode_payload, Notification, NotificationCenter, NotificationId};
use crate::{SwError, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use smartstore_common::{NotificationConfig, OfflineConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace, warn};
use url::Url;

/// The one cross-instance command token a page may send.
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Created, nothing run yet.
    Parsed,
    /// Pre-caching the manifest.
    Installing,
    /// Installed, waiting for the activation gate.
    Installed,
    /// Purging stale caches and claiming pages.
    Activating,
    /// Controlling pages and intercepting fetches.
    Activated,
    /// Replaced or failed.
    Redundant,
}

/// Lifecycle notifications observable from the page side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwEvent {
    /// A new install attempt started.
    UpdateFound { worker: WorkerId },
    /// A worker changed state.
    StateChange { worker: WorkerId, state: WorkerState },
    /// A newly activated worker claimed the open pages.
    ControllerChange {
        worker: WorkerId,
        claimed: Vec<ClientId>,
    },
}

// ==================== Cache Controller ====================

/// One deployed version of the offline cache controller.
#[derive(Debug)]
pub struct CacheController {
    id: WorkerId,
    version: CacheVersion,
    precache: Vec<String>,
    offline_path: String,
    notifications: NotificationConfig,
    state: WorkerState,
}

impl CacheController {
    /// Create a controller for a deployment.
    pub fn new(config: &OfflineConfig) -> Self {
        Self {
            id: WorkerId::new(),
            version: CacheVersion::new(config.cache_version.clone()),
            precache: config.precache.clone(),
            offline_path: config.offline_path.clone(),
            notifications: config.notifications.clone(),
            state: WorkerState::Parsed,
        }
    }

    /// Instance identifier.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Cache generation this instance owns.
    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn set_state(&mut self, state: WorkerState) {
        debug!(worker = %self.id, from = ?self.state, to = ?state, "state change");
        self.state = state;
    }

    /// Pre-cache the manifest into a fresh store and commit it whole.
    ///
    /// Any failed or non-success fetch aborts the install: nothing is
    /// committed and the instance goes redundant.
    pub(crate) fn install(
        &mut self,
        storage: &mut CacheStorage,
        network: &dyn Network,
    ) -> Result<(), SwError> {
        self.set_state(WorkerState::Installing);
        let mut cache = Cache::new(self.version.clone());

        let precache = self.precache.clone();
        for path in &precache {
            let request = FetchRequest::new(path.clone(), Destination::Other);
            match network.fetch(&request) {
                Ok(response) if response.is_ok() => {
                    cache.put(response.into_entry(path.clone()));
                }
                Ok(response) => {
                    self.set_state(WorkerState::Redundant);
                    return Err(SwError::InstallFailed(format!(
                        "precache of {} returned status {}",
                        path, response.status
                    )));
                }
                Err(err) => {
                    self.set_state(WorkerState::Redundant);
                    return Err(SwError::InstallFailed(format!(
                        "precache of {} failed: {}",
                        path, err
                    )));
                }
            }
        }

        storage.commit(cache);
        self.set_state(WorkerState::Installed);
        Ok(())
    }

    /// First half of activation: purge every other cache generation.
    pub(crate) fn begin_activate(&mut self, storage: &mut CacheStorage) -> Vec<CacheVersion> {
        self.set_state(WorkerState::Activating);
        storage.purge_except(&self.version)
    }

    /// Second half of activation, after pages are claimed.
    pub(crate) fn finish_activate(&mut self) {
        self.set_state(WorkerState::Activated);
    }

    pub(crate) fn retire(&mut self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Cache-first fetch policy.
    ///
    /// Hit: the stored response, verbatim. Miss: live network. Network
    /// failure: the pre-cached offline page for navigations, the failure
    /// itself for everything else. Successful network responses are never
    /// written back; the cache stays an install-time snapshot.
    pub fn handle_fetch(
        &self,
        storage: &CacheStorage,
        network: &dyn Network,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        if let Some(entry) = storage.lookup(&self.version, &request.url) {
            trace!(url = %request.url, "served from cache");
            return Ok(FetchResponse::from_entry(entry));
        }

        match network.fetch(request) {
            Ok(response) => Ok(response),
            Err(err) => {
                if request.is_navigation() {
                    if let Some(offline) = storage.lookup(&self.version, &self.offline_path) {
                        debug!(url = %request.url, "navigation failed, serving offline page");
                        return Ok(FetchResponse::from_entry(offline));
                    }
                    warn!(
                        offline_path = %self.offline_path,
                        "offline page not pre-cached, navigation fails"
                    );
                }
                Err(err)
            }
        }
    }

    /// Build the notification for a push delivery.
    pub fn handle_push(&self, payload: Option<&[u8]>) -> Notification {
        Notification {
            title: self.notifications.title.clone(),
            body: decode_payload(payload, &self.notifications.default_body),
            icon: self.notifications.icon.clone(),
            badge: self.notifications.badge.clone(),
            click_target: self.notifications.click_target.clone(),
        }
    }

    /// Close a clicked notification and focus or open its target page.
    pub fn handle_notification_click(
        &self,
        center: &mut NotificationCenter,
        clients: &mut Clients,
        id: NotificationId,
    ) -> Option<ClientId> {
        let notification = center.get(id)?.clone();
        center.close(id);

        match clients.find_window(&notification.click_target) {
            Some(existing) => {
                clients.focus(existing);
                Some(existing)
            }
            None => Some(clients.open_window(&notification.click_target)),
        }
    }
}

// ==================== Registration ====================

#[derive(Deserialize)]
struct ControlMessage {
    #[serde(rename = "type")]
    kind: String,
}

/// Coordinates controller instances across deployments for one origin.
pub struct Registration {
    waiting: Option<CacheController>,
    active: Option<CacheController>,
    storage: Arc<RwLock<CacheStorage>>,
    clients: Arc<RwLock<Clients>>,
    network: Arc<dyn Network>,
    event_tx: mpsc::UnboundedSender<SwEvent>,
}

impl Registration {
    /// Create a registration with no workers.
    pub fn new(
        origin: Url,
        network: Arc<dyn Network>,
    ) -> (Self, mpsc::UnboundedReceiver<SwEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                waiting: None,
                active: None,
                storage: Arc::new(RwLock::new(CacheStorage::new())),
                clients: Arc::new(RwLock::new(Clients::new(origin))),
                network,
                event_tx,
            },
            event_rx,
        )
    }

    /// Shared cache storage handle.
    pub fn storage(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.storage)
    }

    /// Shared client registry handle.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        Arc::clone(&self.clients)
    }

    /// The installed-but-waiting instance, if any.
    pub fn waiting(&self) -> Option<&CacheController> {
        self.waiting.as_ref()
    }

    /// The instance controlling pages, if any.
    pub fn active(&self) -> Option<&CacheController> {
        self.active.as_ref()
    }

    fn emit(&self, event: SwEvent) {
        let _ = self.event_tx.send(event);
    }

    fn retire(&self, mut controller: CacheController) {
        controller.retire();
        self.emit(SwEvent::StateChange {
            worker: controller.id(),
            state: WorkerState::Redundant,
        });
    }

    /// Register a deployment: install it, then activate if the gate allows.
    ///
    /// Install is atomic. On failure the attempt is discarded and any
    /// previously active instance keeps serving.
    pub async fn register(&mut self, config: &OfflineConfig) -> Result<WorkerId, SwError> {
        let mut controller = CacheController::new(config);
        let id = controller.id();
        info!(worker = %id, version = %config.cache_version, "registering worker");
        self.emit(SwEvent::UpdateFound { worker: id });

        let install_result = {
            let mut storage = self.storage.write().await;
            controller.install(&mut storage, self.network.as_ref())
        };

        if let Err(err) = install_result {
            warn!(worker = %id, error = %err, "install failed");
            self.emit(SwEvent::StateChange {
                worker: id,
                state: WorkerState::Redundant,
            });
            return Err(err);
        }

        self.emit(SwEvent::StateChange {
            worker: id,
            state: WorkerState::Installed,
        });

        // A later install supersedes an earlier untriggered one.
        if let Some(old) = self.waiting.take() {
            self.retire(old);
        }
        self.waiting = Some(controller);

        self.try_activate().await;
        Ok(id)
    }

    /// Activate the waiting instance unless some page is still controlled.
    ///
    /// Call again after the last controlled page closes.
    pub async fn try_activate(&mut self) -> bool {
        if self.waiting.is_none() {
            return false;
        }
        if self.clients.read().await.any_controlled() {
            debug!("activation gated: pages still controlled");
            return false;
        }
        self.activate_waiting().await
    }

    async fn activate_waiting(&mut self) -> bool {
        let Some(mut controller) = self.waiting.take() else {
            return false;
        };
        let id = controller.id();

        if let Some(old) = self.active.take() {
            self.retire(old);
        }

        self.emit(SwEvent::StateChange {
            worker: id,
            state: WorkerState::Activating,
        });

        // Purge fully completes before any page is claimed.
        let purged = {
            let mut storage = self.storage.write().await;
            controller.begin_activate(&mut storage)
        };
        if !purged.is_empty() {
            info!(worker = %id, ?purged, "stale generations removed");
        }

        let claimed = self.clients.write().await.claim(id);
        controller.finish_activate();

        self.emit(SwEvent::StateChange {
            worker: id,
            state: WorkerState::Activated,
        });
        self.emit(SwEvent::ControllerChange {
            worker: id,
            claimed,
        });

        self.active = Some(controller);
        true
    }

    /// The standard skip-waiting message a page sends to a pending worker.
    pub fn skip_waiting_message() -> JsonValue {
        serde_json::json!({ "type": SKIP_WAITING })
    }

    /// Deliver a page message to a worker instance.
    ///
    /// Skip-waiting forces the waiting instance through the activation gate.
    /// Anything else is ignored.
    pub async fn post_message(&mut self, target: WorkerId, data: JsonValue) -> Result<(), SwError> {
        let is_skip = serde_json::from_value::<ControlMessage>(data.clone())
            .map(|m| m.kind == SKIP_WAITING)
            .unwrap_or(false);
        if !is_skip {
            trace!(worker = %target, %data, "ignoring unknown message");
            return Ok(());
        }

        if self.waiting.as_ref().map(CacheController::id) == Some(target) {
            info!(worker = %target, "skip waiting requested");
            self.activate_waiting().await;
            Ok(())
        } else if self.active.as_ref().map(CacheController::id) == Some(target) {
            trace!(worker = %target, "skip waiting for active worker ignored");
            Ok(())
        } else {
            Err(SwError::NotFound(format!("{target} is not waiting")))
        }
    }

    /// Intercept a fetch from a controlled page.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let Some(active) = &self.active else {
            return Err(FetchError::NoController);
        };
        let storage = self.storage.read().await;
        active.handle_fetch(&storage, self.network.as_ref(), request)
    }

    /// Deliver a push payload: the active worker shows a notification.
    pub async fn handle_push(
        &self,
        payload: Option<&[u8]>,
        center: &mut NotificationCenter,
    ) -> Result<NotificationId, SwError> {
        let Some(active) = &self.active else {
            return Err(SwError::State("no active worker for push".to_string()));
        };
        let notification = active.handle_push(payload);
        Ok(center.show(notification))
    }

    /// Route a notification click through the active worker.
    pub async fn handle_notification_click(
        &self,
        center: &mut NotificationCenter,
        id: NotificationId,
    ) -> Option<ClientId> {
        let active = self.active.as_ref()?;
        let mut clients = self.clients.write().await;
        active.handle_notification_click(center, &mut clients, id)
    }
}
