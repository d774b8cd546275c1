//! Update prompt coordination.
//!
//! Watches worker lifecycle events for a newly installed instance while the
//! page is already controlled by an older one, holds it as the pending
//! update, and turns the user's decision into actions: send skip-waiting,
//! then reload once control transfers. Dismissal is session-only; the next
//! qualifying install prompts again.

use smartstore_sw::{ClientId, SwEvent, WorkerId, WorkerState};
use tracing::{debug, info};

/// Action for the embedding page to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Surface the "update available" prompt.
    ShowPrompt,
    /// Send the skip-waiting command to this worker.
    SkipWaiting(WorkerId),
    /// Reload the page so the new version serves all subsequent requests.
    Reload,
}

/// Page-side update decision state for one open page.
#[derive(Debug)]
pub struct UpdateCoordinator {
    client: ClientId,
    pending: Option<WorkerId>,
    prompt_visible: bool,
    has_controller: bool,
    awaiting_reload: bool,
}

impl UpdateCoordinator {
    /// Create the coordinator for a freshly loaded page.
    pub fn new(client: ClientId) -> Self {
        Self {
            client,
            pending: None,
            prompt_visible: false,
            has_controller: false,
            awaiting_reload: false,
        }
    }

    /// Feed one lifecycle event; returns the action it calls for, if any.
    ///
    /// A new install reaching Installed while this page is controlled
    /// becomes the pending update, superseding any earlier untriggered one.
    pub fn on_event(&mut self, event: &SwEvent) -> Option<UpdateAction> {
        match event {
            SwEvent::StateChange {
                worker,
                state: WorkerState::Installed,
            } if self.has_controller => {
                if let Some(old) = self.pending.replace(*worker) {
                    debug!(superseded = %old, pending = %worker, "newer update supersedes pending");
                }
                self.prompt_visible = true;
                Some(UpdateAction::ShowPrompt)
            }
            SwEvent::StateChange {
                worker,
                state: WorkerState::Redundant,
            } if self.pending == Some(*worker) => {
                debug!(worker = %worker, "pending update became redundant");
                self.pending = None;
                self.prompt_visible = false;
                None
            }
            SwEvent::ControllerChange { worker, claimed } if claimed.contains(&self.client) => {
                self.has_controller = true;
                if self.awaiting_reload {
                    info!(worker = %worker, "control transferred, reloading");
                    self.awaiting_reload = false;
                    Some(UpdateAction::Reload)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// User accepted the update: hide the prompt and hand back the
    /// skip-waiting action for the pending worker.
    pub fn accept(&mut self) -> Option<UpdateAction> {
        let worker = self.pending.take()?;
        self.prompt_visible = false;
        self.awaiting_reload = true;
        Some(UpdateAction::SkipWaiting(worker))
    }

    /// User dismissed the update. Session-only: nothing is persisted and a
    /// later install will prompt again.
    pub fn dismiss(&mut self) {
        self.pending = None;
        self.prompt_visible = false;
    }

    /// The held pending update, if any.
    pub fn pending_update(&self) -> Option<WorkerId> {
        self.pending
    }

    /// Whether the prompt should be showing.
    pub fn prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    /// Whether this page has observed a controlling worker.
    pub fn has_controller(&self) -> bool {
        self.has_controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstore_common::OfflineConfig;
    use smartstore_sw::{Registration, StaticNetwork};
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;
    use url::Url;

    fn config_v(version: &str) -> OfflineConfig {
        OfflineConfig {
            cache_version: version.to_string(),
            precache: vec!["/".to_string(), "/offline".to_string()],
            offline_path: "/offline".to_string(),
            ..Default::default()
        }
    }

    fn network() -> Arc<StaticNetwork> {
        let network = StaticNetwork::new();
        network.page("/", "<html>home</html>");
        network.page("/offline", "<html>offline</html>");
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

    async fn controlled_page(
    ) -> (Registration, UnboundedReceiver<SwEvent>, UpdateCoordinator) {
        let (mut registration, mut events) = Registration::new(
            Url::parse("https://smartstore.example").unwrap(),
            network(),
        );
        let page = registration.clients().write().await.add_window("/");
        registration.register(&config_v("smartstore-v1")).await.unwrap();

        let mut coordinator = UpdateCoordinator::new(page);
        let actions = drain(&mut coordinator, &mut events);
        assert!(actions.is_empty());
        assert!(coordinator.has_controller());
        (registration, events, coordinator)
    }

    #[tokio::test]
    async fn test_first_install_never_prompts() {
        let (_registration, _events, coordinator) = controlled_page().await;
        assert!(!coordinator.prompt_visible());
        assert!(coordinator.pending_update().is_none());
    }

    #[tokio::test]
    async fn test_update_prompts_and_accept_reloads() {
        let (mut registration, mut events, mut coordinator) = controlled_page().await;

        let v2 = registration.register(&config_v("smartstore-v2")).await.unwrap();
        let actions = drain(&mut coordinator, &mut events);
        assert_eq!(actions, vec![UpdateAction::ShowPrompt]);
        assert_eq!(coordinator.pending_update(), Some(v2));

        let accept = coordinator.accept().unwrap();
        assert_eq!(accept, UpdateAction::SkipWaiting(v2));
        assert!(!coordinator.prompt_visible());

        registration
            .post_message(v2, Registration::skip_waiting_message())
            .await
            .unwrap();
        let actions = drain(&mut coordinator, &mut events);
        assert_eq!(actions, vec![UpdateAction::Reload]);
        assert_eq!(registration.active().unwrap().id(), v2);
    }

    #[tokio::test]
    async fn test_dismiss_is_session_only() {
        let (mut registration, mut events, mut coordinator) = controlled_page().await;

        registration.register(&config_v("smartstore-v2")).await.unwrap();
        drain(&mut coordinator, &mut events);
        coordinator.dismiss();
        assert!(coordinator.pending_update().is_none());
        assert!(coordinator.accept().is_none());

        // the old version keeps serving, but a later install prompts again
        assert_eq!(
            registration.active().unwrap().version().as_str(),
            "smartstore-v1"
        );
        let v3 = registration.register(&config_v("smartstore-v3")).await.unwrap();
        let actions = drain(&mut coordinator, &mut events);
        assert_eq!(actions, vec![UpdateAction::ShowPrompt]);
        assert_eq!(coordinator.pending_update(), Some(v3));
    }

    #[tokio::test]
    async fn test_second_update_supersedes_first() {
        let (mut registration, mut events, mut coordinator) = controlled_page().await;

        registration.register(&config_v("smartstore-v2")).await.unwrap();
        let v3 = registration.register(&config_v("smartstore-v3")).await.unwrap();

        let actions = drain(&mut coordinator, &mut events);
        // one prompt per detected update, latest candidate retained
        assert_eq!(actions, vec![UpdateAction::ShowPrompt, UpdateAction::ShowPrompt]);
        assert_eq!(coordinator.pending_update(), Some(v3));

        let accept = coordinator.accept().unwrap();
        assert_eq!(accept, UpdateAction::SkipWaiting(v3));
    }

    #[tokio::test]
    async fn test_page_opened_after_activation_prompts_only_once_claimed() {
        let (mut registration, mut events) = Registration::new(
            Url::parse("https://smartstore.example").unwrap(),
            network(),
        );
        registration.register(&config_v("smartstore-v1")).await.unwrap();

        // opened after v1 claimed: this page starts uncontrolled
        let page = registration.clients().write().await.add_window("/");
        let mut coordinator = UpdateCoordinator::new(page);
        drain(&mut coordinator, &mut events);
        assert!(!coordinator.has_controller());

        // v2 installs and, with no controlled pages, activates immediately;
        // Installed arrives before this page is claimed, so no prompt shows
        registration.register(&config_v("smartstore-v2")).await.unwrap();
        let actions = drain(&mut coordinator, &mut events);
        assert!(actions.is_empty());
        assert!(coordinator.has_controller());
        assert!(coordinator.pending_update().is_none());
    }
}
