//! Home-screen install prompt coordination.
//!
//! Structurally the update coordinator's twin: capture the platform's
//! deferred install prompt instead of showing its default UI, surface an
//! application-controlled prompt, and forward the user's choice. Unlike
//! update dismissal, an explicit dismissal here is persisted so the user is
//! not asked again.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The platform's deferred install prompt event, captured before its
/// default UI could show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPrompt {
    /// Platform the prompt would install to.
    pub platform: String,
}

/// The user's choice as reported back by the platform prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Where the "don't ask again" flag lives.
pub trait DismissalStore: Send {
    /// Whether the user has permanently dismissed the install prompt.
    fn is_dismissed(&self) -> bool;

    /// Record a permanent dismissal.
    fn set_dismissed(&mut self);
}

/// Session-scoped store, mostly for tests and harnesses.
#[derive(Debug, Default)]
pub struct MemoryDismissalStore {
    dismissed: bool,
}

impl MemoryDismissalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DismissalStore for MemoryDismissalStore {
    fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    fn set_dismissed(&mut self) {
        self.dismissed = true;
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DismissalRecord {
    install_prompt_dismissed: bool,
}

/// JSON-file-backed store surviving page sessions.
///
/// Write failures are logged and swallowed: prompt bookkeeping must never
/// take the page down.
#[derive(Debug)]
pub struct FileDismissalStore {
    path: PathBuf,
    dismissed: bool,
}

impl FileDismissalStore {
    /// Open the store at `path`, reading any existing record.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dismissed = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<DismissalRecord>(&contents).ok())
            .map(|record| record.install_prompt_dismissed)
            .unwrap_or(false);
        Self { path, dismissed }
    }
}

impl DismissalStore for FileDismissalStore {
    fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    fn set_dismissed(&mut self) {
        self.dismissed = true;
        let record = DismissalRecord {
            install_prompt_dismissed: true,
        };
        match serde_json::to_string(&record) {
            Ok(contents) => {
                if let Err(err) = std::fs::write(&self.path, contents) {
                    warn!(path = %self.path.display(), error = %err, "failed to persist dismissal");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode dismissal record"),
        }
    }
}

/// Page-side install prompt state.
pub struct InstallPromptCoordinator {
    deferred: Option<DeferredPrompt>,
    installed: bool,
    store: Box<dyn DismissalStore>,
}

impl InstallPromptCoordinator {
    /// Create a coordinator over a dismissal store.
    pub fn new(store: Box<dyn DismissalStore>) -> Self {
        Self {
            deferred: None,
            installed: false,
            store,
        }
    }

    /// The page detected it is already running installed (standalone).
    pub fn on_standalone(&mut self) {
        self.installed = true;
        self.deferred = None;
    }

    /// The platform reported the app was installed.
    pub fn on_app_installed(&mut self) {
        info!("app installed");
        self.installed = true;
        self.deferred = None;
    }

    /// Capture the platform's install prompt event (its default UI is
    /// suppressed). Returns whether the application prompt should show.
    pub fn on_platform_prompt(&mut self, prompt: DeferredPrompt) -> bool {
        if self.installed {
            debug!("install prompt ignored: already installed");
            return false;
        }
        self.deferred = Some(prompt);
        self.should_show()
    }

    /// Whether the application prompt should be visible.
    pub fn should_show(&self) -> bool {
        self.deferred.is_some() && !self.installed && !self.store.is_dismissed()
    }

    /// User accepted: hand the deferred prompt back so the caller can
    /// forward it to the platform, then report the outcome via `resolve`.
    pub fn accept(&mut self) -> Option<DeferredPrompt> {
        if !self.should_show() {
            return None;
        }
        self.deferred.take()
    }

    /// The platform reported the user's choice. Terminal for this
    /// occurrence either way; no retry is scheduled.
    pub fn resolve(&mut self, outcome: InstallOutcome) {
        info!(?outcome, "install prompt resolved");
        self.deferred = None;
    }

    /// User dismissed the application prompt. Persisted: the prompt will
    /// not be offered again.
    pub fn dismiss(&mut self) {
        self.deferred = None;
        self.store.set_dismissed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> DeferredPrompt {
        DeferredPrompt {
            platform: "web".to_string(),
        }
    }

    fn coordinator() -> InstallPromptCoordinator {
        InstallPromptCoordinator::new(Box::new(MemoryDismissalStore::new()))
    }

    #[test]
    fn test_prompt_shows_after_platform_event() {
        let mut coordinator = coordinator();
        assert!(!coordinator.should_show());

        assert!(coordinator.on_platform_prompt(prompt()));
        assert!(coordinator.should_show());
    }

    #[test]
    fn test_accept_forwards_deferred_prompt_once() {
        let mut coordinator = coordinator();
        coordinator.on_platform_prompt(prompt());

        let deferred = coordinator.accept().unwrap();
        assert_eq!(deferred.platform, "web");
        assert!(!coordinator.should_show());
        assert!(coordinator.accept().is_none());

        coordinator.resolve(InstallOutcome::Accepted);
        assert!(!coordinator.should_show());
    }

    #[test]
    fn test_platform_dismissal_is_not_persisted() {
        let mut coordinator = coordinator();
        coordinator.on_platform_prompt(prompt());
        coordinator.accept().unwrap();
        coordinator.resolve(InstallOutcome::Dismissed);

        // a later platform event re-arms the prompt
        assert!(coordinator.on_platform_prompt(prompt()));
    }

    #[test]
    fn test_explicit_dismissal_is_permanent() {
        let mut coordinator = coordinator();
        coordinator.on_platform_prompt(prompt());
        coordinator.dismiss();

        assert!(!coordinator.should_show());
        assert!(!coordinator.on_platform_prompt(prompt()));
        assert!(coordinator.accept().is_none());
    }

    #[test]
    fn test_installed_app_never_prompts() {
        let mut coordinator = coordinator();
        coordinator.on_app_installed();
        assert!(!coordinator.on_platform_prompt(prompt()));

        let mut standalone = self::coordinator();
        standalone.on_standalone();
        assert!(!standalone.on_platform_prompt(prompt()));
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = std::env::temp_dir().join("smartstore-dismissal-test.json");
        let _ = std::fs::remove_file(&path);

        let mut store = FileDismissalStore::new(&path);
        assert!(!store.is_dismissed());
        store.set_dismissed();

        // a fresh page session sees the persisted flag
        let reloaded = FileDismissalStore::new(&path);
        assert!(reloaded.is_dismissed());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_ignores_corrupt_contents() {
        let path = std::env::temp_dir().join("smartstore-dismissal-corrupt.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileDismissalStore::new(&path);
        assert!(!store.is_dismissed());

        let _ = std::fs::remove_file(&path);
    }
}
