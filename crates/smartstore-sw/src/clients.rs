//! Controlled pages.
//!
//! Tracks which open pages are controlled by which worker instance. A page
//! opened before a worker activates stays uncontrolled until it reloads or
//! the worker claims it during activation.

use crate::WorkerId;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use url::Url;

/// Unique identifier for an open page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An open page.
#[derive(Debug, Clone)]
pub struct Client {
    /// Page identifier.
    pub id: ClientId,

    /// Full page URL.
    pub url: Url,

    /// Whether the page currently has focus.
    pub focused: bool,

    /// Worker controlling this page, if any.
    pub controller: Option<WorkerId>,
}

impl Client {
    /// Whether any worker controls this page.
    pub fn is_controlled(&self) -> bool {
        self.controller.is_some()
    }
}

/// Registry of open pages for one origin.
#[derive(Debug)]
pub struct Clients {
    origin: Url,
    clients: HashMap<ClientId, Client>,
}

impl Clients {
    /// Create an empty registry for an origin.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            clients: HashMap::new(),
        }
    }

    /// The origin pages belong to.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve(&self, path: &str) -> Url {
        self.origin.join(path).unwrap_or_else(|_| self.origin.clone())
    }

    /// Register a page the user opened. Uncontrolled until claimed.
    pub fn add_window(&mut self, path: &str) -> ClientId {
        let id = ClientId::new();
        let url = self.resolve(path);
        debug!(client = ?id, %url, "window opened");
        self.clients.insert(
            id,
            Client {
                id,
                url,
                focused: true,
                controller: None,
            },
        );
        id
    }

    /// Close a page.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.clients.remove(&id)
    }

    /// Get a page by id.
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Whether any open page is controlled by any worker.
    pub fn any_controlled(&self) -> bool {
        self.clients.values().any(Client::is_controlled)
    }

    /// Pages controlled by a specific worker.
    pub fn controlled_by(&self, worker: WorkerId) -> Vec<ClientId> {
        self.clients
            .values()
            .filter(|c| c.controller == Some(worker))
            .map(|c| c.id)
            .collect()
    }

    /// Take control of every open page. Returns the claimed page ids.
    pub fn claim(&mut self, worker: WorkerId) -> Vec<ClientId> {
        let mut claimed = Vec::new();
        for client in self.clients.values_mut() {
            client.controller = Some(worker);
            claimed.push(client.id);
        }
        if !claimed.is_empty() {
            info!(%worker, pages = claimed.len(), "clients claimed");
        }
        claimed
    }

    /// Find an open page at `path`.
    pub fn find_window(&self, path: &str) -> Option<ClientId> {
        let url = self.resolve(path);
        self.clients.values().find(|c| c.url == url).map(|c| c.id)
    }

    /// Focus an open page.
    pub fn focus(&mut self, id: ClientId) -> bool {
        if !self.clients.contains_key(&id) {
            return false;
        }
        for client in self.clients.values_mut() {
            client.focused = client.id == id;
        }
        true
    }

    /// Open a new focused page at `path`.
    pub fn open_window(&mut self, path: &str) -> ClientId {
        let id = self.add_window(path);
        self.focus(id);
        id
    }

    /// Number of open pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no pages are open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://smartstore.example").unwrap()
    }

    #[test]
    fn test_new_window_is_uncontrolled() {
        let mut clients = Clients::new(origin());
        let id = clients.add_window("/dashboard");

        let client = clients.get(id).unwrap();
        assert!(!client.is_controlled());
        assert_eq!(client.url.path(), "/dashboard");
        assert!(!clients.any_controlled());
    }

    #[test]
    fn test_claim_controls_every_page() {
        let mut clients = Clients::new(origin());
        let a = clients.add_window("/");
        let b = clients.add_window("/inventory");
        let worker = WorkerId::new();

        let claimed = clients.claim(worker);

        assert_eq!(claimed.len(), 2);
        assert!(clients.any_controlled());
        assert_eq!(clients.controlled_by(worker).len(), 2);
        assert!(clients.get(a).unwrap().is_controlled());
        assert!(clients.get(b).unwrap().is_controlled());
    }

    #[test]
    fn test_find_and_focus_window() {
        let mut clients = Clients::new(origin());
        let a = clients.add_window("/dashboard");
        let b = clients.add_window("/chat");

        let found = clients.find_window("/dashboard").unwrap();
        assert_eq!(found, a);

        assert!(clients.focus(a));
        assert!(clients.get(a).unwrap().focused);
        assert!(!clients.get(b).unwrap().focused);
    }

    #[test]
    fn test_open_window_focuses() {
        let mut clients = Clients::new(origin());
        let a = clients.add_window("/");
        let b = clients.open_window("/dashboard");

        assert!(clients.get(b).unwrap().focused);
        assert!(!clients.get(a).unwrap().focused);
    }

    #[test]
    fn test_remove_window() {
        let mut clients = Clients::new(origin());
        let id = clients.add_window("/");
        assert!(clients.remove(id).is_some());
        assert!(clients.is_empty());
        assert!(clients.find_window("/").is_none());
    }
}
