//! Thin in-memory repo registry: tracks just enough about each repo to
//! route subsequent per-repo calls. Reset on process restart; it is
//! deliberately not a durable, authenticated registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RepoListItem {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone)]
pub struct AppState {
    pub repo_base: PathBuf,
    registry: Arc<RwLock<HashMap<String, RepoListItem>>>,
}

impl AppState {
    pub fn new(repo_base: PathBuf) -> Self {
        AppState {
            repo_base,
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn list(&self) -> Vec<RepoListItem> {
        let mut items: Vec<_> = self.registry.read().unwrap().values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub fn get(&self, id: &str) -> Option<RepoListItem> {
        self.registry.read().unwrap().get(id).cloned()
    }

    /// Registers `item` under its own id. Returns `false` without
    /// overwriting anything if the id is already taken.
    pub fn register(&self, item: RepoListItem) -> bool {
        let mut registry = self.registry.write().unwrap();
        if registry.contains_key(&item.id) {
            return false;
        }
        registry.insert(item.id.clone(), item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> RepoListItem {
        RepoListItem {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn register_then_list_then_get() {
        let state = AppState::new(PathBuf::from("/tmp/repos"));
        assert!(state.register(item("a")));
        assert!(state.register(item("b")));

        let listed = state.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[1].id, "b");

        assert!(state.get("a").is_some());
        assert!(state.get("missing").is_none());
    }

    #[test]
    fn register_rejects_duplicate_id() {
        let state = AppState::new(PathBuf::from("/tmp/repos"));
        assert!(state.register(item("a")));
        assert!(!state.register(item("a")));
        assert_eq!(state.list().len(), 1);
    }
}
