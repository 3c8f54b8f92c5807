use crate::mock::{Mock, WILDCARD};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, RwLock};

/// All mocks registered for one origin (method + scheme + host), keyed by path.
///
/// Resolution order is fixed: exact path, then the root path `/` as the origin-wide
/// default, then the [`WILDCARD`].
pub(crate) struct Registry {
    mocks: RwLock<HashMap<String, Arc<Mock>>>,
    // Stands in for a registration that never received a response.
    placeholder: bool,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            mocks: RwLock::new(HashMap::new()),
            placeholder: false,
        }
    }

    /// A registry refusing every request, installed for abandoned registrations.
    pub(crate) fn placeholder(refused: Mock) -> Self {
        let registry = Self {
            mocks: RwLock::new(HashMap::new()),
            placeholder: true,
        };
        registry.insert(refused);
        registry
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Register `mock` under its path, replacing any previous mock for the same path.
    pub(crate) fn insert(&self, mock: Mock) -> Arc<Mock> {
        let mock = Arc::new(mock);
        self.mocks
            .write()
            .expect("Poisoned lock!")
            .insert(mock.path().to_owned(), mock.clone());
        mock
    }

    /// The mock registered for exactly `path`, without fallback.
    pub(crate) fn get(&self, path: &str) -> Option<Arc<Mock>> {
        self.mocks.read().expect("Poisoned lock!").get(path).cloned()
    }

    /// Resolve the mock answering `path`: exact path, then `/`, then [`WILDCARD`].
    pub(crate) fn find(&self, path: &str) -> Option<Arc<Mock>> {
        let mocks = self.mocks.read().expect("Poisoned lock!");
        mocks
            .get(path)
            .or_else(|| mocks.get("/"))
            .or_else(|| mocks.get(WILDCARD))
            .cloned()
    }

    /// Snapshot of every mock, sorted by path.
    pub(crate) fn mocks(&self) -> Vec<Arc<Mock>> {
        let mut mocks: Vec<Arc<Mock>> = self
            .mocks
            .read()
            .expect("Poisoned lock!")
            .values()
            .cloned()
            .collect();
        mocks.sort_by(|a, b| a.path().cmp(b.path()));
        mocks
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for mock in self.mocks() {
            map.entry(&mock.path(), &mock);
        }
        map.finish()
    }
}
