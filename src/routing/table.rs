//! Immutable route table.

use std::collections::HashMap;

use crate::worker::WorkerHandle;

/// Exact-match mapping from decoded request path to route worker.
///
/// Built once at startup and shared read-only for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, WorkerHandle>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under its route path. Returns the handle it replaced, if any.
    pub fn insert(&mut self, handle: WorkerHandle) -> Option<WorkerHandle> {
        self.routes.insert(handle.route().to_string(), handle)
    }

    /// Find the worker for a decoded path.
    pub fn lookup(&self, path: &str) -> Option<&WorkerHandle> {
        self.routes.get(path)
    }

    /// Configured paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl FromIterator<WorkerHandle> for RouteTable {
    fn from_iter<I: IntoIterator<Item = WorkerHandle>>(iter: I) -> Self {
        let mut table = Self::new();
        for handle in iter {
            table.insert(handle);
        }
        table
    }
}
