//! Backend registry
//!
//! Backends are registered once at startup and never removed. The registry
//! keeps two orderings of them:
//!
//! - **ascending** priority, used by the startup load so that higher
//!   priority backends overwrite lower ones;
//! - **descending** priority, used by writes and account creation.
//!
//! Equal priorities keep registration order in both views.

use std::collections::HashMap;
use std::sync::Arc;

use account_storage_plugin::AccountStorage;

use crate::error::{CoreError, CoreResult};
use crate::notification::NotificationBus;
use crate::types::BackendInfo;

/// A backend together with its registration index
#[derive(Clone)]
pub struct RegisteredBackend {
    id: usize,
    storage: Arc<dyn AccountStorage>,
}

impl RegisteredBackend {
    /// Registration index, stable for the life of the registry
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn storage(&self) -> &Arc<dyn AccountStorage> {
        &self.storage
    }

    pub fn name(&self) -> &str {
        self.storage.name()
    }

    pub fn priority(&self) -> i32 {
        self.storage.priority()
    }

    /// Metadata snapshot
    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            id: self.id,
            name: self.storage.name().to_string(),
            description: self.storage.description().to_string(),
            provider: self.storage.provider().to_string(),
            priority: self.storage.priority(),
        }
    }
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("id", &self.id)
            .field("name", &self.storage.name())
            .field("priority", &self.storage.priority())
            .finish()
    }
}

/// Collects backends before the registry is frozen.
#[derive(Default)]
pub struct BackendRegistryBuilder {
    backends: Vec<Arc<dyn AccountStorage>>,
}

impl BackendRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend. Registration order breaks priority ties.
    #[must_use]
    pub fn register(mut self, storage: Arc<dyn AccountStorage>) -> Self {
        self.backends.push(storage);
        self
    }

    /// Sort the backends and attach each to the bus.
    pub fn build(self, bus: &NotificationBus) -> CoreResult<BackendRegistry> {
        if self.backends.is_empty() {
            return Err(CoreError::NoBackends);
        }

        let backends: Vec<RegisteredBackend> = self
            .backends
            .into_iter()
            .enumerate()
            .map(|(id, storage)| RegisteredBackend { id, storage })
            .collect();

        let mut ascending: Vec<usize> = (0..backends.len()).collect();
        // stable: ties stay in registration order
        ascending.sort_by_key(|&id| backends[id].priority());
        let descending = reverse_keeping_ties(&ascending, |id| backends[id].priority());

        let mut rank = vec![0; backends.len()];
        for (position, &id) in descending.iter().enumerate() {
            rank[id] = position;
        }

        for backend in &backends {
            log::info!(
                "Registered account storage backend {} (priority {}, provider '{}')",
                backend.name(),
                backend.priority(),
                backend.storage.provider()
            );
            backend
                .storage
                .attach(bus.notifier_for(backend.id, backend.name()));
        }

        Ok(BackendRegistry {
            backends,
            ascending,
            descending,
            rank,
        })
    }
}

/// Reverse a priority-sorted list in O(n), keeping each run of equal
/// priorities in its original order.
fn reverse_keeping_ties(ascending: &[usize], priority: impl Fn(usize) -> i32) -> Vec<usize> {
    let mut descending = Vec::with_capacity(ascending.len());
    let mut end = ascending.len();
    while end > 0 {
        let p = priority(ascending[end - 1]);
        let mut start = end - 1;
        while start > 0 && priority(ascending[start - 1]) == p {
            start -= 1;
        }
        descending.extend_from_slice(&ascending[start..end]);
        end = start;
    }
    descending
}

/// Frozen, priority-ordered set of backends
pub struct BackendRegistry {
    /// In registration order, indexed by id
    backends: Vec<RegisteredBackend>,
    ascending: Vec<usize>,
    descending: Vec<usize>,
    /// Position of each id in `descending`; lower is preferred
    rank: Vec<usize>,
}

impl BackendRegistry {
    /// Lowest priority first
    pub fn ascending(&self) -> impl Iterator<Item = &RegisteredBackend> {
        self.ascending.iter().map(|&id| &self.backends[id])
    }

    /// Highest priority first
    pub fn descending(&self) -> impl Iterator<Item = &RegisteredBackend> {
        self.descending.iter().map(|&id| &self.backends[id])
    }

    /// Backends after `id` in descending order
    pub fn below(&self, id: usize) -> impl Iterator<Item = &RegisteredBackend> {
        let skip = self.rank.get(id).map_or(self.descending.len(), |r| r + 1);
        self.descending().skip(skip)
    }

    pub fn get(&self, id: usize) -> Option<&RegisteredBackend> {
        self.backends.get(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RegisteredBackend> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Whether `a` is preferred over `b`
    pub fn outranks(&self, a: usize, b: usize) -> bool {
        match (self.rank.get(a), self.rank.get(b)) {
            (Some(ra), Some(rb)) => ra < rb,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn infos(&self) -> Vec<BackendInfo> {
        self.descending().map(RegisteredBackend::info).collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descending()).finish()
    }
}
