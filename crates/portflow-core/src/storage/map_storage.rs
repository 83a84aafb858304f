//! Mutex-guarded `BTreeMap` implementation of [`NodeStorage`].

use super::NodeStorage;
use crate::{NodeIdentifier, PortflowError};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Entry<T> {
    node_type: String,
    value: T,
}

#[derive(Debug)]
struct Inner<T> {
    entries: BTreeMap<u64, Entry<T>>,
    next_id: u64,
}

/// In-memory node storage behind a single mutex.
#[derive(Debug)]
pub struct MapNodeStorage<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for MapNodeStorage<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl<T> MapNodeStorage<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections are one map operation plus a counter bump, so data
    // behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> NodeStorage<T> for MapNodeStorage<T> {
    fn add(&self, node_type: &str, value: T) -> NodeIdentifier {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.saturating_add(1);
        inner.entries.insert(
            id,
            Entry {
                node_type: node_type.to_string(),
                value,
            },
        );
        NodeIdentifier::new(id, node_type)
    }

    fn get(&self, id: &NodeIdentifier) -> Result<T, PortflowError> {
        let inner = self.lock();
        match inner.entries.get(&id.id) {
            Some(entry) if entry.node_type == id.node_type => Ok(entry.value.clone()),
            _ => Err(PortflowError::IdentifierNotFound(id.clone())),
        }
    }

    fn drop_node(&self, id: &NodeIdentifier) -> Result<T, PortflowError> {
        let mut inner = self.lock();
        let matches = inner
            .entries
            .get(&id.id)
            .is_some_and(|entry| entry.node_type == id.node_type);
        if !matches {
            return Err(PortflowError::IdentifierNotFound(id.clone()));
        }
        inner
            .entries
            .remove(&id.id)
            .map(|entry| entry.value)
            .ok_or_else(|| PortflowError::IdentifierNotFound(id.clone()))
    }

    fn identifiers(&self) -> Vec<NodeIdentifier> {
        self.lock()
            .entries
            .iter()
            .map(|(&id, entry)| NodeIdentifier::new(id, entry.node_type.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
