//! # Node Storage
//!
//! Keeps live node instances under identifiers generated by the store.
//!
//! Identifiers pair a numeric id with the node type. Ids come from a counter
//! that starts at 1, only increases, and is never reused after a drop.

mod map_storage;

pub use map_storage::MapNodeStorage;

use crate::{NodeIdentifier, PortflowError};

/// Concurrent store of typed node handles.
///
/// Every method takes `&self`; implementations synchronise internally.
pub trait NodeStorage<T: Clone> {
    /// Store `value` and return its freshly generated identifier.
    fn add(&self, node_type: &str, value: T) -> NodeIdentifier;

    /// Clone of the stored value.
    ///
    /// An unknown id, or a known id paired with another node type, is not found.
    fn get(&self, id: &NodeIdentifier) -> Result<T, PortflowError>;

    /// Remove and return the stored value.
    fn drop_node(&self, id: &NodeIdentifier) -> Result<T, PortflowError>;

    /// Identifiers currently stored, in id order.
    fn identifiers(&self) -> Vec<NodeIdentifier>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
