//! Content-addressed storage for per-channel time series
//!
//! Many recordings repeat identical raw series across channels (e.g. derived
//! HbT rows, or padding channels). The registry deduplicates them by value:
//! submitting an equal series twice returns the same handle, so downstream
//! consumers can key GPU uploads and caches off a small integer.
//!
//! Hash equality is only a candidate filter. The stored series is always
//! compared value-for-value before a handle is reused, so a hash collision
//! can at worst store a redundant copy but can never alias two distinct
//! series.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::types::{ChannelDataId, ChannelValue};

/// Errors from registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handle that no stored series corresponds to.
    #[error("invalid channel data index {index} (registry holds {len} series)")]
    InvalidIndex {
        /// The offending handle.
        index: ChannelDataId,
        /// Number of series currently stored.
        len: usize,
    },
}

/// Deduplicating store of raw channel time series.
///
/// One instance is owned by each loaded recording; the registry has no
/// internal synchronization and must not be shared across loading contexts.
#[derive(Debug, Default, Clone)]
pub struct ChannelDataRegistry {
    storage: Vec<Vec<ChannelValue>>,
    // Single-slot candidate map: a colliding later series overwrites the
    // association, leaving earlier series reachable only by rescan. The
    // equality check in `submit` keeps that correct.
    lookup: HashMap<u64, ChannelDataId>,
}

impl ChannelDataRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a series, returning its handle.
    ///
    /// Idempotent: resubmitting a value-equal series returns the previously
    /// assigned handle without storing a duplicate.
    pub fn submit(&mut self, data: &[ChannelValue]) -> ChannelDataId {
        let hash = hash_series(data);

        if let Some(&candidate) = self.lookup.get(&hash) {
            if self.storage[candidate as usize] == data {
                return candidate;
            }
        }

        let new_index = self.storage.len() as ChannelDataId;
        self.storage.push(data.to_vec());
        self.lookup.insert(hash, new_index);
        trace!(index = new_index, samples = data.len(), "series stored");
        new_index
    }

    /// Look up a stored series by handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidIndex`] when no series is stored under
    /// the handle.
    pub fn get(&self, index: ChannelDataId) -> Result<&[ChannelValue], RegistryError> {
        self.storage
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(RegistryError::InvalidIndex {
                index,
                len: self.storage.len(),
            })
    }

    /// Number of distinct series stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the registry holds no series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Drop all stored series and hash associations.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.lookup.clear();
    }
}

/// Order- and value-sensitive combined hash of a series.
///
/// Seeded with the length, then each sample's bit pattern is folded in with
/// the golden-ratio avalanche constant. Bitwise f64 hashing distinguishes
/// `0.0` from `-0.0`, which is fine for a candidate filter backed by value
/// equality.
fn hash_series(data: &[ChannelValue]) -> u64 {
    let mut seed = data.len() as u64;
    for value in data {
        let h = value.to_bits();
        seed ^= h
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2);
    }
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_is_idempotent() {
        let mut registry = ChannelDataRegistry::new();
        let series = vec![0.5, 1.5, 2.5, 3.5];

        let first = registry.submit(&series);
        let second = registry.submit(&series);

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_series_get_distinct_handles() {
        let mut registry = ChannelDataRegistry::new();

        let a = registry.submit(&[1.0, 2.0, 3.0]);
        let b = registry.submit(&[1.0, 2.0, 4.0]);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(registry.get(b).unwrap(), &[1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        // Same multiset of values, different order: must hash apart (or at
        // worst fall back to the equality check and still store both).
        let mut registry = ChannelDataRegistry::new();
        let a = registry.submit(&[1.0, 2.0, 3.0]);
        let b = registry.submit(&[3.0, 2.0, 1.0]);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_colliding_hash_slot_falls_back_to_equality() {
        // A real collision cannot be forced through the hash itself, so the
        // slot associations are primed by hand to simulate two distinct
        // series sharing one hash bucket.
        let mut registry = ChannelDataRegistry::new();
        let first = vec![9.0; 16];
        let second = vec![8.0; 16];

        let first_index = registry.submit(&first);

        // Point the second series' hash slot at the first series
        registry.lookup.insert(hash_series(&second), first_index);
        let second_index = registry.submit(&second);

        // Value mismatch on the occupied slot: fresh handle, slot repointed
        assert_ne!(second_index, first_index);
        assert_eq!(registry.lookup[&hash_series(&second)], second_index);
        assert_eq!(registry.submit(&second), second_index);
        assert_eq!(registry.get(first_index).unwrap(), first.as_slice());

        // Displace the first series' own slot the way a later colliding
        // submission would; it is then reachable only through the equality
        // fallback and a resubmission is stored as new, never aliased
        registry.lookup.insert(hash_series(&first), second_index);
        let first_again = registry.submit(&first);
        assert_ne!(first_again, second_index);
        assert_ne!(first_again, first_index);
        assert_eq!(
            registry.get(first_again).unwrap(),
            registry.get(first_index).unwrap()
        );
    }

    #[test]
    fn test_get_out_of_range() {
        let mut registry = ChannelDataRegistry::new();
        registry.submit(&[1.0]);

        let err = registry.get(5).unwrap_err();
        assert_eq!(err, RegistryError::InvalidIndex { index: 5, len: 1 });
    }

    #[test]
    fn test_clear_resets_handles() {
        let mut registry = ChannelDataRegistry::new();
        registry.submit(&[1.0, 2.0]);
        registry.submit(&[3.0, 4.0]);

        registry.clear();
        assert!(registry.is_empty());

        let index = registry.submit(&[5.0, 6.0]);
        assert_eq!(index, 0);
    }
}
