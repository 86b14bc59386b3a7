//! Store Configuration
//!
//! Construction-time knobs for [`TtlStore`](crate::TtlStore). Nothing here
//! changes after the store is built.

/// Configuration for a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Seed for the treap priority generator (default: drawn from OS entropy).
    ///
    /// Fixing the seed makes the tree shape reproducible across runs.
    pub seed: Option<u64>,

    /// Number of entries to reserve room for up front (default: 0)
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed: None,
            initial_capacity: 0,
        }
    }
}

impl StoreConfig {
    /// Returns a copy of this configuration with a fixed priority seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns a copy of this configuration reserving room for `capacity` entries.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
