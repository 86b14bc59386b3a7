//! Storage Engine Module
//!
//! This module provides the core storage functionality for treapkv: an
//! ordered map with split/merge operations, and a thread-safe store that
//! layers per-key TTL on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TtlStore (RwLock)                          │
//! │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
//! │  │         Treap            │  │   TTL index (BTreeSet)  │  │
//! │  │  key -> value, expiry    │  │   (expiry, key) pairs   │  │
//! │  └──────────────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ now()
//!              ┌─────────────┴─────────────┐
//!              │           Clock           │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Ordered**: Keys iterate in ascending byte order
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **TTL Support**: Keys can have time-to-live expiry
//! - **Lazy Expiry**: Expired keys are swept at the start of every operation
//! - **Pluggable Clock**: Tests drive time with a [`ManualClock`]
//!
//! ## Example
//!
//! ```
//! use treapkv::storage::{ManualClock, TtlStore};
//! use bytes::Bytes;
//!
//! let clock = ManualClock::new(0);
//! let store = TtlStore::with_clock(clock.clone());
//!
//! store.set("name", "Ariz", 0);
//! store.set("session", "token123", 3600);
//! assert_eq!(store.get("name"), Some(Bytes::from("Ariz")));
//!
//! clock.advance(3600);
//! assert_eq!(store.get("session"), None);
//! ```

pub mod clock;
pub mod entry;
pub mod store;
pub mod treap;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use entry::{Entry, Expiration};
pub use store::{StoreStats, TtlStore};
pub use treap::{Iter, Treap};
