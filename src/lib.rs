//! # treapkv - A Concurrent In-Memory Key-Value Store with TTL
//!
//! treapkv keeps string keys in sorted order inside a treap and lets every
//! key carry its own time-to-live. It is a library: there is no server, no
//! persistence and no background thread.
//!
//! ## Features
//!
//! - **Ordered**: Point lookups plus "next N keys from here" range reads
//! - **Balanced by Randomness**: Treap priorities give expected O(log N) depth
//! - **TTL Support**: `ttl = 0` never expires, otherwise expires after `ttl` seconds
//! - **Thread-Safe**: One `RwLock` guards the whole store
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TtlStore                                   │
//! │                                                                         │
//! │   set / remove / get / get_many_sorted / len / remove_one_expired_entry │
//! │                               │                                         │
//! │                               ▼                                         │
//! │                     lazy sweep (TTL index min)                          │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌───────────────────────────────────────────┐   ┌──────────────────┐   │
//! │  │                 Treap                     │   │  (expiry, key)   │   │
//! │  │   split_before / split_after / merge      │   │    BTreeSet      │   │
//! │  │   arena nodes with parent links           │   │                  │   │
//! │  └───────────────────────────────────────────┘   └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use treapkv::TtlStore;
//! use bytes::Bytes;
//!
//! let store = TtlStore::new();
//!
//! store.set("b", "2", 0);
//! store.set("a", "1", 60);
//! store.set("c", "3", 0);
//!
//! assert_eq!(store.get("a"), Some(Bytes::from("1")));
//! assert_eq!(store.get_many_sorted("b", 10).len(), 2);
//! assert!(store.remove("c"));
//! assert_eq!(store.len(), 2);
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: The treap, the TTL-aware store and the clock abstraction
//! - [`config`]: Construction-time configuration
//!
//! ## Design Highlights
//!
//! ### Lazy Expiry
//!
//! Keys with TTL are never swept by a timer. Each operation first removes
//! entries whose expiration has passed, smallest expiration first, until the
//! next one is still in the future. No operation ever observes an expired key.
//!
//! ### Stable Nodes
//!
//! Overwriting a key updates its treap node in place instead of deleting and
//! re-inserting it.

pub mod config;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::StoreConfig;
pub use storage::{
    Clock, Entry, Expiration, ManualClock, MonotonicClock, StoreStats, Treap, TtlStore,
};

/// Version of treapkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
