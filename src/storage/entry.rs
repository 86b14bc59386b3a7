//! Stored Entries and Expiration Times
//!
//! An [`Entry`] is the unit of storage: a key, a value and an absolute
//! [`Expiration`]. Entries are owned by the treap node holding them; callers
//! only ever see borrowed entries or cloned `Bytes`.

use bytes::Bytes;

/// Absolute expiration time of an entry, in clock seconds.
///
/// `Never` orders after every `At`, so it acts as the "maximum" expiration
/// when entries are sorted by expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expiration {
    /// Expires once the clock reaches this second.
    At(u64),
    /// Never expires.
    Never,
}

impl Expiration {
    /// Computes the expiration for a TTL given in seconds.
    ///
    /// A TTL of `0` means the entry never expires.
    ///
    /// ```
    /// use treapkv::Expiration;
    ///
    /// assert_eq!(Expiration::after(100, 0), Expiration::Never);
    /// assert_eq!(Expiration::after(100, 5), Expiration::At(105));
    /// ```
    pub fn after(now: u64, ttl: u64) -> Self {
        if ttl == 0 {
            Expiration::Never
        } else {
            Expiration::At(now.saturating_add(ttl))
        }
    }

    /// Checks if this expiration has passed at `now`.
    #[inline]
    pub fn is_due(self, now: u64) -> bool {
        match self {
            Expiration::At(at) => now >= at,
            Expiration::Never => false,
        }
    }

    /// Seconds left until expiration, or `None` if it never expires.
    pub fn remaining(self, now: u64) -> Option<u64> {
        match self {
            Expiration::At(at) => Some(at.saturating_sub(now)),
            Expiration::Never => None,
        }
    }
}

/// A key-value pair with its expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The key (unique within a treap)
    pub key: Bytes,
    /// The stored value
    pub value: Bytes,
    /// When this entry stops being readable
    pub expires_at: Expiration,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(key: Bytes, value: Bytes, expires_at: Expiration) -> Self {
        Self {
            key,
            value,
            expires_at,
        }
    }

    /// Checks if this entry has expired at `now`.
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_due(now)
    }
}
