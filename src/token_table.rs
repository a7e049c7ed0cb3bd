//! The token hash table (§4.8 "Token hash"): maps a 32-bit local MCB
//! token to the MCB, keyed the way the teacher keys its session tables
//! (`elvis_core::protocols::tcp::Tcp`'s `DashMap<ConnectionId, Arc<TcpSession>>`),
//! just with a `u32` token standing in for the 4-tuple.

use crate::error::McbError;
use crate::FxDashMap;
use rand::RngCore;
use std::sync::Arc;

/// Process-wide monotonic counter backing client-side token allocation
/// (§4.6 "Token allocation"). A real kernel increments a per-namespace
/// counter; a random starting point plus a wrapping increment gives the
/// same "very unlikely to collide, cheap to generate" property without
/// a global mutable counter surviving process restart.
pub struct TokenAllocator {
    next: std::sync::atomic::AtomicU32,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            next: std::sync::atomic::AtomicU32::new(rand::thread_rng().next_u32()),
        }
    }

    pub fn allocate(&self) -> u32 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The token table itself: `token -> Arc<Mcb>`. Readers dominate during
/// steady-state `MP_JOIN` lookup (§5), which is exactly the access
/// pattern `DashMap`'s sharded locking is built for.
#[derive(Default)]
pub struct TokenTable<M> {
    inner: FxDashMap<u32, Arc<M>>,
}

impl<M> TokenTable<M> {
    pub fn new() -> Self {
        Self {
            inner: FxDashMap::default(),
        }
    }

    /// Inserts a freshly-created MCB under its token. Fails with
    /// [`McbError::TokenCollision`] rather than silently overwriting an
    /// existing entry (§4.6 "Token allocation").
    pub fn insert(&self, token: u32, mcb: Arc<M>) -> Result<(), McbError> {
        match self.inner.entry(token) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(McbError::TokenCollision),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(mcb);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, token: u32) -> Option<Arc<M>> {
        self.inner.get(&token).map(|entry| entry.value().clone())
    }

    /// Tied to MCB destruction (§4.6: "the hash entry's lifetime is tied
    /// to MCB destruction").
    pub fn remove(&self, token: u32) -> Option<Arc<M>> {
        self.inner.remove(&token).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let table: TokenTable<u8> = TokenTable::new();
        table.insert(42, Arc::new(7)).unwrap();
        assert_eq!(*table.lookup(42).unwrap(), 7);
    }

    #[test]
    fn duplicate_insert_is_a_collision() {
        let table: TokenTable<u8> = TokenTable::new();
        table.insert(1, Arc::new(1)).unwrap();
        assert!(matches!(
            table.insert(1, Arc::new(2)),
            Err(McbError::TokenCollision)
        ));
    }

    #[test]
    fn remove_drops_the_entry() {
        let table: TokenTable<u8> = TokenTable::new();
        table.insert(5, Arc::new(9)).unwrap();
        assert!(table.remove(5).is_some());
        assert!(table.lookup(5).is_none());
    }

    #[test]
    fn allocator_never_repeats_within_a_short_run() {
        let alloc = TokenAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
    }
}
