//! The join engine (§4.8): the token/tuple hash tables and the
//! server-side `MP_JOIN` SYN/SYN-ACK/ACK handshake that attaches a new
//! subflow to an existing MCB.
//!
//! Lookups follow the teacher's locking shape for shared session state
//! (`elvis_core::protocols::tcp::Tcp`'s `Arc<RwLock<Tcb>>` sessions): the
//! token table hands out `Arc<RwLock<Mcb>>` so a lookup never blocks
//! other readers, and mutation happens under a short-held write lock
//! rather than a process-wide lock (§5's "master subflow's lock").

use crate::address::{AddrId, Socket};
use crate::error::JoinError;
use crate::mcb::Mcb;
use crate::pathmanager::PathEntry;
use crate::subflow::{PathIndex, Subflow};
use crate::token_table::TokenTable;
use crate::FxDashMap;
use std::sync::{Arc, RwLock};

/// A pending `MP_JOIN` handshake (§3 "Request-sock"), indexed by the
/// sender's tuple until the final ACK arrives or the MCB closes.
#[derive(Debug, Clone, Copy)]
pub struct RequestSock {
    pub remote: Socket,
    pub mcb_token: u32,
    /// This end's address id, sent back in the SYN-ACK's `MP_JOIN`.
    pub our_addr_id: AddrId,
}

#[derive(Default)]
pub struct JoinEngine {
    pub tokens: TokenTable<RwLock<Mcb>>,
    tuples: FxDashMap<Socket, RequestSock>,
}

impl JoinEngine {
    pub fn new() -> Self {
        Self {
            tokens: TokenTable::new(),
            tuples: FxDashMap::default(),
        }
    }

    /// §4.8 "Server-side SYN with JOIN". Locates the target MCB by
    /// token, learns the sender's observed source address (NAT
    /// traversal), creates and indexes a request-sock, and hands back
    /// the address id this end should advertise in its `MP_JOIN`
    /// SYN-ACK.
    pub fn on_syn_with_join(
        &self,
        token: u32,
        remote: Socket,
        our_addr_id: AddrId,
        max_remote_addrs: usize,
    ) -> Result<Arc<RwLock<Mcb>>, JoinError> {
        let mcb = self.tokens.lookup(token).ok_or(JoinError::UnknownToken(token))?;
        {
            let mut guard = mcb.write().expect("mcb lock poisoned");
            guard.pm.learn_remote(
                crate::options::AddAddr {
                    addr_id: our_addr_id,
                    address: remote.address,
                    port: Some(remote.port),
                },
                remote.address,
                max_remote_addrs,
            );
        }
        self.tuples.insert(
            remote,
            RequestSock {
                remote,
                mcb_token: token,
                our_addr_id,
            },
        );
        Ok(mcb)
    }

    /// §4.8 "Server-side final ACK". Locates the request-sock via the
    /// tuple hash, assigns a path index by matching the new subflow's
    /// addresses against the MCB's path array (falling back to
    /// `next_unused_pi++`), and attaches it through the subflow registry
    /// (§4.5).
    pub fn on_final_ack(&self, remote: Socket, mut subflow: Subflow) -> Result<Arc<RwLock<Mcb>>, JoinError> {
        let (_, request) = self.tuples.remove(&remote).ok_or(JoinError::UnknownToken(0))?;
        let mcb = self
            .tokens
            .lookup(request.mcb_token)
            .ok_or(JoinError::UnknownToken(request.mcb_token))?;

        let path_index = {
            let guard = mcb.read().expect("mcb lock poisoned");
            match_path_index(&guard.path_array, subflow.local, subflow.remote)
        };

        let mut guard = mcb.write().expect("mcb lock poisoned");
        let path_index = path_index.unwrap_or_else(|| guard.next_path_index());
        if guard.find(path_index).is_some() {
            return Err(JoinError::PathIndexCollision(path_index));
        }
        subflow.path_index = path_index;
        subflow.slave_sk = true;
        drop(guard);

        mcb.write()
            .expect("mcb lock poisoned")
            .attach_subflow(subflow)
            .map_err(|_| JoinError::PathIndexCollision(path_index))?;
        Ok(mcb)
    }

    /// Drops every request-sock still pointing at `token` (§3
    /// "Request-sock ... discarded on MCB close").
    pub fn discard_pending_for(&self, token: u32) {
        self.tuples.retain(|_, req| req.mcb_token != token);
    }
}

fn match_path_index(path_array: &[PathEntry], local: Socket, remote: Socket) -> Option<PathIndex> {
    path_array
        .iter()
        .find(|e| e.local == local && e.remote == remote)
        .map(|e| e.path_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subflow::{Subflow, MASTER_PATH_INDEX};

    fn socket(ip: &str, port: u16) -> Socket {
        Socket::new(ip.parse().unwrap(), port)
    }

    fn fresh_mcb() -> Arc<RwLock<Mcb>> {
        let master = Subflow::master(socket("10.0.0.1", 1000), socket("10.0.0.9", 2000), 0, 1460);
        Arc::new(RwLock::new(Mcb::new_server(42, 1, 2, master, 1 << 16)))
    }

    #[test]
    fn unknown_token_is_rejected() {
        let engine = JoinEngine::new();
        let err = engine
            .on_syn_with_join(999, socket("10.0.0.2", 3000), 2, 8)
            .unwrap_err();
        assert!(matches!(err, JoinError::UnknownToken(999)));
    }

    #[test]
    fn syn_then_final_ack_attaches_subflow() {
        let engine = JoinEngine::new();
        let mcb = fresh_mcb();
        engine.tokens.insert(42, mcb.clone()).unwrap();

        let remote = socket("10.0.0.9", 2000);
        engine.on_syn_with_join(42, remote, 2, 8).unwrap();

        let joined = Subflow::joined(socket("10.0.0.2", 3000), remote, 0, 1460);
        let result = engine.on_final_ack(remote, joined).unwrap();
        let guard = result.read().unwrap();
        assert!(guard.find(2).is_some() || guard.subflows().any(|sf| sf.path_index != MASTER_PATH_INDEX));
    }

    #[test]
    fn final_ack_without_syn_is_rejected() {
        let engine = JoinEngine::new();
        let remote = socket("10.0.0.9", 2000);
        let joined = Subflow::joined(socket("10.0.0.2", 3000), remote, 0, 1460);
        assert!(engine.on_final_ack(remote, joined).is_err());
    }
}
