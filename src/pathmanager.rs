//! The path manager (§4.7): local-address discovery, remote-address
//! learning via `ADD_ADDR`, and path-array generation feeding the join
//! engine's client-side half (subflow initiation).

use crate::address::{AddrId, LocalAddr, RemoteAddr, Socket};
use crate::options::AddAddr;
use crate::subflow::PathIndex;
use std::net::IpAddr;

/// Result of folding one `ADD_ADDR` into the remote-address set (§4.7
/// "Remote-address learning").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// A new address was appended.
    Appended,
    /// The (id, address) pair disagreed with a stored entry (NAT case:
    /// same id, different observed source IP) and was updated in place.
    Updated,
    /// Exact match to an existing entry; nothing changed.
    NoOp,
    /// The remote-address list was already at its configured bound.
    Overflow,
}

/// A single entry in the path array (§3, §4.7): one (local, remote)
/// address pairing and the path index assigned to it, if any subflow
/// has ever used it. `None` ids mark the ULID half of the pairing (the
/// master's own address, per the GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathEntry {
    pub local_id: Option<AddrId>,
    pub remote_id: Option<AddrId>,
    pub local: Socket,
    pub remote: Socket,
    pub path_index: PathIndex,
    pub backup: bool,
}

/// A request the client-side PM hands to the socket layer (§4.7
/// "Initiate-subflow"); creating the actual socket and connecting it is
/// an external collaborator's job (§1), this core only decides *that*
/// and *with which addresses* a subflow should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubflowInitiateRequest {
    pub local: Socket,
    pub remote: Socket,
    pub path_index: PathIndex,
}

#[derive(Debug, Default)]
pub struct PathManager {
    local_addrs: Vec<LocalAddr>,
    remote_addrs: Vec<RemoteAddr>,
    /// Local addresses discovered but not yet announced in an
    /// `ADD_ADDR` to the peer (§4.7 "addr_unsent counters").
    addr_unsent: usize,
    next_local_id: AddrId,
}

impl PathManager {
    pub fn new() -> Self {
        Self {
            next_local_id: 1,
            ..Default::default()
        }
    }

    pub fn local_addrs(&self) -> &[LocalAddr] {
        &self.local_addrs
    }

    pub fn remote_addrs(&self) -> &[RemoteAddr] {
        &self.remote_addrs
    }

    pub fn addr_unsent(&self) -> usize {
        self.addr_unsent
    }

    /// §4.7 "Local-address discovery": folds a fresh interface scan
    /// (already filtered by the caller to exclude loopback, link-local,
    /// and host-scoped addresses — that filter depends on host
    /// networking details out of this core's scope) into the known set,
    /// assigning dense ids to anything new up to `max_local_addrs`.
    pub fn discover_local(&mut self, found: impl IntoIterator<Item = Socket>, max_local_addrs: usize) {
        for socket in found {
            if self.local_addrs.iter().any(|a| a.socket == socket) {
                continue;
            }
            if self.local_addrs.len() >= max_local_addrs {
                tracing::warn!("local address discovery capped, dropping additional address");
                break;
            }
            let id = self.next_local_id;
            self.next_local_id = self.next_local_id.saturating_add(1);
            self.local_addrs.push(LocalAddr { id, socket });
            self.addr_unsent += 1;
        }
    }

    /// Called once an `ADD_ADDR` announcement carrying the local address
    /// set has actually gone out on the wire.
    pub fn clear_unsent(&mut self) {
        self.addr_unsent = 0;
    }

    /// §4.7 "Remote-address learning".
    pub fn learn_remote(
        &mut self,
        add_addr: AddAddr,
        observed_source: IpAddr,
        max_remote_addrs: usize,
    ) -> LearnOutcome {
        let socket = Socket::new(observed_source, add_addr.port.unwrap_or(0));
        if let Some(existing) = self
            .remote_addrs
            .iter_mut()
            .find(|r| r.id == add_addr.addr_id)
        {
            if existing.socket == socket {
                return LearnOutcome::NoOp;
            }
            existing.socket = socket;
            return LearnOutcome::Updated;
        }
        if self.remote_addrs.len() >= max_remote_addrs {
            tracing::warn!(addr_id = add_addr.addr_id, "remote address list full");
            return LearnOutcome::Overflow;
        }
        self.remote_addrs.push(RemoteAddr {
            id: add_addr.addr_id,
            socket,
            backup: false,
        });
        LearnOutcome::Appended
    }

    /// §4.7 "Path-array generation": the Cartesian product of
    /// (local-addresses ∪ {ULID}) × (remote-addresses ∪ {ULID}) minus
    /// the ULID-only pair, matched against `existing` by (loc-id,
    /// rem-id) and, where both ports are non-wildcard, by port equality,
    /// so previously-assigned path indices survive a rebuild.
    /// `allocate_index` is called only for genuinely new entries.
    pub fn rebuild_path_array(
        &self,
        ulid_local: Socket,
        ulid_remote: Socket,
        existing: &[PathEntry],
        mut allocate_index: impl FnMut() -> PathIndex,
    ) -> Vec<PathEntry> {
        let mut out = Vec::new();

        let local_options: Vec<(Option<AddrId>, Socket)> = std::iter::once((None, ulid_local))
            .chain(self.local_addrs.iter().map(|a| (Some(a.id), a.socket)))
            .collect();
        let remote_options: Vec<(Option<AddrId>, Socket, bool)> = std::iter::once((None, ulid_remote, false))
            .chain(self.remote_addrs.iter().map(|a| (Some(a.id), a.socket, a.backup)))
            .collect();

        for &(local_id, local) in &local_options {
            for &(remote_id, remote, backup) in &remote_options {
                if local_id.is_none() && remote_id.is_none() {
                    continue; // already covered by the master subflow
                }
                let matched = existing.iter().find(|e| {
                    e.local_id == local_id
                        && e.remote_id == remote_id
                        && (e.local.port == 0
                            || local.port == 0
                            || e.remote.port == 0
                            || remote.port == 0
                            || (e.local.port == local.port && e.remote.port == remote.port))
                });
                let path_index = match matched {
                    Some(entry) => entry.path_index,
                    None => allocate_index(),
                };
                out.push(PathEntry {
                    local_id,
                    remote_id,
                    local,
                    remote,
                    path_index,
                    backup,
                });
            }
        }
        out
    }

    /// §4.7 "Per-ports mode": builds N-1 extra ULID-address entries with
    /// `port=0` rather than discovering multiple addresses.
    pub fn rebuild_per_ports_array(
        ulid_local: Socket,
        ulid_remote: Socket,
        ndiffports: u8,
        existing: &[PathEntry],
        mut allocate_index: impl FnMut() -> PathIndex,
    ) -> Vec<PathEntry> {
        let mut out = Vec::new();
        for n in 1..ndiffports {
            let local = Socket::new(ulid_local.address, 0);
            let matched = existing.get(n as usize - 1).copied();
            let path_index = match matched {
                Some(entry) => entry.path_index,
                None => allocate_index(),
            };
            out.push(PathEntry {
                local_id: None,
                remote_id: None,
                local,
                remote: ulid_remote,
                path_index,
                backup: false,
            });
        }
        out
    }

    /// §4.7 "Initiate-subflow": every path-array entry without a live
    /// subflow becomes a request.
    pub fn initiate_requests<'a>(
        path_array: &'a [PathEntry],
        live_path_indices: &'a [PathIndex],
    ) -> impl Iterator<Item = SubflowInitiateRequest> + 'a {
        path_array
            .iter()
            .filter(move |entry| !live_path_indices.contains(&entry.path_index))
            .map(|entry| SubflowInitiateRequest {
                local: entry.local,
                remote: entry.remote,
                path_index: entry.path_index,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(ip: &str, port: u16) -> Socket {
        Socket::new(ip.parse().unwrap(), port)
    }

    #[test]
    fn discovery_assigns_dense_ids() {
        let mut pm = PathManager::new();
        pm.discover_local([socket("10.0.0.1", 0), socket("10.0.0.2", 0)], 12);
        assert_eq!(pm.local_addrs()[0].id, 1);
        assert_eq!(pm.local_addrs()[1].id, 2);
        assert_eq!(pm.addr_unsent(), 2);
    }

    #[test]
    fn discovery_caps_at_max() {
        let mut pm = PathManager::new();
        pm.discover_local([socket("10.0.0.1", 0), socket("10.0.0.2", 0)], 1);
        assert_eq!(pm.local_addrs().len(), 1);
    }

    #[test]
    fn learn_remote_appends_then_noops_on_exact_match() {
        let mut pm = PathManager::new();
        let add = AddAddr {
            addr_id: 9,
            address: "192.0.2.1".parse().unwrap(),
            port: Some(5000),
        };
        assert_eq!(
            pm.learn_remote(add, "192.0.2.1".parse().unwrap(), 8),
            LearnOutcome::Appended
        );
        assert_eq!(
            pm.learn_remote(add, "192.0.2.1".parse().unwrap(), 8),
            LearnOutcome::NoOp
        );
    }

    #[test]
    fn learn_remote_updates_on_nat_mismatch() {
        let mut pm = PathManager::new();
        let add = AddAddr {
            addr_id: 9,
            address: "192.0.2.1".parse().unwrap(),
            port: Some(5000),
        };
        pm.learn_remote(add, "192.0.2.1".parse().unwrap(), 8);
        let outcome = pm.learn_remote(add, "203.0.113.9".parse().unwrap(), 8);
        assert_eq!(outcome, LearnOutcome::Updated);
    }

    #[test]
    fn learn_remote_overflows_past_bound() {
        let mut pm = PathManager::new();
        for i in 0..2 {
            pm.learn_remote(
                AddAddr {
                    addr_id: i,
                    address: "192.0.2.1".parse().unwrap(),
                    port: None,
                },
                "192.0.2.1".parse().unwrap(),
                2,
            );
        }
        let outcome = pm.learn_remote(
            AddAddr {
                addr_id: 9,
                address: "192.0.2.9".parse().unwrap(),
                port: None,
            },
            "192.0.2.9".parse().unwrap(),
            2,
        );
        assert_eq!(outcome, LearnOutcome::Overflow);
    }

    #[test]
    fn path_array_excludes_ulid_only_pair_and_is_cartesian() {
        let mut pm = PathManager::new();
        pm.discover_local([socket("10.0.0.2", 0)], 12);
        pm.learn_remote(
            AddAddr {
                addr_id: 1,
                address: "192.0.2.9".parse().unwrap(),
                port: None,
            },
            "192.0.2.9".parse().unwrap(),
            8,
        );
        let mut counter = 2u8;
        let array = pm.rebuild_path_array(socket("10.0.0.1", 100), socket("192.0.2.1", 200), &[], || {
            counter += 1;
            counter
        });
        // (localB, ULIDremote) and (ULIDlocal, remoteB) and (localB, remoteB) = 3 entries.
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn path_array_rebuild_preserves_existing_indices() {
        let mut pm = PathManager::new();
        pm.discover_local([socket("10.0.0.2", 0)], 12);
        let mut counter = 1u8;
        let first = pm.rebuild_path_array(socket("10.0.0.1", 100), socket("192.0.2.1", 200), &[], || {
            counter += 1;
            counter
        });
        let second = pm.rebuild_path_array(socket("10.0.0.1", 100), socket("192.0.2.1", 200), &first, || {
            counter += 1;
            counter
        });
        assert_eq!(first[0].path_index, second[0].path_index);
    }

    #[test]
    fn initiate_requests_skip_live_path_indices() {
        let entries = vec![PathEntry {
            local_id: Some(1),
            remote_id: None,
            local: socket("10.0.0.2", 0),
            remote: socket("192.0.2.1", 200),
            path_index: 2,
            backup: false,
        }];
        let requests: Vec<_> = PathManager::initiate_requests(&entries, &[2]).collect();
        assert!(requests.is_empty());
        let requests: Vec<_> = PathManager::initiate_requests(&entries, &[]).collect();
        assert_eq!(requests.len(), 1);
    }
}
