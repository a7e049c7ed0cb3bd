//! Address and endpoint types.
//!
//! The teacher (`elvis_core::protocols::ipv4`) rolls its own
//! `Ipv4Address` because its sessions never touch a real socket. This
//! core does: §6's `ADD_ADDR` carries real IPv4 *and* IPv6 payloads, and
//! §4.7's local-address discovery walks real host interfaces, so
//! addresses here are `std::net::IpAddr` rather than a simulator-only
//! newtype.

use std::net::IpAddr;

/// A dense, 1-based identifier for an address as carried in `ADD_ADDR`
/// and `MP_JOIN` (§6).
pub type AddrId = u8;

/// A (local or remote) address-and-port pair, as stored in the path
/// manager's address sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Socket {
    pub address: IpAddr,
    pub port: u16,
}

impl Socket {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }
}

/// A locally-known address, tagged with the dense id the path manager
/// assigned it (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalAddr {
    pub id: AddrId,
    pub socket: Socket,
}

/// A remote address learned via `ADD_ADDR` (§4.7), or the master's own
/// remote address acting as the ULID's remote half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteAddr {
    pub id: AddrId,
    pub socket: Socket,
    /// The `b` backup bit carried alongside the id on `MP_JOIN` and, for
    /// addresses we learned about ourselves, on our own `ADD_ADDR`.
    pub backup: bool,
}
